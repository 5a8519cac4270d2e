use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::TerrainError;
use crate::config::TerrainConfig;

/// Backing terrain the heightfield is loaded from and committed to.
///
/// Height buffers are normalized (world height divided by `height_scale`),
/// row-major with X varying fastest.
pub trait TerrainProvider {
    /// Samples along X and Z.
    fn resolution(&self) -> (usize, usize);
    /// World extent along X and Z.
    fn world_size(&self) -> (f32, f32);
    fn height_scale(&self) -> f32;
    /// Read a `w` x `h` block starting at (`x0`, `z0`).
    fn get_heights(&self, x0: usize, z0: usize, w: usize, h: usize) -> Vec<f32>;
    /// Overwrite a `w` x `h` block starting at (`x0`, `z0`).
    fn set_heights(
        &mut self,
        x0: usize,
        z0: usize,
        w: usize,
        h: usize,
        heights: &[f32],
    ) -> Result<(), TerrainError>;
}

/// Terrain held entirely in memory. Counts uploads so callers can verify
/// how often the engine commits.
#[derive(Debug, Clone)]
pub struct MemoryTerrain {
    width: usize,
    height: usize,
    size_x: f32,
    size_z: f32,
    height_scale: f32,
    heights: Vec<f32>,
    uploads: u64,
}

impl MemoryTerrain {
    /// Flat terrain at the given world height.
    pub fn flat(
        width: usize,
        height: usize,
        size: (f32, f32),
        height_scale: f32,
        world_height: f32,
    ) -> Result<Self, TerrainError> {
        if width < 2 || height < 2 {
            return Err(TerrainError::Resolution { width, height });
        }
        if !(size.0 > 0.0 && size.1 > 0.0) {
            return Err(TerrainError::Size { x: size.0, z: size.1 });
        }
        if height_scale <= 0.0 {
            return Err(TerrainError::HeightScale(height_scale));
        }
        Ok(Self {
            width,
            height,
            size_x: size.0,
            size_z: size.1,
            height_scale,
            heights: vec![world_height / height_scale; width * height],
            uploads: 0,
        })
    }

    /// Square terrain described by the `[terrain]` config section, with
    /// seeded roughness when `roughness > 0`.
    pub fn from_config(config: &TerrainConfig) -> Result<Self, TerrainError> {
        let mut terrain = Self::flat(
            config.resolution,
            config.resolution,
            (config.size[0], config.size[1]),
            config.height_scale,
            config.base_height,
        )?;
        if config.roughness > 0.0 {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let amplitude = config.roughness / config.height_scale;
            for h in terrain.heights.iter_mut() {
                *h += amplitude * (rng.gen::<f32>() - 0.5);
            }
        }
        Ok(terrain)
    }

    /// Number of `set_heights` calls received so far.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// World height of one sample.
    pub fn sample(&self, x: usize, z: usize) -> f32 {
        self.heights[z * self.width + x] * self.height_scale
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }
}

impl TerrainProvider for MemoryTerrain {
    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn world_size(&self) -> (f32, f32) {
        (self.size_x, self.size_z)
    }

    fn height_scale(&self) -> f32 {
        self.height_scale
    }

    fn get_heights(&self, x0: usize, z0: usize, w: usize, h: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(w * h);
        for z in z0..(z0 + h).min(self.height) {
            let row = z * self.width;
            out.extend_from_slice(&self.heights[row + x0..row + (x0 + w).min(self.width)]);
        }
        out
    }

    fn set_heights(
        &mut self,
        x0: usize,
        z0: usize,
        w: usize,
        h: usize,
        heights: &[f32],
    ) -> Result<(), TerrainError> {
        if x0 + w > self.width || z0 + h > self.height {
            return Err(TerrainError::Region { x0, z0, w, h });
        }
        if heights.len() != w * h {
            return Err(TerrainError::BufferLength {
                expected: w * h,
                actual: heights.len(),
            });
        }
        for (row, chunk) in heights.chunks(w).enumerate() {
            let start = (z0 + row) * self.width + x0;
            self.heights[start..start + w].copy_from_slice(chunk);
        }
        self.uploads += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_terrain_is_normalized() {
        let terrain = MemoryTerrain::flat(5, 5, (4.0, 4.0), 2.0, 0.5).unwrap();
        assert_eq!(terrain.heights()[0], 0.25);
        assert_eq!(terrain.sample(3, 3), 0.5);
    }

    #[test]
    fn test_rejects_degenerate_terrain() {
        assert_eq!(
            MemoryTerrain::flat(1, 5, (4.0, 4.0), 1.0, 0.0).unwrap_err(),
            TerrainError::Resolution { width: 1, height: 5 }
        );
        assert!(MemoryTerrain::flat(5, 5, (0.0, 4.0), 1.0, 0.0).is_err());
        assert!(MemoryTerrain::flat(5, 5, (4.0, 4.0), 0.0, 0.0).is_err());
    }

    #[test]
    fn test_block_read_write_counts_uploads() {
        let mut terrain = MemoryTerrain::flat(4, 4, (3.0, 3.0), 1.0, 0.0).unwrap();
        terrain.set_heights(1, 1, 2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(terrain.uploads(), 1);
        assert_eq!(terrain.get_heights(1, 1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(terrain.sample(0, 0), 0.0);

        assert!(terrain.set_heights(3, 3, 2, 2, &[0.0; 4]).is_err());
        assert_eq!(terrain.uploads(), 1);
    }

    #[test]
    fn test_seeded_roughness_is_reproducible() {
        let config = TerrainConfig {
            resolution: 9,
            roughness: 0.05,
            ..TerrainConfig::default()
        };
        let a = MemoryTerrain::from_config(&config).unwrap();
        let b = MemoryTerrain::from_config(&config).unwrap();
        assert_eq!(a.heights(), b.heights());
        assert!(a.heights().iter().any(|&h| (h - 0.5).abs() > 1e-6));
        assert!(a.heights().iter().all(|&h| (h - 0.5).abs() <= 0.025 + 1e-6));
    }
}
