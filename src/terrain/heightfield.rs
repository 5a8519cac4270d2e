use nalgebra::Vector3;
use tracing::debug;

use super::provider::TerrainProvider;
use super::TerrainError;

/// Engine-side copy of the terrain heights.
///
/// Three buffers of identical shape are kept, all in normalized units:
/// `current` (live, edited every frame), `baseline` (the undeformed terrain
/// captured at load) and `filtered` (smoothing scratch). Reads multiply by
/// the height scale and writes divide by it, so callers only ever see world
/// heights. Integer cell coordinates wrap toroidally in both axes.
#[derive(Debug, Clone)]
pub struct Heightfield {
    width: usize,
    height: usize,
    size_x: f32,
    size_z: f32,
    height_scale: f32,
    current: Vec<f32>,
    baseline: Vec<f32>,
    filtered: Vec<f32>,
}

impl Heightfield {
    /// Build from raw normalized samples.
    pub fn new(
        width: usize,
        height: usize,
        size: (f32, f32),
        height_scale: f32,
        samples: Vec<f32>,
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
        if samples.len() != width * height {
            return Err(TerrainError::BufferLength {
                expected: width * height,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            size_x: size.0,
            size_z: size.1,
            height_scale,
            baseline: samples.clone(),
            filtered: samples.clone(),
            current: samples,
        })
    }

    /// Load the full terrain from a provider, capturing it as the baseline.
    pub fn from_provider<T: TerrainProvider + ?Sized>(provider: &T) -> Result<Self, TerrainError> {
        let (width, height) = provider.resolution();
        let samples = provider.get_heights(0, 0, width, height);
        let field = Self::new(
            width,
            height,
            provider.world_size(),
            provider.height_scale(),
            samples,
        )?;
        debug!(width, height, "heightfield loaded from provider");
        Ok(field)
    }

    /// Samples along X and Z.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn world_size(&self) -> (f32, f32) {
        (self.size_x, self.size_z)
    }

    pub fn height_scale(&self) -> f32 {
        self.height_scale
    }

    /// World distance between adjacent samples along X and Z.
    pub fn cell_lengths(&self) -> (f32, f32) {
        (
            self.size_x / (self.width - 1) as f32,
            self.size_z / (self.height - 1) as f32,
        )
    }

    /// World area covered by one cell.
    pub fn cell_area(&self) -> f32 {
        let (lx, lz) = self.cell_lengths();
        lx * lz
    }

    #[inline]
    fn index(&self, x: i32, z: i32) -> usize {
        let xi = x.rem_euclid(self.width as i32) as usize;
        let zi = z.rem_euclid(self.height as i32) as usize;
        zi * self.width + xi
    }

    /// True when the cell lies on the terrain without wrapping.
    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && z >= 0 && (x as usize) < self.width && (z as usize) < self.height
    }

    /// Nearest on-terrain cell.
    pub fn clamp_cell(&self, x: i32, z: i32) -> (i32, i32) {
        (x.clamp(0, self.width as i32 - 1), z.clamp(0, self.height as i32 - 1))
    }

    /// Live world height of a cell.
    pub fn get(&self, x: i32, z: i32) -> f32 {
        self.current[self.index(x, z)] * self.height_scale
    }

    /// Undeformed world height of a cell.
    pub fn get_constant(&self, x: i32, z: i32) -> f32 {
        self.baseline[self.index(x, z)] * self.height_scale
    }

    /// Smoothing scratch height of a cell.
    pub fn get_filtered(&self, x: i32, z: i32) -> f32 {
        self.filtered[self.index(x, z)] * self.height_scale
    }

    /// Write a live world height.
    pub fn set(&mut self, x: i32, z: i32, world_height: f32) {
        let i = self.index(x, z);
        self.current[i] = world_height / self.height_scale;
    }

    /// Write a smoothing scratch world height.
    pub fn set_filtered(&mut self, x: i32, z: i32, world_height: f32) {
        let i = self.index(x, z);
        self.filtered[i] = world_height / self.height_scale;
    }

    /// Bilinear sample of the live surface at fractional grid coordinates.
    pub fn get_interpolated(&self, gx: f32, gz: f32) -> f32 {
        let x0 = gx.floor();
        let z0 = gz.floor();
        let tx = gx - x0;
        let tz = gz - z0;
        let (x0, z0) = (x0 as i32, z0 as i32);

        let h00 = self.get(x0, z0);
        let h10 = self.get(x0 + 1, z0);
        let h01 = self.get(x0, z0 + 1);
        let h11 = self.get(x0 + 1, z0 + 1);

        let near = h00 + (h10 - h00) * tx;
        let far = h01 + (h11 - h01) * tx;
        near + (far - near) * tz
    }

    /// Live surface height under a world-space XZ position.
    pub fn height_at_world(&self, x: f32, z: f32) -> f32 {
        let (lx, lz) = self.cell_lengths();
        self.get_interpolated(x / lx, z / lz)
    }

    /// Grid coordinates to world position. Y passes through unchanged.
    pub fn grid_to_world(&self, grid: Vector3<f32>) -> Vector3<f32> {
        let (lx, lz) = self.cell_lengths();
        Vector3::new(grid.x * lx, grid.y, grid.z * lz)
    }

    /// World position to fractional grid coordinates. Y passes through unchanged.
    pub fn world_to_grid(&self, world: Vector3<f32>) -> Vector3<f32> {
        let (lx, lz) = self.cell_lengths();
        Vector3::new(world.x / lx, world.y, world.z / lz)
    }

    /// Integer cell containing a world position.
    pub fn world_to_cell(&self, world: Vector3<f32>) -> (i32, i32) {
        let grid = self.world_to_grid(world);
        (grid.x.floor() as i32, grid.z.floor() as i32)
    }

    /// Set every live cell of a square window to one world height. The
    /// window is clipped to the terrain.
    pub fn flatten_window(&mut self, center: (i32, i32), half: i32, world_height: f32) {
        for dz in -half..=half {
            for dx in -half..=half {
                let (x, z) = (center.0 + dx, center.1 + dz);
                if self.contains(x, z) {
                    self.set(x, z, world_height);
                }
            }
        }
    }

    /// Number of live cells that differ from the baseline.
    pub fn deformed_cells(&self) -> usize {
        self.current
            .iter()
            .zip(&self.baseline)
            .filter(|(c, b)| c != b)
            .count()
    }

    /// Live world heights, row-major.
    pub fn world_heights(&self) -> Vec<f32> {
        self.current.iter().map(|h| h * self.height_scale).collect()
    }

    /// Commit the live buffer to the provider in a single upload.
    pub fn save<T: TerrainProvider + ?Sized>(&self, provider: &mut T) -> Result<(), TerrainError> {
        provider.set_heights(0, 0, self.width, self.height, &self.current)
    }
}
