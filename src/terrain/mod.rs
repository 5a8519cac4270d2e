//! Terrain storage: the engine-side heightfield and the provider it is
//! loaded from and committed back to.

pub mod heightfield;
pub mod provider;

pub use heightfield::Heightfield;
pub use provider::{MemoryTerrain, TerrainProvider};

use thiserror::Error;

/// Errors raised while building or syncing terrain buffers.
#[derive(Debug, Error, PartialEq)]
pub enum TerrainError {
    #[error("terrain resolution must be at least 2x2, got {width}x{height}")]
    Resolution { width: usize, height: usize },
    #[error("terrain world size must be positive, got {x}x{z}")]
    Size { x: f32, z: f32 },
    #[error("terrain height scale must be positive, got {0}")]
    HeightScale(f32),
    #[error("height buffer holds {actual} samples, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("block {w}x{h} at ({x0}, {z0}) exceeds the terrain")]
    Region { x0: usize, z0: usize, w: usize, h: usize },
}
