//! Footprint deformation: contact classification, ground reaction forces,
//! the compaction solver, smoothing, and the per-frame orchestrator.

pub mod brush;
pub mod constants;
pub mod contact;
pub mod engine;
pub mod filter;
pub mod forces;
pub mod gait;
pub mod observation;
pub mod solver;

pub use brush::{Brush, BrushId, BrushSlot};
pub use contact::{CellTag, ContactProbe, ContactWindow};
pub use engine::FootprintEngine;
pub use observation::{FrameObservation, MetricsSink};

use nalgebra::Vector3;
use serde::Serialize;

/// Which foot of a biped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FootSide {
    Left,
    Right,
}

impl FootSide {
    pub const BOTH: [FootSide; 2] = [FootSide::Left, FootSide::Right];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            FootSide::Left => 0,
            FootSide::Right => 1,
        }
    }

    pub fn opposite(self) -> FootSide {
        match self {
            FootSide::Left => FootSide::Right,
            FootSide::Right => FootSide::Left,
        }
    }
}

/// One foot as reported by the body provider.
#[derive(Debug, Clone, Copy)]
pub struct FootSample {
    /// World position of the foot target on the ground
    pub position: Vector3<f32>,
    pub grounded: bool,
    /// Velocity reported by the foot's rigid body, when it has one
    pub native_velocity: Option<Vector3<f32>>,
}

/// Character state the engine reads every tick.
pub trait BodyProvider {
    fn foot(&self, side: FootSide) -> FootSample;
    /// Body mass in kilograms.
    fn mass(&self) -> f32;
    /// Share of the weight carried by the right foot during double support.
    fn pivot_weight(&self) -> f32;
    fn is_moving(&self) -> bool;
}
