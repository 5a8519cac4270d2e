//! Scripted biped used to drive the engine outside a game: kinematic foot
//! bodies in a rapier world, a walking gait, and a fixed-step scenario loop.

pub mod physics;
pub mod scenario;
pub mod walker;

pub use physics::{FootRig, RigProbe};
pub use scenario::{Scenario, ScenarioReport};
pub use walker::{Biped, Walker};
