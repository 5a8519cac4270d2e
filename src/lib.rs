//! Softground footprint deformation library
//!
//! Deforms a terrain heightfield under the feet of a walking biped: contact
//! classification, ground reaction forces, compaction, smoothing and a
//! per-frame orchestrator, plus a scripted rig for running it headless.

pub mod config;
pub mod deform;
pub mod rig;
pub mod terrain;
