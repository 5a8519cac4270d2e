use nalgebra::Vector3;
use thiserror::Error;
use tracing::info;

use super::brush::{Brush, BrushId, BrushSlot};
use super::contact::{ClassifierParams, ContactProbe};
use super::filter::FilterLatch;
use super::forces::{foot_forces, weight_shares, FootForces, ForceExtremes, VelocityTracker};
use super::gait::{FootTimer, GaitLimits, GaitState};
use super::observation::{FrameObservation, MetricsSink};
use super::solver::FootDeformation;
use super::{BodyProvider, FootSide};
use crate::config::{BrushConfig, ConfigError, EngineConfig, MaterialParams};
use crate::terrain::{Heightfield, TerrainError, TerrainProvider};

mod frame_pipeline;

/// Errors raised while building an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
}

/// Everything the engine tracks for one foot across ticks.
#[derive(Debug, Clone, Default)]
pub(crate) struct FootState {
    velocity: VelocityTracker,
    forces: FootForces,
    extremes: ForceExtremes,
    deformation: FootDeformation,
    latch: FilterLatch,
}

/// Footprint deformation engine for one biped on one terrain.
///
/// Drive it with [`FootprintEngine::physics_tick`] at the physics rate and
/// [`FootprintEngine::frame_tick`] once per rendered frame. The physics tick
/// samples velocities and computes forces; the frame tick classifies contact,
/// deforms the heightfield and commits it to the terrain provider at most
/// once.
pub struct FootprintEngine {
    brush_config: BrushConfig,
    classifier: ClassifierParams,
    material: MaterialParams,
    gravity: Vector3<f32>,
    prefer_native_velocity: bool,
    heightfield: Heightfield,
    brushes: BrushSlot,
    footprint_brush: BrushId,
    feet: [FootState; 2],
    gait: GaitState,
    frame: u64,
    time: f32,
}

impl FootprintEngine {
    /// Creates an engine over an already loaded heightfield. The footprint
    /// brush is registered and active.
    pub fn new(config: &EngineConfig, heightfield: Heightfield) -> Result<Self, ConfigError> {
        config.validate()?;
        let (width, height) = heightfield.dimensions();
        let span = (2 * config.brush.half_width + 1) as usize;
        if span > width.min(height) {
            return Err(ConfigError::Invalid(format!(
                "brush window of {} cells does not fit a {}x{} terrain",
                span, width, height
            )));
        }

        let mut brushes = BrushSlot::default();
        let footprint_brush = brushes.register(Brush::Footprint);
        brushes.activate(footprint_brush);

        let material = config.material_params();
        info!(
            width,
            height,
            young_modulus = material.young_modulus,
            contact_time = material.contact_time,
            poisson_ratio = material.poisson_ratio,
            "footprint engine created"
        );

        Ok(Self {
            brush_config: config.brush.clone(),
            classifier: ClassifierParams::from(&config.brush),
            material,
            gravity: Vector3::new(0.0, config.character.gravity, 0.0),
            prefer_native_velocity: config.character.prefer_native_velocity,
            heightfield,
            brushes,
            footprint_brush,
            feet: Default::default(),
            gait: GaitState::default(),
            frame: 0,
            time: 0.0,
        })
    }

    /// Creates an engine and loads its heightfield from a terrain provider.
    pub fn from_provider<T: TerrainProvider + ?Sized>(
        config: &EngineConfig,
        provider: &T,
    ) -> Result<Self, EngineError> {
        let heightfield = Heightfield::from_provider(provider)?;
        Ok(Self::new(config, heightfield)?)
    }

    pub fn heightfield(&self) -> &Heightfield {
        &self.heightfield
    }

    pub fn material(&self) -> &MaterialParams {
        &self.material
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Id of the built-in footprint brush.
    pub fn footprint_brush(&self) -> BrushId {
        self.footprint_brush
    }

    pub fn brushes(&self) -> &BrushSlot {
        &self.brushes
    }

    pub fn brushes_mut(&mut self) -> &mut BrushSlot {
        &mut self.brushes
    }

    /// Forces computed by the latest physics tick.
    pub fn foot_forces(&self, side: FootSide) -> &FootForces {
        &self.feet[side.index()].forces
    }

    pub fn deformation(&self, side: FootSide) -> &FootDeformation {
        &self.feet[side.index()].deformation
    }

    pub fn force_extremes(&self, side: FootSide) -> &ForceExtremes {
        &self.feet[side.index()].extremes
    }

    /// Contact timer of one foot.
    pub fn gait_timer(&self, side: FootSide) -> &FootTimer {
        self.gait.foot(side)
    }

    pub fn filter_latch(&self, side: FootSide) -> &FilterLatch {
        &self.feet[side.index()].latch
    }

    fn gait_limits(&self) -> GaitLimits {
        GaitLimits {
            contact_time: self.material.contact_time,
            offset: self.brush_config.deformation_offset,
            debounce_frames: self.brush_config.debounce_frames,
        }
    }

    /// Sample foot velocities and recompute the forces on both feet.
    pub fn physics_tick<B: BodyProvider + ?Sized>(&mut self, dt: f32, body: &B) {
        let samples = FootSide::BOTH.map(|side| body.foot(side));
        let shares = weight_shares(samples[0].grounded, samples[1].grounded, body.pivot_weight());
        let mass = body.mass();

        for side in FootSide::BOTH {
            let i = side.index();
            let sample = &samples[i];
            let foot = &mut self.feet[i];
            let velocity = foot.velocity.sample(
                sample.position,
                sample.native_velocity,
                self.prefer_native_velocity,
                dt,
            );
            foot.forces = foot_forces(
                mass,
                shares[i],
                velocity,
                self.gravity,
                self.material.contact_time,
            );
            foot.extremes.track(sample.grounded, foot.forces.reaction_on_foot);
        }
    }

    /// Run one rendered frame: classify, deform, smooth and commit.
    pub fn frame_tick<B, P, T>(
        &mut self,
        dt: f32,
        body: &B,
        probe: &P,
        terrain: &mut T,
        sink: &mut dyn MetricsSink,
    ) -> FrameObservation
    where
        B: BodyProvider + ?Sized,
        P: ContactProbe + Sync + ?Sized,
        T: TerrainProvider + ?Sized,
    {
        let observation = frame_pipeline::run_frame_phases(self, dt, body, probe, terrain);
        sink.record(&observation);
        observation
    }
}
