use serde::Serialize;
use tracing::{debug, info};

use super::physics::FootRig;
use super::walker::Walker;
use crate::config::EngineConfig;
use crate::deform::engine::EngineError;
use crate::deform::observation::{FrameObservation, MetricsSink};
use crate::deform::FootprintEngine;
use crate::terrain::{MemoryTerrain, TerrainProvider};

/// Tolerance when draining the physics accumulator.
const ACCUMULATOR_SLACK: f32 = 1e-6;

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub frames: u64,
    pub physics_ticks: u64,
    /// Uploads the terrain received
    pub commits: u64,
    /// Cells whose height differs from the starting terrain
    pub deformed_cells: usize,
    pub min_height: f32,
    pub max_height: f32,
}

/// A walker on an in-memory terrain, wired to a footprint engine.
///
/// Physics runs at `fixed_dt` through an accumulator; each rendered frame
/// then gets one engine frame tick.
pub struct Scenario {
    pub engine: FootprintEngine,
    pub terrain: MemoryTerrain,
    pub rig: FootRig,
    pub walker: Walker,
    fixed_dt: f32,
    frame_dt: f32,
    accumulator: f32,
    physics_ticks: u64,
}

impl Scenario {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let terrain = MemoryTerrain::from_config(&config.terrain)?;
        let engine = FootprintEngine::from_provider(config, &terrain)?;

        let mut rig = FootRig::new(config.character.gravity);
        let mut walker = Walker::new(&config.simulation, config.character.mass);
        walker.spawn_feet(&mut rig, engine.heightfield());

        info!(
            resolution = config.terrain.resolution,
            walk_seconds = config.simulation.walk_seconds,
            "scenario ready"
        );

        Ok(Self {
            engine,
            terrain,
            rig,
            walker,
            fixed_dt: config.simulation.fixed_dt,
            frame_dt: config.simulation.frame_dt,
            accumulator: 0.0,
            physics_ticks: 0,
        })
    }

    /// Advance by one rendered frame.
    pub fn step_frame(&mut self, sink: &mut dyn MetricsSink) -> FrameObservation {
        self.accumulator += self.frame_dt;
        while self.accumulator + ACCUMULATOR_SLACK >= self.fixed_dt {
            self.walker.advance(self.fixed_dt, self.engine.heightfield());
            self.walker.drive(&mut self.rig, self.fixed_dt);
            self.rig.step(self.fixed_dt);
            self.engine
                .physics_tick(self.fixed_dt, &self.walker.body(&self.rig));
            self.accumulator -= self.fixed_dt;
            self.physics_ticks += 1;
        }

        let body = self.walker.body(&self.rig);
        let probe = self.rig.probe();
        self.engine
            .frame_tick(self.frame_dt, &body, &probe, &mut self.terrain, sink)
    }

    /// Run `frames` rendered frames and summarize the result.
    pub fn run(&mut self, frames: u32, sink: &mut dyn MetricsSink) -> ScenarioReport {
        for _ in 0..frames {
            let observation = self.step_frame(sink);
            if observation.committed {
                debug!(frame = observation.frame, "terrain committed");
            }
        }
        let report = self.report();
        info!(
            frames = report.frames,
            commits = report.commits,
            deformed_cells = report.deformed_cells,
            min_height = report.min_height,
            "scenario finished"
        );
        report
    }

    pub fn report(&self) -> ScenarioReport {
        let heights = self.engine.heightfield().world_heights();
        let (min_height, max_height) = heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)));
        ScenarioReport {
            frames: self.engine.frame(),
            physics_ticks: self.physics_ticks,
            commits: self.terrain.uploads(),
            deformed_cells: self.engine.heightfield().deformed_cells(),
            min_height,
            max_height,
        }
    }

    /// Grid dimensions and world heights of the committed terrain.
    pub fn committed_heights(&self) -> ((usize, usize), Vec<f32>) {
        let (width, height) = self.terrain.resolution();
        let samples = (0..height)
            .flat_map(|z| (0..width).map(move |x| (x, z)))
            .map(|(x, z)| self.terrain.sample(x, z))
            .collect();
        ((width, height), samples)
    }
}
