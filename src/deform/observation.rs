//! Per-frame observables reported by the engine.

use serde::Serialize;
use std::io::Write;
use tracing::warn;

use super::filter::FilterLatch;
use super::gait::FootPhase;
use super::solver::{FootDeformation, WindowEdit};
use super::FootSide;

/// Observables for one foot in one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FootObservation {
    pub side: FootSide,
    pub phase: FootPhase,
    pub grounded: bool,
    /// Terrain cell under the foot, when it lies on the terrain
    pub center: Option<[i32; 2]>,
    pub time_passed: f32,
    pub weight_share: f32,
    pub velocity: [f32; 3],
    pub weight_force_y: f32,
    pub momentum_force_y: f32,
    pub ground_reaction_y: f32,
    pub reaction_y: f32,
    pub reaction_min: [f32; 3],
    pub reaction_max: [f32; 3],
    pub hits: usize,
    pub deformation: FootDeformation,
    pub edit: WindowEdit,
    pub filter: FilterLatch,
    pub smoothing_passes: u32,
}

impl FootObservation {
    pub fn new(side: FootSide) -> Self {
        Self {
            side,
            phase: FootPhase::Airborne,
            grounded: false,
            center: None,
            time_passed: 0.0,
            weight_share: 0.0,
            velocity: [0.0; 3],
            weight_force_y: 0.0,
            momentum_force_y: 0.0,
            ground_reaction_y: 0.0,
            reaction_y: 0.0,
            reaction_min: [0.0; 3],
            reaction_max: [0.0; 3],
            hits: 0,
            deformation: FootDeformation::default(),
            edit: WindowEdit::default(),
            filter: FilterLatch::default(),
            smoothing_passes: 0,
        }
    }
}

/// Everything the engine did in one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameObservation {
    pub frame: u64,
    pub time: f32,
    pub dt: f32,
    pub brush: Option<&'static str>,
    /// Whether the terrain was uploaded to the provider this frame
    pub committed: bool,
    pub feet: [FootObservation; 2],
}

impl FrameObservation {
    pub fn foot(&self, side: FootSide) -> &FootObservation {
        &self.feet[side.index()]
    }

    /// Flat list of named scalar probes, `<side>.<quantity>`.
    pub fn probes(&self) -> Vec<(String, f32)> {
        let mut out = Vec::with_capacity(24);
        for foot in &self.feet {
            let prefix = match foot.side {
                FootSide::Left => "left",
                FootSide::Right => "right",
            };
            let d = &foot.deformation;
            let values = [
                ("weight_force_y", foot.weight_force_y),
                ("momentum_force_y", foot.momentum_force_y),
                ("ground_reaction_y", foot.ground_reaction_y),
                ("reaction_y", foot.reaction_y),
                ("pressure", d.pressure),
                ("area", d.area.current),
                ("area_max", d.area.running_max),
                ("target_displacement", d.target_displacement),
                ("bump_height", d.bump_height),
                ("time_passed", foot.time_passed),
                ("hits", foot.hits as f32),
                ("contour_cells", d.contour_cells as f32),
            ];
            out.extend(values.into_iter().map(|(name, v)| (format!("{prefix}.{name}"), v)));
        }
        out
    }
}

/// Receiver for per-frame observations.
pub trait MetricsSink {
    fn record(&mut self, observation: &FrameObservation);
}

/// Discards everything.
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&mut self, _observation: &FrameObservation) {}
}

/// Keeps every observation in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<FrameObservation>,
}

impl MetricsSink for MemorySink {
    fn record(&mut self, observation: &FrameObservation) {
        self.frames.push(observation.clone());
    }
}

/// Writes one JSON object per frame.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    failed: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricsSink for JsonLinesSink<W> {
    fn record(&mut self, observation: &FrameObservation) {
        if self.failed {
            return;
        }
        let result = serde_json::to_writer(&mut self.writer, observation)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = result {
            warn!(error = %e, "observation trace write failed, disabling sink");
            self.failed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FrameObservation {
        let mut left = FootObservation::new(FootSide::Left);
        left.grounded = true;
        left.reaction_y = -735.75;
        left.hits = 9;
        FrameObservation {
            frame: 3,
            time: 0.05,
            dt: 1.0 / 60.0,
            brush: Some("footprint"),
            committed: true,
            feet: [left, FootObservation::new(FootSide::Right)],
        }
    }

    #[test]
    fn test_probes_are_named_per_foot() {
        let probes = frame().probes();
        assert_eq!(probes.len(), 24);
        let reaction = probes.iter().find(|(name, _)| name == "left.reaction_y").unwrap();
        assert_eq!(reaction.1, -735.75);
        let hits = probes.iter().find(|(name, _)| name == "left.hits").unwrap();
        assert_eq!(hits.1, 9.0);
        assert!(probes.iter().any(|(name, _)| name == "right.bump_height"));
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_frame() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record(&frame());
        sink.record(&frame());
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["frame"], 3);
        assert_eq!(value["feet"][0]["side"], "left");
        assert_eq!(value["feet"][1]["phase"], "airborne");
    }
}
