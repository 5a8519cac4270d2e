use serde::Serialize;
use tracing::debug;

use super::FootSide;

/// Where a foot is in its deformation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FootPhase {
    #[default]
    Airborne,
    /// Grounded and still inside the deformation window
    Accumulating,
    /// Grounded past the deformation window; bookkeeping only
    Suppressed,
}

/// Per-foot contact timer.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FootTimer {
    pub time_passed: f32,
    pub debounce: u32,
    pub phase: FootPhase,
}

/// Contact timers for both feet plus the motion toggle that restarts them.
#[derive(Debug, Clone, Default)]
pub struct GaitState {
    feet: [FootTimer; 2],
    was_moving: Option<bool>,
}

/// Limits the timers are checked against.
#[derive(Debug, Clone, Copy)]
pub struct GaitLimits {
    pub contact_time: f32,
    /// Extra seconds after `contact_time` during which writes are allowed
    pub offset: f32,
    pub debounce_frames: u32,
}

impl GaitState {
    pub fn foot(&self, side: FootSide) -> &FootTimer {
        &self.feet[side.index()]
    }

    /// Advance the timers of grounded feet and report, per foot, whether the
    /// deformation window is still open this frame.
    pub fn begin_frame(&mut self, dt: f32, grounded: [bool; 2], limits: &GaitLimits) -> [bool; 2] {
        let window = limits.contact_time + limits.offset;
        let mut open = [false; 2];
        for (i, timer) in self.feet.iter_mut().enumerate() {
            if !grounded[i] {
                timer.phase = FootPhase::Airborne;
                continue;
            }
            timer.time_passed += dt;
            open[i] = timer.time_passed <= window;
            timer.phase = if open[i] {
                FootPhase::Accumulating
            } else {
                FootPhase::Suppressed
            };
        }
        open
    }

    /// Restart timers after the frame's writes.
    ///
    /// While walking, a lifted foot restarts its timer. While idle, an
    /// ungrounded reading restarts it only for the first `debounce_frames`
    /// frames so a flickering sensor cannot re-stamp a standing foot forever.
    /// Starting or stopping motion restarts everything.
    pub fn end_frame(&mut self, grounded: [bool; 2], moving: bool, limits: &GaitLimits) {
        for (i, timer) in self.feet.iter_mut().enumerate() {
            if grounded[i] {
                continue;
            }
            if moving {
                timer.time_passed = 0.0;
            } else if timer.debounce <= limits.debounce_frames {
                timer.time_passed = 0.0;
                timer.debounce += 1;
            }
        }

        if self.was_moving.is_some_and(|was| was != moving) {
            debug!(moving, "motion toggled, restarting contact timers");
            for timer in self.feet.iter_mut() {
                timer.time_passed = 0.0;
                timer.debounce = 0;
            }
        }
        self.was_moving = Some(moving);
    }
}
