use nalgebra::Vector3;
use std::f32::consts::PI;

use super::physics::FootRig;
use crate::config::SimulationConfig;
use crate::deform::{BodyProvider, FootSample, FootSide};
use crate::terrain::Heightfield;

/// Scripted foot state produced by the walker each physics tick.
#[derive(Debug, Clone, Copy)]
pub struct WalkerFoot {
    pub sole: Vector3<f32>,
    pub grounded: bool,
    /// Gait phase in [0, 1); stance while below the duty factor
    pub phase: f32,
}

/// Straight-line biped gait along +X: walk for a while, then stand still.
///
/// Stance feet are planted on the live surface under them, so the sole
/// follows the footprint as it sinks. Swing feet travel one stride along a
/// sine arc.
#[derive(Debug, Clone)]
pub struct Walker {
    config: SimulationConfig,
    mass: f32,
    time: f32,
    gait_time: f32,
    moving: bool,
    feet: [WalkerFoot; 2],
    pivot_weight: f32,
}

impl Walker {
    pub fn new(config: &SimulationConfig, mass: f32) -> Self {
        let mut walker = Self {
            config: config.clone(),
            mass,
            time: 0.0,
            gait_time: 0.0,
            moving: config.walk_seconds > 0.0,
            feet: [WalkerFoot {
                sole: Vector3::zeros(),
                grounded: true,
                phase: 0.0,
            }; 2],
            pivot_weight: 0.5,
        };
        for side in FootSide::BOTH {
            walker.feet[side.index()] = walker.scripted_foot(side, None);
        }
        walker
    }

    fn phase_offset(side: FootSide) -> f32 {
        match side {
            FootSide::Left => 0.0,
            FootSide::Right => 0.5,
        }
    }

    fn lateral(&self, side: FootSide) -> f32 {
        let half = self.config.stance_width / 2.0;
        match side {
            FootSide::Left => self.config.start[1] + half,
            FootSide::Right => self.config.start[1] - half,
        }
    }

    fn stride(&self) -> f32 {
        self.config.walk_speed * self.config.step_period
    }

    /// Foot placement for the current gait clock. Heights come from the
    /// surface when a heightfield is given.
    fn scripted_foot(&self, side: FootSide, field: Option<&Heightfield>) -> WalkerFoot {
        let duty = self.config.duty_factor;
        let offset = Self::phase_offset(side);
        let cycles = self.gait_time / self.config.step_period + offset;
        let cycle = cycles.floor();
        let phase = cycles - cycle;
        let stride = self.stride();
        let base = self.config.start[0] + stride * (duty / 2.0 - offset);

        let (progress, lift, grounded) = if phase < duty {
            (0.0, 0.0, true)
        } else if !self.moving {
            // Stopping mid-swing puts the foot down where it was headed
            (1.0, 0.0, true)
        } else {
            let s = (phase - duty) / (1.0 - duty);
            let eased = s * s * (3.0 - 2.0 * s);
            (eased, self.config.step_height * (PI * s).sin(), false)
        };

        let x = base + (cycle + progress) * stride;
        let z = self.lateral(side);
        let surface = field.map(|f| f.height_at_world(x, z)).unwrap_or(0.0);
        WalkerFoot {
            sole: Vector3::new(x, surface + lift, z),
            grounded,
            phase,
        }
    }

    /// Advance the script by one physics tick.
    pub fn advance(&mut self, dt: f32, field: &Heightfield) {
        self.time += dt;
        self.moving = self.time < self.config.walk_seconds;
        if self.moving {
            self.gait_time += dt;
        }

        for side in FootSide::BOTH {
            self.feet[side.index()] = self.scripted_foot(side, Some(field));
        }
        self.pivot_weight = self.compute_pivot();
    }

    /// Right foot's share of the weight while both feet are down. Weight
    /// moves onto the foot that landed last over the double-support period.
    fn compute_pivot(&self) -> f32 {
        let [left, right] = self.feet;
        if !(self.moving && left.grounded && right.grounded) {
            return 0.5;
        }
        let double_support = (self.config.duty_factor - 0.5).max(f32::EPSILON);
        if right.phase < left.phase {
            (right.phase / double_support).clamp(0.0, 1.0)
        } else {
            1.0 - (left.phase / double_support).clamp(0.0, 1.0)
        }
    }

    /// Create the foot bodies in the rig at their starting placement.
    pub fn spawn_feet(&mut self, rig: &mut FootRig, field: &Heightfield) {
        for side in FootSide::BOTH {
            let foot = self.scripted_foot(side, Some(field));
            self.feet[side.index()] = foot;
            rig.add_foot(side, foot.sole, self.config.foot_size);
        }
    }

    /// Push this tick's sole targets into the rig.
    pub fn drive(&self, rig: &mut FootRig, dt: f32) {
        for side in FootSide::BOTH {
            rig.set_sole_target(side, self.feet[side.index()].sole, dt);
        }
    }

    pub fn foot(&self, side: FootSide) -> &WalkerFoot {
        &self.feet[side.index()]
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn pivot_weight(&self) -> f32 {
        self.pivot_weight
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Engine-facing view pairing the script with the rig's bodies.
    pub fn body<'a>(&'a self, rig: &'a FootRig) -> Biped<'a> {
        Biped { walker: self, rig }
    }
}

/// Body provider backed by a walker and its rig.
pub struct Biped<'a> {
    walker: &'a Walker,
    rig: &'a FootRig,
}

impl BodyProvider for Biped<'_> {
    fn foot(&self, side: FootSide) -> FootSample {
        let scripted = self.walker.foot(side);
        FootSample {
            position: self.rig.sole_position(side).unwrap_or(scripted.sole),
            grounded: scripted.grounded,
            native_velocity: self.rig.foot_velocity(side),
        }
    }

    fn mass(&self) -> f32 {
        self.walker.mass()
    }

    fn pivot_weight(&self) -> f32 {
        self.walker.pivot_weight()
    }

    fn is_moving(&self) -> bool {
        self.walker.is_moving()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn field() -> Heightfield {
        Heightfield::new(65, 65, (16.0, 16.0), 1.0, vec![0.5; 65 * 65]).unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            walk_seconds: 2.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_starts_in_double_support() {
        let walker = Walker::new(&config(), 75.0);
        assert!(walker.foot(FootSide::Left).grounded);
        assert!(walker.foot(FootSide::Right).grounded);
        assert!(walker.is_moving());
        assert!(walker.foot(FootSide::Left).sole.z > walker.foot(FootSide::Right).sole.z);
    }

    #[test]
    fn test_feet_alternate_while_walking() {
        let f = field();
        let mut walker = Walker::new(&config(), 75.0);
        let mut left_swings = 0;
        let mut right_swings = 0;
        let mut flight = 0;
        for _ in 0..90 {
            walker.advance(0.02, &f);
            let l = walker.foot(FootSide::Left).grounded;
            let r = walker.foot(FootSide::Right).grounded;
            left_swings += usize::from(!l);
            right_swings += usize::from(!r);
            flight += usize::from(!l && !r);
            assert!((0.0..=1.0).contains(&walker.pivot_weight()));
        }
        assert!(left_swings > 0 && right_swings > 0);
        assert_eq!(flight, 0);
    }

    #[test]
    fn test_swing_foot_lifts_and_advances() {
        let f = field();
        let mut walker = Walker::new(&config(), 75.0);
        let start_x = walker.foot(FootSide::Left).sole.x;
        let mut peak = 0.0f32;
        // Left swings during phase [0.6, 1.0) of the first cycle
        for _ in 0..50 {
            walker.advance(0.02, &f);
            peak = peak.max(walker.foot(FootSide::Left).sole.y - 0.5);
        }
        assert_relative_eq!(peak, 0.12, epsilon = 0.01);
        assert_relative_eq!(walker.foot(FootSide::Left).sole.x - start_x, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_stands_still_after_walking() {
        let f = field();
        let mut walker = Walker::new(&config(), 75.0);
        for _ in 0..120 {
            walker.advance(0.02, &f);
        }
        assert!(!walker.is_moving());
        let left = *walker.foot(FootSide::Left);
        walker.advance(0.02, &f);
        assert!(left.grounded && walker.foot(FootSide::Right).grounded);
        assert_eq!(walker.foot(FootSide::Left).sole, left.sole);
        assert_eq!(walker.pivot_weight(), 0.5);
    }

    #[test]
    fn test_biped_view_reads_rig() {
        let f = field();
        let mut rig = FootRig::default();
        let mut walker = Walker::new(&config(), 80.0);
        walker.spawn_feet(&mut rig, &f);
        walker.advance(0.02, &f);
        walker.drive(&mut rig, 0.02);
        rig.step(0.02);

        let body = walker.body(&rig);
        assert_eq!(body.mass(), 80.0);
        let left = body.foot(FootSide::Left);
        assert!(left.native_velocity.is_some());
        assert_relative_eq!(left.position, walker.foot(FootSide::Left).sole, epsilon = 1e-5);
    }
}
