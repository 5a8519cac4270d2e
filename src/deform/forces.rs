use nalgebra::Vector3;

use super::constants::numeric;

/// Fraction of body weight carried by each foot, `[left, right]`.
///
/// In double support the right foot carries `pivot_weight` and the left the
/// remainder; a lone grounded foot carries everything; a body in flight
/// carries nothing.
pub fn weight_shares(left_grounded: bool, right_grounded: bool, pivot_weight: f32) -> [f32; 2] {
    match (left_grounded, right_grounded) {
        (true, true) => {
            let pivot = pivot_weight.clamp(0.0, 1.0);
            [1.0 - pivot, pivot]
        }
        (true, false) => [1.0, 0.0],
        (false, true) => [0.0, 1.0],
        (false, false) => [0.0, 0.0],
    }
}

/// Forces acting on one foot during one physics tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootForces {
    pub weight_share: f32,
    pub velocity: Vector3<f32>,
    /// mass * gravity * share
    pub weight: Vector3<f32>,
    /// Impulse needed to stop the foot's downward motion
    pub impulse: Vector3<f32>,
    /// Impulse spread over the contact time
    pub momentum: Vector3<f32>,
    /// Force the ground exerts on the foot
    pub ground_reaction: Vector3<f32>,
    /// Force the foot exerts on the ground
    pub reaction_on_foot: Vector3<f32>,
}

impl Default for FootForces {
    fn default() -> Self {
        Self {
            weight_share: 0.0,
            velocity: Vector3::zeros(),
            weight: Vector3::zeros(),
            impulse: Vector3::zeros(),
            momentum: Vector3::zeros(),
            ground_reaction: Vector3::zeros(),
            reaction_on_foot: Vector3::zeros(),
        }
    }
}

impl FootForces {
    /// Downward load on the ground in newtons (positive compresses).
    pub fn load(&self) -> f32 {
        -self.reaction_on_foot.y
    }
}

/// Compute the forces on one foot.
///
/// A foot moving upward produces no impulse; otherwise the impulse cancels
/// its whole velocity over `contact_time`.
pub fn foot_forces(
    mass: f32,
    weight_share: f32,
    velocity: Vector3<f32>,
    gravity: Vector3<f32>,
    contact_time: f32,
) -> FootForces {
    let share_mass = mass * weight_share;
    let weight = gravity * share_mass;
    let impulse = if velocity.y <= 0.0 {
        -velocity * share_mass
    } else {
        Vector3::zeros()
    };
    let momentum = impulse / contact_time;
    let ground_reaction = momentum - weight;

    FootForces {
        weight_share,
        velocity,
        weight,
        impulse,
        momentum,
        ground_reaction,
        reaction_on_foot: -ground_reaction,
    }
}

/// Per-foot velocity source: the body's native velocity when available and
/// preferred, otherwise a backward difference over the physics tick.
#[derive(Debug, Clone, Copy)]
pub struct VelocityTracker {
    previous: Option<Vector3<f32>>,
    velocity: Vector3<f32>,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self {
            previous: None,
            velocity: Vector3::zeros(),
        }
    }
}

impl VelocityTracker {
    pub fn sample(
        &mut self,
        position: Vector3<f32>,
        native: Option<Vector3<f32>>,
        prefer_native: bool,
        dt: f32,
    ) -> Vector3<f32> {
        self.velocity = match (native, self.previous) {
            (Some(v), _) if prefer_native => v,
            (_, Some(prev)) if dt > numeric::EPSILON => (position - prev) / dt,
            _ => Vector3::zeros(),
        };
        self.previous = Some(position);
        self.velocity
    }

    pub fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }
}

/// Extremes of the reaction force reached during the current grounded phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceExtremes {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for ForceExtremes {
    fn default() -> Self {
        Self {
            min: Vector3::zeros(),
            max: Vector3::zeros(),
        }
    }
}

impl ForceExtremes {
    pub fn track(&mut self, grounded: bool, reaction: Vector3<f32>) {
        if grounded {
            self.min = self.min.inf(&reaction);
            self.max = self.max.sup(&reaction);
        } else {
            *self = Self::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gravity() -> Vector3<f32> {
        Vector3::new(0.0, -9.81, 0.0)
    }

    #[test]
    fn test_weight_shares() {
        let [left, right] = weight_shares(true, true, 0.3);
        assert_relative_eq!(left, 0.7);
        assert_relative_eq!(right, 0.3);
        assert_eq!(weight_shares(true, false, 0.3), [1.0, 0.0]);
        assert_eq!(weight_shares(false, true, 0.3), [0.0, 1.0]);
        assert_eq!(weight_shares(false, false, 0.3), [0.0, 0.0]);
        assert_eq!(weight_shares(true, true, 1.5), [0.0, 1.0]);
    }

    #[test]
    fn test_landing_foot_forces() {
        let forces = foot_forces(75.0, 1.0, Vector3::new(0.0, -2.0, 0.0), gravity(), 0.1);
        assert_relative_eq!(forces.weight.y, -735.75, epsilon = 1e-3);
        assert_relative_eq!(forces.impulse.y, 150.0, epsilon = 1e-3);
        assert_relative_eq!(forces.momentum.y, 1500.0, epsilon = 1e-2);
        assert_relative_eq!(forces.ground_reaction.y, 2235.75, epsilon = 1e-2);
        assert_relative_eq!(forces.reaction_on_foot.y, -2235.75, epsilon = 1e-2);
        assert_relative_eq!(forces.load(), 2235.75, epsilon = 1e-2);
    }

    #[test]
    fn test_rising_foot_has_no_impulse() {
        let forces = foot_forces(75.0, 0.5, Vector3::new(0.3, 1.0, 0.0), gravity(), 0.1);
        assert_eq!(forces.impulse, Vector3::zeros());
        assert_eq!(forces.momentum, Vector3::zeros());
        assert_relative_eq!(forces.ground_reaction.y, 367.875, epsilon = 1e-3);
    }

    #[test]
    fn test_horizontal_velocity_feeds_impulse() {
        let forces = foot_forces(80.0, 1.0, Vector3::new(1.0, -0.5, 0.0), gravity(), 0.2);
        assert_relative_eq!(forces.impulse.x, -80.0, epsilon = 1e-4);
        assert_relative_eq!(forces.reaction_on_foot.x, 400.0, epsilon = 1e-3);
    }

    #[test]
    fn test_velocity_tracker_backward_difference() {
        let mut tracker = VelocityTracker::default();
        let v0 = tracker.sample(Vector3::new(0.0, 1.0, 0.0), None, true, 0.02);
        assert_eq!(v0, Vector3::zeros());
        let v1 = tracker.sample(Vector3::new(0.02, 0.96, 0.0), None, true, 0.02);
        assert_relative_eq!(v1, Vector3::new(1.0, -2.0, 0.0), epsilon = 1e-4);

        let native = Vector3::new(0.0, -3.0, 0.0);
        assert_eq!(tracker.sample(Vector3::zeros(), Some(native), true, 0.02), native);
        let differenced = tracker.sample(Vector3::zeros(), Some(native), false, 0.02);
        assert_eq!(differenced, Vector3::zeros());
    }

    #[test]
    fn test_force_extremes_reset_when_airborne() {
        let mut extremes = ForceExtremes::default();
        extremes.track(true, Vector3::new(-5.0, -700.0, 12.0));
        extremes.track(true, Vector3::new(3.0, -900.0, -4.0));
        assert_eq!(extremes.min, Vector3::new(-5.0, -900.0, -4.0));
        assert_eq!(extremes.max, Vector3::new(3.0, 0.0, 12.0));
        extremes.track(false, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(extremes, ForceExtremes::default());
    }
}
