use nalgebra::Vector3;
use rapier3d::parry::query::RayCast;
use rapier3d::prelude::*;

use crate::deform::{ContactProbe, FootSide};

/// Time steps at or below this produce a zero sampled velocity.
const MIN_DT: f32 = 1e-4;

/// One foot's kinematic body and the colliders rays are tested against.
#[derive(Debug, Clone)]
pub struct FootBody {
    pub body: RigidBodyHandle,
    pub colliders: Vec<ColliderHandle>,
    /// Distance from the body origin down to the sole
    pub sole_offset: f32,
    /// Velocity sampled from consecutive target translations
    pub kinematic_velocity: Vector3<f32>,
}

/// Rapier world holding the two foot bodies of a biped.
///
/// Feet are kinematic and position-based: callers set a sole target each
/// physics tick and step the world; the velocity implied by the move is
/// kept as the foot's native velocity.
pub struct FootRig {
    pub gravity: Vector<Real>,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    feet: [Option<FootBody>; 2],
}

impl Default for FootRig {
    fn default() -> Self {
        Self::new(-9.81)
    }
}

impl FootRig {
    pub fn new(gravity_y: f32) -> Self {
        Self {
            gravity: vector![0.0, gravity_y, 0.0],
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            feet: [None, None],
        }
    }

    /// Steps the world forward by dt seconds
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// Adds a box foot whose sole rests at `sole`. `size` is the full
    /// extent (length along X, height, width along Z). Replaces any foot
    /// already on that side.
    pub fn add_foot(
        &mut self,
        side: FootSide,
        sole: Vector3<f32>,
        size: [f32; 3],
    ) -> RigidBodyHandle {
        if let Some(old) = self.feet[side.index()].take() {
            self.rigid_body_set.remove(
                old.body,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }

        let [sx, sy, sz] = size;
        let sole_offset = sy / 2.0;
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![sole.x, sole.y + sole_offset, sole.z])
            .build();
        let handle = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::cuboid(sx / 2.0, sy / 2.0, sz / 2.0)
            .sensor(true)
            .build();
        let collider_handle = self
            .collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.feet[side.index()] = Some(FootBody {
            body: handle,
            colliders: vec![collider_handle],
            sole_offset,
            kinematic_velocity: Vector3::zeros(),
        });
        handle
    }

    /// Attaches an extra collider (a heel or toe pad) to an existing foot.
    pub fn attach_collider(
        &mut self,
        side: FootSide,
        collider: Collider,
    ) -> Option<ColliderHandle> {
        let foot = self.feet[side.index()].as_mut()?;
        let handle = self
            .collider_set
            .insert_with_parent(collider, foot.body, &mut self.rigid_body_set);
        foot.colliders.push(handle);
        Some(handle)
    }

    pub fn foot(&self, side: FootSide) -> Option<&FootBody> {
        self.feet[side.index()].as_ref()
    }

    /// Moves a foot so its sole reaches `sole` on the next step, sampling
    /// the implied velocity over `dt`.
    pub fn set_sole_target(&mut self, side: FootSide, sole: Vector3<f32>, dt: f32) {
        let Some(foot) = self.feet[side.index()].as_mut() else {
            return;
        };
        if let Some(body) = self.rigid_body_set.get_mut(foot.body) {
            let target = vector![sole.x, sole.y + foot.sole_offset, sole.z];
            let cur = *body.translation();
            let inv_dt = if dt > MIN_DT { 1.0 / dt } else { 0.0 };
            foot.kinematic_velocity = (target - cur) * inv_dt;
            body.set_next_kinematic_translation(target);
        }
    }

    /// Current sole position of a foot.
    pub fn sole_position(&self, side: FootSide) -> Option<Vector3<f32>> {
        let foot = self.feet[side.index()].as_ref()?;
        self.rigid_body_set.get(foot.body).map(|body| {
            let t = body.translation();
            Vector3::new(t.x, t.y - foot.sole_offset, t.z)
        })
    }

    pub fn foot_velocity(&self, side: FootSide) -> Option<Vector3<f32>> {
        self.feet[side.index()].as_ref().map(|foot| foot.kinematic_velocity)
    }

    fn colliders_of(&self, side: FootSide) -> &[ColliderHandle] {
        match &self.feet[side.index()] {
            Some(foot) => &foot.colliders,
            None => &[],
        }
    }

    /// Read-only ray probe over the foot colliders.
    pub fn probe(&self) -> RigProbe<'_> {
        RigProbe {
            collider_set: &self.collider_set,
            feet: [self.colliders_of(FootSide::Left), self.colliders_of(FootSide::Right)],
        }
    }
}

/// Ray test restricted to the colliders of one foot.
pub struct RigProbe<'a> {
    collider_set: &'a ColliderSet,
    feet: [&'a [ColliderHandle]; 2],
}

impl RigProbe<'_> {
    /// Distance along an upward ray from `origin` to the first collider of
    /// `side`, if any lies within `max_distance`.
    pub fn cast_up(&self, side: FootSide, origin: Vector3<f32>, max_distance: f32) -> Option<f32> {
        let ray = Ray::new(point![origin.x, origin.y, origin.z], vector![0.0, 1.0, 0.0]);
        self.feet[side.index()]
            .iter()
            .filter_map(|&handle| self.collider_set.get(handle))
            .filter_map(|collider| {
                collider
                    .shape()
                    .cast_ray(collider.position(), &ray, max_distance, true)
            })
            .reduce(f32::min)
    }
}

impl ContactProbe for RigProbe<'_> {
    fn probe_up(&self, side: FootSide, origin: Vector3<f32>, max_distance: f32) -> bool {
        self.cast_up(side, origin, max_distance).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FOOT: [f32; 3] = [0.26, 0.08, 0.1];

    #[test]
    fn test_add_foot_places_sole() {
        let mut rig = FootRig::default();
        rig.add_foot(FootSide::Left, Vector3::new(1.0, 0.5, 2.0), FOOT);
        let sole = rig.sole_position(FootSide::Left).unwrap();
        assert_relative_eq!(sole, Vector3::new(1.0, 0.5, 2.0), epsilon = 1e-6);
        assert!(rig.sole_position(FootSide::Right).is_none());
    }

    #[test]
    fn test_upward_probe_hits_sole() {
        let mut rig = FootRig::default();
        rig.add_foot(FootSide::Left, Vector3::new(1.0, 0.5, 2.0), FOOT);
        rig.step(0.02);
        let probe = rig.probe();

        let toi = probe
            .cast_up(FootSide::Left, Vector3::new(1.05, 0.46, 2.0), 0.1)
            .unwrap();
        assert_relative_eq!(toi, 0.04, epsilon = 1e-4);
        assert!(probe.probe_up(FootSide::Left, Vector3::new(1.0, 0.46, 2.03), 0.1));

        // Outside the sole footprint
        assert!(!probe.probe_up(FootSide::Left, Vector3::new(1.2, 0.46, 2.0), 0.1));
        // Too far below
        assert!(!probe.probe_up(FootSide::Left, Vector3::new(1.0, 0.3, 2.0), 0.1));
        // Wrong foot
        assert!(!probe.probe_up(FootSide::Right, Vector3::new(1.0, 0.46, 2.0), 0.1));
    }

    #[test]
    fn test_kinematic_target_moves_foot_and_samples_velocity() {
        let mut rig = FootRig::default();
        rig.add_foot(FootSide::Right, Vector3::new(0.0, 1.0, 0.0), FOOT);
        rig.set_sole_target(FootSide::Right, Vector3::new(0.02, 0.96, 0.0), 0.02);
        rig.step(0.02);

        let v = rig.foot_velocity(FootSide::Right).unwrap();
        assert_relative_eq!(v, Vector3::new(1.0, -2.0, 0.0), epsilon = 1e-3);
        let sole = rig.sole_position(FootSide::Right).unwrap();
        assert_relative_eq!(sole, Vector3::new(0.02, 0.96, 0.0), epsilon = 1e-5);

        assert!(rig
            .probe()
            .probe_up(FootSide::Right, Vector3::new(0.02, 0.93, 0.0), 0.1));
    }

    #[test]
    fn test_extra_collider_extends_probe() {
        let mut rig = FootRig::default();
        rig.add_foot(FootSide::Left, Vector3::new(0.0, 0.0, 0.0), FOOT);
        let toe = ColliderBuilder::ball(0.05)
            .translation(vector![0.2, 0.0, 0.0])
            .sensor(true)
            .build();
        assert!(rig.attach_collider(FootSide::Left, toe).is_some());
        rig.step(0.02);
        assert_eq!(rig.foot(FootSide::Left).unwrap().colliders.len(), 2);
        assert!(rig
            .probe()
            .probe_up(FootSide::Left, Vector3::new(0.22, -0.05, 0.0), 0.1));
        assert!(rig.attach_collider(FootSide::Right, ColliderBuilder::ball(0.1).build()).is_none());
    }
}
