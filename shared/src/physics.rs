//! The physics engine as seen by the controller: a set of black-box queries
//! and body mutations. The engine owns every body; actors and interactables
//! only hold handles.

use crate::ids::{BodyHandle, InteractableId, JointHandle};
use crate::math::{Quat, Vec3};

/// Collision layer a query is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Everything the controller collides with.
    Solid,
    /// Only bodies that carry an interactable.
    Interactables,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryFilter {
    pub layer: Layer,
    pub exclude: Option<BodyHandle>,
}

impl QueryFilter {
    pub fn solid(exclude: BodyHandle) -> Self {
        Self {
            layer: Layer::Solid,
            exclude: Some(exclude),
        }
    }

    pub fn interactables() -> Self {
        Self {
            layer: Layer::Interactables,
            exclude: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyHandle,
    pub interactable: Option<InteractableId>,
    pub distance: f32,
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastHit {
    pub body: BodyHandle,
    pub distance: f32,
    pub velocity: Vec3,
    /// Simulated rigid body, as opposed to static geometry.
    pub dynamic: bool,
    /// The body belongs to another controller.
    pub actor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub mass: f32,
}

/// Vertical capsule collider, `center` relative to the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub radius: f32,
    pub height: f32,
    pub center: f32,
}

impl Capsule {
    pub const STANDING: Capsule = Capsule {
        radius: 0.25,
        height: 2.0,
        center: -0.5,
    };
    pub const CROUCHED: Capsule = Capsule {
        radius: 0.25,
        height: 1.0,
        center: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringJoint {
    /// Anchor on the owning body, local space.
    pub anchor: Vec3,
    /// Anchor on the connected body, local space.
    pub connected_anchor: Vec3,
    pub spring: f32,
    pub damper: f32,
    pub break_force: f32,
}

impl SpringJoint {
    pub fn grab(anchor: Vec3, connected_anchor: Vec3) -> Self {
        Self {
            anchor,
            connected_anchor,
            spring: 10_000.0,
            damper: 1_000.0,
            break_force: 5_000.0,
        }
    }
}

/// Nearest-hit ray query. Both the authority's engine and a peer's mirror
/// scene answer it.
pub trait SceneQuery {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Option<RayHit>;
}

/// Queries and mutations the authority performs on the engine.
pub trait PhysicsWorld: SceneQuery {
    /// All hits of a swept sphere, nearest first.
    fn sphere_cast_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Vec<CastHit>;

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> bool {
        !self
            .sphere_cast_all(origin, radius, direction, max_distance, filter)
            .is_empty()
    }

    /// Sweeps the capsule spanned by `top`/`bottom` along `direction`.
    fn capsule_cast(
        &self,
        top: Vec3,
        bottom: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> bool;

    fn body(&self, body: BodyHandle) -> Option<BodyState>;

    fn add_force(&mut self, body: BodyHandle, force: Vec3);
    fn add_impulse(&mut self, body: BodyHandle, impulse: Vec3);
    fn move_position(&mut self, body: BodyHandle, position: Vec3);
    fn set_rotation(&mut self, body: BodyHandle, rotation: Quat);
    fn set_gravity(&mut self, body: BodyHandle, enabled: bool);
    fn set_capsule(&mut self, body: BodyHandle, capsule: Capsule);
    fn set_colliders_enabled(&mut self, body: BodyHandle, enabled: bool);
    fn set_rotation_locked(&mut self, body: BodyHandle, locked: bool);
    fn set_mass(&mut self, body: BodyHandle, mass: f32);
    fn remove_body(&mut self, body: BodyHandle);

    fn attach_spring(
        &mut self,
        body: BodyHandle,
        connected: BodyHandle,
        joint: SpringJoint,
    ) -> Option<JointHandle>;
    fn detach(&mut self, joint: JointHandle);
    /// False once the joint broke or was detached.
    fn joint_alive(&self, joint: JointHandle) -> bool;
}
