//! Body half of the rotation solver.

use shared::math::{Quat, Vec3};
use shared::physics::PhysicsWorld;
use shared::rotation::{body_target, step_body_rotation};
use shared::{Authority, BodyHandle, PitchLimits, BODY_ROTATION_STEP_DEGREES};

/// Turns the body one fixed tick towards the replicated look rotation.
///
/// Returns the rotation written to the body, or `None` if the body is gone.
pub fn apply_body_rotation<P: PhysicsWorld>(
    _auth: Authority,
    physics: &mut P,
    body: BodyHandle,
    rotation: Vec3,
    limits: PitchLimits,
) -> Option<Quat> {
    let current = physics.body(body)?.rotation;
    let next = step_body_rotation(current, body_target(rotation, limits), BODY_ROTATION_STEP_DEGREES);
    physics.set_rotation(body, next);
    Some(next)
}
