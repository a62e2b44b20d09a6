//! Rotation math used by both halves of the rotation solver.
//!
//! Angles are in degrees. A look rotation is yaw about +Y followed by pitch
//! about +X, so positive pitch looks up. The replicated rotation vector holds
//! `(pitch, yaw, roll)` in x, y, z.

use crate::config::PitchLimits;
use crate::math::{Quat, Vec3};
use glam::EulerRot;

/// Wraps once into [-360, 360] and clamps to `[min, max]`.
pub fn clamp_angle(mut angle: f32, min: f32, max: f32) -> f32 {
    if angle < -360.0 {
        angle += 360.0;
    }
    if angle > 360.0 {
        angle -= 360.0;
    }
    angle.clamp(min, max)
}

/// Maps an angle in [0, 360) to (-180, 180].
pub fn signed_angle(angle: f32) -> f32 {
    if angle > 180.0 {
        angle - 360.0
    } else {
        angle
    }
}

pub fn look_rotation(yaw: f32, pitch: f32) -> Quat {
    Quat::from_rotation_y(yaw.to_radians()) * Quat::from_rotation_x(pitch.to_radians())
}

/// Tilt that turns a look rotation into the body frame: the body's facing
/// axis points skyward when the look is level.
pub fn body_alignment() -> Quat {
    Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)
}

/// Inverse of [`body_alignment`]: maps a body (or seat) frame to a look frame.
pub fn view_offset() -> Quat {
    body_alignment().inverse()
}

/// Decomposes a rotation into the replicated `(pitch, yaw, roll)` vector.
pub fn euler_angles(rotation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Target body orientation for a replicated rotation vector.
pub fn body_target(rotation: Vec3, limits: PitchLimits) -> Quat {
    let pitch = signed_angle(rotation.x).clamp(-limits.down, limits.up);
    let roll = signed_angle(rotation.z);

    Quat::from_euler(EulerRot::YXZ, rotation.y.to_radians(), pitch.to_radians(), 0.0)
        * body_alignment()
        * Quat::from_rotation_y(-roll.to_radians())
}

/// Rotates `from` towards `to` by at most `max_degrees`.
pub fn rotate_towards(from: Quat, to: Quat, max_degrees: f32) -> Quat {
    let angle = from.angle_between(to).to_degrees();
    if angle <= max_degrees || angle == 0.0 {
        to
    } else {
        from.slerp(to, max_degrees / angle)
    }
}

/// One body-rotation step: small deltas are halved directly, large deltas are
/// walked at a capped angular rate.
pub fn step_body_rotation(current: Quat, target: Quat, max_step_degrees: f32) -> Quat {
    let delta = current.angle_between(target).to_degrees();
    if delta < max_step_degrees {
        current.slerp(target, 0.5)
    } else {
        rotate_towards(current, target, max_step_degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{LOOK_FORWARD, BLOCK_FORWARD};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_clamp_angle_inclusive_limit() {
        assert_eq!(clamp_angle(85.0, -85.0, 85.0), 85.0);
        assert_eq!(clamp_angle(120.0, -85.0, 85.0), 85.0);
        assert_eq!(clamp_angle(-90.0, -85.0, 85.0), -85.0);
    }

    /// `angle_between` goes through `acos` and bottoms out near 7e-4 rad
    /// for equal inputs, so equality is checked on the dot product.
    fn same_rotation(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-6
    }

    #[test]
    fn test_identical_rotations_compare_equal() {
        let q = look_rotation(25.0, 10.0) * body_alignment();
        assert!(same_rotation(q, q));
        assert!(same_rotation(q, -q));
        assert!(!same_rotation(q, q * Quat::from_rotation_y(0.01)));
    }

    #[test]
    fn test_clamp_angle_wraps_once() {
        assert_approx_eq!(clamp_angle(370.0, -85.0, 85.0), 10.0, 1e-4);
        assert_approx_eq!(clamp_angle(-370.0, -85.0, 85.0), -10.0, 1e-4);
    }

    #[test]
    fn test_positive_pitch_looks_up() {
        let forward = look_rotation(0.0, 30.0) * LOOK_FORWARD;
        assert!(forward.y > 0.0);
    }

    #[test]
    fn test_euler_angles_roundtrip() {
        let angles = euler_angles(look_rotation(40.0, -20.0));
        assert_approx_eq!(angles.x, -20.0, 1e-3);
        assert_approx_eq!(angles.y, 40.0, 1e-3);
        assert_approx_eq!(angles.z, 0.0, 1e-3);
    }

    #[test]
    fn test_level_body_faces_up() {
        let limits = PitchLimits::default();
        let body = body_target(Vec3::ZERO, limits);
        let facing = body * BLOCK_FORWARD;
        assert_approx_eq!(facing.y, 1.0, 1e-5);
    }

    #[test]
    fn test_body_target_clamps_pitch() {
        let limits = PitchLimits { up: 80.0, down: 80.0 };
        let clamped = body_target(Vec3::new(89.0, 0.0, 0.0), limits);
        let at_limit = body_target(Vec3::new(80.0, 0.0, 0.0), limits);
        assert!(same_rotation(clamped, at_limit));
    }

    #[test]
    fn test_body_target_unwraps_angles() {
        let limits = PitchLimits { up: 80.0, down: 80.0 };
        let wrapped = body_target(Vec3::new(350.0, 0.0, 0.0), limits);
        let signed = body_target(Vec3::new(-10.0, 0.0, 0.0), limits);
        assert!(same_rotation(wrapped, signed));
    }

    #[test]
    fn test_view_offset_restores_look() {
        let look = look_rotation(25.0, 10.0);
        let body = look * body_alignment();
        assert!(same_rotation(body * view_offset(), look));
    }

    #[test]
    fn test_step_body_rotation_small_delta_halves() {
        let current = Quat::IDENTITY;
        let target = Quat::from_rotation_y(4f32.to_radians());
        let next = step_body_rotation(current, target, 10.0);
        assert_approx_eq!(next.angle_between(target).to_degrees(), 2.0, 1e-2);
    }

    #[test]
    fn test_step_body_rotation_large_delta_capped() {
        let current = Quat::IDENTITY;
        let target = Quat::from_rotation_y(90f32.to_radians());
        let next = step_body_rotation(current, target, 10.0);
        assert_approx_eq!(current.angle_between(next).to_degrees(), 10.0, 1e-2);
    }
}
