//! Vector helpers on top of `glam`.
//!
//! World convention: +Y is up, -Z is the look forward axis. Placed blocks
//! (actor bodies, seats) face along their local +Z.

pub use glam::{Quat, Vec2, Vec3};

/// Facing axis of a placed block in its local frame.
pub const BLOCK_FORWARD: Vec3 = Vec3::Z;
/// Forward axis of a look rotation.
pub const LOOK_FORWARD: Vec3 = Vec3::NEG_Z;
pub const LOOK_RIGHT: Vec3 = Vec3::X;

/// Moves `current` towards `target` by at most `max_delta`.
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance == 0.0 {
        target
    } else {
        current + delta / distance * max_delta
    }
}

pub fn move_towards_f32(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Scales `v` down so its length does not exceed `max`.
pub fn clamp_magnitude(v: Vec3, max: f32) -> Vec3 {
    v.clamp_length_max(max.max(0.0))
}

/// Linear interpolation with `t` clamped to [0, 1].
pub fn lerp_clamped(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Drops the vertical component.
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Forward direction of a placed block with the given rotation.
pub fn block_forward(rotation: Quat) -> Vec3 {
    rotation * BLOCK_FORWARD
}
