use crate::math::{clamp_magnitude, Vec3};

/// Latest intent received by the authority for one actor.
///
/// Overwritten on every SetInput, never queued: applying the same payload
/// twice is the same as applying it once.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingInput {
    pub direction: Vec3,
    /// Replicated look rotation as `(pitch, yaw, roll)` degrees.
    pub rotation: Vec3,
}

impl PendingInput {
    pub fn overwrite(&mut self, direction: Vec3, rotation: Vec3) {
        self.direction = direction;
        self.rotation = rotation;
    }

    /// Horizontal intent with magnitude at most 1.
    pub fn clamped_direction(&self) -> Vec3 {
        let clamped = clamp_magnitude(self.direction, 1.0);
        Vec3::new(clamped.x, 0.0, clamped.z)
    }
}
