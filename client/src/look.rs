//! Look half of the rotation solver, plus camera placement and zoom.
//!
//! Yaw and pitch accumulate into targets and the current angles chase them
//! exponentially. While seated the look is composed onto the seat's frame.

use shared::math::{block_forward, lerp_clamped, Quat, Vec2, Vec3, LOOK_FORWARD};
use shared::rotation::{clamp_angle, euler_angles, look_rotation, view_offset};
use shared::ControllerConfig;

/// Mouse deltas are scaled to match a 60 Hz sampling convention.
const SENSITIVITY_SCALE: f32 = 1.0 / 60.0;
/// How far the standing eye point sits along the body's facing axis.
const STANDING_EYE_OFFSET: f32 = 0.25;
const ZOOM_SCROLL_RATE: f32 = 10.0;

/// The seat frame a seated look is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatView {
    pub position: Vec3,
    pub rotation: Quat,
    pub eye_height: f32,
}

#[derive(Debug, Clone)]
pub struct LookController {
    target_yaw: f32,
    target_pitch: f32,
    yaw: f32,
    pitch: f32,
    look: Quat,
    final_rotation: Quat,
    last_look: Quat,
    last_seated: Quat,
    zoom: f32,
}

impl Default for LookController {
    fn default() -> Self {
        Self {
            target_yaw: 0.0,
            target_pitch: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            look: Quat::IDENTITY,
            final_rotation: Quat::IDENTITY,
            last_look: Quat::IDENTITY,
            last_seated: Quat::IDENTITY,
            zoom: 0.0,
        }
    }
}

impl LookController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn target_pitch(&self) -> f32 {
        self.target_pitch
    }

    /// World-space camera rotation after the last update.
    pub fn rotation(&self) -> Quat {
        self.final_rotation
    }

    pub fn forward(&self) -> Vec3 {
        self.final_rotation * LOOK_FORWARD
    }

    /// `(pitch, yaw, roll)` in degrees, as relayed to the authority.
    pub fn replicated_rotation(&self) -> Vec3 {
        euler_angles(self.final_rotation)
    }

    /// One frame. `delta` is ignored unless the actor is controlled.
    pub fn update(
        &mut self,
        delta: Vec2,
        controlling: bool,
        dt: f32,
        config: &ControllerConfig,
        seat: Option<&SeatView>,
    ) -> Quat {
        if controlling {
            let scale = config.sensitivity * SENSITIVITY_SCALE;
            // Mouse right turns right, which is negative yaw about +Y.
            self.target_yaw -= delta.x * scale;
            self.target_pitch += delta.y * scale;
            self.target_pitch = clamp_angle(
                self.target_pitch,
                -config.look_pitch_limit,
                config.look_pitch_limit,
            );

            let t = config.smoothing * dt;
            self.yaw = lerp_clamped(self.yaw, self.target_yaw, t);
            self.pitch = lerp_clamped(self.pitch, self.target_pitch, t);
            self.look = look_rotation(self.yaw, self.pitch);
        }

        match seat {
            Some(seat) => {
                self.final_rotation = seat.rotation * view_offset() * self.look;
                self.last_seated = self.final_rotation;
            }
            None => {
                self.final_rotation = self.look;
                self.last_look = self.final_rotation;
            }
        }
        self.final_rotation
    }

    /// Keeps the world-space heading when sitting down: the new yaw is the
    /// last standing look expressed in the seat's frame.
    pub fn enter_seat(&mut self, seat_rotation: Quat) {
        let frame = seat_rotation * view_offset();
        let relative = frame.inverse() * self.last_look;
        self.yaw = euler_angles(relative).y;
        self.target_yaw = self.yaw;
    }

    /// Restores the heading of the last seated look when standing up.
    pub fn exit_seat(&mut self) {
        self.yaw = euler_angles(self.last_seated).y;
        self.target_yaw = self.yaw;
    }

    pub fn scroll(&mut self, amount: f32, dt: f32) {
        self.zoom = (self.zoom - amount * dt * ZOOM_SCROLL_RATE).clamp(0.0, 1.0);
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn fov(&self, config: &ControllerConfig) -> f32 {
        config.zoom_fov + (1.0 - self.zoom) * (config.fov - config.zoom_fov)
    }
}

/// Eye point: on the seat when seated, otherwise just ahead of the body
/// centre along its facing axis.
pub fn eye_position(body_position: Vec3, body_rotation: Quat, seat: Option<&SeatView>) -> Vec3 {
    match seat {
        Some(seat) => seat.position + block_forward(seat.rotation) * seat.eye_height,
        None => body_position + block_forward(body_rotation) * STANDING_EYE_OFFSET,
    }
}

/// Camera rotation. A dead actor's camera follows the tumbling body.
pub fn camera_rotation(look: &LookController, body_rotation: Quat, dead: bool) -> Quat {
    if dead {
        body_rotation * view_offset()
    } else {
        look.rotation()
    }
}
