//! Input sampling on the controlling peer.
//!
//! A device reports raw levels once per frame; the sampler turns them into
//! smoothed movement axes and press/release edges.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::math::{horizontal, move_towards_f32, Quat, Vec2, Vec3, LOOK_FORWARD, LOOK_RIGHT};
use shared::KeyCode;
use std::collections::VecDeque;

/// Axes move towards their target by this much per second of frame time.
pub const AXIS_RATE: f32 = 4.0;

/// One frame of raw device state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    /// W/S, in [-1, 1].
    pub forward: f32,
    /// D/A, in [-1, 1].
    pub strafe: f32,
    pub look_delta: Vec2,
    pub scroll: f32,
    pub jump: bool,
    pub crouch: bool,
    pub interact: bool,
    /// Toggles control of the actor.
    pub activate: bool,
    /// Relayed keys currently held.
    pub keys: Vec<KeyCode>,
}

pub trait InputDevice {
    fn poll(&mut self) -> RawInput;
}

/// Replays a fixed list of frames, then repeats the last one.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    frames: VecDeque<RawInput>,
    last: RawInput,
}

impl ScriptedDevice {
    pub fn new(frames: impl IntoIterator<Item = RawInput>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            last: RawInput::default(),
        }
    }

    pub fn push(&mut self, frame: RawInput) {
        self.frames.push_back(frame);
    }
}

impl InputDevice for ScriptedDevice {
    fn poll(&mut self) -> RawInput {
        if let Some(frame) = self.frames.pop_front() {
            self.last = frame;
        }
        self.last.clone()
    }
}

/// A headless stand-in for a player: wanders, looks around, hops now and
/// then.
pub struct WanderDevice {
    rng: StdRng,
    current: RawInput,
    frames_left: u32,
}

impl WanderDevice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            current: RawInput::default(),
            frames_left: 0,
        }
    }
}

impl InputDevice for WanderDevice {
    fn poll(&mut self) -> RawInput {
        if self.frames_left == 0 {
            self.frames_left = self.rng.gen_range(30..120);
            self.current.forward = self.rng.gen_range(-1..=1) as f32;
            self.current.strafe = self.rng.gen_range(-1..=1) as f32;
            self.current.look_delta = Vec2::new(self.rng.gen_range(-2.0..2.0), 0.0);
        }
        self.frames_left -= 1;

        let mut frame = self.current.clone();
        frame.jump = self.rng.gen_bool(0.01);
        frame.activate = false;
        frame
    }
}

/// Level plus edges of one button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Button {
    pub down: bool,
    pub pressed: bool,
    pub released: bool,
}

impl Button {
    fn from_levels(previous: bool, current: bool) -> Self {
        Self {
            down: current,
            pressed: current && !previous,
            released: !current && previous,
        }
    }
}

/// What the controller consumes each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub forward: f32,
    pub strafe: f32,
    pub look_delta: Vec2,
    pub scroll: f32,
    pub jump: Button,
    pub crouch: Button,
    pub interact: Button,
    pub activate: Button,
    pub keys_pressed: Vec<KeyCode>,
    pub keys_released: Vec<KeyCode>,
}

impl Sample {
    /// Movement intent on the horizontal plane, relative to the camera.
    pub fn direction(&self, camera: Quat) -> Vec3 {
        let forward = horizontal(camera * LOOK_FORWARD).normalize_or_zero();
        let right = camera * LOOK_RIGHT;
        forward * self.forward + right * self.strafe
    }
}

#[derive(Debug, Default)]
pub struct InputSampler {
    forward: f32,
    strafe: f32,
    previous: RawInput,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples one frame. Movement axes fall back to zero while the actor is
    /// not controlled.
    pub fn sample(&mut self, raw: RawInput, controlling: bool, dt: f32) -> Sample {
        let (target_forward, target_strafe) = if controlling {
            (raw.forward.clamp(-1.0, 1.0), raw.strafe.clamp(-1.0, 1.0))
        } else {
            (0.0, 0.0)
        };
        self.forward = move_towards_f32(self.forward, target_forward, dt * AXIS_RATE);
        self.strafe = move_towards_f32(self.strafe, target_strafe, dt * AXIS_RATE);

        let prev = &self.previous;
        let keys_pressed = raw
            .keys
            .iter()
            .filter(|k| k.is_relayed() && !prev.keys.contains(*k))
            .copied()
            .collect();
        let keys_released = prev
            .keys
            .iter()
            .filter(|k| k.is_relayed() && !raw.keys.contains(*k))
            .copied()
            .collect();

        let sample = Sample {
            forward: self.forward,
            strafe: self.strafe,
            look_delta: raw.look_delta,
            scroll: raw.scroll,
            jump: Button::from_levels(prev.jump, raw.jump),
            crouch: Button::from_levels(prev.crouch, raw.crouch),
            interact: Button::from_levels(prev.interact, raw.interact),
            activate: Button::from_levels(prev.activate, raw.activate),
            keys_pressed,
            keys_released,
        };
        self.previous = raw;
        sample
    }
}
