//! Outbound requests from the controlling peer.
//!
//! Direction and rotation are relayed on the fixed tick: every tick when the
//! authority is local, every `interval` ticks over the wire. Discrete events
//! (jump, crouch, control, seat keys) go out immediately.

use shared::math::Vec3;
use shared::{ActorId, KeyCode, Outgoing, Packet};

#[derive(Debug, Clone)]
pub struct InputChannel {
    ticks: u64,
    interval: u64,
}

impl InputChannel {
    pub fn new(interval: u64) -> Self {
        Self {
            ticks: 0,
            interval: interval.max(1),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Called once per fixed tick. Returns the SetInput due this tick, if any.
    pub fn fixed_tick(
        &mut self,
        local_authority: bool,
        actor: ActorId,
        direction: Vec3,
        rotation: Vec3,
    ) -> Option<Outgoing> {
        let due = local_authority || self.ticks % self.interval == 0;
        self.ticks = self.ticks.wrapping_add(1);
        due.then(|| {
            Outgoing::request(
                local_authority,
                Packet::SetInput {
                    actor,
                    direction,
                    rotation,
                },
            )
        })
    }

    pub fn jump(&self, local_authority: bool, actor: ActorId) -> Outgoing {
        Outgoing::request(local_authority, Packet::Jump { actor })
    }

    pub fn crouch(&self, local_authority: bool, actor: ActorId, value: bool) -> Outgoing {
        Outgoing::request(local_authority, Packet::SetCrouch { actor, value })
    }

    pub fn controlling(&self, local_authority: bool, actor: ActorId, value: bool) -> Outgoing {
        Outgoing::request(local_authority, Packet::SetControlling { actor, value })
    }

    pub fn seat_key(
        &self,
        local_authority: bool,
        actor: ActorId,
        key: KeyCode,
        pressed: bool,
    ) -> Outgoing {
        let key = key.code();
        let packet = if pressed {
            Packet::SeatKeyPress { actor, key }
        } else {
            Packet::SeatKeyRelease { actor, key }
        };
        Outgoing::request(local_authority, packet)
    }
}

impl Default for InputChannel {
    fn default() -> Self {
        Self::new(shared::INPUT_RELAY_INTERVAL)
    }
}
