//! The controlling peer's per-frame driver for one actor.
//!
//! Ties together input sampling, the look rotation, the interaction driver
//! and the relay channel. Everything it produces is a request; the world
//! passed in is only read.

use crate::channel::InputChannel;
use crate::input::{InputSampler, RawInput};
use crate::interaction::InteractionDriver;
use crate::look::{camera_rotation, eye_position, LookController, SeatView};
use crate::session::Session;
use log::debug;
use shared::math::{Quat, Vec3};
use shared::physics::SceneQuery;
use shared::{ActorId, InteractableId, KeyCode, Outgoing, World};
use std::collections::BTreeSet;

/// Drives one actor from this peer
///
/// Holds only presentation and intent state: the smoothed look, the crouch
/// the player asked for, and the relayed keys reported down. Physical state
/// is read from the mirrored world and never written here.
pub struct LocalController {
    actor: ActorId,
    sampler: InputSampler,
    look: LookController,
    channel: InputChannel,
    interaction: InteractionDriver,
    target_crouch: bool,
    seat: Option<InteractableId>,
    direction: Vec3,
    /// Relayed keys reported down to the seat.
    keys_down: BTreeSet<KeyCode>,
}

fn seat_view(world: &World, actor: ActorId) -> Option<SeatView> {
    let seat = world.seat_of(actor)?;
    Some(SeatView {
        position: seat.transform.position,
        rotation: seat.transform.rotation,
        eye_height: seat.seat()?.eye_height,
    })
}

impl LocalController {
    /// Creates a driver for `actor` that relays direction and rotation every
    /// `relay_interval` fixed ticks when talking to a remote authority
    pub fn new(actor: ActorId, relay_interval: u64) -> Self {
        Self {
            actor,
            sampler: InputSampler::new(),
            look: LookController::new(),
            channel: InputChannel::new(relay_interval),
            interaction: InteractionDriver::new(),
            target_crouch: false,
            seat: None,
            direction: Vec3::ZERO,
            keys_down: BTreeSet::new(),
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn look(&self) -> &LookController {
        &self.look
    }

    pub fn interaction(&self) -> &InteractionDriver {
        &self.interaction
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn target_crouch(&self) -> bool {
        self.target_crouch
    }

    /// Eye point and rotation of the camera.
    pub fn camera(&self, world: &World) -> Option<(Vec3, Quat)> {
        let actor = world.actor(self.actor)?;
        let seat = seat_view(world, self.actor);
        let position = eye_position(
            actor.transform.position,
            actor.transform.rotation,
            seat.as_ref(),
        );
        let rotation = camera_rotation(&self.look, actor.transform.rotation, actor.is_dead());
        Some((position, rotation))
    }

    /// Takes control of the actor
    ///
    /// Refused while the session controls a different actor. On success the
    /// authority is told through SetControlling so it can raise the
    /// controlled key.
    pub fn take_control(&mut self, session: &mut Session) -> Vec<Outgoing> {
        if !session.set_controlling(self.actor, true) {
            return Vec::new();
        }
        vec![self
            .channel
            .controlling(session.local_authority(), self.actor, true)]
    }

    /// Drops control: crouch is cleared, the interaction stopped and every
    /// relayed key released.
    pub fn release_control(&mut self, session: &mut Session) -> Vec<Outgoing> {
        if !session.set_controlling(self.actor, false) {
            return Vec::new();
        }
        let local_authority = session.local_authority();
        let mut out = vec![self.channel.controlling(local_authority, self.actor, false)];

        if self.target_crouch {
            self.target_crouch = false;
            out.push(self.channel.crouch(local_authority, self.actor, false));
        }
        out.extend(self.interaction.release(local_authority, self.actor));
        out.extend(self.release_keys(local_authority));
        out
    }

    fn release_keys(&mut self, local_authority: bool) -> Vec<Outgoing> {
        std::mem::take(&mut self.keys_down)
            .into_iter()
            .map(|key| self.channel.seat_key(local_authority, self.actor, key, false))
            .collect()
    }

    /// Follows seat changes decided by the authority: the look is re-based
    /// onto the seat frame on entry and back onto the world on exit.
    fn sync_seat(&mut self, world: &World) {
        let current = world.actor(self.actor).and_then(|a| a.seat);
        if current == self.seat {
            return;
        }
        match (self.seat, current) {
            (_, Some(seat)) => {
                if let Some(interactable) = world.interactable(seat) {
                    self.look.enter_seat(interactable.transform.rotation);
                }
                debug!("{} entered {}", self.actor, seat);
            }
            (Some(seat), None) => {
                self.look.exit_seat();
                // The seat released every relayed key on its side.
                self.keys_down.clear();
                debug!("{} left {}", self.actor, seat);
            }
            (None, None) => {}
        }
        self.target_crouch = false;
        self.seat = current;
    }

    /// Runs one variable-rate frame
    ///
    /// Samples the device and updates the look, then produces the requests
    /// this frame calls for. While controlling a live actor that covers zoom,
    /// seat keys or crouch (depending on whether the actor is seated), jump,
    /// and the look target. The interaction driver runs last so a lost
    /// target or a dropped control stops the interaction in the same frame.
    ///
    /// Tunables come from the actor's config in `world`, which carries the
    /// values the host spawned it with. Returns nothing beyond control
    /// toggles if the actor is not in the mirror yet.
    pub fn frame<S: SceneQuery>(
        &mut self,
        session: &mut Session,
        world: &World,
        scene: &S,
        raw: RawInput,
        dt: f32,
    ) -> Vec<Outgoing> {
        let mut out = Vec::new();
        let local_authority = session.local_authority();

        let sample = self
            .sampler
            .sample(raw, session.is_controlling(self.actor), dt);
        if sample.activate.pressed {
            if session.is_controlling(self.actor) {
                out.extend(self.release_control(session));
            } else {
                out.extend(self.take_control(session));
            }
        }
        let controlling = session.is_controlling(self.actor);

        let Some(actor) = world.actor(self.actor) else {
            return out;
        };
        let config = actor.config.clone();
        let dead = actor.is_dead();
        let (body_position, body_rotation) = (actor.transform.position, actor.transform.rotation);

        self.sync_seat(world);
        let seat = seat_view(world, self.actor);

        self.look
            .update(sample.look_delta, controlling, dt, &config, seat.as_ref());
        self.direction = sample.direction(self.look.rotation());

        if controlling && !dead {
            self.look.scroll(sample.scroll, dt);

            if seat.is_some() {
                for key in &sample.keys_pressed {
                    if self.keys_down.insert(*key) {
                        out.push(self.channel.seat_key(local_authority, self.actor, *key, true));
                    }
                }
                for key in &sample.keys_released {
                    if self.keys_down.remove(key) {
                        out.push(self.channel.seat_key(local_authority, self.actor, *key, false));
                    }
                }
            } else {
                let crouch = if config.toggle_crouch {
                    self.target_crouch ^ sample.crouch.pressed
                } else {
                    sample.crouch.down
                };
                if crouch != self.target_crouch {
                    self.target_crouch = crouch;
                    out.push(self.channel.crouch(local_authority, self.actor, crouch));
                }
            }

            if sample.jump.pressed {
                out.push(self.channel.jump(local_authority, self.actor));
            }

            let eye = eye_position(body_position, body_rotation, seat.as_ref());
            self.interaction.acquire(
                scene,
                world,
                eye,
                self.look.forward(),
                config.interact_distance,
            );
        }

        out.extend(self.interaction.update(
            local_authority,
            self.actor,
            sample.interact,
            controlling && !dead,
        ));
        out
    }

    /// Runs one fixed tick: the throttled direction and rotation relay
    ///
    /// Returns a SetInput on every tick with a local authority, otherwise
    /// every `relay_interval`-th tick.
    pub fn fixed_tick(&mut self, session: &Session) -> Option<Outgoing> {
        self.channel.fixed_tick(
            session.local_authority(),
            self.actor,
            self.direction,
            self.look.replicated_rotation(),
        )
    }
}
