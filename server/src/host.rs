//! The authoritative session: world tables, the physics engine, and the
//! request dispatcher that sits between the transport and the solvers.

use crate::emulation::EmulatedKey;
use crate::physics::{Body, SimWorld};
use crate::{health, interaction, movement, seat};
use log::{debug, info, warn};
use shared::math::Vec3;
use shared::physics::PhysicsWorld;
use shared::protocol::{ActorState, InteractableInfo, InteractableState};
use shared::{
    ActorId, Authority, BodyHandle, ControllerConfig, InteractableId, InteractableKind, Outgoing,
    Packet, PeerId, SessionRole, Transform, World,
};

/// The authoritative session for one world
///
/// Owns the actor and interactable tables together with the physics engine
/// that moves their bodies. Every mutation goes through an [`Authority`]
/// token taken from `role`, so a host built with a non-authority role
/// accepts requests but changes nothing.
///
/// [`Authority`]: shared::Authority
pub struct Host<P: PhysicsWorld> {
    pub world: World,
    pub physics: P,
    pub role: SessionRole,
    tick: u32,
    keys: Vec<EmulatedKey>,
}

impl<P: PhysicsWorld> Host<P> {
    /// Creates a hosting session around `physics` with empty tables
    pub fn new(physics: P) -> Self {
        Self::with_role(physics, SessionRole::host())
    }

    /// Creates a session with an explicit role
    ///
    /// Used for single-player sessions and for local simulation shadows,
    /// which hold authority without hosting.
    pub fn with_role(physics: P, role: SessionRole) -> Self {
        Self {
            world: World::new(),
            physics,
            role,
            tick: 0,
            keys: Vec::new(),
        }
    }

    /// Number of fixed ticks run so far; stamped on every snapshot
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Adds an actor owned by `owner`
    ///
    /// The actor starts at the body's current transform when a body is
    /// given. Only requests from `owner` will be accepted for it.
    pub fn spawn_actor(
        &mut self,
        owner: PeerId,
        body: Option<BodyHandle>,
        config: ControllerConfig,
    ) -> ActorId {
        let id = self.world.spawn_actor(owner, body, config);
        if let Some(state) = body.and_then(|b| self.physics.body(b)) {
            if let Some(actor) = self.world.actor_mut(id) {
                actor.transform = Transform {
                    position: state.position,
                    rotation: state.rotation,
                    velocity: state.velocity,
                };
            }
        }
        info!("Spawned {} for {}", id, owner);
        id
    }

    /// Adds an interactable and copies its body transform into the table
    pub fn spawn_interactable(
        &mut self,
        kind: InteractableKind,
        label: &str,
        body: Option<BodyHandle>,
    ) -> InteractableId {
        let id = self.world.add_interactable(kind, label, body);
        self.sync_transforms();
        id
    }

    /// Static interactable descriptions sent to a peer when it connects.
    pub fn layout(&self) -> Vec<InteractableInfo> {
        self.world.interactables().map(|i| i.info()).collect()
    }

    /// Looks up the actor whose character body is `body`
    pub fn actor_for_body(&self, body: BodyHandle) -> Option<ActorId> {
        self.world
            .actors()
            .find(|a| a.body == Some(body))
            .map(|a| a.id)
    }

    /// Drops every actor a departed peer owned, releasing holds and seats.
    pub fn remove_peer(&mut self, peer: PeerId) -> Vec<Outgoing> {
        let mut outgoing = Vec::new();
        for actor_id in self.world.actors_owned_by(peer) {
            if let Some(auth) = self.role.authority() {
                outgoing.extend(interaction::release_all(
                    auth,
                    &mut self.physics,
                    &mut self.world,
                    actor_id,
                    &mut self.keys,
                ));
            }
            if let Some(actor) = self.world.remove_actor(actor_id) {
                if let Some(body) = actor.body {
                    self.physics.remove_body(body);
                }
                info!("Removed {} of {}", actor_id, peer);
            }
        }
        outgoing
    }

    /// Applies one request from `sender`
    ///
    /// The claimed actor must be bound to `sender`. The one exception is a
    /// jump confirmed by the host itself. Input and crouch overwrite the
    /// actor's state, so duplicates are harmless. Interaction requests go
    /// through the exclusivity check and answer with Remote* broadcasts.
    ///
    /// Anything that fails validation (unknown actor, wrong sender, a held
    /// target, a non-request packet) is logged and dropped. Nothing is sent
    /// back to the requester in that case.
    ///
    /// ```rust
    /// use server::host::Host;
    /// use server::physics::SimWorld;
    /// use shared::math::Vec3;
    /// use shared::{ControllerConfig, Packet, PeerId};
    ///
    /// let mut host = Host::new(SimWorld::new());
    /// let actor = host.spawn_actor(PeerId(1), None, ControllerConfig::default());
    /// let input = |direction| Packet::SetInput {
    ///     actor,
    ///     direction,
    ///     rotation: Vec3::ZERO,
    /// };
    ///
    /// // Another peer cannot steer the actor.
    /// assert!(host.handle(PeerId(2), input(Vec3::X)).is_empty());
    /// assert_eq!(host.world.actor(actor).map(|a| a.pending.direction), Some(Vec3::ZERO));
    ///
    /// // The owner can, and the input simply overwrites the last one.
    /// host.handle(PeerId(1), input(Vec3::X));
    /// assert_eq!(host.world.actor(actor).map(|a| a.pending.direction), Some(Vec3::X));
    /// ```
    pub fn handle(&mut self, sender: PeerId, packet: Packet) -> Vec<Outgoing> {
        let Some(auth) = self.role.authority() else {
            warn!("Dropping {:?}: this process is not the authority", packet);
            return Vec::new();
        };
        if !packet.is_request() {
            warn!("Unexpected {:?} from {}", packet, sender);
            return Vec::new();
        }
        let Some(actor) = packet.actor() else {
            return Vec::new();
        };

        let bound = self.world.is_bound_to(actor, sender);
        let host_jump = matches!(packet, Packet::Jump { .. })
            && sender.is_host()
            && self.world.actor(actor).is_some();
        if !bound && !host_jump {
            debug!("Dropping {:?}: {} does not drive {}", packet, sender, actor);
            return Vec::new();
        }

        self.dispatch(auth, actor, packet)
    }

    fn dispatch(&mut self, auth: Authority, actor_id: ActorId, packet: Packet) -> Vec<Outgoing> {
        match packet {
            Packet::SetInput {
                direction,
                rotation,
                ..
            } => {
                if let Some(actor) = self.world.actor_mut(actor_id) {
                    actor.pending.overwrite(direction, rotation);
                }
                Vec::new()
            }
            Packet::Jump { .. } => movement::jump(auth, &mut self.physics, &mut self.world, actor_id),
            Packet::SetCrouch { value, .. } => {
                if let Some(actor) = self.world.actor_mut(actor_id) {
                    actor.target_crouch = value;
                }
                Vec::new()
            }
            Packet::SetControlling { value, .. } => {
                if let Some(actor) = self.world.actor_mut(actor_id) {
                    actor.controlling = value;
                    actor.controlled_key.set(value);
                }
                Vec::new()
            }
            Packet::RequestStartInteraction { interactable, .. } => {
                debug!("{} requests {}", actor_id, interactable);
                interaction::start(
                    auth,
                    &mut self.physics,
                    &mut self.world,
                    actor_id,
                    interactable,
                    &mut self.keys,
                )
            }
            Packet::RequestStopInteraction { interactable, .. } => interaction::stop(
                auth,
                &mut self.physics,
                &mut self.world,
                actor_id,
                interactable,
                &mut self.keys,
            ),
            Packet::SeatKeyPress { key, .. } => {
                seat::apply_key(auth, &mut self.world, actor_id, key, true);
                Vec::new()
            }
            Packet::SeatKeyRelease { key, .. } => {
                seat::apply_key(auth, &mut self.world, actor_id, key, false);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Impact reported by the physics engine
    ///
    /// Damages the actor owning `body`, if any. After death the impact only
    /// produces blood particles.
    pub fn on_collision(&mut self, body: BodyHandle, relative_velocity: Vec3) -> Vec<Outgoing> {
        let Some(auth) = self.role.authority() else {
            return Vec::new();
        };
        let Some(actor) = self.actor_for_body(body) else {
            return Vec::new();
        };
        health::on_collision(auth, &self.physics, &mut self.world, actor, relative_velocity)
    }

    /// Damages every actor within `radius` of `center`
    ///
    /// Damage falls off linearly with distance. An actor the blast kills is
    /// thrown away from the centre. Health changes are reported as Hit
    /// notifications on the next tick.
    pub fn on_explosion(&mut self, center: Vec3, power: f32, radius: f32) {
        let Some(auth) = self.role.authority() else {
            return;
        };
        for actor in self.world.actor_ids() {
            health::on_explosion(
                auth,
                &mut self.physics,
                &mut self.world,
                actor,
                power,
                center,
                radius,
            );
        }
    }

    /// One fixed tick of every authority-side solver. Does not step the
    /// engine; see [`Host::step`] for the bundled reference engine.
    pub fn fixed_tick(&mut self, dt: f32) -> Vec<Outgoing> {
        let Some(auth) = self.role.authority() else {
            return Vec::new();
        };
        let mut outgoing = Vec::new();

        for actor in self.world.actor_ids() {
            health::apply_conditions(auth, &mut self.world, actor);
            outgoing.extend(health::update(
                auth,
                &mut self.physics,
                &mut self.world,
                actor,
                &mut self.keys,
            ));
            outgoing.extend(interaction::check_grab(
                auth,
                &mut self.physics,
                &mut self.world,
                actor,
            ));
            movement::solve(auth, &mut self.physics, &mut self.world, actor, dt);
        }

        self.keys.extend(seat::flush_keys(auth, &mut self.world));
        for actor in self.world.actors_mut() {
            if let Some(pressed) = actor.controlled_key.take_edge() {
                self.keys.push(EmulatedKey::controlled(actor.id, pressed));
            }
        }

        self.sync_transforms();
        self.tick = self.tick.wrapping_add(1);
        outgoing
    }

    /// Copies engine state into the world tables.
    pub fn sync_transforms(&mut self) {
        for actor in self.world.actors_mut() {
            if let Some(state) = actor.body.and_then(|b| self.physics.body(b)) {
                actor.transform = Transform {
                    position: state.position,
                    rotation: state.rotation,
                    velocity: state.velocity,
                };
            }
        }
        for interactable in self.world.interactables_mut() {
            if let Some(state) = interactable.body.and_then(|b| self.physics.body(b)) {
                interactable.transform = Transform {
                    position: state.position,
                    rotation: state.rotation,
                    velocity: state.velocity,
                };
            }
        }
    }

    /// Snapshot of every actor and interactable at the current tick
    ///
    /// Broadcast each tick so mirrors converge even when discrete
    /// notifications are lost.
    pub fn world_state(&self) -> Packet {
        let actors = self
            .world
            .actors()
            .map(|a| ActorState {
                id: a.id,
                owner: a.owner,
                position: a.transform.position,
                rotation: a.transform.rotation,
                velocity: a.transform.velocity,
                crouched: a.crouched,
                alive: !a.is_dead(),
            })
            .collect();
        let interactables = self
            .world
            .interactables()
            .map(|i| InteractableState {
                id: i.id,
                position: i.transform.position,
                rotation: i.transform.rotation,
                velocity: i.transform.velocity,
                simulating: i.simulating,
                latched: i.latched(),
            })
            .collect();
        Packet::WorldState {
            tick: self.tick,
            actors,
            interactables,
        }
    }

    /// Drains the emulated key edges raised since the last call.
    pub fn take_emulated_keys(&mut self) -> Vec<EmulatedKey> {
        std::mem::take(&mut self.keys)
    }
}

impl Host<SimWorld> {
    /// Spawns an actor with a fresh character body.
    pub fn spawn_player(&mut self, owner: PeerId, position: Vec3, config: ControllerConfig) -> ActorId {
        let body = self.physics.add_body(Body::character(position, config.mass));
        self.spawn_actor(owner, Some(body), config)
    }

    /// Runs the solvers, advances the engine, and feeds new contacts back
    /// into the health model.
    pub fn step(&mut self, dt: f32) -> Vec<Outgoing> {
        let mut outgoing = self.fixed_tick(dt);
        for contact in self.physics.step(dt) {
            outgoing.extend(self.on_collision(contact.body, contact.relative_velocity));
        }
        self.sync_transforms();
        outgoing
    }
}
