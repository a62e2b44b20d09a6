//! Actor and interactable tables.
//!
//! Cross references (holder, seat, held) are plain ids into these tables,
//! never owning pointers. Releasing one side of a relation clears both.
//!
//! The authority changes holder state through [`World::grant_start`] and
//! [`World::grant_stop`], which require an [`Authority`] token. Every other
//! peer only replays the authority's decisions through the `mirror_*` methods.

use crate::authority::Authority;
use crate::config::ControllerConfig;
use crate::ids::{ActorId, BodyHandle, InteractableId, JointHandle, PeerId};
use crate::input::PendingInput;
use crate::keys::{KeyCode, RelayKeys, RemoteKey};
use crate::math::{Quat, Vec3};
use crate::protocol::{InteractableInfo, InteractableKindInfo};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    /// Peer allowed to drive this actor.
    pub owner: PeerId,
    pub body: Option<BodyHandle>,
    pub config: ControllerConfig,
    pub transform: Transform,
    pub pending: PendingInput,
    pub target_crouch: bool,
    pub crouched: bool,
    pub grounded: bool,
    pub seat: Option<InteractableId>,
    pub held: Option<InteractableId>,
    pub grab_joint: Option<JointHandle>,
    pub health: f32,
    pub previous_health: f32,
    pub died: bool,
    pub burning: bool,
    pub frozen: bool,
    /// The owner is driving this actor right now.
    pub controlling: bool,
    pub controlled_key: RemoteKey,
}

impl Actor {
    pub fn new(id: ActorId, owner: PeerId, body: Option<BodyHandle>, config: ControllerConfig) -> Self {
        let health = config.health;
        Self {
            id,
            owner,
            body,
            config,
            transform: Transform::default(),
            pending: PendingInput::default(),
            target_crouch: false,
            crouched: false,
            grounded: false,
            seat: None,
            held: None,
            grab_joint: None,
            health,
            previous_health: health,
            died: false,
            burning: false,
            frozen: false,
            controlling: false,
            controlled_key: RemoteKey::default(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.died || self.health <= 0.0
    }

    pub fn is_seated(&self) -> bool {
        self.seat.is_some()
    }

    pub fn crouch_offset(&self) -> Vec3 {
        if self.crouched {
            Vec3::Y
        } else {
            Vec3::ZERO
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeatState {
    /// Occupants sit crouched.
    pub crouched: bool,
    pub eye_height: f32,
    pub keys: RelayKeys,
}

impl SeatState {
    pub fn new(crouched: bool, eye_height: f32) -> Self {
        Self {
            crouched,
            eye_height,
            keys: RelayKeys::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractableKind {
    /// Level-triggered button, held while interacting.
    Plain { held: bool },
    /// Latch flipped once per start.
    Toggle { latched: bool },
    Seat(SeatState),
    /// Pulled around on a spring while held.
    Grabbable,
}

impl InteractableKind {
    pub fn emits_keys(&self) -> bool {
        matches!(self, Self::Plain { .. } | Self::Toggle { .. })
    }

    pub fn is_seat(&self) -> bool {
        matches!(self, Self::Seat(_))
    }

    pub fn info(&self) -> InteractableKindInfo {
        match self {
            Self::Plain { .. } => InteractableKindInfo::Plain,
            Self::Toggle { .. } => InteractableKindInfo::Toggle,
            Self::Seat(seat) => InteractableKindInfo::Seat {
                crouched: seat.crouched,
                eye_height: seat.eye_height,
            },
            Self::Grabbable => InteractableKindInfo::Grabbable,
        }
    }

    pub fn from_info(info: InteractableKindInfo) -> Self {
        match info {
            InteractableKindInfo::Plain => Self::Plain { held: false },
            InteractableKindInfo::Toggle => Self::Toggle { latched: false },
            InteractableKindInfo::Seat {
                crouched,
                eye_height,
            } => Self::Seat(SeatState::new(crouched, eye_height)),
            InteractableKindInfo::Grabbable => Self::Grabbable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Interactable {
    pub id: InteractableId,
    pub kind: InteractableKind,
    pub label: String,
    pub body: Option<BodyHandle>,
    pub transform: Transform,
    pub simulating: bool,
    /// Current holder or seat occupant.
    pub holder: Option<ActorId>,
}

impl Interactable {
    pub fn new(id: InteractableId, kind: InteractableKind, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            body: None,
            transform: Transform::default(),
            simulating: true,
            holder: None,
        }
    }

    pub fn from_info(info: &InteractableInfo) -> Self {
        Self::new(info.id, InteractableKind::from_info(info.kind), info.label.clone())
    }

    pub fn info(&self) -> InteractableInfo {
        InteractableInfo {
            id: self.id,
            kind: self.kind.info(),
            label: self.label.clone(),
        }
    }

    /// Label spaced out for the on-screen hint ("Use" -> "U s e").
    pub fn hint(&self) -> String {
        let mut hint = String::with_capacity(self.label.len() * 2);
        for (i, c) in self.label.chars().enumerate() {
            if i > 0 {
                hint.push(' ');
            }
            hint.push(c);
        }
        hint
    }

    pub fn seat(&self) -> Option<&SeatState> {
        match &self.kind {
            InteractableKind::Seat(seat) => Some(seat),
            _ => None,
        }
    }

    pub fn seat_mut(&mut self) -> Option<&mut SeatState> {
        match &mut self.kind {
            InteractableKind::Seat(seat) => Some(seat),
            _ => None,
        }
    }

    pub fn latched(&self) -> bool {
        matches!(self.kind, InteractableKind::Toggle { latched: true })
    }
}

/// Result of a granted start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Started {
    Held,
    Seated,
    Toggled { latched: bool },
}

#[derive(Debug, Default)]
pub struct World {
    actors: BTreeMap<ActorId, Actor>,
    interactables: BTreeMap<InteractableId, Interactable>,
    next_actor: u32,
    next_interactable: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_actor(
        &mut self,
        owner: PeerId,
        body: Option<BodyHandle>,
        config: ControllerConfig,
    ) -> ActorId {
        self.next_actor += 1;
        let id = ActorId(self.next_actor);
        self.actors.insert(id, Actor::new(id, owner, body, config));
        id
    }

    /// Inserts an actor with a known id (mirrors learn ids from the authority).
    pub fn insert_actor(&mut self, actor: Actor) {
        self.next_actor = self.next_actor.max(actor.id.0);
        self.actors.insert(actor.id, actor);
    }

    /// Removes an actor, clearing every relation that points at it.
    pub fn remove_actor(&mut self, id: ActorId) -> Option<Actor> {
        self.release_seat(id);
        self.release_hold(id);
        self.actors.remove(&id)
    }

    pub fn add_interactable(
        &mut self,
        kind: InteractableKind,
        label: impl Into<String>,
        body: Option<BodyHandle>,
    ) -> InteractableId {
        self.next_interactable += 1;
        let id = InteractableId(self.next_interactable);
        let mut interactable = Interactable::new(id, kind, label);
        interactable.body = body;
        self.interactables.insert(id, interactable);
        id
    }

    pub fn insert_interactable(&mut self, interactable: Interactable) {
        self.next_interactable = self.next_interactable.max(interactable.id.0);
        self.interactables.insert(interactable.id, interactable);
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn interactable(&self, id: InteractableId) -> Option<&Interactable> {
        self.interactables.get(&id)
    }

    pub fn interactable_mut(&mut self, id: InteractableId) -> Option<&mut Interactable> {
        self.interactables.get_mut(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actors_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.actors.values_mut()
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    pub fn interactables(&self) -> impl Iterator<Item = &Interactable> {
        self.interactables.values()
    }

    pub fn interactables_mut(&mut self) -> impl Iterator<Item = &mut Interactable> {
        self.interactables.values_mut()
    }

    pub fn actors_owned_by(&self, peer: PeerId) -> Vec<ActorId> {
        self.actors
            .values()
            .filter(|a| a.owner == peer)
            .map(|a| a.id)
            .collect()
    }

    /// True iff `actor` exists and is driven by `peer`.
    pub fn is_bound_to(&self, actor: ActorId, peer: PeerId) -> bool {
        self.actors.get(&actor).map(|a| a.owner == peer).unwrap_or(false)
    }

    /// The seat an actor occupies, if any.
    pub fn seat_of(&self, actor: ActorId) -> Option<&Interactable> {
        let seat = self.actors.get(&actor)?.seat?;
        self.interactables.get(&seat)
    }

    pub fn holder_of(&self, target: InteractableId) -> Option<ActorId> {
        self.interactables.get(&target).and_then(|i| i.holder)
    }

    /// Validates and applies a start request. `None` means rejected.
    pub fn grant_start(
        &mut self,
        _auth: Authority,
        actor_id: ActorId,
        target_id: InteractableId,
    ) -> Option<Started> {
        let actor = self.actors.get_mut(&actor_id)?;
        let target = self.interactables.get_mut(&target_id)?;

        if actor.is_dead() || !target.simulating {
            debug!("Rejected start {} -> {}: not eligible", actor_id, target_id);
            return None;
        }

        match &mut target.kind {
            InteractableKind::Toggle { latched } => {
                *latched = !*latched;
                Some(Started::Toggled { latched: *latched })
            }
            InteractableKind::Seat(_) => {
                if target.holder.is_some() || actor.seat.is_some() {
                    debug!("Rejected seat {} for {}: occupied", target_id, actor_id);
                    return None;
                }
                target.holder = Some(actor_id);
                actor.seat = Some(target_id);
                actor.target_crouch = false;
                Some(Started::Seated)
            }
            InteractableKind::Plain { held } => {
                if target.holder.is_some() || actor.held.is_some() {
                    debug!("Rejected {} for {}: already held", target_id, actor_id);
                    return None;
                }
                *held = true;
                target.holder = Some(actor_id);
                actor.held = Some(target_id);
                Some(Started::Held)
            }
            InteractableKind::Grabbable => {
                if target.holder.is_some() || actor.held.is_some() {
                    debug!("Rejected {} for {}: already held", target_id, actor_id);
                    return None;
                }
                target.holder = Some(actor_id);
                actor.held = Some(target_id);
                Some(Started::Held)
            }
        }
    }

    /// Validates and applies a stop request. Seats and toggles have no
    /// sustained hold to stop, so they always yield `false`.
    pub fn grant_stop(
        &mut self,
        _auth: Authority,
        actor_id: ActorId,
        target_id: InteractableId,
    ) -> bool {
        let eligible = match (self.actors.get(&actor_id), self.interactables.get(&target_id)) {
            (Some(actor), Some(target)) => {
                !actor.is_dead()
                    && target.simulating
                    && target.holder == Some(actor_id)
                    && matches!(
                        target.kind,
                        InteractableKind::Plain { .. } | InteractableKind::Grabbable
                    )
            }
            _ => false,
        };

        if !eligible {
            debug!("Rejected stop {} -> {}", actor_id, target_id);
            return false;
        }

        self.release_hold(actor_id) == Some(target_id)
    }

    /// Applies a propagated start. Returns true if the mirror changed.
    pub fn mirror_start(&mut self, actor_id: ActorId, target_id: InteractableId) -> bool {
        if !self.actors.contains_key(&actor_id) {
            return false;
        }
        let (previous, is_seat) = match self.interactables.get(&target_id) {
            Some(target) => match target.kind {
                InteractableKind::Toggle { .. } => return false,
                _ => (target.holder, target.kind.is_seat()),
            },
            None => return false,
        };

        if previous == Some(actor_id) {
            return false;
        }

        // The authority decided; drop whatever the mirror believed before.
        if let Some(stale) = previous {
            if is_seat {
                self.release_seat(stale);
            } else {
                self.release_hold(stale);
            }
        }
        if is_seat {
            self.release_seat(actor_id);
        } else {
            self.release_hold(actor_id);
        }

        let (Some(actor), Some(target)) = (
            self.actors.get_mut(&actor_id),
            self.interactables.get_mut(&target_id),
        ) else {
            return false;
        };

        target.holder = Some(actor_id);
        match &mut target.kind {
            InteractableKind::Seat(_) => {
                actor.seat = Some(target_id);
                actor.target_crouch = false;
            }
            InteractableKind::Plain { held } => {
                *held = true;
                actor.held = Some(target_id);
            }
            _ => actor.held = Some(target_id),
        }
        true
    }

    /// Applies a propagated stop. Returns true if the mirror changed.
    pub fn mirror_stop(&mut self, actor_id: ActorId, target_id: InteractableId) -> bool {
        let Some(target) = self.interactables.get(&target_id) else {
            return false;
        };
        if target.holder != Some(actor_id) {
            return false;
        }
        if target.kind.is_seat() {
            self.release_seat(actor_id) == Some(target_id)
        } else {
            self.release_hold(actor_id) == Some(target_id)
        }
    }

    /// Frees the actor's seat. Relayed keys are released so the next edge
    /// flush reports them up.
    pub fn release_seat(&mut self, actor_id: ActorId) -> Option<InteractableId> {
        let seat_id = self.actors.get_mut(&actor_id)?.seat.take()?;
        if let Some(seat) = self.interactables.get_mut(&seat_id) {
            if seat.holder == Some(actor_id) {
                seat.holder = None;
            }
            if let Some(state) = seat.seat_mut() {
                state.keys.release_all();
            }
        }
        Some(seat_id)
    }

    /// Drops whatever the actor holds.
    pub fn release_hold(&mut self, actor_id: ActorId) -> Option<InteractableId> {
        let held_id = self.actors.get_mut(&actor_id)?.held.take()?;
        if let Some(target) = self.interactables.get_mut(&held_id) {
            if target.holder == Some(actor_id) {
                target.holder = None;
            }
            if let InteractableKind::Plain { held } = &mut target.kind {
                *held = false;
            }
        }
        Some(held_id)
    }

    /// Writes a relayed key on the actor's seat. Ignored when not seated,
    /// dead, or for keys outside the allow-list.
    pub fn set_seat_key(&mut self, actor_id: ActorId, key: KeyCode, pressed: bool) -> bool {
        let Some(actor) = self.actors.get(&actor_id) else {
            return false;
        };
        if actor.is_dead() {
            return false;
        }
        let Some(seat_id) = actor.seat else {
            return false;
        };
        self.interactables
            .get_mut(&seat_id)
            .and_then(|seat| seat.seat_mut())
            .map(|seat| seat.keys.set(key, pressed))
            .unwrap_or(false)
    }
}
