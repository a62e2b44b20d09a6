//! Replays the authority's decisions on a peer's copy of the world.
//!
//! Every handler is idempotent: a duplicated notification changes nothing
//! the second time, and a snapshot older than the last applied one is
//! dropped.

use log::{debug, info};
use shared::protocol::{ActorState, InteractableInfo, InteractableState};
use shared::world::Actor;
use shared::{
    ActorId, ControllerConfig, Interactable, InteractableId, InteractableKind, Packet, PeerId, World,
};

/// What changed on the mirror, for feedback (sounds, particles, camera).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEvent {
    Started {
        actor: ActorId,
        interactable: InteractableId,
    },
    Stopped {
        actor: ActorId,
        interactable: InteractableId,
    },
    Jumped {
        actor: ActorId,
        dismounted: Option<InteractableId>,
    },
    Died {
        actor: ActorId,
    },
    Hit {
        actor: ActorId,
    },
    Blood {
        actor: ActorId,
    },
    Snapshot {
        tick: u32,
    },
}

/// Creates the mirrored interactables from the layout sent on connect.
pub fn load_layout(world: &mut World, layout: &[InteractableInfo]) {
    for info in layout {
        if world.interactable(info.id).is_none() {
            world.insert_interactable(Interactable::from_info(info));
        }
    }
}

#[derive(Debug, Default)]
pub struct Mirror {
    last_tick: Option<u32>,
    /// The actor this peer drives and the tunables the host gave it.
    /// Other actors are mirrored with defaults; only transforms and flags
    /// of theirs are read.
    own: Option<(ActorId, ControllerConfig)>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    /// Records the actor assigned on connect and creates it with the host's
    /// config. Snapshots that re-create it later reuse the same config.
    pub fn adopt(&mut self, world: &mut World, actor: ActorId, owner: PeerId, config: ControllerConfig) {
        match world.actor_mut(actor) {
            Some(existing) => existing.config = config.clone(),
            None => world.insert_actor(Actor::new(actor, owner, None, config.clone())),
        }
        self.own = Some((actor, config));
    }

    pub fn apply(&mut self, world: &mut World, packet: &Packet) -> Option<MirrorEvent> {
        match packet {
            Packet::RemoteStartInteraction { actor, interactable } => world
                .mirror_start(*actor, *interactable)
                .then_some(MirrorEvent::Started {
                    actor: *actor,
                    interactable: *interactable,
                }),
            Packet::RemoteStopInteraction { actor, interactable } => world
                .mirror_stop(*actor, *interactable)
                .then_some(MirrorEvent::Stopped {
                    actor: *actor,
                    interactable: *interactable,
                }),
            Packet::Jump { actor } => {
                world.actor(*actor)?;
                let dismounted = world.release_seat(*actor);
                if let Some(seat) = dismounted {
                    debug!("{} jumped off {}", actor, seat);
                }
                Some(MirrorEvent::Jumped {
                    actor: *actor,
                    dismounted,
                })
            }
            Packet::Death { actor } => mark_dead(world, *actor).then_some(MirrorEvent::Died { actor: *actor }),
            Packet::Hit { actor } => Some(MirrorEvent::Hit { actor: *actor }),
            Packet::BloodParticles { actor } => Some(MirrorEvent::Blood { actor: *actor }),
            Packet::WorldState {
                tick,
                actors,
                interactables,
            } => {
                if let Some(last) = self.last_tick {
                    // Wrapping comparison: anything "behind" the last tick is stale.
                    if tick.wrapping_sub(last) as i32 <= 0 {
                        debug!("Dropping stale snapshot {} (have {})", tick, last);
                        return None;
                    }
                }
                self.last_tick = Some(*tick);
                apply_actors(world, actors, self.own.as_ref());
                apply_interactables(world, interactables);
                Some(MirrorEvent::Snapshot { tick: *tick })
            }
            _ => None,
        }
    }
}

/// One-shot death on the mirror. False if the actor is unknown or already dead.
fn mark_dead(world: &mut World, actor_id: ActorId) -> bool {
    let Some(actor) = world.actor_mut(actor_id) else {
        return false;
    };
    if actor.died {
        return false;
    }
    actor.died = true;
    actor.health = 0.0;
    world.release_seat(actor_id);
    world.release_hold(actor_id);
    info!("{} died", actor_id);
    true
}

fn apply_actors(world: &mut World, actors: &[ActorState], own: Option<&(ActorId, ControllerConfig)>) {
    for gone in world.actor_ids() {
        if !actors.iter().any(|a| a.id == gone) {
            info!("{} left the session", gone);
            world.remove_actor(gone);
        }
    }

    for state in actors {
        if world.actor(state.id).is_none() {
            let config = match own {
                Some((id, config)) if *id == state.id => config.clone(),
                _ => ControllerConfig::default(),
            };
            world.insert_actor(Actor::new(state.id, state.owner, None, config));
        }
        if let Some(actor) = world.actor_mut(state.id) {
            actor.transform.position = state.position;
            actor.transform.rotation = state.rotation;
            actor.transform.velocity = state.velocity;
            actor.crouched = state.crouched;
        }
        if !state.alive {
            mark_dead(world, state.id);
        }
    }
}

fn apply_interactables(world: &mut World, interactables: &[InteractableState]) {
    for state in interactables {
        let Some(interactable) = world.interactable_mut(state.id) else {
            continue;
        };
        interactable.transform.position = state.position;
        interactable.transform.rotation = state.rotation;
        interactable.transform.velocity = state.velocity;
        interactable.simulating = state.simulating;
        if let InteractableKind::Toggle { latched } = &mut interactable.kind {
            *latched = state.latched;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::math::{Quat, Vec3};
    use shared::protocol::InteractableKindInfo;

    fn layout() -> Vec<InteractableInfo> {
        vec![
            InteractableInfo {
                id: InteractableId(1),
                kind: InteractableKindInfo::Plain,
                label: "Use".into(),
            },
            InteractableInfo {
                id: InteractableId(2),
                kind: InteractableKindInfo::Seat {
                    crouched: true,
                    eye_height: 0.5,
                },
                label: "Sit".into(),
            },
        ]
    }

    fn actor_state(id: u32, alive: bool) -> ActorState {
        ActorState {
            id: ActorId(id),
            owner: PeerId(id),
            position: Vec3::new(id as f32, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            crouched: false,
            alive,
        }
    }

    fn snapshot(tick: u32, actors: Vec<ActorState>) -> Packet {
        Packet::WorldState {
            tick,
            actors,
            interactables: vec![],
        }
    }

    fn mirrored() -> (Mirror, World) {
        let mut world = World::new();
        load_layout(&mut world, &layout());
        let mut mirror = Mirror::new();
        mirror.apply(&mut world, &snapshot(1, vec![actor_state(1, true), actor_state(2, true)]));
        (mirror, world)
    }

    #[test]
    fn test_snapshot_creates_and_removes_actors() {
        let (mut mirror, mut world) = mirrored();
        assert_eq!(world.actor_ids(), vec![ActorId(1), ActorId(2)]);

        mirror.apply(&mut world, &snapshot(2, vec![actor_state(2, true)]));
        assert_eq!(world.actor_ids(), vec![ActorId(2)]);
    }

    #[test]
    fn test_stale_snapshot_dropped() {
        let (mut mirror, mut world) = mirrored();
        mirror.apply(&mut world, &snapshot(5, vec![actor_state(1, true), actor_state(2, true)]));
        assert_eq!(mirror.apply(&mut world, &snapshot(3, vec![])), None);
        assert_eq!(world.actor_ids().len(), 2);
        assert_eq!(mirror.last_tick(), Some(5));
    }

    #[test]
    fn test_remote_start_is_idempotent() {
        let (mut mirror, mut world) = mirrored();
        let start = Packet::RemoteStartInteraction {
            actor: ActorId(1),
            interactable: InteractableId(1),
        };
        assert!(mirror.apply(&mut world, &start).is_some());
        assert_eq!(mirror.apply(&mut world, &start), None);
        assert_eq!(world.holder_of(InteractableId(1)), Some(ActorId(1)));
    }

    #[test]
    fn test_jump_dismounts_mirror() {
        let (mut mirror, mut world) = mirrored();
        mirror.apply(
            &mut world,
            &Packet::RemoteStartInteraction {
                actor: ActorId(2),
                interactable: InteractableId(2),
            },
        );
        assert!(world.actor(ActorId(2)).unwrap().is_seated());

        let event = mirror.apply(&mut world, &Packet::Jump { actor: ActorId(2) });
        assert_eq!(
            event,
            Some(MirrorEvent::Jumped {
                actor: ActorId(2),
                dismounted: Some(InteractableId(2)),
            })
        );
        assert_eq!(world.holder_of(InteractableId(2)), None);
    }

    #[test]
    fn test_death_applied_once_and_frees_hold() {
        let (mut mirror, mut world) = mirrored();
        mirror.apply(
            &mut world,
            &Packet::RemoteStartInteraction {
                actor: ActorId(1),
                interactable: InteractableId(1),
            },
        );
        let death = Packet::Death { actor: ActorId(1) };
        assert_eq!(
            mirror.apply(&mut world, &death),
            Some(MirrorEvent::Died { actor: ActorId(1) })
        );
        assert_eq!(mirror.apply(&mut world, &death), None);
        assert_eq!(world.holder_of(InteractableId(1)), None);
    }

    #[test]
    fn test_adopted_actor_keeps_host_config() {
        let mut world = World::new();
        let mut mirror = Mirror::new();
        let config = ControllerConfig {
            toggle_crouch: true,
            interact_distance: 2.0,
            ..ControllerConfig::default()
        };
        mirror.adopt(&mut world, ActorId(1), PeerId(1), config.clone());
        assert_eq!(world.actor(ActorId(1)).unwrap().config, config);

        // Dropped by one snapshot, re-created by the next.
        mirror.apply(&mut world, &snapshot(1, vec![actor_state(2, true)]));
        assert!(world.actor(ActorId(1)).is_none());
        mirror.apply(&mut world, &snapshot(2, vec![actor_state(1, true), actor_state(2, true)]));
        assert_eq!(world.actor(ActorId(1)).unwrap().config, config);
        assert_eq!(world.actor(ActorId(2)).unwrap().config, ControllerConfig::default());
    }

    #[test]
    fn test_snapshot_death_when_notification_lost() {
        let (mut mirror, mut world) = mirrored();
        mirror.apply(&mut world, &snapshot(2, vec![actor_state(1, false), actor_state(2, true)]));
        assert!(world.actor(ActorId(1)).unwrap().died);
    }
}
