//! Authority side of seats: binding the occupant's body to the carrier and
//! turning relayed key levels into edge events.

use crate::emulation::{EmulatedKey, KeySource};
use log::{debug, info};
use shared::physics::PhysicsWorld;
use shared::{ActorId, Authority, InteractableId, KeyCode, World};

/// Called after a seat start was granted. Crouch follows the seat through
/// the movement solver; gravity is switched off while seated.
pub fn bind<P: PhysicsWorld>(_auth: Authority, physics: &mut P, world: &World, actor_id: ActorId) {
    let Some(actor) = world.actor(actor_id) else {
        return;
    };
    if let Some(body) = actor.body {
        physics.set_gravity(body, false);
    }
    if let Some(seat) = actor.seat {
        info!("{} seated in {}", actor_id, seat);
    }
}

/// Frees the actor's seat and gives the body back to the world.
pub fn release<P: PhysicsWorld>(
    _auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor_id: ActorId,
) -> Option<InteractableId> {
    let seat = world.release_seat(actor_id)?;
    if let Some(body) = world.actor(actor_id).and_then(|a| a.body) {
        physics.set_gravity(body, true);
        physics.set_colliders_enabled(body, true);
    }
    info!("{} left {}", actor_id, seat);
    Some(seat)
}

/// Applies a relayed key level. Unknown codes are dropped.
pub fn apply_key(_auth: Authority, world: &mut World, actor_id: ActorId, code: u32, pressed: bool) -> bool {
    let Some(key) = KeyCode::from_code(code) else {
        debug!("Dropping seat key code {} from {}", code, actor_id);
        return false;
    };
    world.set_seat_key(actor_id, key, pressed)
}

/// Drains one event per key transition since the last flush.
pub fn flush_keys(_auth: Authority, world: &mut World) -> Vec<EmulatedKey> {
    let mut events = Vec::new();
    for interactable in world.interactables_mut() {
        let id = interactable.id;
        if let Some(seat) = interactable.seat_mut() {
            events.extend(seat.keys.take_edges().into_iter().map(|(key, pressed)| EmulatedKey {
                source: KeySource::Interactable(id),
                key,
                pressed,
            }));
        }
    }
    events
}
