//! Authority handlers of the interaction handshake.
//!
//! A start or stop request is validated against the world tables, applied,
//! and confirmed to every peer with a Remote* notification. Rejections are
//! silent toward the requester: no reply, no error.

use crate::emulation::EmulatedKey;
use crate::seat;
use log::debug;
use shared::math::Vec3;
use shared::physics::{PhysicsWorld, SpringJoint};
use shared::world::Started;
use shared::{ActorId, Authority, InteractableId, InteractableKind, Outgoing, Packet, World};

fn remote_start(actor: ActorId, interactable: InteractableId) -> Outgoing {
    Outgoing::to_all(Packet::RemoteStartInteraction {
        actor,
        interactable,
    })
}

fn remote_stop(actor: ActorId, interactable: InteractableId) -> Outgoing {
    Outgoing::to_all(Packet::RemoteStopInteraction {
        actor,
        interactable,
    })
}

fn is_button(world: &World, target: InteractableId) -> bool {
    world
        .interactable(target)
        .map(|i| matches!(i.kind, InteractableKind::Plain { .. }))
        .unwrap_or(false)
}

/// Handles a start request that passed sender authentication
///
/// The target must be simulating and have no holder, and the actor must be
/// alive and not already holding something. On success every peer is told
/// with RemoteStartInteraction. Buttons also press their emulated key, seats
/// bind the body to the carrier, and grabbables attach a spring joint.
///
/// A toggle flips its latch and taps its key without becoming held, so no
/// broadcast goes out; the latch travels in the next snapshot. A rejected
/// request returns nothing.
pub fn start<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor: ActorId,
    target: InteractableId,
    keys: &mut Vec<EmulatedKey>,
) -> Vec<Outgoing> {
    match world.grant_start(auth, actor, target) {
        None => Vec::new(),
        Some(Started::Held) => {
            if is_button(world, target) {
                keys.push(EmulatedKey::button(target, true));
            } else {
                attach_grab(physics, world, actor, target);
            }
            debug!("{} holds {}", actor, target);
            vec![remote_start(actor, target)]
        }
        Some(Started::Seated) => {
            seat::bind(auth, physics, world, actor);
            vec![remote_start(actor, target)]
        }
        Some(Started::Toggled { latched }) => {
            debug!("{} toggled {} to {}", actor, target, latched);
            keys.push(EmulatedKey::button(target, true));
            keys.push(EmulatedKey::button(target, false));
            Vec::new()
        }
    }
}

/// Handles a stop request that passed sender authentication
///
/// Only the current holder can stop. The button key is released and any
/// grab joint detached before RemoteStopInteraction is broadcast. A stop
/// from anyone else returns nothing.
pub fn stop<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor: ActorId,
    target: InteractableId,
    keys: &mut Vec<EmulatedKey>,
) -> Vec<Outgoing> {
    let button = is_button(world, target);
    if !world.grant_stop(auth, actor, target) {
        return Vec::new();
    }
    if button {
        keys.push(EmulatedKey::button(target, false));
    }
    detach_grab(physics, world, actor);
    debug!("{} released {}", actor, target);
    vec![remote_stop(actor, target)]
}

/// Drops every hold and seat of the actor (death, disconnect).
pub fn release_all<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor: ActorId,
    keys: &mut Vec<EmulatedKey>,
) -> Vec<Outgoing> {
    let mut outgoing = Vec::new();

    detach_grab(physics, world, actor);
    if let Some(held) = world.actor(actor).and_then(|a| a.held) {
        let button = is_button(world, held);
        world.release_hold(actor);
        if button {
            keys.push(EmulatedKey::button(held, false));
        }
        outgoing.push(remote_stop(actor, held));
    }
    if let Some(seat) = seat::release(auth, physics, world, actor) {
        outgoing.push(remote_stop(actor, seat));
    }
    outgoing
}

/// Releases a grab whose joint broke under load.
pub fn check_grab<P: PhysicsWorld>(
    _auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor: ActorId,
) -> Vec<Outgoing> {
    let Some(joint) = world.actor(actor).and_then(|a| a.grab_joint) else {
        return Vec::new();
    };
    if physics.joint_alive(joint) {
        return Vec::new();
    }
    if let Some(a) = world.actor_mut(actor) {
        a.grab_joint = None;
    }
    match world.release_hold(actor) {
        Some(held) => {
            debug!("Grab joint of {} broke", actor);
            vec![remote_stop(actor, held)]
        }
        None => Vec::new(),
    }
}

fn attach_grab<P: PhysicsWorld>(
    physics: &mut P,
    world: &mut World,
    actor: ActorId,
    target: InteractableId,
) {
    let actor_body = world.actor(actor).and_then(|a| a.body);
    let target_body = world.interactable(target).and_then(|i| i.body);
    let (Some(actor_body), Some(target_body)) = (actor_body, target_body) else {
        return;
    };
    let (Some(a), Some(b)) = (physics.body(actor_body), physics.body(target_body)) else {
        return;
    };

    // Body-local +Y is the look direction, so the anchor floats in front of
    // the eyes at the current grab distance.
    let distance = a.position.distance(b.position);
    let joint = physics.attach_spring(
        actor_body,
        target_body,
        SpringJoint::grab(Vec3::new(0.0, distance, 0.0), Vec3::ZERO),
    );
    if let Some(a) = world.actor_mut(actor) {
        a.grab_joint = joint;
    }
}

fn detach_grab<P: PhysicsWorld>(physics: &mut P, world: &mut World, actor: ActorId) {
    if let Some(joint) = world.actor_mut(actor).and_then(|a| a.grab_joint.take()) {
        physics.detach(joint);
    }
}
