//! Authority-side health: impact and condition damage, the one-shot death
//! transition, and the cosmetic notifications that go with them.

use crate::emulation::EmulatedKey;
use crate::interaction;
use log::info;
use shared::math::Vec3;
use shared::physics::PhysicsWorld;
use shared::{
    ActorId, Authority, Outgoing, Packet, World, CONDITION_DAMAGE_PER_TICK, CORPSE_MASS,
};

/// Impact damage for a body of `mass` hit at `relative_speed`.
pub fn impact_damage(mass: f32, relative_speed: f32) -> f32 {
    mass * relative_speed * relative_speed / 10_000.0
}

/// Explosion damage falls off linearly to zero at `radius`.
pub fn explosion_damage(power: f32, distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    power * (1.0 - distance / radius).clamp(0.0, 1.0) / 1_000.0
}

/// Subtracts health. Ignored for actors without health or already dead.
pub fn damage(_auth: Authority, world: &mut World, actor_id: ActorId, amount: f32) -> bool {
    let Some(actor) = world.actor_mut(actor_id) else {
        return false;
    };
    if !actor.config.has_health || actor.is_dead() {
        return false;
    }
    actor.health -= amount;
    true
}

/// Burning and frozen each cost a fixed amount per tick.
pub fn apply_conditions(auth: Authority, world: &mut World, actor_id: ActorId) {
    let Some(actor) = world.actor(actor_id) else {
        return;
    };
    let ticks = actor.burning as u8 + actor.frozen as u8;
    for _ in 0..ticks {
        damage(auth, world, actor_id, CONDITION_DAMAGE_PER_TICK);
    }
}

/// A new contact reported by the engine. Once dead, impacts only spray blood.
pub fn on_collision<P: PhysicsWorld>(
    auth: Authority,
    physics: &P,
    world: &mut World,
    actor_id: ActorId,
    relative_velocity: Vec3,
) -> Vec<Outgoing> {
    let Some(actor) = world.actor(actor_id) else {
        return Vec::new();
    };
    if actor.is_dead() {
        return vec![Outgoing::to_all(Packet::BloodParticles { actor: actor_id })];
    }

    let mass = actor
        .body
        .and_then(|b| physics.body(b))
        .map(|s| s.mass)
        .unwrap_or(actor.config.mass);
    let amount = impact_damage(mass, relative_velocity.length());
    if amount > actor.config.minimum_damage {
        damage(auth, world, actor_id, amount);
    }
    Vec::new()
}

/// Damages the actor and, if that leaves a corpse, throws it.
pub fn on_explosion<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor_id: ActorId,
    power: f32,
    center: Vec3,
    radius: f32,
) {
    let Some(actor) = world.actor(actor_id) else {
        return;
    };
    let position = actor
        .body
        .and_then(|b| physics.body(b))
        .map(|s| s.position)
        .unwrap_or(actor.transform.position);
    let distance = position.distance(center);

    damage(auth, world, actor_id, explosion_damage(power, distance, radius));

    let Some(actor) = world.actor(actor_id) else {
        return;
    };
    if let (true, Some(body)) = (actor.is_dead(), actor.body) {
        physics.set_mass(body, CORPSE_MASS);
        let falloff = (1.0 - distance / radius.max(1e-4)).clamp(0.0, 1.0);
        let away = (position - center).normalize_or_zero();
        physics.add_impulse(body, away * power / 200.0 * falloff);
    }
}

/// Runs the death transition at most once per actor.
pub fn die<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor_id: ActorId,
    keys: &mut Vec<EmulatedKey>,
) -> Vec<Outgoing> {
    let Some(actor) = world.actor_mut(actor_id) else {
        return Vec::new();
    };
    if actor.died {
        return Vec::new();
    }
    actor.died = true;
    actor.health = 0.0;
    let body = actor.body;
    info!("{} died", actor_id);

    let mut outgoing = interaction::release_all(auth, physics, world, actor_id, keys);
    if let Some(body) = body {
        physics.set_rotation_locked(body, false);
        physics.set_mass(body, CORPSE_MASS);
    }
    outgoing.push(Outgoing::to_all(Packet::Death { actor: actor_id }));
    outgoing.push(Outgoing::to_all(Packet::BloodParticles { actor: actor_id }));
    outgoing
}

/// Per-tick bookkeeping: fires the death transition once health is gone and
/// reports health changes.
pub fn update<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor_id: ActorId,
    keys: &mut Vec<EmulatedKey>,
) -> Vec<Outgoing> {
    let mut outgoing = Vec::new();

    let dying = world
        .actor(actor_id)
        .map(|a| a.is_dead() && !a.died)
        .unwrap_or(false);
    if dying {
        outgoing.extend(die(auth, physics, world, actor_id, keys));
    }

    if let Some(actor) = world.actor_mut(actor_id) {
        if actor.config.has_health && actor.health != actor.previous_health {
            actor.previous_health = actor.health;
            outgoing.push(Outgoing::to_all(Packet::Hit { actor: actor_id }));
        }
    }
    outgoing
}
