//! Authority-side movement solver.
//!
//! Turns an actor's pending input into a force on its body once per fixed
//! tick. Movement is relative to whatever the actor stands on (or sits in),
//! and the crouch collider only changes when the change is physically clear.

use crate::rotation::apply_body_rotation;
use crate::seat;
use shared::math::{block_forward, clamp_magnitude, move_towards, Vec3};
use shared::physics::{Capsule, PhysicsWorld, QueryFilter};
use shared::world::Transform;
use shared::{
    Actor, ActorId, Authority, BodyHandle, ControllerConfig, Interactable, Outgoing, Packet, World,
    CROUCH_SPEED_FACTOR, GROUND_CAST_DROP, GROUND_CAST_RADIUS, GROUND_RAY_LENGTH,
    GROUND_RING_PROBES, HEADROOM_PROBE_DISTANCE, HEADROOM_PROBE_RADIUS, SEAT_APPROACH_SPEED,
    SEAT_OFFSET_CROUCHED, SEAT_OFFSET_STANDING, SEAT_SNAP_DISTANCE, UNBOUNDED_ACCELERATION,
};

/// What one solver step decided, kept for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementOutcome {
    pub grounded: bool,
    /// Velocity of the surface or seat carrier the movement is relative to.
    pub ground_velocity: Vec3,
    /// Input contribution after the crouch penalty and push attenuation.
    pub input_velocity: Vec3,
    pub goal_velocity: Vec3,
    /// Acceleration actually applied, vertical axis masked unless seated.
    pub acceleration: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct SeatFrame {
    position: Vec3,
    forward: Vec3,
    velocity: Vec3,
    crouched: bool,
}

impl SeatFrame {
    fn of<P: PhysicsWorld>(physics: &P, seat: &Interactable) -> Option<Self> {
        let crouched = seat.seat()?.crouched;
        let (position, rotation, velocity) = match seat.body.and_then(|b| physics.body(b)) {
            Some(state) => (state.position, state.rotation, state.velocity),
            None => (
                seat.transform.position,
                seat.transform.rotation,
                seat.transform.velocity,
            ),
        };
        Some(Self {
            position,
            forward: block_forward(rotation),
            velocity,
            crouched,
        })
    }
}

/// Velocity of the first moving, non-controller body below the feet.
///
/// Tries a cast straight down first, then a ring of casts offset by the
/// configured spread. Zero if nothing qualifies.
pub fn ground_velocity<P: PhysicsWorld>(
    physics: &P,
    body: BodyHandle,
    position: Vec3,
    crouch_offset: Vec3,
    config: &ControllerConfig,
) -> Vec3 {
    let origin = position + Vec3::NEG_Y * GROUND_CAST_DROP + crouch_offset;
    let filter = QueryFilter::solid(body);

    let carrier_below = |origin: Vec3| {
        physics
            .sphere_cast_all(
                origin,
                GROUND_CAST_RADIUS,
                Vec3::NEG_Y,
                config.ground_stick_distance,
                filter,
            )
            .into_iter()
            .find(|hit| hit.dynamic && !hit.actor)
            .map(|hit| hit.velocity)
    };

    if let Some(velocity) = carrier_below(origin) {
        return velocity;
    }
    if config.ground_probe_spread <= 0.0 {
        return Vec3::ZERO;
    }

    (0..GROUND_RING_PROBES)
        .find_map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / GROUND_RING_PROBES as f32;
            let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * config.ground_probe_spread;
            carrier_below(origin + offset)
        })
        .unwrap_or(Vec3::ZERO)
}

pub fn is_grounded<P: PhysicsWorld>(
    physics: &P,
    body: BodyHandle,
    position: Vec3,
    crouch_offset: Vec3,
) -> bool {
    physics
        .raycast(
            position + Vec3::NEG_Y + crouch_offset,
            Vec3::NEG_Y,
            GROUND_RAY_LENGTH,
            QueryFilter::solid(body),
        )
        .is_some()
}

/// Moves the collider towards `should_crouch`. Standing up is refused while
/// the headroom probe is blocked. Returns true if the collider changed.
pub fn update_crouch<P: PhysicsWorld>(
    _auth: Authority,
    physics: &mut P,
    actor: &mut Actor,
    body: BodyHandle,
    should_crouch: bool,
    grounded: bool,
) -> bool {
    if should_crouch == actor.crouched || actor.is_dead() {
        return false;
    }
    let Some(state) = physics.body(body) else {
        return false;
    };

    if should_crouch {
        physics.set_capsule(body, Capsule::CROUCHED);
        if grounded {
            physics.move_position(body, state.position - Vec3::Y);
        }
        actor.crouched = true;
        return true;
    }

    let blocked = physics.sphere_cast(
        state.position,
        HEADROOM_PROBE_RADIUS,
        Vec3::Y,
        HEADROOM_PROBE_DISTANCE,
        QueryFilter::solid(body),
    );
    if blocked {
        return false;
    }

    physics.set_capsule(body, Capsule::STANDING);
    physics.move_position(body, state.position + Vec3::Y);
    actor.crouched = false;
    true
}

/// One fixed tick of movement for `actor_id`.
pub fn solve<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor_id: ActorId,
    dt: f32,
) -> Option<MovementOutcome> {
    let seat = world
        .seat_of(actor_id)
        .and_then(|seat| SeatFrame::of(&*physics, seat));
    let actor = world.actor_mut(actor_id)?;
    let body = actor.body?;

    let state = physics.body(body)?;
    let grounded = is_grounded(physics, body, state.position, actor.crouch_offset());
    actor.grounded = grounded;

    let should_crouch = actor.target_crouch || seat.map(|s| s.crouched).unwrap_or(false);
    update_crouch(auth, physics, actor, body, should_crouch, grounded);

    let state = physics.body(body)?;
    let config = &actor.config;

    let mut ground_velocity =
        ground_velocity(physics, body, state.position, actor.crouch_offset(), config);

    let crouch_factor = if actor.crouched && grounded {
        CROUCH_SPEED_FACTOR
    } else {
        1.0
    };
    let mut input = actor.pending.clamped_direction() * crouch_factor;

    let reach = if actor.crouched { 0.25 } else { 1.25 };
    if input != Vec3::ZERO
        && physics.capsule_cast(
            state.position + Vec3::Y * 0.25,
            state.position - Vec3::Y * reach,
            0.2,
            input,
            config.max_speed * dt,
            QueryFilter::solid(body),
        )
    {
        input *= config.push_force_scale;
    }
    let input_velocity = input * config.max_speed;

    let goal_velocity = match seat {
        Some(seat) => {
            ground_velocity = seat.velocity;
            let offset = if seat.crouched {
                SEAT_OFFSET_CROUCHED
            } else {
                SEAT_OFFSET_STANDING
            };
            let to_seat = seat.position + seat.forward * offset - state.position;
            physics.set_colliders_enabled(body, to_seat.length() < SEAT_SNAP_DISTANCE);
            ground_velocity + clamp_magnitude(to_seat, 1.0) * SEAT_APPROACH_SPEED
        }
        None => {
            physics.set_colliders_enabled(body, true);
            ground_velocity + input_velocity
        }
    };

    let blended = move_towards(goal_velocity, goal_velocity + state.velocity, dt);
    let ceiling = if ground_velocity == Vec3::ZERO {
        config.max_acceleration
    } else {
        UNBOUNDED_ACCELERATION
    };
    let needed = clamp_magnitude((blended - state.velocity) / dt, ceiling);
    let vertical = if seat.is_some() { needed.y } else { 0.0 };
    let acceleration = Vec3::new(needed.x, vertical, needed.z);

    if !actor.is_dead() {
        physics.set_rotation_locked(body, true);
        physics.add_force(body, acceleration * state.mass);
        apply_body_rotation(auth, physics, body, actor.pending.rotation, config.body_pitch);
    }

    if let Some(state) = physics.body(body) {
        actor.transform = Transform {
            position: state.position,
            rotation: state.rotation,
            velocity: state.velocity,
        };
    }

    Some(MovementOutcome {
        grounded,
        ground_velocity,
        input_velocity,
        goal_velocity,
        acceleration,
    })
}

/// Applies a jump. The impulse needs ground contact and a free, living
/// actor; the notification goes out regardless so every peer can dismount.
pub fn jump<P: PhysicsWorld>(
    auth: Authority,
    physics: &mut P,
    world: &mut World,
    actor_id: ActorId,
) -> Vec<Outgoing> {
    let Some(actor) = world.actor(actor_id) else {
        return Vec::new();
    };
    let seated = actor.is_seated();

    if !seated && !actor.is_dead() && actor.grounded {
        if let Some(body) = actor.body {
            physics.add_impulse(body, Vec3::Y * actor.config.jump_force);
        }
    }

    if seated {
        seat::release(auth, physics, world, actor_id);
    }

    vec![Outgoing::to_all(Packet::Jump { actor: actor_id })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Body, SimWorld};
    use assert_approx_eq::assert_approx_eq;
    use shared::world::{InteractableKind, SeatState};
    use shared::{PeerId, SessionRole, FIXED_TIMESTEP};

    fn auth() -> Authority {
        SessionRole::host().authority().unwrap()
    }

    /// Floor top at y = 0 and a standing actor resting on it.
    fn standing_actor() -> (SimWorld, World, ActorId, BodyHandle) {
        let mut physics = SimWorld::new();
        physics.add_body(Body::fixed(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0)));
        let body = physics.add_body(Body::character(Vec3::new(0.0, 1.5, 0.0), 5.0));

        let mut world = World::new();
        let actor = world.spawn_actor(PeerId(1), Some(body), ControllerConfig::default());
        (physics, world, actor, body)
    }

    #[test]
    fn test_static_floor_has_zero_ground_velocity() {
        let (physics, _, _, body) = standing_actor();
        let velocity = ground_velocity(
            &physics,
            body,
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::ZERO,
            &ControllerConfig::default(),
        );
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn test_ring_probe_finds_offset_carrier() {
        let mut physics = SimWorld::new();
        let body = physics.add_body(Body::character(Vec3::new(0.0, 1.5, 0.0), 5.0));
        // Narrow platform just off to the side of the primary cast.
        physics.add_body(Body::kinematic(
            Vec3::new(0.7, -0.5, 0.0),
            Vec3::new(0.2, 0.5, 0.2),
            Vec3::new(1.0, 0.0, 0.0),
        ));

        let mut config = ControllerConfig::default();
        config.ground_probe_spread = 0.0;
        let none = ground_velocity(&physics, body, Vec3::new(0.0, 1.5, 0.0), Vec3::ZERO, &config);
        assert_eq!(none, Vec3::ZERO);

        config.ground_probe_spread = 0.4;
        let found = ground_velocity(&physics, body, Vec3::new(0.0, 1.5, 0.0), Vec3::ZERO, &config);
        assert_eq!(found, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_other_actors_are_not_ground() {
        let mut physics = SimWorld::new();
        let body = physics.add_body(Body::character(Vec3::new(0.0, 1.5, 0.0), 5.0));
        let mut below = Body::character(Vec3::new(0.0, -0.5, 0.0), 5.0);
        below.velocity = Vec3::X;
        physics.add_body(below);

        let velocity = ground_velocity(
            &physics,
            body,
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::ZERO,
            &ControllerConfig::default(),
        );
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn test_crouched_grounded_input_is_halved() {
        let (mut physics, mut world, actor, _) = standing_actor();
        {
            let a = world.actor_mut(actor).unwrap();
            a.target_crouch = true;
            a.pending.overwrite(Vec3::X, Vec3::ZERO);
        }

        let outcome = solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP).unwrap();
        assert!(outcome.grounded);
        assert!(world.actor(actor).unwrap().crouched);
        assert_approx_eq!(outcome.input_velocity.x, 5.0);
        assert_eq!(outcome.ground_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_crouch_moves_body_down_when_grounded() {
        let (mut physics, mut world, actor, body) = standing_actor();
        world.actor_mut(actor).unwrap().target_crouch = true;
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);
        assert_approx_eq!(physics.body(body).unwrap().position.y, 0.5);
    }

    #[test]
    fn test_stand_blocked_by_ceiling() {
        let (mut physics, mut world, actor, body) = standing_actor();
        world.actor_mut(actor).unwrap().target_crouch = true;
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);

        physics.add_body(Body::fixed(Vec3::new(0.0, 1.5, 0.0), Vec3::new(5.0, 0.25, 5.0)));
        world.actor_mut(actor).unwrap().target_crouch = false;
        for _ in 0..5 {
            solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);
            assert!(world.actor(actor).unwrap().crouched);
        }
        assert_approx_eq!(physics.body(body).unwrap().position.y, 0.5);
    }

    #[test]
    fn test_stand_up_when_clear() {
        let (mut physics, mut world, actor, body) = standing_actor();
        world.actor_mut(actor).unwrap().target_crouch = true;
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);
        world.actor_mut(actor).unwrap().target_crouch = false;
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);

        assert!(!world.actor(actor).unwrap().crouched);
        assert_approx_eq!(physics.body(body).unwrap().position.y, 1.5);
    }

    #[test]
    fn test_airborne_acceleration_is_capped() {
        let mut physics = SimWorld::new();
        let body = physics.add_body(Body::character(Vec3::new(0.0, 10.0, 0.0), 5.0));
        let mut world = World::new();
        let actor = world.spawn_actor(PeerId(1), Some(body), ControllerConfig::default());
        world.actor_mut(actor).unwrap().pending.overwrite(Vec3::X, Vec3::ZERO);

        let outcome = solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP).unwrap();
        assert!(!outcome.grounded);
        assert_approx_eq!(outcome.acceleration.length(), 75.0, 1e-3);
        assert_approx_eq!(physics.pending_force(body).x, 75.0 * 5.0, 1e-2);
    }

    #[test]
    fn test_moving_ground_lifts_ceiling() {
        let mut physics = SimWorld::new();
        let body = physics.add_body(Body::character(Vec3::new(0.0, 1.5, 0.0), 5.0));
        physics.add_body(Body::kinematic(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(5.0, 0.5, 5.0),
            Vec3::new(0.0, 0.0, 3.0),
        ));
        let mut world = World::new();
        let actor = world.spawn_actor(PeerId(1), Some(body), ControllerConfig::default());
        world.actor_mut(actor).unwrap().pending.overwrite(Vec3::X, Vec3::ZERO);

        let outcome = solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP).unwrap();
        assert_eq!(outcome.ground_velocity, Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(outcome.goal_velocity, Vec3::new(10.0, 0.0, 3.0));
        assert!(outcome.acceleration.length() > 75.0);
        assert_eq!(outcome.acceleration.y, 0.0);
    }

    #[test]
    fn test_wall_attenuates_input() {
        let (mut physics, mut world, actor, _) = standing_actor();
        physics.add_body(Body::fixed(Vec3::new(0.4, 1.0, 0.0), Vec3::new(0.05, 2.0, 2.0)));
        world.actor_mut(actor).unwrap().config.push_force_scale = 0.25;
        world.actor_mut(actor).unwrap().pending.overwrite(Vec3::X, Vec3::ZERO);

        let outcome = solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP).unwrap();
        assert_approx_eq!(outcome.input_velocity.x, 2.5);
    }

    #[test]
    fn test_seated_goal_tracks_carrier() {
        let mut physics = SimWorld::new();
        let body = physics.add_body(Body::character(Vec3::new(0.0, 1.5, 5.0), 5.0));
        let mut world = World::new();
        let actor = world.spawn_actor(PeerId(1), Some(body), ControllerConfig::default());

        let seat = world.add_interactable(InteractableKind::Seat(SeatState::new(false, 0.5)), "Sit", None);
        let seat_body = physics.add_body(
            Body::kinematic(Vec3::ZERO, Vec3::splat(0.5), Vec3::new(0.0, 0.0, 3.0)).with_interactable(seat),
        );
        world.interactable_mut(seat).unwrap().body = Some(seat_body);
        world.grant_start(auth(), actor, seat);

        let outcome = solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP).unwrap();
        assert_eq!(outcome.ground_velocity, Vec3::new(0.0, 0.0, 3.0));
        let approach = outcome.goal_velocity - outcome.ground_velocity;
        assert_approx_eq!(approach.length(), SEAT_APPROACH_SPEED, 1e-3);
        // Far from the seat: colliders stay off until it snaps in.
        assert!(!physics.get(body).unwrap().colliders_enabled);
    }

    #[test]
    fn test_jump_requires_ground() {
        let mut physics = SimWorld::new();
        let body = physics.add_body(Body::character(Vec3::new(0.0, 10.0, 0.0), 5.0));
        let mut world = World::new();
        let actor = world.spawn_actor(PeerId(1), Some(body), ControllerConfig::default());
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);

        let out = jump(auth(), &mut physics, &mut world, actor);
        assert_eq!(out, vec![Outgoing::to_all(Packet::Jump { actor })]);
        assert_eq!(physics.body(body).unwrap().velocity.y, 0.0);
    }

    #[test]
    fn test_jump_when_grounded_applies_impulse() {
        let (mut physics, mut world, actor, body) = standing_actor();
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);

        jump(auth(), &mut physics, &mut world, actor);
        assert_approx_eq!(physics.body(body).unwrap().velocity.y, 100.0 / 5.0);
    }

    #[test]
    fn test_jump_dismounts() {
        let (mut physics, mut world, actor, body) = standing_actor();
        let seat = world.add_interactable(InteractableKind::Seat(SeatState::new(false, 0.5)), "Sit", None);
        world.grant_start(auth(), actor, seat);
        solve(auth(), &mut physics, &mut world, actor, FIXED_TIMESTEP);

        let out = jump(auth(), &mut physics, &mut world, actor);
        assert_eq!(out.len(), 1);
        assert!(!world.actor(actor).unwrap().is_seated());
        assert_eq!(world.holder_of(seat), None);
        assert_eq!(physics.body(body).unwrap().velocity.y, 0.0);
    }
}
