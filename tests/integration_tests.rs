//! Integration tests for the networked character controller
//!
//! Controlling peers and the authoritative host run in one process, joined
//! by an in-memory transport that can drop, duplicate and reorder packets.

use assert_approx_eq::assert_approx_eq;
use client::controller::LocalController;
use client::input::RawInput;
use client::mirror::{load_layout, Mirror};
use client::scene::MirrorScene;
use client::session::Session;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use server::host::Host;
use server::movement;
use server::physics::{Body, SimWorld};
use shared::world::SeatState;
use shared::{
    ActorId, ControllerConfig, InteractableId, InteractableKind, Outgoing, Packet, PeerId,
    Recipient, SessionRole, World, FIXED_TIMESTEP, SEAT_APPROACH_SPEED,
};

/// Best-effort datagram queue in both directions.
struct Transport {
    rng: StdRng,
    loss: f64,
    duplicate: f64,
    to_host: Vec<(PeerId, Packet)>,
    to_peers: Vec<(PeerId, Packet)>,
}

impl Transport {
    fn new(seed: u64, loss: f64, duplicate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            loss,
            duplicate,
            to_host: Vec::new(),
            to_peers: Vec::new(),
        }
    }

    /// Takes everything in flight, shuffled, minus losses, plus duplicates.
    fn drain(&mut self, to_host: bool) -> Vec<(PeerId, Packet)> {
        let queue = if to_host {
            std::mem::take(&mut self.to_host)
        } else {
            std::mem::take(&mut self.to_peers)
        };
        let mut delivered = Vec::new();
        for item in queue {
            if self.rng.gen_bool(self.loss) {
                continue;
            }
            if self.rng.gen_bool(self.duplicate) {
                delivered.push(item.clone());
            }
            delivered.push(item);
        }
        delivered.shuffle(&mut self.rng);
        delivered
    }
}

struct Peer {
    id: PeerId,
    session: Session,
    world: World,
    mirror: Mirror,
    controller: LocalController,
    input: RawInput,
}

struct Harness {
    host: Host<SimWorld>,
    peers: Vec<Peer>,
    transport: Transport,
    /// Every authority broadcast except snapshots, in send order.
    broadcasts: Vec<Packet>,
}

impl Harness {
    /// Floor top at y = 0.
    fn new(seed: u64, loss: f64, duplicate: f64) -> Self {
        let mut host = Host::new(SimWorld::new());
        host.physics.add_body(Body::fixed(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
        ));
        Self {
            host,
            peers: Vec::new(),
            transport: Transport::new(seed, loss, duplicate),
            broadcasts: Vec::new(),
        }
    }

    fn add_interactable(&mut self, kind: InteractableKind, label: &str, body: Body) -> InteractableId {
        let id = self.host.world.add_interactable(kind, label, None);
        let handle = self.host.physics.add_body(body.with_interactable(id));
        if let Some(interactable) = self.host.world.interactable_mut(id) {
            interactable.body = Some(handle);
        }
        self.host.sync_transforms();
        id
    }

    fn add_button(&mut self, position: Vec3) -> InteractableId {
        self.add_interactable(
            InteractableKind::Plain { held: false },
            "Use",
            Body::fixed(position, Vec3::splat(0.2)),
        )
    }

    /// Connects a remote peer driving a fresh actor. Returns its index.
    fn add_peer(&mut self, position: Vec3, config: ControllerConfig) -> usize {
        let id = PeerId(self.peers.len() as u32 + 1);
        let actor = self.host.spawn_player(id, position, config);
        let mut world = World::new();
        load_layout(&mut world, &self.host.layout());
        self.peers.push(Peer {
            id,
            session: Session::new(id, SessionRole::remote_peer()),
            world,
            mirror: Mirror::new(),
            controller: LocalController::new(actor, shared::INPUT_RELAY_INTERVAL),
            input: RawInput::default(),
        });
        self.peers.len() - 1
    }

    fn actor(&self, peer: usize) -> ActorId {
        self.peers[peer].controller.actor()
    }

    fn send_from_peer(&mut self, peer: usize, outgoing: Vec<Outgoing>) {
        let id = self.peers[peer].id;
        for out in outgoing {
            assert_eq!(out.recipient, Recipient::Authority);
            self.transport.to_host.push((id, out.packet));
        }
    }

    fn route_host(&mut self, outgoing: Vec<Outgoing>) {
        let mut pending = outgoing;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for Outgoing { recipient, packet } in pending {
                match recipient {
                    Recipient::All => {
                        if !matches!(packet, Packet::WorldState { .. }) {
                            self.broadcasts.push(packet.clone());
                        }
                        for peer in &self.peers {
                            self.transport.to_peers.push((peer.id, packet.clone()));
                        }
                    }
                    Recipient::Peer(id) => self.transport.to_peers.push((id, packet)),
                    Recipient::Authority | Recipient::Loopback => {
                        next.extend(self.host.handle(PeerId::HOST, packet));
                    }
                }
            }
            pending = next;
        }
    }

    /// One fixed tick: peer frames, host inbox, host step, peer inboxes.
    fn tick(&mut self) {
        for index in 0..self.peers.len() {
            let peer = &mut self.peers[index];
            let scene = MirrorScene::new(&peer.world);
            let mut out = peer.controller.frame(
                &mut peer.session,
                &peer.world,
                &scene,
                peer.input.clone(),
                FIXED_TIMESTEP,
            );
            out.extend(peer.controller.fixed_tick(&peer.session));
            self.send_from_peer(index, out);
        }

        for (sender, packet) in self.transport.drain(true) {
            let out = self.host.handle(sender, packet);
            self.route_host(out);
        }

        let out = self.host.step(FIXED_TIMESTEP);
        self.route_host(out);
        let snapshot = self.host.world_state();
        self.route_host(vec![Outgoing::to_all(snapshot)]);

        for (dest, packet) in self.transport.drain(false) {
            if let Some(peer) = self.peers.iter_mut().find(|p| p.id == dest) {
                peer.mirror.apply(&mut peer.world, &packet);
            }
        }
    }

    fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Presses activate for one tick so the peer controls its actor.
    fn take_control(&mut self, peer: usize) {
        self.peers[peer].input.activate = true;
        self.tick();
        self.peers[peer].input.activate = false;
        self.tick();
    }

    fn count_broadcasts(&self, matcher: impl Fn(&Packet) -> bool) -> usize {
        self.broadcasts.iter().filter(|p| matcher(p)).count()
    }
}

/// Holder and held/seat references agree on both sides; nothing has two
/// holders.
fn assert_relations_consistent(world: &World) {
    for interactable in world.interactables() {
        if let Some(holder) = interactable.holder {
            let actor = world.actor(holder).expect("holder exists");
            assert!(
                actor.held == Some(interactable.id) || actor.seat == Some(interactable.id),
                "{} holds {} without a back reference",
                holder,
                interactable.id
            );
        }
    }
    for actor in world.actors() {
        if let Some(held) = actor.held {
            assert_eq!(world.holder_of(held), Some(actor.id));
        }
        if let Some(seat) = actor.seat {
            assert_eq!(world.holder_of(seat), Some(actor.id));
        }
    }
}

/// INTERACTION HANDSHAKE
mod interaction_tests {
    use super::*;

    /// A remote peer presses interact at a free button: the request goes to
    /// the host, the grant is broadcast, and every copy of the world agrees.
    #[test]
    fn remote_press_is_granted_and_propagated() {
        let mut harness = Harness::new(1, 0.0, 0.0);
        let button = harness.add_button(Vec3::new(0.0, 1.5, -3.0));
        let a = harness.add_peer(Vec3::new(0.0, 1.5, 0.0), ControllerConfig::default());
        let b = harness.add_peer(Vec3::new(4.0, 1.5, 0.0), ControllerConfig::default());
        harness.run(5);
        harness.take_control(a);

        harness.peers[a].input.interact = true;
        harness.run(3);

        let actor = harness.actor(a);
        assert_eq!(
            harness.count_broadcasts(|p| matches!(
                p,
                Packet::RemoteStartInteraction { actor: x, interactable: y } if *x == actor && *y == button
            )),
            1
        );
        assert_eq!(harness.host.world.holder_of(button), Some(actor));
        assert_eq!(harness.peers[a].world.holder_of(button), Some(actor));
        assert_eq!(harness.peers[b].world.holder_of(button), Some(actor));

        harness.peers[a].input.interact = false;
        harness.run(3);
        assert_eq!(harness.host.world.holder_of(button), None);
        assert_eq!(harness.peers[b].world.holder_of(button), None);
    }

    /// The requester itself only becomes the holder once the broadcast comes
    /// back.
    #[test]
    fn requester_waits_for_propagation() {
        let mut harness = Harness::new(2, 0.0, 0.0);
        let button = harness.add_button(Vec3::new(0.0, 1.5, -3.0));
        let a = harness.add_peer(Vec3::new(0.0, 1.5, 0.0), ControllerConfig::default());
        harness.run(5);
        harness.take_control(a);

        harness.peers[a].input.interact = true;
        let peer = &mut harness.peers[a];
        let scene = MirrorScene::new(&peer.world);
        let out = peer.controller.frame(
            &mut peer.session,
            &peer.world,
            &scene,
            peer.input.clone(),
            FIXED_TIMESTEP,
        );
        assert!(out
            .iter()
            .any(|o| matches!(o.packet, Packet::RequestStartInteraction { .. })));
        assert_eq!(peer.world.holder_of(button), None);
    }

    /// Two peers press the same free button in the same host tick: one
    /// grant, one broadcast, and the loser hears nothing.
    #[test]
    fn contested_press_grants_exactly_one() {
        for seed in 0..8 {
            let mut harness = Harness::new(seed, 0.0, 0.0);
            let button = harness.add_button(Vec3::new(0.0, 1.5, -3.0));
            let a = harness.add_peer(Vec3::new(-0.3, 1.5, 0.0), ControllerConfig::default());
            let b = harness.add_peer(Vec3::new(0.3, 1.5, 0.0), ControllerConfig::default());
            harness.run(5);
            harness.take_control(a);
            harness.take_control(b);

            harness.peers[a].input.interact = true;
            harness.peers[b].input.interact = true;
            harness.run(3);

            assert_eq!(
                harness.count_broadcasts(|p| matches!(p, Packet::RemoteStartInteraction { .. })),
                1,
                "seed {}",
                seed
            );
            let holder = harness.host.world.holder_of(button);
            assert!(holder == Some(harness.actor(a)) || holder == Some(harness.actor(b)));
            for peer in &harness.peers {
                assert_eq!(peer.world.holder_of(button), holder);
            }
        }
    }

    /// Under loss, duplication and reordering the tables never disagree with
    /// themselves, on the host or on any mirror.
    #[test]
    fn lossy_transport_keeps_relations_consistent() {
        let mut harness = Harness::new(42, 0.3, 0.2);
        harness.add_button(Vec3::new(0.0, 1.5, -3.0));
        let a = harness.add_peer(Vec3::new(-0.3, 1.5, 0.0), ControllerConfig::default());
        let b = harness.add_peer(Vec3::new(0.3, 1.5, 0.0), ControllerConfig::default());
        harness.run(5);
        for peer in [a, b] {
            harness.peers[peer].input.activate = true;
        }
        harness.run(1);
        for peer in [a, b] {
            harness.peers[peer].input.activate = false;
        }

        for tick in 0..300 {
            harness.peers[a].input.interact = tick % 10 < 5;
            harness.peers[b].input.interact = tick % 14 < 7;
            harness.tick();

            assert_relations_consistent(&harness.host.world);
            for peer in &harness.peers {
                assert_relations_consistent(&peer.world);
            }
        }
        assert!(harness.count_broadcasts(|p| matches!(p, Packet::RemoteStartInteraction { .. })) > 0);
    }
}

/// MOVEMENT THROUGH THE RELAY
mod movement_tests {
    use super::*;

    /// Crouched and grounded with a full strafe: the goal contribution is
    /// half the max speed.
    #[test]
    fn crouched_relayed_input_is_halved() {
        let mut harness = Harness::new(3, 0.0, 0.0);
        let a = harness.add_peer(Vec3::new(0.0, 1.5, 0.0), ControllerConfig::default());
        harness.run(5);
        harness.take_control(a);

        harness.peers[a].input.strafe = 1.0;
        harness.peers[a].input.crouch = true;
        harness.run(20);

        let actor = harness.actor(a);
        let pending = harness.host.world.actor(actor).unwrap().pending;
        assert_approx_eq!(pending.direction.x, 1.0, 1e-4);
        assert!(harness.host.world.actor(actor).unwrap().crouched);

        let auth = harness.host.role.authority().unwrap();
        let outcome = movement::solve(
            auth,
            &mut harness.host.physics,
            &mut harness.host.world,
            actor,
            FIXED_TIMESTEP,
        )
        .unwrap();
        assert!(outcome.grounded);
        assert_eq!(outcome.ground_velocity, Vec3::ZERO);
        assert_approx_eq!(outcome.input_velocity.x, 5.0, 1e-3);
        assert_approx_eq!(outcome.goal_velocity.x, 5.0, 1e-3);
    }

    /// Seated on a carrier moving along +Z: the goal keeps the full carrier
    /// velocity plus a capped approach towards the seat.
    #[test]
    fn seated_goal_carries_platform_velocity() {
        let mut harness = Harness::new(4, 0.0, 0.0);
        let seat = harness.add_interactable(
            InteractableKind::Seat(SeatState::new(false, 0.5)),
            "Sit",
            Body::kinematic(
                Vec3::new(0.0, 0.5, -8.0),
                Vec3::new(1.0, 0.25, 1.0),
                Vec3::new(0.0, 0.0, 3.0),
            ),
        );
        let a = harness.add_peer(Vec3::new(0.0, 1.5, 0.0), ControllerConfig::default());
        harness.run(3);

        let actor = harness.actor(a);
        harness.send_from_peer(
            a,
            vec![Outgoing::request(
                false,
                Packet::RequestStartInteraction {
                    actor,
                    interactable: seat,
                },
            )],
        );
        harness.run(2);
        assert_eq!(harness.host.world.holder_of(seat), Some(actor));
        assert!(harness.peers[a].world.actor(actor).unwrap().is_seated());

        let auth = harness.host.role.authority().unwrap();
        let outcome = movement::solve(
            auth,
            &mut harness.host.physics,
            &mut harness.host.world,
            actor,
            FIXED_TIMESTEP,
        )
        .unwrap();
        assert_eq!(outcome.ground_velocity, Vec3::new(0.0, 0.0, 3.0));
        let approach = outcome.goal_velocity - outcome.ground_velocity;
        assert!(approach.length() <= SEAT_APPROACH_SPEED + 1e-3);
        assert_approx_eq!(approach.length(), SEAT_APPROACH_SPEED, 1e-3);
    }

    /// Jumping while seated dismounts on the host and on every mirror.
    #[test]
    fn jump_dismounts_everywhere() {
        let mut harness = Harness::new(5, 0.0, 0.0);
        let seat = harness.add_interactable(
            InteractableKind::Seat(SeatState::new(true, 0.5)),
            "Sit",
            Body::fixed(Vec3::new(0.0, 0.25, -3.0), Vec3::new(0.5, 0.25, 0.5)),
        );
        let a = harness.add_peer(Vec3::new(0.0, 1.5, 0.0), ControllerConfig::default());
        let b = harness.add_peer(Vec3::new(4.0, 1.5, 0.0), ControllerConfig::default());
        harness.run(3);
        harness.take_control(a);

        let actor = harness.actor(a);
        harness.send_from_peer(
            a,
            vec![Outgoing::request(
                false,
                Packet::RequestStartInteraction {
                    actor,
                    interactable: seat,
                },
            )],
        );
        harness.run(2);
        assert_eq!(harness.peers[b].world.holder_of(seat), Some(actor));

        harness.peers[a].input.jump = true;
        harness.run(2);
        assert_eq!(harness.host.world.holder_of(seat), None);
        assert_eq!(harness.peers[a].world.holder_of(seat), None);
        assert_eq!(harness.peers[b].world.holder_of(seat), None);
    }
}

/// HEALTH
mod health_tests {
    use super::*;

    /// A fatal impact on a seated actor: one Death, the seat released, and
    /// later impacts only produce blood.
    #[test]
    fn fatal_impact_kills_once_and_frees_seat() {
        let mut harness = Harness::new(6, 0.0, 0.0);
        let seat = harness.add_interactable(
            InteractableKind::Seat(SeatState::new(false, 0.5)),
            "Sit",
            Body::fixed(Vec3::new(0.0, 0.25, -3.0), Vec3::new(0.5, 0.25, 0.5)),
        );
        let config = ControllerConfig {
            has_health: true,
            ..ControllerConfig::default()
        };
        let a = harness.add_peer(Vec3::new(0.0, 1.5, 0.0), config);
        let b = harness.add_peer(Vec3::new(4.0, 1.5, 0.0), ControllerConfig::default());
        harness.run(3);

        let actor = harness.actor(a);
        harness.send_from_peer(
            a,
            vec![Outgoing::request(
                false,
                Packet::RequestStartInteraction {
                    actor,
                    interactable: seat,
                },
            )],
        );
        harness.run(2);
        assert_eq!(harness.host.world.holder_of(seat), Some(actor));

        let body = harness.host.world.actor(actor).unwrap().body.unwrap();
        // Below the minimum damage: nothing happens.
        let out = harness.host.on_collision(body, Vec3::new(0.0, 20.0, 0.0));
        harness.route_host(out);
        harness.run(1);
        assert_eq!(harness.host.world.actor(actor).unwrap().health, 0.5);

        // 5 * 40^2 / 10000 = 0.8, more than the 0.5 it has.
        let out = harness.host.on_collision(body, Vec3::new(0.0, 40.0, 0.0));
        harness.route_host(out);
        harness.run(3);

        assert_eq!(harness.count_broadcasts(|p| matches!(p, Packet::Death { .. })), 1);
        assert_eq!(harness.host.world.holder_of(seat), None);
        assert!(harness.peers[b].world.actor(actor).unwrap().died);
        assert_eq!(harness.peers[b].world.holder_of(seat), None);

        let health = harness.host.world.actor(actor).unwrap().health;
        let out = harness.host.on_collision(body, Vec3::new(0.0, 30.0, 0.0));
        assert!(out
            .iter()
            .all(|o| matches!(o.packet, Packet::BloodParticles { .. })));
        assert!(!out.is_empty());
        assert_eq!(harness.host.world.actor(actor).unwrap().health, health);
        harness.run(2);
        assert_eq!(harness.count_broadcasts(|p| matches!(p, Packet::Death { .. })), 1);
    }
}
