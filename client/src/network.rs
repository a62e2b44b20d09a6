//! UDP client loop for a controlling peer.

use crate::controller::LocalController;
use crate::input::InputDevice;
use crate::mirror::{load_layout, Mirror, MirrorEvent};
use crate::scene::MirrorScene;
use crate::session::Session;
use log::{debug, error, info, warn};
use shared::{NetConfig, NetError, Outgoing, Packet, Recipient, World, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,
    net: NetConfig,

    session: Session,
    world: World,
    mirror: Mirror,
    controller: Option<LocalController>,
    device: Box<dyn InputDevice + Send>,
    /// Take control of the actor as soon as it is assigned.
    auto_control: bool,
    last_frame: Instant,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        net: NetConfig,
        device: Box<dyn InputDevice + Send>,
        auto_control: bool,
    ) -> Result<Self, NetError> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            net,
            session: Session::remote(),
            world: World::new(),
            mirror: Mirror::new(),
            controller: None,
            device,
            auto_control,
            last_frame: Instant::now(),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), NetError> {
        info!("Connecting to {}...", self.server_addr);
        self.send_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
        .await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        let data = packet.encode()?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Best-effort: a failed send is logged and never retried.
    async fn route(&self, outgoing: Vec<Outgoing>) {
        for Outgoing { recipient, packet } in outgoing {
            match recipient {
                Recipient::Authority => {
                    if let Err(e) = self.send_packet(&packet).await {
                        error!("Error sending {:?}: {}", packet, e);
                    }
                }
                other => warn!("Peer cannot deliver to {:?}, dropping {:?}", other, packet),
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                peer,
                actor,
                config,
                layout,
            } => {
                if self.connected {
                    debug!("Duplicate Connected ignored");
                    return;
                }
                info!("Connected as {}, driving {}", peer, actor);
                self.session.peer = peer;
                self.connected = true;
                load_layout(&mut self.world, &layout);
                self.mirror.adopt(&mut self.world, actor, peer, config);

                let mut controller = LocalController::new(actor, self.net.input_relay_interval);
                if self.auto_control {
                    let out = controller.take_control(&mut self.session);
                    self.route(out).await;
                }
                self.controller = Some(controller);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.reset();
            }

            other => match self.mirror.apply(&mut self.world, &other) {
                Some(MirrorEvent::Snapshot { .. }) | None => {}
                Some(event) => self.report(event),
            },
        }
    }

    /// Forgets everything learned from the last host.
    ///
    /// The controlled actor is released so the next `Connected` can take
    /// control of its new actor, and the mirror starts over because a
    /// restarted host counts ticks from the beginning again. Release
    /// requests are not sent: the host has already dropped this peer.
    fn reset(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            let unsent = controller.release_control(&mut self.session);
            debug!("Discarding {} release requests", unsent.len());
        }
        self.connected = false;
        self.mirror = Mirror::new();
        self.world = World::new();
    }

    fn report(&self, event: MirrorEvent) {
        let own = self.controller.as_ref().map(|c| c.actor());
        match event {
            MirrorEvent::Died { actor } if Some(actor) == own => info!("You died"),
            MirrorEvent::Hit { actor } if Some(actor) == own => info!("Hit"),
            MirrorEvent::Started {
                actor,
                interactable,
            } => {
                let label = self
                    .world
                    .interactable(interactable)
                    .map(|i| i.label.as_str())
                    .unwrap_or("?");
                info!("{} started {} ({})", actor, interactable, label);
            }
            event => debug!("{:?}", event),
        }
    }

    async fn frame(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let raw = self.device.poll();
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let scene = MirrorScene::new(&self.world);
        let out = controller.frame(&mut self.session, &self.world, &scene, raw, dt);
        self.route(out).await;
    }

    async fn fixed_tick(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        if let Some(out) = controller.fixed_tick(&self.session) {
            self.route(vec![out]).await;
        }
    }

    fn spawn_shutdown_listener(&self) -> mpsc::UnboundedReceiver<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for ctrl-c: {}", e);
                return;
            }
            let _ = shutdown_tx.send(());
        });

        shutdown_rx
    }

    pub async fn run(&mut self) -> Result<(), NetError> {
        let mut shutdown_rx = self.spawn_shutdown_listener();
        self.connect().await?;

        let mut frame_interval = interval(FRAME_INTERVAL);
        let mut tick_interval = interval(Duration::from_secs_f32(self.net.timestep()));
        let mut status_interval = interval(Duration::from_secs(5));

        let mut buffer = [0u8; 4096];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => match Packet::decode(&buffer[..len]) {
                            Ok(packet) => self.handle_packet(packet).await,
                            Err(e) => warn!("Malformed packet: {}", e),
                        },
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => self.frame().await,

                _ = tick_interval.tick() => self.fixed_tick().await,

                _ = status_interval.tick() => {
                    if let Some(controller) = &self.controller {
                        if let Some((position, _)) = controller.camera(&self.world) {
                            info!(
                                "Eye at ({:.1}, {:.1}, {:.1}), looking at {:?}",
                                position.x,
                                position.y,
                                position.z,
                                controller.interaction().hint(&self.world)
                            );
                        }
                    } else if !self.connected {
                        self.connect().await?;
                    }
                },

                Some(()) = shutdown_rx.recv() => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
