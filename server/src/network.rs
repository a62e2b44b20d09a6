//! Host network layer: UDP transport around the authoritative [`Host`].

use crate::client_manager::ClientManager;
use crate::host::Host;
use crate::physics::SimWorld;
use crate::scene::DemoScene;
use log::{debug, error, info, warn};
use shared::{
    ControllerConfig, NetConfig, NetError, Outgoing, Packet, PeerId, Recipient, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to the main loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { peer: PeerId },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    host: Host<SimWorld>,
    actor_config: ControllerConfig,
    net: NetConfig,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        net: NetConfig,
        actor_config: ControllerConfig,
    ) -> Result<Self, NetError> {
        let addr: SocketAddr = addr.parse()?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Host listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let mut host = Host::new(SimWorld::new());
        DemoScene::build(&mut host);

        let clients = ClientManager::new(
            net.max_clients,
            Duration::from_secs(net.client_timeout_secs),
        );

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(clients)),
            host,
            actor_config,
            net,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to hand packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Malformed packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let addrs = clients.read().await.get_client_addrs();
                        for (peer, addr) in addrs {
                            if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to {}: {}", peer, e);
                            }
                        }
                    }
                }
            }
        });
    }

    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts();
                for peer in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { peer }) {
                        error!("Failed to report timeout: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue outgoing packet: {}", e);
        }
    }

    /// Delivers the host's decisions. Requests addressed to the authority
    /// are applied in-process as the host's own.
    async fn route(&mut self, outgoing: Vec<Outgoing>) {
        let mut pending = outgoing;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for Outgoing { recipient, packet } in pending {
                match recipient {
                    Recipient::All => {
                        debug!("Broadcast {:?}", packet);
                        self.queue(GameMessage::BroadcastPacket { packet });
                    }
                    Recipient::Peer(peer) => {
                        let addr = self.clients.read().await.get(peer).map(|c| c.addr);
                        match addr {
                            Some(addr) => self.queue(GameMessage::SendPacket { packet, addr }),
                            None => debug!("Dropping {:?} for departed {}", packet, peer),
                        }
                    }
                    Recipient::Authority | Recipient::Loopback => {
                        next.extend(self.host.handle(PeerId::HOST, packet));
                    }
                }
            }
            pending = next;
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!("Peer connecting from {} (version {})", addr, client_version);
                if client_version != PROTOCOL_VERSION {
                    let reason = format!("Protocol version {} required", PROTOCOL_VERSION);
                    self.queue(GameMessage::SendPacket {
                        packet: Packet::Disconnected { reason },
                        addr,
                    });
                    return;
                }

                let existing = self.clients.read().await.find_client_by_addr(addr);
                if let Some(peer) = existing {
                    info!("Replacing stale session of {} at {}", peer, addr);
                    self.clients.write().await.remove_client(peer);
                    let outgoing = self.host.remove_peer(peer);
                    self.route(outgoing).await;
                }

                let peer = self.clients.write().await.add_client(addr);
                let Some(peer) = peer else {
                    self.queue(GameMessage::SendPacket {
                        packet: Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    });
                    return;
                };

                let actor = self.host.spawn_player(
                    peer,
                    DemoScene::spawn_point(peer.0),
                    self.actor_config.clone(),
                );
                self.clients.write().await.bind_actor(peer, actor);
                let layout = self.host.layout();
                self.queue(GameMessage::SendPacket {
                    packet: Packet::Connected {
                        peer,
                        actor,
                        config: self.actor_config.clone(),
                        layout,
                    },
                    addr,
                });
            }

            Packet::Disconnect => {
                let peer = self.clients.read().await.find_client_by_addr(addr);
                if let Some(peer) = peer {
                    self.clients.write().await.remove_client(peer);
                    let outgoing = self.host.remove_peer(peer);
                    self.route(outgoing).await;
                }
            }

            packet if packet.is_request() => {
                let peer = self.clients.write().await.touch(addr);
                match peer {
                    Some(peer) => {
                        let outgoing = self.host.handle(peer, packet);
                        self.route(outgoing).await;
                    }
                    None => debug!("Request from unknown address {}", addr),
                }
            }

            packet => {
                warn!("Unexpected {:?} from {}", packet, addr);
            }
        }
    }

    async fn tick(&mut self, dt: f32) {
        let outgoing = self.host.step(dt);
        self.route(outgoing).await;

        for key in self.host.take_emulated_keys() {
            debug!("Emulated key {:?}", key);
        }

        if !self.clients.read().await.is_empty() {
            self.queue(GameMessage::BroadcastPacket {
                packet: self.host.world_state(),
            });
        }

        let tick = self.host.tick();
        if tick % (self.net.tick_hz.max(1) * 10) == 0 {
            debug!(
                "Tick {}: {} peers, {} actors",
                tick,
                self.clients.read().await.len(),
                self.host.world.actor_ids().len()
            );
        }
    }

    fn spawn_shutdown_listener(&self) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for ctrl-c: {}", e);
                return;
            }
            let _ = server_tx.send(ServerMessage::Shutdown);
        });
    }

    pub async fn run(&mut self) -> Result<(), NetError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.spawn_shutdown_listener();

        let dt = self.net.timestep();
        let mut tick_interval = interval(Duration::from_secs_f32(dt));

        info!("Host started at {} Hz", self.net.tick_hz);

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { peer }) => {
                            info!("{} timed out", peer);
                            let outgoing = self.host.remove_peer(peer);
                            self.route(outgoing).await;
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Host shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    self.tick(dt).await;
                }
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), NetError> {
    let data = packet.encode()?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
