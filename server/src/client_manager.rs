//! Peer connection bookkeeping for the host.
//!
//! Maps socket addresses to peer ids, remembers which actor each peer was
//! bound to on connect, and detects peers that went silent. Peer ids start
//! at 1; 0 is reserved for the host itself.

use log::info;
use shared::{ActorId, PeerId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected remote peer.
#[derive(Debug)]
pub struct Client {
    pub peer: PeerId,
    /// Where replies and broadcasts go.
    pub addr: SocketAddr,
    /// Last time any packet arrived from this peer.
    pub last_seen: Instant,
    /// The actor spawned for this peer on connect.
    pub actor: Option<ActorId>,
}

impl Client {
    pub fn new(peer: PeerId, addr: SocketAddr) -> Self {
        Self {
            peer,
            addr,
            last_seen: Instant::now(),
            actor: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All remote peers of one host, with a capacity limit.
pub struct ClientManager {
    clients: HashMap<PeerId, Client>,
    next_peer: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_peer: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a new peer. `None` when the host is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<PeerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let peer = PeerId(self.next_peer);
        self.next_peer += 1;

        info!("{} connected from {}", peer, addr);
        self.clients.insert(peer, Client::new(peer, addr));
        Some(peer)
    }

    pub fn remove_client(&mut self, peer: PeerId) -> Option<Client> {
        let client = self.clients.remove(&peer)?;
        info!("{} disconnected", peer);
        Some(client)
    }

    pub fn bind_actor(&mut self, peer: PeerId, actor: ActorId) -> bool {
        match self.clients.get_mut(&peer) {
            Some(client) => {
                client.actor = Some(actor);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, peer: PeerId) -> Option<&Client> {
        self.clients.get(&peer)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PeerId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.peer)
    }

    /// Refreshes the activity timestamp of the peer at `addr`.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<PeerId> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.touch();
        Some(client.peer)
    }

    /// Removes and returns every peer silent for longer than the timeout.
    pub fn check_timeouts(&mut self) -> Vec<PeerId> {
        let timed_out: Vec<PeerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.peer)
            .collect();

        for peer in &timed_out {
            self.remove_client(*peer);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(PeerId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.peer, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
