//! Wire envelope exchanged between peers.
//!
//! Delivery is best-effort and unordered. Requests carry no sequence
//! numbers: every handler either overwrites state or is idempotent.

use crate::config::ControllerConfig;
use crate::ids::{ActorId, InteractableId, PeerId};
use crate::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Connection lifecycle
    Connect {
        client_version: u32,
    },
    Connected {
        peer: PeerId,
        actor: ActorId,
        /// Tunables the host spawned the actor with.
        config: ControllerConfig,
        layout: Vec<InteractableInfo>,
    },
    Disconnect,
    Disconnected {
        reason: String,
    },

    // Controller -> authority
    SetInput {
        actor: ActorId,
        direction: Vec3,
        rotation: Vec3,
    },
    Jump {
        actor: ActorId,
    },
    SetCrouch {
        actor: ActorId,
        value: bool,
    },
    SetControlling {
        actor: ActorId,
        value: bool,
    },
    RequestStartInteraction {
        actor: ActorId,
        interactable: InteractableId,
    },
    RequestStopInteraction {
        actor: ActorId,
        interactable: InteractableId,
    },
    SeatKeyPress {
        actor: ActorId,
        key: u32,
    },
    SeatKeyRelease {
        actor: ActorId,
        key: u32,
    },

    // Authority -> all
    RemoteStartInteraction {
        actor: ActorId,
        interactable: InteractableId,
    },
    RemoteStopInteraction {
        actor: ActorId,
        interactable: InteractableId,
    },
    Death {
        actor: ActorId,
    },
    Hit {
        actor: ActorId,
    },
    BloodParticles {
        actor: ActorId,
    },
    WorldState {
        tick: u32,
        actors: Vec<ActorState>,
        interactables: Vec<InteractableState>,
    },
}

impl Packet {
    /// The actor a gameplay message refers to.
    pub fn actor(&self) -> Option<ActorId> {
        match self {
            Packet::SetInput { actor, .. }
            | Packet::Jump { actor }
            | Packet::SetCrouch { actor, .. }
            | Packet::SetControlling { actor, .. }
            | Packet::RequestStartInteraction { actor, .. }
            | Packet::RequestStopInteraction { actor, .. }
            | Packet::SeatKeyPress { actor, .. }
            | Packet::SeatKeyRelease { actor, .. }
            | Packet::RemoteStartInteraction { actor, .. }
            | Packet::RemoteStopInteraction { actor, .. }
            | Packet::Death { actor }
            | Packet::Hit { actor }
            | Packet::BloodParticles { actor } => Some(*actor),
            Packet::Connected { actor, .. } => Some(*actor),
            _ => None,
        }
    }

    /// Messages a controlling peer sends toward the authority.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Packet::SetInput { .. }
                | Packet::Jump { .. }
                | Packet::SetCrouch { .. }
                | Packet::SetControlling { .. }
                | Packet::RequestStartInteraction { .. }
                | Packet::RequestStopInteraction { .. }
                | Packet::SeatKeyPress { .. }
                | Packet::SeatKeyRelease { .. }
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, NetError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Static description of an interactable, sent once on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractableInfo {
    pub id: InteractableId,
    pub kind: InteractableKindInfo,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InteractableKindInfo {
    Plain,
    Toggle,
    Seat { crouched: bool, eye_height: f32 },
    Grabbable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    pub id: ActorId,
    pub owner: PeerId,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub crouched: bool,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractableState {
    pub id: InteractableId,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub simulating: bool,
    pub latched: bool,
}

/// Where an outgoing message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Over the wire to the authority.
    Authority,
    /// The local process is the authority: apply in-process.
    Loopback,
    /// Every connected peer.
    All,
    Peer(PeerId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub recipient: Recipient,
    pub packet: Packet,
}

impl Outgoing {
    pub fn to_all(packet: Packet) -> Self {
        Self {
            recipient: Recipient::All,
            packet,
        }
    }

    /// Routes a request to the authority, in-process when we are it.
    pub fn request(local_authority: bool, packet: Packet) -> Self {
        let recipient = if local_authority {
            Recipient::Loopback
        } else {
            Recipient::Authority
        };
        Self { recipient, packet }
    }
}
