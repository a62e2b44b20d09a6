//! Per-process session context: who we are and which actor we drive.

use log::{debug, info};
use shared::{ActorId, PeerId, SessionRole};

#[derive(Debug, Clone)]
pub struct Session {
    pub peer: PeerId,
    pub role: SessionRole,
    controlling: Option<ActorId>,
}

impl Session {
    pub fn new(peer: PeerId, role: SessionRole) -> Self {
        Self {
            peer,
            role,
            controlling: None,
        }
    }

    /// A peer connected to a remote host, before the handshake completes.
    pub fn remote() -> Self {
        Self::new(PeerId::HOST, SessionRole::remote_peer())
    }

    /// Re-read every tick; host status may change at runtime.
    pub fn local_authority(&self) -> bool {
        self.role.has_authority()
    }

    pub fn controlling(&self) -> Option<ActorId> {
        self.controlling
    }

    pub fn is_controlling(&self, actor: ActorId) -> bool {
        self.controlling == Some(actor)
    }

    /// Takes or drops control of `actor`. Refused while a different actor is
    /// controlled. Returns true if the flag changed.
    pub fn set_controlling(&mut self, actor: ActorId, value: bool) -> bool {
        match (self.controlling, value) {
            (Some(current), true) if current != actor => {
                debug!("Refusing control of {}: {} is controlled", actor, current);
                false
            }
            (Some(_), true) => false,
            (None, true) => {
                info!("Controlling {}", actor);
                self.controlling = Some(actor);
                true
            }
            (Some(current), false) if current == actor => {
                info!("Released control of {}", actor);
                self.controlling = None;
                true
            }
            (_, false) => false,
        }
    }
}
