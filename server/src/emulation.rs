//! Emulated key events raised by the authority.
//!
//! Buttons, seats and the per-actor controlled flag drive the surrounding
//! machine logic by "pressing" keys. The host collects those edges each tick
//! and hands them to whoever consumes them.

use shared::{ActorId, InteractableId, KeyCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Interactable(InteractableId),
    Actor(ActorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatedKey {
    pub source: KeySource,
    pub key: KeyCode,
    pub pressed: bool,
}

impl EmulatedKey {
    pub fn button(id: InteractableId, pressed: bool) -> Self {
        Self {
            source: KeySource::Interactable(id),
            key: KeyCode::Emulated,
            pressed,
        }
    }

    pub fn controlled(actor: ActorId, pressed: bool) -> Self {
        Self {
            source: KeySource::Actor(actor),
            key: KeyCode::Emulated,
            pressed,
        }
    }
}
