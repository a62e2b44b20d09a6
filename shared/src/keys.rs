//! Emulated keys relayed from a seat occupant to the authority.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys a seated occupant may drive remotely. Anything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyCode {
    UpArrow,
    DownArrow,
    LeftArrow,
    RightArrow,
    W,
    A,
    S,
    D,
    Q,
    R,
    Space,
    LeftShift,
    Alpha1,
    Alpha2,
    Alpha3,
    Alpha4,
    /// Emitted by buttons and the controlled flag; never relayed by seats.
    Emulated,
}

impl KeyCode {
    pub const SEAT_RELAYED: [KeyCode; 16] = [
        KeyCode::UpArrow,
        KeyCode::DownArrow,
        KeyCode::LeftArrow,
        KeyCode::RightArrow,
        KeyCode::W,
        KeyCode::A,
        KeyCode::S,
        KeyCode::D,
        KeyCode::Q,
        KeyCode::R,
        KeyCode::Space,
        KeyCode::LeftShift,
        KeyCode::Alpha1,
        KeyCode::Alpha2,
        KeyCode::Alpha3,
        KeyCode::Alpha4,
    ];

    /// Wire code, the position in the relay allow-list.
    pub fn code(self) -> u32 {
        Self::SEAT_RELAYED
            .iter()
            .position(|k| *k == self)
            .map(|i| i as u32)
            .unwrap_or(u32::MAX)
    }

    /// Resolves a wire code; codes outside the allow-list yield `None`.
    pub fn from_code(code: u32) -> Option<KeyCode> {
        Self::SEAT_RELAYED.get(code as usize).copied()
    }

    pub fn is_relayed(self) -> bool {
        Self::SEAT_RELAYED.contains(&self)
    }
}

/// Level state of one relayed key with edge detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteKey {
    pub current: bool,
    pub previous: bool,
}

impl RemoteKey {
    pub fn set(&mut self, value: bool) {
        self.current = value;
    }

    /// Returns the new level once per transition.
    pub fn take_edge(&mut self) -> Option<bool> {
        if self.current == self.previous {
            return None;
        }
        self.previous = self.current;
        Some(self.current)
    }
}

/// The allow-listed key states of a single seat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayKeys {
    keys: BTreeMap<KeyCode, RemoteKey>,
}

impl RelayKeys {
    pub fn new() -> Self {
        Self {
            keys: KeyCode::SEAT_RELAYED
                .iter()
                .map(|k| (*k, RemoteKey::default()))
                .collect(),
        }
    }

    /// Returns false if `key` is not relayed by seats.
    pub fn set(&mut self, key: KeyCode, pressed: bool) -> bool {
        match self.keys.get_mut(&key) {
            Some(state) => {
                state.set(pressed);
                true
            }
            None => false,
        }
    }

    pub fn is_down(&self, key: KeyCode) -> bool {
        self.keys.get(&key).map(|k| k.current).unwrap_or(false)
    }

    pub fn release_all(&mut self) {
        for state in self.keys.values_mut() {
            state.set(false);
        }
    }

    /// Drains one edge per changed key, in allow-list order.
    pub fn take_edges(&mut self) -> Vec<(KeyCode, bool)> {
        self.keys
            .iter_mut()
            .filter_map(|(key, state)| state.take_edge().map(|pressed| (*key, pressed)))
            .collect()
    }
}
