//! Who is allowed to write physical and interaction state.
//!
//! Every mutating operation on the authoritative path takes an [`Authority`]
//! token. The only way to obtain one is through [`SessionRole::authority`], so
//! a peer that is not the authority has no way to call those paths.

use crate::world::Actor;

/// Proof that the caller resolved authority for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    _proof: (),
}

/// How the local process participates in the shared simulation.
///
/// Host status can change at runtime, so this is re-evaluated every tick
/// rather than cached in a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRole {
    pub hosting: bool,
    pub multiplayer: bool,
    /// A local-only shadow simulation (e.g. a preview run).
    pub local_sim: bool,
}

impl SessionRole {
    pub fn host() -> Self {
        Self {
            hosting: true,
            multiplayer: true,
            local_sim: false,
        }
    }

    pub fn remote_peer() -> Self {
        Self {
            hosting: false,
            multiplayer: true,
            local_sim: false,
        }
    }

    pub fn single_player() -> Self {
        Self {
            hosting: false,
            multiplayer: false,
            local_sim: false,
        }
    }

    pub fn has_authority(&self) -> bool {
        self.hosting || !self.multiplayer || self.local_sim
    }

    pub fn authority(&self) -> Option<Authority> {
        self.has_authority().then_some(Authority { _proof: () })
    }

    /// Authority is process-wide: the actor only identifies the subject.
    pub fn is_authority(&self, _actor: &Actor) -> bool {
        self.has_authority()
    }
}
