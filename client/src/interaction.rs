//! Controlling side of the interaction handshake.
//!
//! The driver never marks anything as held. It only sends requests; the
//! actor becomes the holder when the authority's RemoteStartInteraction
//! arrives, the requester included.

use crate::input::Button;
use log::debug;
use shared::math::Vec3;
use shared::physics::{QueryFilter, SceneQuery};
use shared::{ActorId, InteractableId, Outgoing, Packet, World};

#[derive(Debug, Clone, Default)]
pub struct InteractionDriver {
    looking_at: Option<InteractableId>,
    /// Target of the last start request, until a stop is sent for it.
    interacting_with: Option<InteractableId>,
}

impl InteractionDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn looking_at(&self) -> Option<InteractableId> {
        self.looking_at
    }

    pub fn interacting_with(&self) -> Option<InteractableId> {
        self.interacting_with
    }

    /// Casts the look ray. Only the nearest hit counts, and only while its
    /// interactable is simulating.
    pub fn acquire<S: SceneQuery>(
        &mut self,
        scene: &S,
        world: &World,
        origin: Vec3,
        forward: Vec3,
        distance: f32,
    ) -> Option<InteractableId> {
        self.looking_at = scene
            .raycast(origin, forward, distance, QueryFilter::interactables())
            .and_then(|hit| hit.interactable)
            .filter(|id| world.interactable(*id).map(|i| i.simulating).unwrap_or(false));
        self.looking_at
    }

    /// Spaced label of the current look target.
    pub fn hint(&self, world: &World) -> Option<String> {
        self.looking_at
            .and_then(|id| world.interactable(id))
            .map(|i| i.hint())
    }

    /// Press, release, and target loss for one frame.
    pub fn update(
        &mut self,
        local_authority: bool,
        actor: ActorId,
        interact: Button,
        controlling: bool,
    ) -> Vec<Outgoing> {
        let mut out = Vec::new();

        if let Some(target) = self.interacting_with {
            let lost = self.looking_at != Some(target);
            if !controlling || interact.released || lost {
                out.push(self.stop(local_authority, actor, target));
            }
        }

        if controlling && interact.pressed && self.interacting_with.is_none() {
            if let Some(target) = self.looking_at {
                debug!("Requesting start {} -> {}", actor, target);
                self.interacting_with = Some(target);
                out.push(Outgoing::request(
                    local_authority,
                    Packet::RequestStartInteraction {
                        actor,
                        interactable: target,
                    },
                ));
            }
        }

        out
    }

    /// Drops the current interaction, if any. Used when control is released.
    pub fn release(&mut self, local_authority: bool, actor: ActorId) -> Option<Outgoing> {
        let target = self.interacting_with?;
        Some(self.stop(local_authority, actor, target))
    }

    fn stop(&mut self, local_authority: bool, actor: ActorId, target: InteractableId) -> Outgoing {
        debug!("Requesting stop {} -> {}", actor, target);
        self.interacting_with = None;
        Outgoing::request(
            local_authority,
            Packet::RequestStopInteraction {
                actor,
                interactable: target,
            },
        )
    }
}
