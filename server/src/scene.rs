//! The level the host binary starts with: a floor, a button, a latch, a
//! seat riding a moving carrier, and a crate to grab.

use crate::host::Host;
use crate::physics::{Body, SimWorld};
use shared::math::{Quat, Vec3};
use shared::world::SeatState;
use shared::{BodyHandle, InteractableId, InteractableKind};

/// Top surface of the floor slab.
pub const FLOOR_TOP: f32 = -1.5;

/// Handles to everything the demo level placed.
#[derive(Debug, Clone, Copy)]
pub struct DemoScene {
    pub floor: BodyHandle,
    pub button: InteractableId,
    pub latch: InteractableId,
    pub seat: InteractableId,
    pub carrier: BodyHandle,
    pub crate_box: InteractableId,
}

impl DemoScene {
    pub fn build(host: &mut Host<SimWorld>) -> Self {
        let floor = host.physics.add_body(Body::fixed(
            Vec3::new(0.0, FLOOR_TOP - 0.5, 0.0),
            Vec3::new(100.0, 0.5, 100.0),
        ));

        let button = Self::place(
            host,
            InteractableKind::Plain { held: false },
            "Use",
            Body::fixed(Vec3::new(3.0, 0.0, -3.0), Vec3::splat(0.2)),
        );
        let latch = Self::place(
            host,
            InteractableKind::Toggle { latched: false },
            "Switch",
            Body::fixed(Vec3::new(-3.0, 0.0, -3.0), Vec3::splat(0.2)),
        );

        // The carrier drifts along +Z; the seat is the carrier itself, with
        // its facing axis pointing up.
        let mut carrier_body = Body::kinematic(
            Vec3::new(0.0, -1.25, -8.0),
            Vec3::new(1.0, 0.25, 1.5),
            Vec3::new(0.0, 0.0, 1.0),
        );
        carrier_body.rotation = Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2);
        let seat = host
            .world
            .add_interactable(InteractableKind::Seat(SeatState::new(true, 0.5)), "Sit", None);
        let carrier = host.physics.add_body(carrier_body.with_interactable(seat));
        if let Some(interactable) = host.world.interactable_mut(seat) {
            interactable.body = Some(carrier);
        }

        let crate_box = Self::place(
            host,
            InteractableKind::Grabbable,
            "Grab",
            Body::dynamic(Vec3::new(0.0, -1.0, -4.0), Vec3::splat(0.25), 1.0),
        );

        host.sync_transforms();
        Self {
            floor,
            button,
            latch,
            seat,
            carrier,
            crate_box,
        }
    }

    fn place(
        host: &mut Host<SimWorld>,
        kind: InteractableKind,
        label: &str,
        body: Body,
    ) -> InteractableId {
        let id = host.world.add_interactable(kind, label, None);
        let handle = host.physics.add_body(body.with_interactable(id));
        if let Some(interactable) = host.world.interactable_mut(id) {
            interactable.body = Some(handle);
        }
        id
    }

    /// Spawn points spread along X so new players do not overlap.
    pub fn spawn_point(index: u32) -> Vec3 {
        let lane = (index % 8) as f32 - 3.5;
        Vec3::new(lane * 1.5, FLOOR_TOP + 1.5, 2.0)
    }
}
