//! Look-ray queries against the mirrored world.
//!
//! A remote peer has no engine of its own; interactables are picked as
//! spheres around their last replicated position.

use shared::math::Vec3;
use shared::physics::{Layer, QueryFilter, RayHit, SceneQuery};
use shared::{BodyHandle, World};

pub const PICK_RADIUS: f32 = 0.5;

pub struct MirrorScene<'a> {
    world: &'a World,
}

impl<'a> MirrorScene<'a> {
    pub fn new(world: &'a World) -> Self {
        Self { world }
    }
}

/// Distance along a normalized ray to the first intersection with a sphere.
fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let along = to_center.dot(direction);
    let miss_sq = to_center.length_squared() - along * along;
    let radius_sq = radius * radius;
    if miss_sq > radius_sq {
        return None;
    }
    let half_chord = (radius_sq - miss_sq).sqrt();
    let near = along - half_chord;
    let far = along + half_chord;
    if far < 0.0 {
        None
    } else {
        Some(near.max(0.0))
    }
}

impl SceneQuery for MirrorScene<'_> {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Option<RayHit> {
        if filter.layer != Layer::Interactables {
            return None;
        }
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        self.world
            .interactables()
            .filter_map(|i| {
                let body = i.body.unwrap_or(BodyHandle(i.id.0));
                if filter.exclude == Some(body) {
                    return None;
                }
                let distance = ray_sphere(origin, direction, i.transform.position, PICK_RADIUS)?;
                (distance <= max_distance).then_some(RayHit {
                    body,
                    interactable: Some(i.id),
                    distance,
                    point: origin + direction * distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
