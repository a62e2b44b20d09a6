//! Reference rigid-body world backing the host.
//!
//! Every collider is an axis-aligned box. Shape casts are answered by
//! sweeping a point against boxes grown by the cast radius, which is exact
//! for the box faces and slightly generous at the corners. Collisions are
//! resolved along the axis of shallowest penetration.

use log::debug;
use shared::math::{Quat, Vec3};
use shared::physics::{
    BodyState, Capsule, CastHit, Layer, PhysicsWorld, QueryFilter, RayHit, SceneQuery, SpringJoint,
};
use shared::{BodyHandle, InteractableId, JointHandle};
use std::collections::{BTreeMap, BTreeSet};

pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Immovable level geometry.
    Static,
    /// Moves with its own velocity, unaffected by forces (vehicles, carriers).
    Kinematic,
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub half_extents: Vec3,
    /// Collider centre relative to `position`.
    pub offset: Vec3,
    pub mass: f32,
    pub gravity: bool,
    pub colliders_enabled: bool,
    pub rotation_locked: bool,
    pub interactable: Option<InteractableId>,
    /// Owned by a character controller.
    pub actor: bool,
    force: Vec3,
}

impl Body {
    fn new(kind: BodyKind, position: Vec3, half_extents: Vec3) -> Self {
        Self {
            kind,
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            half_extents,
            offset: Vec3::ZERO,
            mass: 1.0,
            gravity: kind == BodyKind::Dynamic,
            colliders_enabled: true,
            rotation_locked: false,
            interactable: None,
            actor: false,
            force: Vec3::ZERO,
        }
    }

    pub fn fixed(position: Vec3, half_extents: Vec3) -> Self {
        Self::new(BodyKind::Static, position, half_extents)
    }

    pub fn kinematic(position: Vec3, half_extents: Vec3, velocity: Vec3) -> Self {
        let mut body = Self::new(BodyKind::Kinematic, position, half_extents);
        body.velocity = velocity;
        body
    }

    pub fn dynamic(position: Vec3, half_extents: Vec3, mass: f32) -> Self {
        let mut body = Self::new(BodyKind::Dynamic, position, half_extents);
        body.mass = mass;
        body
    }

    /// A controller body with the standing capsule.
    pub fn character(position: Vec3, mass: f32) -> Self {
        let mut body = Self::dynamic(position, Vec3::ZERO, mass);
        body.actor = true;
        body.rotation_locked = true;
        body.set_capsule(Capsule::STANDING);
        body
    }

    pub fn with_interactable(mut self, id: InteractableId) -> Self {
        self.interactable = Some(id);
        self
    }

    pub fn set_capsule(&mut self, capsule: Capsule) {
        self.half_extents = Vec3::new(capsule.radius, capsule.height * 0.5, capsule.radius);
        self.offset = Vec3::new(0.0, capsule.center, 0.0);
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        let center = self.position + self.offset;
        (center - self.half_extents, center + self.half_extents)
    }

    fn matches(&self, handle: BodyHandle, filter: &QueryFilter) -> bool {
        if !self.colliders_enabled || filter.exclude == Some(handle) {
            return false;
        }
        match filter.layer {
            Layer::Solid => true,
            Layer::Interactables => self.interactable.is_some(),
        }
    }
}

/// A new touch between a dynamic body and something else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body: BodyHandle,
    pub other: BodyHandle,
    pub relative_velocity: Vec3,
}

#[derive(Debug, Clone)]
struct Joint {
    body: BodyHandle,
    connected: BodyHandle,
    params: SpringJoint,
}

#[derive(Debug, Default)]
pub struct SimWorld {
    bodies: BTreeMap<BodyHandle, Body>,
    joints: BTreeMap<JointHandle, Joint>,
    touching: BTreeSet<(BodyHandle, BodyHandle)>,
    next_body: u32,
    next_joint: u32,
}

/// Entry and exit distance of a ray against a box, if the line crosses it
/// ahead of the origin.
fn ray_box(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < 1e-8 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (min[axis] - o) * inv;
        let mut t2 = (max[axis] - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        return None;
    }
    Some((t_min, t_max))
}

fn overlap(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> Option<Vec3> {
    let depth = a.1.min(b.1) - a.0.max(b.0);
    if depth.x > 0.0 && depth.y > 0.0 && depth.z > 0.0 {
        Some(depth)
    } else {
        None
    }
}

/// Axis index of the smallest component.
fn shallowest_axis(depth: Vec3) -> usize {
    if depth.x <= depth.y && depth.x <= depth.z {
        0
    } else if depth.y <= depth.z {
        1
    } else {
        2
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        self.next_body += 1;
        let handle = BodyHandle(self.next_body);
        self.bodies.insert(handle, body);
        handle
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle)
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(&handle)
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.velocity = velocity;
        }
    }

    /// Force accumulated since the last step.
    pub fn pending_force(&self, handle: BodyHandle) -> Vec3 {
        self.bodies
            .get(&handle)
            .map(|b| b.force)
            .unwrap_or(Vec3::ZERO)
    }

    /// Advances the world and reports contacts that started this step.
    pub fn step(&mut self, dt: f32) -> Vec<Contact> {
        self.apply_joints();

        for body in self.bodies.values_mut() {
            match body.kind {
                BodyKind::Static => {}
                BodyKind::Kinematic => body.position += body.velocity * dt,
                BodyKind::Dynamic => {
                    let mut acceleration = body.force / body.mass.max(1e-4);
                    if body.gravity {
                        acceleration += GRAVITY;
                    }
                    body.velocity += acceleration * dt;
                    body.position += body.velocity * dt;
                }
            }
            body.force = Vec3::ZERO;
        }

        self.resolve_collisions()
    }

    fn apply_joints(&mut self) {
        let mut broken = Vec::new();

        for (handle, joint) in &self.joints {
            let (Some(a), Some(b)) = (
                self.bodies.get(&joint.body),
                self.bodies.get(&joint.connected),
            ) else {
                broken.push(*handle);
                continue;
            };

            let anchor_a = a.position + a.rotation * joint.params.anchor;
            let anchor_b = b.position + b.rotation * joint.params.connected_anchor;
            let force = (anchor_a - anchor_b) * joint.params.spring
                - (b.velocity - a.velocity) * joint.params.damper;

            if force.length() > joint.params.break_force {
                broken.push(*handle);
                continue;
            }

            let (body, connected) = (joint.body, joint.connected);
            if let Some(b) = self.bodies.get_mut(&connected) {
                if b.kind == BodyKind::Dynamic {
                    b.force += force;
                }
            }
            if let Some(a) = self.bodies.get_mut(&body) {
                if a.kind == BodyKind::Dynamic {
                    a.force -= force;
                }
            }
        }

        for handle in broken {
            debug!("Joint {} broke", handle.0);
            self.joints.remove(&handle);
        }
    }

    fn resolve_collisions(&mut self) -> Vec<Contact> {
        let handles: Vec<BodyHandle> = self.bodies.keys().copied().collect();
        let mut touching = BTreeSet::new();
        let mut contacts = Vec::new();

        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                let (Some(body_a), Some(body_b)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
                    continue;
                };
                if !body_a.colliders_enabled || !body_b.colliders_enabled {
                    continue;
                }
                let a_dynamic = body_a.kind == BodyKind::Dynamic;
                let b_dynamic = body_b.kind == BodyKind::Dynamic;
                if !a_dynamic && !b_dynamic {
                    continue;
                }
                let Some(depth) = overlap(body_a.bounds(), body_b.bounds()) else {
                    continue;
                };

                let axis = shallowest_axis(depth);
                let relative_velocity = body_a.velocity - body_b.velocity;
                let sign = if body_a.position[axis] + body_a.offset[axis]
                    < body_b.position[axis] + body_b.offset[axis]
                {
                    -1.0
                } else {
                    1.0
                };

                let (mass_a, mass_b) = (body_a.mass, body_b.mass);
                let (vel_a, vel_b) = (body_a.velocity[axis], body_b.velocity[axis]);

                let (share_a, shared_velocity) = match (a_dynamic, b_dynamic) {
                    (true, true) => (0.5, (vel_a * mass_a + vel_b * mass_b) / (mass_a + mass_b)),
                    (true, false) => (1.0, vel_b),
                    _ => (0.0, vel_a),
                };

                if let Some(body) = self.bodies.get_mut(&a) {
                    if a_dynamic {
                        body.position[axis] += sign * depth[axis] * share_a;
                        body.velocity[axis] = shared_velocity;
                    }
                }
                if let Some(body) = self.bodies.get_mut(&b) {
                    if b_dynamic {
                        body.position[axis] -= sign * depth[axis] * (1.0 - share_a);
                        body.velocity[axis] = shared_velocity;
                    }
                }

                touching.insert((a, b));
                if !self.touching.contains(&(a, b)) {
                    if a_dynamic {
                        contacts.push(Contact {
                            body: a,
                            other: b,
                            relative_velocity,
                        });
                    }
                    if b_dynamic {
                        contacts.push(Contact {
                            body: b,
                            other: a,
                            relative_velocity: -relative_velocity,
                        });
                    }
                }
            }
        }

        self.touching = touching;
        contacts
    }

    fn sweep(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: &QueryFilter,
        include_overlaps: bool,
    ) -> Vec<(BodyHandle, f32)> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return Vec::new();
        }

        let mut hits: Vec<(BodyHandle, f32)> = self
            .bodies
            .iter()
            .filter(|(handle, body)| body.matches(**handle, filter))
            .filter_map(|(handle, body)| {
                let (min, max) = body.bounds();
                let grow = Vec3::splat(radius);
                let (entry, _) = ray_box(origin, direction, min - grow, max + grow)?;
                if entry < 0.0 {
                    return include_overlaps.then_some((*handle, 0.0));
                }
                (entry <= max_distance).then_some((*handle, entry))
            })
            .collect();

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }
}

impl SceneQuery for SimWorld {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        self.sweep(origin, 0.0, direction, max_distance, &filter, false)
            .first()
            .and_then(|(handle, distance)| {
                let body = self.bodies.get(handle)?;
                Some(RayHit {
                    body: *handle,
                    interactable: body.interactable,
                    distance: *distance,
                    point: origin + direction * *distance,
                })
            })
    }
}

impl PhysicsWorld for SimWorld {
    fn sphere_cast_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Vec<CastHit> {
        self.sweep(origin, radius, direction, max_distance, &filter, true)
            .into_iter()
            .filter_map(|(handle, distance)| {
                let body = self.bodies.get(&handle)?;
                Some(CastHit {
                    body: handle,
                    distance,
                    velocity: body.velocity,
                    dynamic: body.kind != BodyKind::Static,
                    actor: body.actor,
                })
            })
            .collect()
    }

    fn capsule_cast(
        &self,
        top: Vec3,
        bottom: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> bool {
        let middle = (top + bottom) * 0.5;
        [top, middle, bottom].iter().any(|origin| {
            !self
                .sweep(*origin, radius, direction, max_distance, &filter, false)
                .is_empty()
        })
    }

    fn body(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&body).map(|b| BodyState {
            position: b.position,
            rotation: b.rotation,
            velocity: b.velocity,
            mass: b.mass,
        })
    }

    fn add_force(&mut self, body: BodyHandle, force: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            if b.kind == BodyKind::Dynamic {
                b.force += force;
            }
        }
    }

    fn add_impulse(&mut self, body: BodyHandle, impulse: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            if b.kind == BodyKind::Dynamic {
                b.velocity += impulse / b.mass.max(1e-4);
            }
        }
    }

    fn move_position(&mut self, body: BodyHandle, position: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.position = position;
        }
    }

    fn set_rotation(&mut self, body: BodyHandle, rotation: Quat) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.rotation = rotation;
        }
    }

    fn set_gravity(&mut self, body: BodyHandle, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.gravity = enabled;
        }
    }

    fn set_capsule(&mut self, body: BodyHandle, capsule: Capsule) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.set_capsule(capsule);
        }
    }

    fn set_colliders_enabled(&mut self, body: BodyHandle, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.colliders_enabled = enabled;
        }
    }

    fn set_rotation_locked(&mut self, body: BodyHandle, locked: bool) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.rotation_locked = locked;
        }
    }

    fn set_mass(&mut self, body: BodyHandle, mass: f32) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.mass = mass;
        }
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body);
        self.joints
            .retain(|_, j| j.body != body && j.connected != body);
    }

    fn attach_spring(
        &mut self,
        body: BodyHandle,
        connected: BodyHandle,
        joint: SpringJoint,
    ) -> Option<JointHandle> {
        if !self.bodies.contains_key(&body) || !self.bodies.contains_key(&connected) {
            return None;
        }
        self.next_joint += 1;
        let handle = JointHandle(self.next_joint);
        self.joints.insert(
            handle,
            Joint {
                body,
                connected,
                params: joint,
            },
        );
        Some(handle)
    }

    fn detach(&mut self, joint: JointHandle) {
        self.joints.remove(&joint);
    }

    fn joint_alive(&self, joint: JointHandle) -> bool {
        self.joints.contains_key(&joint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn floor() -> Body {
        Body::fixed(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0))
    }

    #[test]
    fn test_raycast_hits_nearest() {
        let mut world = SimWorld::new();
        let near = world.add_body(Body::fixed(Vec3::new(0.0, 0.0, -3.0), Vec3::splat(0.5)));
        world.add_body(Body::fixed(Vec3::new(0.0, 0.0, -6.0), Vec3::splat(0.5)));

        let hit = world
            .raycast(Vec3::ZERO, Vec3::NEG_Z, 10.0, QueryFilter { layer: Layer::Solid, exclude: None })
            .unwrap();
        assert_eq!(hit.body, near);
        assert_approx_eq!(hit.distance, 2.5);
    }

    #[test]
    fn test_raycast_respects_layer_and_range() {
        let mut world = SimWorld::new();
        world.add_body(Body::fixed(Vec3::new(0.0, 0.0, -3.0), Vec3::splat(0.5)));
        let button = world.add_body(
            Body::fixed(Vec3::new(0.0, 0.0, -5.0), Vec3::splat(0.5)).with_interactable(InteractableId(1)),
        );

        let hit = world
            .raycast(Vec3::ZERO, Vec3::NEG_Z, 10.0, QueryFilter::interactables())
            .unwrap();
        assert_eq!(hit.body, button);
        assert_eq!(hit.interactable, Some(InteractableId(1)));

        assert!(world
            .raycast(Vec3::ZERO, Vec3::NEG_Z, 4.0, QueryFilter::interactables())
            .is_none());
    }

    #[test]
    fn test_dynamic_body_rests_on_floor() {
        let mut world = SimWorld::new();
        world.add_body(floor());
        let crate_body = world.add_body(Body::dynamic(Vec3::new(0.0, 2.0, 0.0), Vec3::splat(0.5), 1.0));

        for _ in 0..200 {
            world.step(0.02);
        }

        let state = world.body(crate_body).unwrap();
        assert_approx_eq!(state.position.y, 0.5, 0.05);
        assert_approx_eq!(state.velocity.y, 0.0, 0.25);
    }

    #[test]
    fn test_contact_reported_once_per_touch() {
        let mut world = SimWorld::new();
        world.add_body(floor());
        let falling = world.add_body(Body::dynamic(Vec3::new(0.0, 1.0, 0.0), Vec3::splat(0.5), 1.0));
        world.set_velocity(falling, Vec3::new(0.0, -10.0, 0.0));

        let mut contacts = Vec::new();
        for _ in 0..20 {
            contacts.extend(world.step(0.02));
        }

        let own: Vec<_> = contacts.iter().filter(|c| c.body == falling).collect();
        assert_eq!(own.len(), 1);
        assert!(own[0].relative_velocity.y < -9.0);
    }

    #[test]
    fn test_sphere_cast_reports_carrier_velocity() {
        let mut world = SimWorld::new();
        let carrier = world.add_body(Body::kinematic(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(2.0, 0.5, 2.0),
            Vec3::new(0.0, 0.0, 3.0),
        ));

        let hits = world.sphere_cast_all(
            Vec3::new(0.0, 0.5, 0.0),
            0.24,
            Vec3::NEG_Y,
            1.5,
            QueryFilter { layer: Layer::Solid, exclude: None },
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, carrier);
        assert!(hits[0].dynamic);
        assert_eq!(hits[0].velocity, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_excluded_and_disabled_bodies_are_ignored() {
        let mut world = SimWorld::new();
        let a = world.add_body(Body::fixed(Vec3::new(0.0, 0.0, -2.0), Vec3::splat(0.5)));
        assert!(world.sphere_cast(Vec3::ZERO, 0.2, Vec3::NEG_Z, 5.0, QueryFilter::solid(BodyHandle(99))));
        assert!(!world.sphere_cast(Vec3::ZERO, 0.2, Vec3::NEG_Z, 5.0, QueryFilter::solid(a)));

        world.set_colliders_enabled(a, false);
        assert!(!world.sphere_cast(Vec3::ZERO, 0.2, Vec3::NEG_Z, 5.0, QueryFilter::solid(BodyHandle(99))));
    }

    #[test]
    fn test_spring_breaks_past_limit() {
        let mut world = SimWorld::new();
        let a = world.add_body(Body::dynamic(Vec3::ZERO, Vec3::splat(0.1), 1.0));
        let b = world.add_body(Body::dynamic(Vec3::new(0.0, 0.0, -0.1), Vec3::splat(0.1), 1.0));
        let far = world.add_body(Body::dynamic(Vec3::new(0.0, 0.0, -10.0), Vec3::splat(0.1), 1.0));

        let held = world
            .attach_spring(a, b, SpringJoint::grab(Vec3::ZERO, Vec3::ZERO))
            .unwrap();
        let snapped = world
            .attach_spring(a, far, SpringJoint::grab(Vec3::ZERO, Vec3::ZERO))
            .unwrap();

        world.step(0.001);
        assert!(world.joint_alive(held));
        assert!(!world.joint_alive(snapped));

        world.detach(held);
        assert!(!world.joint_alive(held));
    }

    #[test]
    fn test_capsule_cast_detects_wall() {
        let mut world = SimWorld::new();
        world.add_body(Body::fixed(Vec3::new(0.6, 0.0, 0.0), Vec3::new(0.1, 2.0, 2.0)));
        let filter = QueryFilter { layer: Layer::Solid, exclude: None };

        assert!(world.capsule_cast(
            Vec3::new(0.0, 0.25, 0.0),
            Vec3::new(0.0, -1.25, 0.0),
            0.2,
            Vec3::X,
            0.5,
            filter
        ));
        assert!(!world.capsule_cast(
            Vec3::new(0.0, 0.25, 0.0),
            Vec3::new(0.0, -1.25, 0.0),
            0.2,
            Vec3::NEG_X,
            0.5,
            filter
        ));
    }
}
