//! Contact constraints generated from collision manifolds.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use sim_collision::{
    ColliderPair, CollisionEvent, CollisionEventKind, CollisionWorld, Contact, Manifold,
};
use sim_constraint::{Constraint, ConstraintManager, FrictionConstraint, NormalConstraint};
use sim_core::BodySet;
use sim_types::{BodyId, ConstraintId, ContactConfig, Result, SimError};
use tracing::{debug, trace, warn};

/// Constraint ids generated for one contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactRows {
    /// Non-penetration row.
    pub normal: ConstraintId,
    /// Friction rows along the two tangents.
    pub friction: [ConstraintId; 2],
}

impl ContactRows {
    /// All three ids, normal first.
    #[must_use]
    pub fn ids(&self) -> [ConstraintId; 3] {
        [self.normal, self.friction[0], self.friction[1]]
    }
}

#[derive(Debug, Clone)]
struct ContactGroup {
    bodies: [BodyId; 2],
    rows: Vec<ContactRows>,
}

/// Orthonormal tangents of a contact normal.
///
/// The helper axis is the world axis along the smallest component of `n`,
/// which keeps `n × axis` well away from zero. A zero or non-finite normal
/// falls back to the world X and Y axes.
#[must_use]
pub fn tangent_basis(normal: &Vector3<f64>) -> [Vector3<f64>; 2] {
    let abs = normal.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let Some(t1) = normal
        .cross(&axis)
        .try_normalize(f64::EPSILON)
        .filter(|t| t.iter().all(|v| v.is_finite()))
    else {
        return [Vector3::x(), Vector3::y()];
    };
    let t2 = normal.cross(&t1).try_normalize(f64::EPSILON).unwrap_or_else(|| axis.cross(&t1));
    [t1, t2]
}

/// Remove one contact row. Rows may already be gone when a body was removed
/// before its colliders.
fn remove_row(manager: &mut ConstraintManager, id: ConstraintId, bodies: &mut BodySet) {
    match manager.remove_constraint(id, bodies) {
        Ok(_) | Err(SimError::InvalidConstraintId(_)) => {}
        Err(err) => warn!(%id, %err, "failed to remove contact constraint"),
    }
}

/// Keeps one `{normal, friction, friction}` triple of constraints per live
/// manifold contact.
///
/// Colliders are mapped to bodies through [`sim_collision::Collider::body`].
/// Pairs whose colliders have no body, or whose bodies are unknown, are
/// skipped with a warning.
#[derive(Debug, Clone, Default)]
pub struct ContactConstraints {
    config: ContactConfig,
    groups: BTreeMap<ColliderPair, ContactGroup>,
}

impl ContactConstraints {
    /// Create an empty system.
    #[must_use]
    pub fn new(config: ContactConfig) -> Self {
        Self {
            config,
            groups: BTreeMap::new(),
        }
    }

    /// Contact parameters.
    #[must_use]
    pub fn config(&self) -> &ContactConfig {
        &self.config
    }

    /// Number of pairs with contact constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no pair has contact constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of constraints owned by the system.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.groups.values().map(|group| group.rows.len() * 3).sum()
    }

    /// Constraint ids of a pair, one entry per contact.
    #[must_use]
    pub fn rows(&self, pair: &ColliderPair) -> Option<&[ContactRows]> {
        self.groups.get(pair).map(|group| group.rows.as_slice())
    }

    /// Apply a batch of collision events.
    pub fn handle_events(
        &mut self,
        events: &[CollisionEvent],
        world: &CollisionWorld,
        bodies: &mut BodySet,
        manager: &mut ConstraintManager,
    ) -> Result<()> {
        for event in events {
            match (event.kind, world.manifold(&event.pair)) {
                (CollisionEventKind::Intersecting, Some(manifold)) => {
                    self.intersecting(event.pair, manifold, world, bodies, manager)?;
                }
                _ => self.remove_pair(&event.pair, bodies, manager),
            }
        }
        Ok(())
    }

    /// Remove every constraint of a pair, e.g. when one of its colliders is
    /// removed.
    pub fn remove_pair(
        &mut self,
        pair: &ColliderPair,
        bodies: &mut BodySet,
        manager: &mut ConstraintManager,
    ) {
        let Some(group) = self.groups.remove(pair) else {
            return;
        };
        for id in group.rows.iter().flat_map(ContactRows::ids) {
            remove_row(manager, id, bodies);
        }
        debug!(%pair, contacts = group.rows.len(), "removed contact constraints");
    }

    fn intersecting(
        &mut self,
        pair: ColliderPair,
        manifold: &Manifold,
        world: &CollisionWorld,
        bodies: &mut BodySet,
        manager: &mut ConstraintManager,
    ) -> Result<()> {
        let (Some(c1), Some(c2)) = (world.collider(pair.first()), world.collider(pair.second()))
        else {
            warn!(%pair, "contact between unknown colliders");
            self.remove_pair(&pair, bodies, manager);
            return Ok(());
        };
        let (Some(b1), Some(b2)) = (c1.body(), c2.body()) else {
            warn!(%pair, "contact involves a collider without a body");
            return Ok(());
        };
        let (Some(body1), Some(body2)) = (bodies.get(b1), bodies.get(b2)) else {
            warn!(%pair, body1 = %b1, body2 = %b2, "contact references unknown bodies");
            self.remove_pair(&pair, bodies, manager);
            return Ok(());
        };
        if b1 == b2 || (body1.is_immovable() && body2.is_immovable()) {
            trace!(%pair, "skipping contact between immovable bodies");
            self.remove_pair(&pair, bodies, manager);
            return Ok(());
        }

        let mu = FrictionConstraint::mix(
            body1.config().friction_coefficient,
            body2.config().friction_coefficient,
        );
        let centers = [body1.position(), body2.position()];
        let poses = [c1.pose(), c2.pose()];
        let offsets = |contact: &Contact| {
            [
                poses[0].transform_point(&contact.local_position[0]) - centers[0],
                poses[1].transform_point(&contact.local_position[1]) - centers[1],
            ]
        };

        let group = self.groups.entry(pair).or_insert_with(|| ContactGroup {
            bodies: [b1, b2],
            rows: Vec::new(),
        });
        let before = group.rows.len();
        let contacts = manifold.contacts();

        while group.rows.len() > contacts.len() {
            if let Some(rows) = group.rows.pop() {
                for id in rows.ids() {
                    remove_row(manager, id, bodies);
                }
            }
        }

        for (index, contact) in contacts.iter().enumerate() {
            let r = offsets(contact);
            let [t1, t2] = tangent_basis(&contact.normal);
            if let Some(rows) = group.rows.get(index) {
                if let Some(normal) = manager
                    .constraint_mut(rows.normal)
                    .and_then(Constraint::as_normal_mut)
                {
                    normal.update(contact.normal, r);
                }
                for (id, tangent) in rows.friction.into_iter().zip([t1, t2]) {
                    if let Some(friction) =
                        manager.constraint_mut(id).and_then(Constraint::as_friction_mut)
                    {
                        friction.update(tangent, r);
                    }
                }
            } else {
                let [b1, b2] = group.bodies;
                let normal = manager.add_constraint(
                    NormalConstraint::new(b1, b2, contact.normal, r, self.config).into(),
                    bodies,
                )?;
                let mut friction = [normal; 2];
                for (slot, tangent) in friction.iter_mut().zip([t1, t2]) {
                    *slot = manager.add_constraint(
                        FrictionConstraint::new(b1, b2, tangent, r, normal, mu).into(),
                        bodies,
                    )?;
                }
                group.rows.push(ContactRows { normal, friction });
            }
            trace!(
                %pair,
                index,
                penetration = contact.penetration,
                normal = ?contact.normal,
                "contact constraint updated"
            );
        }

        if group.rows.len() != before {
            debug!(%pair, from = before, to = group.rows.len(), "contact count changed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_collision::{Collider, ConvexShape};
    use sim_constraint::ConstraintEquation;
    use sim_core::{RigidBody, RigidBodyConfig};
    use sim_types::{CollisionConfig, Pose};

    struct Scene {
        bodies: BodySet,
        world: CollisionWorld,
        manager: ConstraintManager,
        contacts: ContactConstraints,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                bodies: BodySet::new(),
                world: CollisionWorld::new(&CollisionConfig::default()),
                manager: ConstraintManager::default(),
                contacts: ContactConstraints::new(ContactConfig::default()),
            }
        }

        fn add_box(&mut self, body: RigidBody, half: Vector3<f64>) -> (BodyId, sim_types::ColliderId) {
            let pose = body.pose();
            let id = self.bodies.insert(body);
            let collider = Collider::convex(ConvexShape::bounding_box(half))
                .unwrap()
                .with_body(id)
                .with_pose(pose);
            (id, self.world.add_collider(collider))
        }

        fn step_collision(&mut self) -> Vec<CollisionEvent> {
            let events = self.world.update();
            self.contacts
                .handle_events(&events, &self.world, &mut self.bodies, &mut self.manager)
                .unwrap();
            events
        }
    }

    fn floor() -> RigidBody {
        RigidBody::immovable(Pose::from_position(Point3::new(0.0, 0.0, -0.5)))
    }

    fn cube_at(z: f64) -> RigidBody {
        RigidBody::new(
            RigidBodyConfig::default(),
            Pose::from_position(Point3::new(0.0, 0.0, z)),
        )
    }

    #[test]
    fn test_tangent_basis_is_orthonormal() {
        for n in [
            Vector3::z(),
            Vector3::x(),
            -Vector3::y(),
            Vector3::new(1.0, 2.0, -3.0).normalize(),
        ] {
            let [t1, t2] = tangent_basis(&n);
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t2.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&t2), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tangent_basis_of_degenerate_normal() {
        for n in [Vector3::zeros(), Vector3::repeat(f64::NAN), Vector3::new(1e-320, 0.0, 0.0)] {
            let [t1, t2] = tangent_basis(&n);
            assert!(t1.iter().chain(t2.iter()).all(|v| v.is_finite()));
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&t2), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_three_constraints_per_contact() {
        let mut scene = Scene::new();
        let (floor_body, floor_collider) =
            scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        let (cube_body, cube_collider) = scene.add_box(cube_at(0.45), Vector3::repeat(0.5));
        scene.step_collision();

        let pair = ColliderPair::new(floor_collider, cube_collider);
        let contacts = scene.world.manifold(&pair).unwrap().contacts().len();
        let rows = scene.contacts.rows(&pair).unwrap();
        assert_eq!(rows.len(), contacts);
        assert_eq!(scene.manager.len(), 3 * contacts);
        assert_eq!(scene.contacts.constraint_count(), 3 * contacts);

        let normal = scene.manager.constraint(rows[0].normal).unwrap();
        assert_eq!(normal.bodies(), [floor_body, cube_body]);
        let normal = normal.as_normal().unwrap();
        assert_relative_eq!(*normal.normal(), Vector3::z(), epsilon = 1e-6);

        // Offsets lead from each center of mass to the contact point.
        let contact = scene.world.manifold(&pair).unwrap().contacts()[0];
        assert_relative_eq!(
            Point3::new(0.0, 0.0, 0.45) + normal.offsets()[1],
            contact.world_position[1],
            epsilon = 1e-9
        );

        let friction = scene.manager.constraint(rows[0].friction[0]).unwrap();
        let friction = friction.as_friction().unwrap();
        assert_eq!(friction.normal(), rows[0].normal);
        assert_relative_eq!(friction.coefficient(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_disjoint_removes_constraints() {
        let mut scene = Scene::new();
        scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        let (_, cube) = scene.add_box(cube_at(0.45), Vector3::repeat(0.5));
        scene.step_collision();
        assert!(!scene.manager.is_empty());

        scene
            .world
            .set_collider_pose(cube, Pose::from_position(Point3::new(0.0, 0.0, 3.0)))
            .unwrap();
        scene.step_collision();
        assert!(scene.manager.is_empty());
        assert!(scene.contacts.is_empty());
    }

    #[test]
    fn test_repeated_events_reuse_constraints() {
        let mut scene = Scene::new();
        scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        let (_, cube) = scene.add_box(cube_at(0.45), Vector3::repeat(0.5));
        scene.step_collision();
        let ids: Vec<_> = scene.manager.constraints().map(|(id, _)| id).collect();

        // Far enough to replace the contact point.
        scene
            .world
            .set_collider_pose(cube, Pose::from_position(Point3::new(0.3, 0.0, 0.44)))
            .unwrap();
        assert_eq!(scene.step_collision().len(), 1);
        let again: Vec<_> = scene.manager.constraints().map(|(id, _)| id).collect();
        assert_eq!(ids[..3], again[..3]);
    }

    #[test]
    fn test_immovable_pairs_are_skipped() {
        let mut scene = Scene::new();
        scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        scene.add_box(
            RigidBody::immovable(Pose::from_position(Point3::new(0.0, 0.0, 0.45))),
            Vector3::repeat(0.5),
        );
        scene.step_collision();
        assert_eq!(scene.world.manifolds().count(), 1);
        assert!(scene.manager.is_empty());
        assert!(scene.contacts.is_empty());
    }

    #[test]
    fn test_unknown_bodies_are_skipped() {
        let mut scene = Scene::new();
        scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        let (cube_body, _) = scene.add_box(cube_at(0.45), Vector3::repeat(0.5));
        scene.bodies.remove(cube_body).unwrap();

        scene.step_collision();
        assert!(scene.manager.is_empty());
        assert!(scene.contacts.is_empty());
    }

    #[test]
    fn test_remove_pair() {
        let mut scene = Scene::new();
        let (_, floor_collider) = scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        let (_, cube_collider) = scene.add_box(cube_at(0.45), Vector3::repeat(0.5));
        scene.step_collision();

        let (_, pairs) = scene.world.remove_collider(cube_collider).unwrap();
        assert_eq!(pairs, vec![ColliderPair::new(floor_collider, cube_collider)]);
        for pair in &pairs {
            scene
                .contacts
                .remove_pair(pair, &mut scene.bodies, &mut scene.manager);
        }
        assert!(scene.manager.is_empty());
        assert_eq!(scene.manager.body_count(), 0);
    }

    #[test]
    fn test_remove_pair_after_rows_are_gone() {
        let mut scene = Scene::new();
        let (_, floor_collider) = scene.add_box(floor(), Vector3::new(5.0, 5.0, 0.5));
        let (cube_body, cube_collider) = scene.add_box(cube_at(0.45), Vector3::repeat(0.5));
        scene.step_collision();

        // The body goes first and takes its constraints with it.
        let removed = scene.manager.remove_rigid_body(cube_body, &mut scene.bodies);
        assert!(!removed.is_empty());
        assert!(scene.manager.is_empty());

        let pair = ColliderPair::new(floor_collider, cube_collider);
        scene
            .contacts
            .remove_pair(&pair, &mut scene.bodies, &mut scene.manager);
        assert!(scene.contacts.is_empty());
        assert!(scene.manager.is_empty());
    }
}
