//! Fine collision detection and manifold maintenance.
//!
//! Every candidate pair from the broad phase is reduced to convex part
//! pairs, each tested with GJK and resolved with EPA:
//!
//! ```text
//! convex  × convex   ──► one GJK/EPA test
//! convex  × concave  ──► parts of the concave side overlapping the convex AABB
//! concave × concave  ──► parts × parts with overlapping AABBs
//! ```
//!
//! The resulting contacts are merged into the pair's persistent
//! [`Manifold`].

use sim_types::CollisionConfig;
use tracing::trace;

use crate::{
    Collider, ColliderGeometry, Contact, ConvexCollider, Epa, Gjk, Manifold, ManifoldState,
};

/// Narrow phase: updates contact manifolds of candidate pairs.
#[derive(Debug, Clone)]
pub struct FineCollisionDetector {
    gjk: Gjk,
    epa: Epa,
    separation: f64,
}

impl Default for FineCollisionDetector {
    fn default() -> Self {
        Self::new(&CollisionConfig::default())
    }
}

impl FineCollisionDetector {
    /// Create a detector from the collision tolerances.
    #[must_use]
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            gjk: Gjk::new(config),
            epa: Epa::new(config),
            separation: config.contact_separation,
        }
    }

    /// Contact between two convex colliders, if they overlap.
    #[must_use]
    pub fn contact(&self, c1: &ConvexCollider, c2: &ConvexCollider) -> Option<Contact> {
        let simplex = self.gjk.calculate(c1, c2)?;
        self.epa.calculate(c1, c2, &simplex)
    }

    /// Update `manifold` for the pair `(c1, c2)` and report whether they
    /// intersect.
    ///
    /// Contact normals point from `c1` to `c2`, and local positions are
    /// expressed in the frames of `c1` and `c2` even when a contact comes
    /// from a concave part. A pair where neither collider moved keeps its
    /// manifold untouched.
    ///
    /// The manifold is marked [`ManifoldState::Updated`] only when the pair
    /// starts or stops intersecting, or when a contact is added or pruned.
    pub fn collide(&self, manifold: &mut Manifold, c1: &Collider, c2: &Collider) -> bool {
        if !c1.is_updated() && !c2.is_updated() {
            return manifold.is_intersecting();
        }

        let was_intersecting = manifold.is_intersecting();
        let poses = [c1.pose(), c2.pose()];
        let mut intersecting = false;
        let mut changed = false;
        let mut test = |a: &ConvexCollider, b: &ConvexCollider| {
            let Some(mut contact) = self.contact(a, b) else {
                return;
            };
            if !intersecting {
                changed |= manifold.prune(poses, self.separation);
                intersecting = true;
            }
            contact.local_position = [
                poses[0].inverse_transform_point(&contact.world_position[0]),
                poses[1].inverse_transform_point(&contact.world_position[1]),
            ];
            trace!(
                penetration = contact.penetration,
                normal = ?contact.normal,
                "contact found"
            );
            changed |= manifold.add_contact(contact, self.separation);
        };

        match (c1.geometry(), c2.geometry()) {
            (ColliderGeometry::Convex(a), ColliderGeometry::Convex(b)) => test(a, b),
            (ColliderGeometry::Convex(a), ColliderGeometry::Concave(b)) => {
                for part in b.overlapping_parts(a.aabb()) {
                    test(a, &part);
                }
            }
            (ColliderGeometry::Concave(a), ColliderGeometry::Convex(b)) => {
                for part in a.overlapping_parts(b.aabb()) {
                    test(&part, b);
                }
            }
            (ColliderGeometry::Concave(a), ColliderGeometry::Concave(b)) => {
                let parts_a = a.overlapping_parts(b.aabb());
                let parts_b = b.overlapping_parts(a.aabb());
                for part_a in &parts_a {
                    for part_b in &parts_b {
                        if part_a.aabb().overlaps(part_b.aabb()) {
                            test(part_a, part_b);
                        }
                    }
                }
            }
        }

        if intersecting {
            manifold.set_state(ManifoldState::Intersecting, true);
            if changed || !was_intersecting {
                manifold.set_state(ManifoldState::Updated, true);
            }
        } else if was_intersecting || !manifold.contacts().is_empty() {
            manifold.set_disjoint();
        }
        intersecting
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{CompositeCollider, ConvexShape, MAX_CONTACTS, TerrainCollider};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use sim_types::Pose;

    fn cube_at(x: f64, y: f64, z: f64) -> Collider {
        Collider::convex(ConvexShape::bounding_box(Vector3::repeat(0.5)))
            .unwrap()
            .with_pose(Pose::from_position(Point3::new(x, y, z)))
    }

    fn floor() -> Collider {
        Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))
            .unwrap()
            .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5)))
    }

    #[test]
    fn test_convex_pair_contact() {
        let detector = FineCollisionDetector::default();
        let mut manifold = Manifold::new();
        let floor = floor();
        let cube = cube_at(0.0, 0.0, 0.45);

        assert!(detector.collide(&mut manifold, &floor, &cube));
        assert!(manifold.is_intersecting());
        assert!(manifold.is_updated());
        assert_eq!(manifold.contacts().len(), 1);

        let contact = manifold.contacts()[0];
        assert_relative_eq!(contact.normal, Vector3::z(), epsilon = 1e-6);
        assert_relative_eq!(contact.penetration, 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_disjoint_pair_clears_manifold() {
        let detector = FineCollisionDetector::default();
        let mut manifold = Manifold::new();
        let floor = floor();

        assert!(detector.collide(&mut manifold, &floor, &cube_at(0.0, 0.0, 0.45)));
        assert!(!detector.collide(&mut manifold, &floor, &cube_at(0.0, 0.0, 0.7)));
        assert!(manifold.contacts().is_empty());
        assert!(!manifold.is_intersecting());
        assert!(manifold.is_updated());
    }

    #[test]
    fn test_unmoved_pair_keeps_state() {
        let detector = FineCollisionDetector::default();
        let mut manifold = Manifold::new();
        let mut floor = floor();
        let mut cube = cube_at(0.0, 0.0, 0.45);
        assert!(detector.collide(&mut manifold, &floor, &cube));

        floor.clear_updated();
        cube.clear_updated();
        manifold.set_state(ManifoldState::Updated, false);

        assert!(detector.collide(&mut manifold, &floor, &cube));
        assert!(!manifold.is_updated());
        assert_eq!(manifold.contacts().len(), 1);
    }

    #[test]
    fn test_refreshed_contacts_do_not_mark_updated() {
        let detector = FineCollisionDetector::default();
        let mut manifold = Manifold::new();
        let floor = floor();
        let cube = cube_at(0.0, 0.0, 0.45);
        assert!(detector.collide(&mut manifold, &floor, &cube));
        let contacts = manifold.contacts().len();

        // Same poses, both colliders still flagged as moved.
        for _ in 0..5 {
            manifold.set_state(ManifoldState::Updated, false);
            assert!(detector.collide(&mut manifold, &floor, &cube));
            assert!(!manifold.is_updated());
            assert_eq!(manifold.contacts().len(), contacts);
        }

        // A slide far enough to strand the old points changes the manifold.
        manifold.set_state(ManifoldState::Updated, false);
        assert!(detector.collide(&mut manifold, &floor, &cube_at(1.0, 0.0, 0.45)));
        assert!(manifold.is_updated());
    }

    #[test]
    fn test_disjoint_pair_never_intersected_stays_quiet() {
        let detector = FineCollisionDetector::default();
        let mut manifold = Manifold::new();
        assert!(!detector.collide(&mut manifold, &floor(), &cube_at(0.0, 0.0, 3.0)));
        assert!(!manifold.is_updated());
    }

    #[test]
    fn test_contacts_persist_while_resting() {
        let detector = FineCollisionDetector::default();
        let mut manifold = Manifold::new();
        let floor = floor();

        // Tilt the cube slightly so that EPA lands on different corners as it
        // settles.
        for step in 0..8 {
            let angle = if step % 2 == 0 { 0.02 } else { -0.02 };
            let cube = Collider::convex(ConvexShape::bounding_box(Vector3::repeat(0.5)))
                .unwrap()
                .with_pose(Pose::from_position_rotation(
                    Point3::new(0.0, 0.0, 0.45),
                    nalgebra::UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle),
                ));
            assert!(detector.collide(&mut manifold, &floor, &cube));
            assert!(!manifold.contacts().is_empty());
            assert!(manifold.contacts().len() <= MAX_CONTACTS);
        }
    }

    #[test]
    fn test_convex_against_terrain() {
        let detector = FineCollisionDetector::default();
        let terrain = Collider::terrain(
            TerrainCollider::flat(5, 5, Vector3::new(10.0, 10.0, 1.0)).unwrap(),
        );
        let sphere = Collider::convex(ConvexShape::sphere(0.5))
            .unwrap()
            .with_pose(Pose::from_position(Point3::new(1.2, 0.7, 0.4)));

        let mut manifold = Manifold::new();
        assert!(detector.collide(&mut manifold, &sphere, &terrain));
        let contact = manifold.contacts()[0];
        assert_relative_eq!(contact.penetration, 0.1, epsilon = 1e-2);
        // Normal points from the sphere down into the terrain.
        assert!(contact.normal.z < -0.9);

        let mut reversed = Manifold::new();
        assert!(detector.collide(&mut reversed, &terrain, &sphere));
        assert!(reversed.contacts()[0].normal.z > 0.9);
    }

    #[test]
    fn test_local_positions_use_top_level_frame() {
        let detector = FineCollisionDetector::default();
        let composite = CompositeCollider::new(vec![(
            Pose::from_position(Point3::new(2.0, 0.0, 0.0)),
            ConvexShape::bounding_box(Vector3::repeat(0.5)),
        )])
        .unwrap();
        let composite = Collider::composite(composite)
            .with_pose(Pose::from_position(Point3::new(0.0, 0.0, 1.0)));
        let cube = cube_at(2.0, 0.0, 0.1);

        let mut manifold = Manifold::new();
        assert!(detector.collide(&mut manifold, &composite, &cube));
        for contact in manifold.contacts() {
            assert_relative_eq!(
                composite.pose().transform_point(&contact.local_position[0]),
                contact.world_position[0],
                epsilon = 1e-9
            );
            // Local x is measured from the composite origin, not the part.
            assert!(contact.local_position[0].x > 1.0);
        }
    }

    #[test]
    fn test_composite_against_composite() {
        let detector = FineCollisionDetector::default();
        let make = |x: f64| {
            Collider::composite(
                CompositeCollider::new(vec![
                    (
                        Pose::from_position(Point3::new(-1.0, 0.0, 0.0)),
                        ConvexShape::sphere(0.5),
                    ),
                    (
                        Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
                        ConvexShape::sphere(0.5),
                    ),
                ])
                .unwrap(),
            )
            .with_pose(Pose::from_position(Point3::new(x, 0.0, 0.0)))
        };

        let mut manifold = Manifold::new();
        assert!(detector.collide(&mut manifold, &make(0.0), &make(2.1)));
        assert_eq!(manifold.contacts().len(), 1);
        assert!(manifold.contacts()[0].normal.x > 0.9);

        assert!(!detector.collide(&mut manifold, &make(0.0), &make(4.1)));
    }
}
