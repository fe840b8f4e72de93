//! The collision world: colliders, manifolds and collision events.

use std::collections::{BTreeMap, BTreeSet};

use sim_types::{Arena, ColliderId, CollisionConfig, Pose, Result, SimError};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    CoarseCollisionDetector, Collider, ColliderPair, FineCollisionDetector, Manifold,
    ManifoldState,
};

/// Whether a pair started or stopped touching, or changed while touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionEventKind {
    /// The pair intersects and its manifold changed.
    Intersecting,
    /// The pair no longer intersects.
    Disjoint,
}

/// Notification emitted by [`CollisionWorld::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionEvent {
    /// The colliders involved.
    pub pair: ColliderPair,
    /// New state of the pair.
    pub kind: CollisionEventKind,
}

/// Owns colliders and the manifolds between them.
///
/// Manifolds are kept in a sorted map, so updates and events follow pair
/// order and are reproducible. Slots of removed colliders are reused under
/// fresh ids.
#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    colliders: Arena<Collider>,
    manifolds: BTreeMap<ColliderPair, Manifold>,
    coarse: CoarseCollisionDetector,
    fine: FineCollisionDetector,
}

impl CollisionWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            colliders: Arena::new(),
            manifolds: BTreeMap::new(),
            coarse: CoarseCollisionDetector::new(),
            fine: FineCollisionDetector::new(config),
        }
    }

    /// Use a custom broad phase.
    #[must_use]
    pub fn with_broad_phase(mut self, coarse: CoarseCollisionDetector) -> Self {
        self.coarse = coarse;
        self
    }

    /// Add a collider and return its id.
    pub fn add_collider(&mut self, collider: Collider) -> ColliderId {
        let id = ColliderId::new(self.colliders.insert(collider));
        debug!(%id, "added collider");
        id
    }

    /// Remove a collider together with its manifolds.
    ///
    /// Returns the collider and the pairs whose manifolds were dropped.
    pub fn remove_collider(&mut self, id: ColliderId) -> Result<(Collider, Vec<ColliderPair>)> {
        let collider = self
            .colliders
            .remove(id.raw())
            .ok_or(SimError::InvalidColliderId(id.raw()))?;

        let pairs: Vec<_> = self
            .manifolds
            .keys()
            .filter(|pair| pair.contains(id))
            .copied()
            .collect();
        for pair in &pairs {
            self.manifolds.remove(pair);
        }
        debug!(%id, manifolds = pairs.len(), "removed collider");
        Ok((collider, pairs))
    }

    /// Get a collider.
    #[must_use]
    pub fn collider(&self, id: ColliderId) -> Option<&Collider> {
        self.colliders.get(id.raw())
    }

    /// Get a collider mutably.
    pub fn collider_mut(&mut self, id: ColliderId) -> Option<&mut Collider> {
        self.colliders.get_mut(id.raw())
    }

    /// Move a collider.
    pub fn set_collider_pose(&mut self, id: ColliderId, pose: Pose) -> Result<()> {
        self.collider_mut(id)
            .ok_or(SimError::InvalidColliderId(id.raw()))?
            .set_transforms(pose);
        Ok(())
    }

    /// Iterate over live colliders.
    pub fn colliders(&self) -> impl Iterator<Item = (ColliderId, &Collider)> {
        self.colliders
            .iter()
            .map(|(raw, collider)| (ColliderId::new(raw), collider))
    }

    /// Manifold of a pair, if the pair is tracked.
    #[must_use]
    pub fn manifold(&self, pair: &ColliderPair) -> Option<&Manifold> {
        self.manifolds.get(pair)
    }

    /// Tracked manifolds in pair order.
    pub fn manifolds(&self) -> impl Iterator<Item = (&ColliderPair, &Manifold)> {
        self.manifolds.iter()
    }

    /// Run the broad and narrow phases and report every changed pair.
    pub fn update(&mut self) -> Vec<CollisionEvent> {
        let before = self.manifolds.len();
        self.manifolds.retain(|_, manifold| manifold.is_intersecting());
        if self.manifolds.len() != before {
            debug!(removed = before - self.manifolds.len(), "dropped disjoint manifolds");
        }
        for manifold in self.manifolds.values_mut() {
            manifold.set_state(ManifoldState::Updated, false);
        }

        let candidates = self.coarse.collect(self.colliders());

        for pair in &candidates {
            let (Some(c1), Some(c2)) = (
                self.colliders.get(pair.first().raw()),
                self.colliders.get(pair.second().raw()),
            ) else {
                continue;
            };
            if let Some(manifold) = self.manifolds.get_mut(pair) {
                self.fine.collide(manifold, c1, c2);
            } else {
                let mut manifold = Manifold::new();
                if self.fine.collide(&mut manifold, c1, c2) {
                    debug!(%pair, contacts = manifold.contacts().len(), "new manifold");
                    self.manifolds.insert(*pair, manifold);
                }
            }
        }

        let stale: BTreeSet<_> = self
            .manifolds
            .keys()
            .filter(|pair| !candidates.contains(pair))
            .copied()
            .collect();
        for pair in &stale {
            if let Some(manifold) = self.manifolds.get_mut(pair) {
                manifold.set_disjoint();
            }
        }

        let events: Vec<_> = self
            .manifolds
            .iter()
            .filter(|(_, manifold)| manifold.is_updated())
            .map(|(pair, manifold)| CollisionEvent {
                pair: *pair,
                kind: if manifold.is_intersecting() {
                    CollisionEventKind::Intersecting
                } else {
                    CollisionEventKind::Disjoint
                },
            })
            .collect();

        for (_, collider) in self.colliders.iter_mut() {
            collider.clear_updated();
        }
        events
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::ConvexShape;
    use nalgebra::{Point3, Vector3};

    fn cube_at(z: f64) -> Collider {
        Collider::convex(ConvexShape::bounding_box(Vector3::repeat(0.5)))
            .unwrap()
            .with_pose(Pose::from_position(Point3::new(0.0, 0.0, z)))
    }

    fn ball_at(x: f64, y: f64, z: f64) -> Collider {
        Collider::convex(ConvexShape::sphere(0.5))
            .unwrap()
            .with_pose(Pose::from_position(Point3::new(x, y, z)))
    }

    fn event_kinds(events: &[CollisionEvent]) -> Vec<CollisionEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_event_lifecycle() {
        let mut world = CollisionWorld::new(&CollisionConfig::default());
        let floor = world.add_collider(cube_at(0.0));
        let ball = world.add_collider(ball_at(0.0, 0.0, 0.9));
        let pair = ColliderPair::new(floor, ball);

        let events = world.update();
        assert_eq!(events, vec![CollisionEvent {
            pair,
            kind: CollisionEventKind::Intersecting
        }]);
        assert_eq!(world.manifold(&pair).unwrap().contacts().len(), 1);

        // Nothing moved: no events, manifold kept.
        assert!(world.update().is_empty());
        assert!(world.manifold(&pair).unwrap().is_intersecting());

        // Off the corner: the boxes still overlap, the shapes do not.
        world
            .set_collider_pose(ball, Pose::from_position(Point3::new(0.9, 0.9, 0.9)))
            .unwrap();
        assert_eq!(event_kinds(&world.update()), vec![CollisionEventKind::Disjoint]);

        // The disjoint manifold is dropped on the next update.
        assert!(world.update().is_empty());
        assert!(world.manifold(&pair).is_none());
    }

    #[test]
    fn test_resting_pair_reports_once() {
        let mut world = CollisionWorld::new(&CollisionConfig::default());
        world.add_collider(cube_at(0.0));
        let ball = world.add_collider(ball_at(0.0, 0.0, 0.9));
        assert_eq!(world.update().len(), 1);

        // Re-posing in place flags the collider as moved every update.
        for _ in 0..10 {
            world
                .set_collider_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 0.9)))
                .unwrap();
            assert!(world.update().is_empty());
        }
    }

    #[test]
    fn test_leaving_broad_phase_emits_disjoint() {
        let mut world = CollisionWorld::new(&CollisionConfig::default());
        world.add_collider(cube_at(0.0));
        let cube = world.add_collider(cube_at(0.9));
        world.update();

        world
            .set_collider_pose(cube, Pose::from_position(Point3::new(0.0, 0.0, 5.0)))
            .unwrap();
        assert_eq!(event_kinds(&world.update()), vec![CollisionEventKind::Disjoint]);
        assert!(world.update().is_empty());
        assert_eq!(world.manifolds().count(), 0);
    }

    #[test]
    fn test_broad_phase_only_pairs_create_no_manifold() {
        let mut world = CollisionWorld::new(&CollisionConfig::default());
        world.add_collider(cube_at(0.0));
        world.add_collider(ball_at(0.9, 0.9, 0.0));
        assert!(world.update().is_empty());
        assert_eq!(world.manifolds().count(), 0);
    }

    #[test]
    fn test_remove_collider_drops_manifolds() {
        let mut world = CollisionWorld::new(&CollisionConfig::default());
        let floor = world.add_collider(cube_at(0.0));
        let cube = world.add_collider(cube_at(0.9));
        world.update();

        let (_, pairs) = world.remove_collider(cube).unwrap();
        assert_eq!(pairs, vec![ColliderPair::new(floor, cube)]);
        assert_eq!(world.manifolds().count(), 0);
        assert!(world.collider(cube).is_none());
        assert!(world.remove_collider(cube).unwrap_err().is_invalid_id());
        assert!(world.update().is_empty());
    }

    #[test]
    fn test_collider_churn_reuses_slots() {
        let mut world = CollisionWorld::new(&CollisionConfig::default());
        let floor = world.add_collider(cube_at(0.0));
        let mut previous = world.add_collider(cube_at(0.9));
        world.update();

        for _ in 0..500 {
            world.remove_collider(previous).unwrap();
            let next = world.add_collider(cube_at(0.9));
            assert_ne!(next, previous);
            assert!(world.collider(previous).is_none());
            previous = next;
            world.update();
        }

        assert_eq!(world.colliders.capacity(), 2);
        assert_eq!(world.colliders().count(), 2);
        assert!(world.collider(floor).is_some());
        assert_eq!(world.manifolds().count(), 1);
        assert!(world.manifold(&ColliderPair::new(floor, previous)).is_some());
    }
}
