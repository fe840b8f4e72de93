//! Broad-phase collision detection.
//!
//! Reduces the set of collider pairs handed to the narrow phase to those
//! whose world AABBs overlap. The scan is a plain O(n²) sweep over all
//! unordered pairs, which is the right trade-off for the scene sizes this
//! world targets.

use std::collections::BTreeSet;

use sim_types::ColliderId;

use crate::{Collider, ColliderPair};

/// Brute-force AABB broad phase.
///
/// Colliders attached to the same body never form a pair.
#[derive(Debug, Clone, Default)]
pub struct CoarseCollisionDetector {
    /// Margin for AABB expansion.
    margin: f64,
}

impl CoarseCollisionDetector {
    /// Create a broad phase without margin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a predictive margin.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Candidate pairs whose bounding boxes overlap.
    pub fn collect<'a>(
        &self,
        colliders: impl IntoIterator<Item = (ColliderId, &'a Collider)>,
    ) -> BTreeSet<ColliderPair> {
        let boxes: Vec<_> = colliders
            .into_iter()
            .map(|(id, collider)| {
                let aabb = if self.margin > 0.0 {
                    collider.aabb().expanded(self.margin)
                } else {
                    *collider.aabb()
                };
                (id, collider.body(), aabb)
            })
            .collect();

        let mut pairs = BTreeSet::new();
        for (i, (id_a, body_a, aabb_a)) in boxes.iter().enumerate() {
            for (id_b, body_b, aabb_b) in &boxes[i + 1..] {
                if body_a.is_some() && body_a == body_b {
                    continue;
                }
                if aabb_a.overlaps(aabb_b) {
                    pairs.insert(ColliderPair::new(*id_a, *id_b));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::ConvexShape;
    use nalgebra::Point3;
    use proptest::prelude::*;
    use sim_types::{BodyId, Pose};

    fn sphere_at(x: f64, y: f64, z: f64) -> Collider {
        Collider::convex(ConvexShape::sphere(0.5))
            .unwrap()
            .with_pose(Pose::from_position(Point3::new(x, y, z)))
    }

    fn ids(n: u64) -> impl Iterator<Item = ColliderId> {
        (0..n).map(ColliderId::new)
    }

    #[test]
    fn test_overlapping_pairs() {
        let colliders = [
            sphere_at(0.0, 0.0, 0.0),
            sphere_at(0.9, 0.0, 0.0),
            sphere_at(5.0, 0.0, 0.0),
            // Touching the first one exactly.
            sphere_at(-0.5, 0.0, -1.0),
        ];
        let pairs = CoarseCollisionDetector::new().collect(ids(4).zip(colliders.iter()));

        let expected: BTreeSet<_> = [
            ColliderPair::new(ColliderId::new(0), ColliderId::new(1)),
            ColliderPair::new(ColliderId::new(0), ColliderId::new(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_margin_adds_pairs() {
        let colliders = [sphere_at(0.0, 0.0, 0.0), sphere_at(1.1, 0.0, 0.0)];
        assert!(
            CoarseCollisionDetector::new()
                .collect(ids(2).zip(colliders.iter()))
                .is_empty()
        );
        assert_eq!(
            CoarseCollisionDetector::new()
                .with_margin(0.1)
                .collect(ids(2).zip(colliders.iter()))
                .len(),
            1
        );
    }

    #[test]
    fn test_same_body_is_skipped() {
        let body = BodyId::new(1);
        let colliders = [
            sphere_at(0.0, 0.0, 0.0).with_body(body),
            sphere_at(0.5, 0.0, 0.0).with_body(body),
            sphere_at(0.5, 0.5, 0.0),
        ];
        let pairs = CoarseCollisionDetector::new().collect(ids(3).zip(colliders.iter()));
        assert_eq!(pairs.len(), 2);
        assert!(!pairs.contains(&ColliderPair::new(ColliderId::new(0), ColliderId::new(1))));
    }

    proptest! {
        #[test]
        fn prop_pairs_match_aabb_overlap(
            centers in prop::collection::vec((-3.0f64..3.0, -3.0f64..3.0, -3.0f64..3.0), 0..12)
        ) {
            let colliders: Vec<_> = centers.iter().map(|&(x, y, z)| sphere_at(x, y, z)).collect();
            let items: Vec<_> = ids(colliders.len() as u64).zip(colliders.iter()).collect();
            let forward = CoarseCollisionDetector::new().collect(items.iter().copied());
            let backward = CoarseCollisionDetector::new().collect(items.iter().rev().copied());

            prop_assert_eq!(&forward, &backward);
            for (i, a) in colliders.iter().enumerate() {
                for (j, b) in colliders.iter().enumerate().skip(i + 1) {
                    let pair = ColliderPair::new(ColliderId::new(i as u64), ColliderId::new(j as u64));
                    prop_assert_eq!(forward.contains(&pair), a.aabb().overlaps(b.aabb()));
                }
            }
        }
    }
}
