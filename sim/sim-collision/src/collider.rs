//! Colliders tracked by the collision world.
//!
//! A [`Collider`] is either a single convex shape or a concave shape that
//! is split into convex parts on demand:
//!
//! ```text
//! Collider
//!   ├── Convex(ConvexCollider)          one shape, tested directly
//!   └── Concave(ConcaveCollider)
//!         ├── Terrain(TerrainCollider)  height-field triangles
//!         └── Composite(CompositeCollider)
//!                                       convex shapes at local offsets
//! ```

use nalgebra::Point3;
use sim_types::{BodyId, Pose, Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Aabb, ConvexCollider, ConvexShape, TerrainCollider};

/// Convex shapes rigidly attached to a common frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompositeCollider {
    parts: Vec<(Pose, ConvexShape)>,
    pose: Pose,
    aabb: Aabb,
}

impl CompositeCollider {
    /// Create a composite from `(local pose, shape)` parts.
    pub fn new(parts: Vec<(Pose, ConvexShape)>) -> Result<Self> {
        if parts.is_empty() {
            return Err(SimError::invalid_shape("composite collider has no parts"));
        }
        for (local, shape) in &parts {
            if !local.is_finite() {
                return Err(SimError::invalid_shape("composite part pose must be finite"));
            }
            shape.validate()?;
        }
        let mut composite = Self {
            parts,
            pose: Pose::identity(),
            aabb: Aabb::default(),
        };
        composite.aabb = composite.compute_aabb();
        Ok(composite)
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false; construction rejects empty composites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// World bounding box.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Move the composite and recompute its bounding box.
    pub fn set_transforms(&mut self, pose: Pose) {
        self.pose = pose;
        self.aabb = self.compute_aabb();
    }

    fn compute_aabb(&self) -> Aabb {
        self.parts
            .iter()
            .map(|(local, shape)| shape.world_aabb(&self.pose.compose(local)))
            .reduce(|a, b| a.merged(&b))
            .unwrap_or_default()
    }

    /// Parts whose world bounding box overlaps `aabb`.
    #[must_use]
    pub fn overlapping_parts(&self, aabb: &Aabb) -> Vec<ConvexCollider> {
        self.parts
            .iter()
            .filter_map(|(local, shape)| {
                let part = ConvexCollider::at(shape.clone(), self.pose.compose(local));
                part.aabb().overlaps(aabb).then_some(part)
            })
            .collect()
    }
}

/// A collider made of convex parts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConcaveCollider {
    /// Height-field terrain.
    Terrain(TerrainCollider),
    /// Rigid assembly of convex shapes.
    Composite(CompositeCollider),
}

impl ConcaveCollider {
    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        match self {
            Self::Terrain(terrain) => terrain.pose(),
            Self::Composite(composite) => composite.pose(),
        }
    }

    /// World bounding box.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        match self {
            Self::Terrain(terrain) => terrain.aabb(),
            Self::Composite(composite) => composite.aabb(),
        }
    }

    /// Move the collider.
    pub fn set_transforms(&mut self, pose: Pose) {
        match self {
            Self::Terrain(terrain) => terrain.set_transforms(pose),
            Self::Composite(composite) => composite.set_transforms(pose),
        }
    }

    /// Convex parts overlapping a world bounding box.
    #[must_use]
    pub fn overlapping_parts(&self, aabb: &Aabb) -> Vec<ConvexCollider> {
        match self {
            Self::Terrain(terrain) => terrain.overlapping_parts(aabb),
            Self::Composite(composite) => composite.overlapping_parts(aabb),
        }
    }
}

/// Geometry of a collider.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColliderGeometry {
    /// Single convex shape.
    Convex(ConvexCollider),
    /// Shape decomposed into convex parts.
    Concave(ConcaveCollider),
}

/// A shape in the collision world, optionally attached to a rigid body.
///
/// The `updated` flag records whether the collider moved since the last
/// collision update; the fine detector skips pairs where neither side
/// moved.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Collider {
    geometry: ColliderGeometry,
    body: Option<BodyId>,
    updated: bool,
}

impl Collider {
    fn from_geometry(geometry: ColliderGeometry) -> Self {
        Self {
            geometry,
            body: None,
            updated: true,
        }
    }

    /// Convex collider from a shape.
    pub fn convex(shape: ConvexShape) -> Result<Self> {
        Ok(Self::from_geometry(ColliderGeometry::Convex(
            ConvexCollider::new(shape)?,
        )))
    }

    /// Terrain collider.
    #[must_use]
    pub fn terrain(terrain: TerrainCollider) -> Self {
        Self::from_geometry(ColliderGeometry::Concave(ConcaveCollider::Terrain(terrain)))
    }

    /// Composite collider.
    #[must_use]
    pub fn composite(composite: CompositeCollider) -> Self {
        Self::from_geometry(ColliderGeometry::Concave(ConcaveCollider::Composite(
            composite,
        )))
    }

    /// Attach the collider to a body.
    #[must_use]
    pub fn with_body(mut self, body: BodyId) -> Self {
        self.body = Some(body);
        self
    }

    /// Place the collider at a pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.set_transforms(pose);
        self
    }

    /// Body the collider is attached to.
    #[must_use]
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// Geometry of the collider.
    #[must_use]
    pub fn geometry(&self) -> &ColliderGeometry {
        &self.geometry
    }

    /// Whether the collider is a single convex shape.
    #[must_use]
    pub fn is_convex(&self) -> bool {
        matches!(self.geometry, ColliderGeometry::Convex(_))
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        match &self.geometry {
            ColliderGeometry::Convex(convex) => convex.pose(),
            ColliderGeometry::Concave(concave) => concave.pose(),
        }
    }

    /// World bounding box.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        match &self.geometry {
            ColliderGeometry::Convex(convex) => convex.aabb(),
            ColliderGeometry::Concave(concave) => concave.aabb(),
        }
    }

    /// Move the collider and flag it as updated.
    pub fn set_transforms(&mut self, pose: Pose) {
        match &mut self.geometry {
            ColliderGeometry::Convex(convex) => convex.set_transforms(pose),
            ColliderGeometry::Concave(concave) => concave.set_transforms(pose),
        }
        self.updated = true;
    }

    /// Whether the collider moved since the last collision update.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub(crate) fn clear_updated(&mut self) {
        self.updated = false;
    }

    /// Express a world point in the collider frame.
    #[must_use]
    pub fn to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        self.pose().inverse_transform_point(world)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn dumbbell() -> CompositeCollider {
        CompositeCollider::new(vec![
            (
                Pose::from_position(Point3::new(-2.0, 0.0, 0.0)),
                ConvexShape::sphere(0.5),
            ),
            (
                Pose::from_position(Point3::new(2.0, 0.0, 0.0)),
                ConvexShape::sphere(0.5),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_composite_rejects_empty_and_invalid() {
        assert!(CompositeCollider::new(Vec::new()).is_err());
        assert!(CompositeCollider::new(vec![(Pose::identity(), ConvexShape::sphere(-1.0))]).is_err());
    }

    #[test]
    fn test_composite_aabb_and_parts() {
        let mut composite = dumbbell();
        assert_relative_eq!(composite.aabb().min, Point3::new(-2.5, -0.5, -0.5));
        assert_relative_eq!(composite.aabb().max, Point3::new(2.5, 0.5, 0.5));

        composite.set_transforms(Pose::from_position(Point3::new(0.0, 0.0, 10.0)));
        let query = Aabb::from_center(Point3::new(2.0, 0.0, 10.0), Vector3::repeat(0.1));
        let parts = composite.overlapping_parts(&query);
        assert_eq!(parts.len(), 1);
        assert_relative_eq!(parts[0].pose().position, Point3::new(2.0, 0.0, 10.0));
    }

    #[test]
    fn test_updated_flag() {
        let mut collider = Collider::convex(ConvexShape::sphere(1.0)).unwrap();
        assert!(collider.is_updated());

        collider.clear_updated();
        assert!(!collider.is_updated());

        collider.set_transforms(Pose::from_position(Point3::new(1.0, 2.0, 3.0)));
        assert!(collider.is_updated());
        assert_relative_eq!(collider.aabb().min, Point3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_to_local() {
        let collider = Collider::composite(dumbbell())
            .with_pose(Pose::from_position(Point3::new(1.0, 0.0, 0.0)))
            .with_body(BodyId::new(7));
        assert!(!collider.is_convex());
        assert_eq!(collider.body(), Some(BodyId::new(7)));
        assert_relative_eq!(
            collider.to_local(&Point3::new(3.0, 0.0, 0.0)),
            Point3::new(2.0, 0.0, 0.0)
        );
    }
}
