//! Convex shapes and their support mappings.
//!
//! Every convex shape answers one question: which of its points lies
//! furthest along a direction. GJK and EPA are built entirely on top of
//! that support mapping.

use nalgebra::{Point3, Vector3};
use sim_types::{Pose, Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Aabb;

/// Tolerance below which a direction is treated as zero.
const DIRECTION_EPSILON: f64 = 1e-12;

/// Convex shape described in its own local frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConvexShape {
    /// Box centered at the origin.
    BoundingBox {
        /// Half-extents along each local axis.
        half_extents: Vector3<f64>,
    },
    /// Sphere centered at the origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Capsule along the local Z axis.
    Capsule {
        /// Radius of the hemispherical caps and the cylinder.
        radius: f64,
        /// Half-length of the segment between the cap centers.
        half_length: f64,
    },
    /// Single triangle (zero thickness).
    Triangle {
        /// The three corners.
        vertices: [Point3<f64>; 3],
    },
    /// Convex hull of a point cloud.
    ConvexPolyhedron {
        /// Hull vertices; interior points are harmless.
        vertices: Vec<Point3<f64>>,
    },
}

impl ConvexShape {
    /// Box with the given half-extents.
    #[must_use]
    pub fn bounding_box(half_extents: Vector3<f64>) -> Self {
        Self::BoundingBox { half_extents }
    }

    /// Sphere with the given radius.
    #[must_use]
    pub fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Capsule along local Z.
    #[must_use]
    pub fn capsule(radius: f64, half_length: f64) -> Self {
        Self::Capsule {
            radius,
            half_length,
        }
    }

    /// Triangle from three corners.
    #[must_use]
    pub fn triangle(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self::Triangle {
            vertices: [a, b, c],
        }
    }

    /// Convex polyhedron from its vertices.
    #[must_use]
    pub fn convex_polyhedron(vertices: Vec<Point3<f64>>) -> Self {
        Self::ConvexPolyhedron { vertices }
    }

    /// Check that the shape has a usable, finite description.
    pub fn validate(&self) -> Result<()> {
        let finite = |p: &Point3<f64>| p.iter().all(|x| x.is_finite());
        match self {
            Self::BoundingBox { half_extents } => {
                if half_extents.iter().all(|&h| h.is_finite() && h > 0.0) {
                    Ok(())
                } else {
                    Err(SimError::invalid_shape(
                        "box half-extents must be positive and finite",
                    ))
                }
            }
            Self::Sphere { radius } => {
                if radius.is_finite() && *radius > 0.0 {
                    Ok(())
                } else {
                    Err(SimError::invalid_shape("sphere radius must be positive"))
                }
            }
            Self::Capsule {
                radius,
                half_length,
            } => {
                if radius.is_finite() && *radius > 0.0 && half_length.is_finite() && *half_length >= 0.0
                {
                    Ok(())
                } else {
                    Err(SimError::invalid_shape(
                        "capsule needs a positive radius and a non-negative half-length",
                    ))
                }
            }
            Self::Triangle { vertices } => {
                if !vertices.iter().all(finite) {
                    return Err(SimError::invalid_shape("triangle vertices must be finite"));
                }
                let [a, b, c] = vertices;
                if (b - a).cross(&(c - a)).norm() <= DIRECTION_EPSILON {
                    return Err(SimError::invalid_shape("triangle has zero area"));
                }
                Ok(())
            }
            Self::ConvexPolyhedron { vertices } => {
                if vertices.is_empty() {
                    Err(SimError::invalid_shape("convex polyhedron has no vertices"))
                } else if !vertices.iter().all(finite) {
                    Err(SimError::invalid_shape("polyhedron vertices must be finite"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Furthest point along a direction, both given in local coordinates.
    #[must_use]
    pub fn local_support(&self, direction: &Vector3<f64>) -> Point3<f64> {
        match self {
            Self::BoundingBox { half_extents } => Point3::new(
                half_extents.x.copysign(direction.x),
                half_extents.y.copysign(direction.y),
                half_extents.z.copysign(direction.z),
            ),
            Self::Sphere { radius } => Point3::from(unit_or_zero(direction) * *radius),
            Self::Capsule {
                radius,
                half_length,
            } => {
                let cap = Point3::new(0.0, 0.0, half_length.copysign(direction.z));
                cap + unit_or_zero(direction) * *radius
            }
            Self::Triangle { vertices } => furthest_vertex(vertices, direction),
            Self::ConvexPolyhedron { vertices } => furthest_vertex(vertices, direction),
        }
    }

    /// Bounding box in local coordinates.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        match self {
            Self::BoundingBox { half_extents } => Aabb::from_center(Point3::origin(), *half_extents),
            Self::Sphere { radius } => {
                Aabb::from_center(Point3::origin(), Vector3::repeat(*radius))
            }
            Self::Capsule {
                radius,
                half_length,
            } => Aabb::from_center(
                Point3::origin(),
                Vector3::new(*radius, *radius, half_length + radius),
            ),
            Self::Triangle { vertices } => Aabb::from_points(vertices.iter()).unwrap_or_default(),
            Self::ConvexPolyhedron { vertices } => {
                Aabb::from_points(vertices.iter()).unwrap_or_default()
            }
        }
    }

    /// Bounding box of the shape placed at `pose`.
    ///
    /// Boxes, triangles and polyhedra are bounded through their transformed
    /// vertices; round shapes through their rotation-invariant extents.
    #[must_use]
    pub fn world_aabb(&self, pose: &Pose) -> Aabb {
        match self {
            Self::BoundingBox { .. } => self.local_aabb().transformed(pose),
            Self::Sphere { radius } => Aabb::from_center(pose.position, Vector3::repeat(*radius)),
            Self::Capsule {
                radius,
                half_length,
            } => {
                let axis = pose.transform_vector(&Vector3::new(0.0, 0.0, *half_length));
                let a = Aabb::from_center(pose.position + axis, Vector3::repeat(*radius));
                let b = Aabb::from_center(pose.position - axis, Vector3::repeat(*radius));
                a.merged(&b)
            }
            Self::Triangle { vertices } => {
                let world = vertices.map(|v| pose.transform_point(&v));
                Aabb::from_points(world.iter()).unwrap_or_default()
            }
            Self::ConvexPolyhedron { vertices } => {
                let world: Vec<_> = vertices.iter().map(|v| pose.transform_point(v)).collect();
                Aabb::from_points(world.iter()).unwrap_or_default()
            }
        }
    }
}

fn unit_or_zero(direction: &Vector3<f64>) -> Vector3<f64> {
    direction
        .try_normalize(DIRECTION_EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

fn furthest_vertex(vertices: &[Point3<f64>], direction: &Vector3<f64>) -> Point3<f64> {
    let mut best = Point3::origin();
    let mut best_dot = f64::NEG_INFINITY;
    for vertex in vertices {
        let dot = vertex.coords.dot(direction);
        if dot > best_dot {
            best_dot = dot;
            best = *vertex;
        }
    }
    best
}

/// A convex shape placed in the world.
///
/// Caches its pose and world AABB; both are refreshed by
/// [`ConvexCollider::set_transforms`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvexCollider {
    shape: ConvexShape,
    pose: Pose,
    aabb: Aabb,
}

impl ConvexCollider {
    /// Create a collider at the identity pose.
    pub fn new(shape: ConvexShape) -> Result<Self> {
        shape.validate()?;
        Ok(Self::at(shape, Pose::identity()))
    }

    /// Create a collider at a pose without validating the shape.
    pub(crate) fn at(shape: ConvexShape, pose: Pose) -> Self {
        let aabb = shape.world_aabb(&pose);
        Self { shape, pose, aabb }
    }

    /// Local shape description.
    #[must_use]
    pub fn shape(&self) -> &ConvexShape {
        &self.shape
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

    /// Move the collider and recompute its bounding box.
    pub fn set_transforms(&mut self, pose: Pose) {
        self.pose = pose;
        self.aabb = self.shape.world_aabb(&self.pose);
    }

    /// Furthest point along a world direction, returned as `(world, local)`.
    #[must_use]
    pub fn furthest_point_in_direction(
        &self,
        direction: &Vector3<f64>,
    ) -> (Point3<f64>, Point3<f64>) {
        let local_direction = self.pose.inverse_transform_vector(direction);
        let local = self.shape.local_support(&local_direction);
        (self.pose.transform_point(&local), local)
    }
}
