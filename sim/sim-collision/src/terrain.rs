//! Height-field terrain colliders.
//!
//! The terrain is a regular grid of `x_size × y_size` height samples laid
//! out over the local XY plane and centered on the origin:
//!
//! ```text
//! x = (i / (x_size - 1) - 0.5) * scale.x
//! y = (j / (y_size - 1) - 0.5) * scale.y
//! z = heights[j * x_size + i] * scale.z
//! ```
//!
//! Each grid cell is split into two triangles, which are the convex parts
//! handed to the narrow phase.

use nalgebra::{Point3, Vector3};
use sim_types::{Pose, Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Aabb, ConvexCollider, ConvexShape};

/// A height-field terrain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TerrainCollider {
    heights: Vec<f64>,
    x_size: usize,
    y_size: usize,
    scale: Vector3<f64>,
    local_aabb: Aabb,
    pose: Pose,
    aabb: Aabb,
}

impl TerrainCollider {
    /// Create a terrain from row-major height samples.
    ///
    /// `scale` is the size of the terrain along X and Y and the height
    /// multiplier along Z.
    pub fn new(heights: Vec<f64>, x_size: usize, y_size: usize, scale: Vector3<f64>) -> Result<Self> {
        if x_size < 2 || y_size < 2 {
            return Err(SimError::invalid_shape(
                "terrain needs at least 2x2 height samples",
            ));
        }
        if heights.len() != x_size * y_size {
            return Err(SimError::invalid_shape(format!(
                "terrain expects {} heights, got {}",
                x_size * y_size,
                heights.len()
            )));
        }
        if !heights.iter().all(|h| h.is_finite()) {
            return Err(SimError::invalid_shape("terrain heights must be finite"));
        }
        if !scale.iter().all(|&s| s.is_finite() && s > 0.0) {
            return Err(SimError::invalid_shape("terrain scale must be positive"));
        }

        let (min_h, max_h) = heights
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)));
        let local_aabb = Aabb::new(
            Point3::new(-0.5 * scale.x, -0.5 * scale.y, min_h * scale.z),
            Point3::new(0.5 * scale.x, 0.5 * scale.y, max_h * scale.z),
        );

        let pose = Pose::identity();
        Ok(Self {
            heights,
            x_size,
            y_size,
            scale,
            local_aabb,
            aabb: local_aabb.transformed(&pose),
            pose,
        })
    }

    /// Flat terrain at height zero.
    pub fn flat(x_size: usize, y_size: usize, scale: Vector3<f64>) -> Result<Self> {
        Self::new(vec![0.0; x_size * y_size], x_size, y_size, scale)
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

    /// Move the terrain and recompute its bounding box.
    pub fn set_transforms(&mut self, pose: Pose) {
        self.pose = pose;
        self.aabb = self.local_aabb.transformed(&self.pose);
    }

    /// Local position of grid sample `(i, j)`.
    #[allow(clippy::cast_precision_loss)]
    fn vertex(&self, i: usize, j: usize) -> Point3<f64> {
        let x = (i as f64 / (self.x_size - 1) as f64 - 0.5) * self.scale.x;
        let y = (j as f64 / (self.y_size - 1) as f64 - 0.5) * self.scale.y;
        let z = self.heights[j * self.x_size + i] * self.scale.z;
        Point3::new(x, y, z)
    }

    /// Inclusive range of cell indices along one axis covering `[min, max]`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn cell_range(min: f64, max: f64, extent: f64, size: usize) -> Option<(usize, usize)> {
        let cells = (size - 1) as f64;
        let lo = ((min / extent + 0.5) * cells).floor();
        let hi = ((max / extent + 0.5) * cells).ceil();
        if hi < 0.0 || lo > cells {
            return None;
        }
        let lo = lo.max(0.0) as usize;
        let hi = (hi.min(cells) as usize).max(lo + 1).min(size - 1);
        Some((lo, hi - 1))
    }

    /// Triangles of the terrain whose bounds overlap a world AABB.
    ///
    /// The returned parts carry the terrain pose, so their local points are
    /// expressed in the terrain frame.
    #[must_use]
    pub fn overlapping_parts(&self, aabb: &Aabb) -> Vec<ConvexCollider> {
        let local = aabb.inverse_transformed(&self.pose);
        if !local.overlaps(&self.local_aabb) {
            return Vec::new();
        }

        let Some((i_lo, i_hi)) =
            Self::cell_range(local.min.x, local.max.x, self.scale.x, self.x_size)
        else {
            return Vec::new();
        };
        let Some((j_lo, j_hi)) =
            Self::cell_range(local.min.y, local.max.y, self.scale.y, self.y_size)
        else {
            return Vec::new();
        };

        let mut parts = Vec::new();
        for j in j_lo..=j_hi {
            for i in i_lo..=i_hi {
                let v0 = self.vertex(i, j);
                let v1 = self.vertex(i + 1, j);
                let v2 = self.vertex(i, j + 1);
                let v3 = self.vertex(i + 1, j + 1);

                for triangle in [[v0, v1, v2], [v1, v3, v2]] {
                    let lo = triangle.iter().map(|v| v.z).fold(f64::INFINITY, f64::min);
                    let hi = triangle.iter().map(|v| v.z).fold(f64::NEG_INFINITY, f64::max);
                    if lo <= local.max.z && hi >= local.min.z {
                        let [a, b, c] = triangle;
                        parts.push(ConvexCollider::at(ConvexShape::triangle(a, b, c), self.pose));
                    }
                }
            }
        }
        parts
    }
}
