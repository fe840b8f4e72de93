//! GJK (Gilbert-Johnson-Keerthi) intersection test.
//!
//! GJK works on the configuration space obstacle (CSO) of two convex
//! colliders, the Minkowski difference `A - B`. The colliders overlap iff
//! the CSO contains the origin. The algorithm grows a simplex (point, line,
//! triangle, tetrahedron) of CSO support points towards the origin:
//!
//! ```text
//!           new support point
//!                  ●
//!                 /|\          origin ○ inside the tetrahedron
//!                / | \         → collision, hand simplex to EPA
//!               /  ○  \
//!              ●---|---●       origin outside every face
//!               \  |  /        → keep the closest feature, search again
//!                \ | /
//!                  ●
//! ```
//!
//! # Degenerate simplices
//!
//! When the search direction collapses (origin exactly on a vertex or edge
//! of the simplex) or the final tetrahedron is flat, the simplex is
//! completed by searching along directions that raise its dimension: the
//! coordinate axes for a point, perpendiculars for a segment and the face
//! normal for a triangle. The completed tetrahedron must have volume and
//! contain the origin, otherwise no collision is reported.
//!
//! # References
//!
//! - Gilbert, Johnson, Keerthi: "A Fast Procedure for Computing the Distance
//!   Between Complex Objects in Three-Dimensional Space" (1988)
//! - van den Bergen: "Collision Detection in Interactive 3D Environments" (2003)

use nalgebra::{Point3, Vector3};
use sim_types::CollisionConfig;

use crate::ConvexCollider;

/// A point of the CSO together with the collider points that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportPoint {
    /// CSO point, `world[0] - world[1]`.
    pub point: Vector3<f64>,
    /// Furthest points in world coordinates on both colliders.
    pub world: [Point3<f64>; 2],
    /// The same points in each collider's local frame.
    pub local: [Point3<f64>; 2],
}

impl Default for SupportPoint {
    fn default() -> Self {
        Self {
            point: Vector3::zeros(),
            world: [Point3::origin(); 2],
            local: [Point3::origin(); 2],
        }
    }
}

impl SupportPoint {
    /// Support point of the CSO along `direction`.
    #[must_use]
    pub fn new(c1: &ConvexCollider, c2: &ConvexCollider, direction: &Vector3<f64>) -> Self {
        let (world_a, local_a) = c1.furthest_point_in_direction(direction);
        let (world_b, local_b) = c2.furthest_point_in_direction(&-direction);
        Self {
            point: world_a - world_b,
            world: [world_a, world_b],
            local: [local_a, local_b],
        }
    }
}

/// Simplex of up to four support points, newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simplex {
    points: [SupportPoint; 4],
    size: usize,
}

impl Simplex {
    /// Create an empty simplex.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a point to the front, dropping the oldest one when full.
    pub fn push(&mut self, point: SupportPoint) {
        for i in (1..=self.size.min(3)).rev() {
            self.points[i] = self.points[i - 1];
        }
        self.points[0] = point;
        self.size = (self.size + 1).min(4);
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the simplex has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Points, newest first.
    #[must_use]
    pub fn points(&self) -> &[SupportPoint] {
        &self.points[..self.size]
    }

    fn set(&mut self, points: &[SupportPoint]) {
        self.size = points.len().min(4);
        for (i, p) in points.iter().take(4).enumerate() {
            self.points[i] = *p;
        }
    }

    /// Signed volume of the tetrahedron, times six.
    fn volume(&self) -> f64 {
        if self.size < 4 {
            return 0.0;
        }
        let [a, b, c, d] = self.points.map(|p| p.point);
        (b - a).dot(&(c - a).cross(&(d - a)))
    }

    /// Whether the tetrahedron contains the origin, boundary included.
    fn contains_origin(&self, epsilon: f64) -> bool {
        if self.size < 4 {
            return false;
        }
        let p = self.points.map(|p| p.point);
        [[0, 1, 2, 3], [0, 1, 3, 2], [0, 2, 3, 1], [1, 2, 3, 0]]
            .iter()
            .all(|&[i, j, k, opposite]| {
                let normal = (p[j] - p[i]).cross(&(p[k] - p[i]));
                let side = normal.dot(&(p[opposite] - p[i])).signum();
                normal.dot(&-p[i]) * side >= -epsilon * normal.norm()
            })
    }
}

/// GJK intersection test with fixed tolerances.
#[derive(Debug, Clone)]
pub struct Gjk {
    precision: f64,
    max_iterations: usize,
}

impl Gjk {
    /// Create a GJK solver from the collision tolerances.
    #[must_use]
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            precision: config.contact_precision,
            max_iterations: config.max_gjk_iterations,
        }
    }

    /// Test two convex colliders.
    ///
    /// Returns a tetrahedron enclosing the origin when they overlap, which is
    /// the starting polytope for EPA.
    #[must_use]
    pub fn calculate(&self, c1: &ConvexCollider, c2: &ConvexCollider) -> Option<Simplex> {
        let mut direction = c1.pose().position - c2.pose().position;
        if direction.norm() < self.precision {
            direction = Vector3::x();
        }

        let mut simplex = Simplex::new();
        simplex.push(SupportPoint::new(c1, c2, &direction));
        direction = -simplex.points[0].point;

        for _ in 0..self.max_iterations {
            if direction.norm() < self.precision {
                // Origin lies on the current simplex feature.
                return self.complete(c1, c2, simplex);
            }
            direction.normalize_mut();

            let new_point = SupportPoint::new(c1, c2, &direction);
            if new_point.point.dot(&direction) < self.precision {
                return None;
            }

            simplex.push(new_point);
            if do_simplex(&mut simplex, &mut direction) {
                if simplex.volume().abs() <= self.precision {
                    return self.complete(c1, c2, simplex);
                }
                return Some(simplex);
            }
        }

        None
    }

    /// Grow a degenerate simplex into a tetrahedron that contains the origin.
    fn complete(
        &self,
        c1: &ConvexCollider,
        c2: &ConvexCollider,
        mut simplex: Simplex,
    ) -> Option<Simplex> {
        if simplex.len() == 4 {
            // Flat tetrahedron: drop the newest point and rebuild.
            let rest = [simplex.points[1], simplex.points[2], simplex.points[3]];
            simplex.set(&rest);
        }

        while simplex.len() < 4 {
            let added = expansion_directions(&simplex)
                .into_iter()
                .map(|direction| SupportPoint::new(c1, c2, &direction))
                .find(|candidate| raises_dimension(&simplex, &candidate.point, self.precision))?;
            simplex.push(added);
        }

        (simplex.volume().abs() > self.precision && simplex.contains_origin(self.precision))
            .then_some(simplex)
    }
}

/// Search directions that can add a point off the span of the simplex.
fn expansion_directions(simplex: &Simplex) -> Vec<Vector3<f64>> {
    let p = simplex.points();
    match p.len() {
        1 => vec![
            Vector3::x(),
            -Vector3::x(),
            Vector3::y(),
            -Vector3::y(),
            Vector3::z(),
            -Vector3::z(),
        ],
        2 => {
            let segment = p[1].point - p[0].point;
            let first = any_perpendicular(&segment);
            let second = segment.cross(&first).try_normalize(f64::EPSILON).unwrap_or(first);
            vec![first, -first, second, -second]
        }
        3 => {
            let normal = (p[1].point - p[0].point).cross(&(p[2].point - p[0].point));
            vec![normal, -normal]
        }
        _ => Vec::new(),
    }
}

/// Whether `point` lies off the point, line or plane spanned by the simplex.
fn raises_dimension(simplex: &Simplex, point: &Vector3<f64>, epsilon: f64) -> bool {
    let p = simplex.points();
    match p.len() {
        1 => (point - p[0].point).norm() > epsilon,
        2 => {
            let segment = p[1].point - p[0].point;
            let length = segment.norm();
            length > epsilon && segment.cross(&(point - p[0].point)).norm() / length > epsilon
        }
        3 => {
            let normal = (p[1].point - p[0].point).cross(&(p[2].point - p[0].point));
            let area = normal.norm();
            area > epsilon && (normal.dot(&(point - p[0].point)) / area).abs() > epsilon
        }
        _ => false,
    }
}

/// A unit vector perpendicular to `v`.
fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let axis = if v.x.abs() <= v.y.abs() && v.x.abs() <= v.z.abs() {
        Vector3::x()
    } else if v.y.abs() <= v.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&axis).try_normalize(f64::EPSILON).unwrap_or(axis)
}

// =============================================================================
// Simplex reduction
// =============================================================================

/// Keep the feature closest to the origin and update the search direction.
///
/// Returns true once the tetrahedron encloses the origin.
fn do_simplex(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    match simplex.len() {
        2 => do_simplex_line(simplex, direction),
        3 => do_simplex_triangle(simplex, direction),
        4 => do_simplex_tetrahedron(simplex, direction),
        _ => false,
    }
}

fn do_simplex_line(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    let a = simplex.points[0].point;
    let b = simplex.points[1].point;

    let ab = b - a;
    let ao = -a;

    if ab.dot(&ao) > 0.0 {
        *direction = triple_product(&ab, &ao, &ab);
    } else {
        simplex.set(&[simplex.points[0]]);
        *direction = ao;
    }

    false
}

fn do_simplex_triangle(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    let a = simplex.points[0].point;
    let b = simplex.points[1].point;
    let c = simplex.points[2].point;

    let ab = b - a;
    let ac = c - a;
    let ao = -a;

    let abc = ab.cross(&ac);

    if abc.cross(&ac).dot(&ao) > 0.0 {
        // Outside edge AC
        if ac.dot(&ao) > 0.0 {
            simplex.set(&[simplex.points[0], simplex.points[2]]);
            *direction = triple_product(&ac, &ao, &ac);
        } else {
            reduce_to_edge_ab(simplex, direction, &ab, &ao);
        }
    } else if ab.cross(&abc).dot(&ao) > 0.0 {
        reduce_to_edge_ab(simplex, direction, &ab, &ao);
    } else if abc.dot(&ao) > 0.0 {
        *direction = abc;
    } else {
        // Below the triangle: flip the winding so the next point lands on top.
        simplex.set(&[simplex.points[0], simplex.points[2], simplex.points[1]]);
        *direction = -abc;
    }

    false
}

fn reduce_to_edge_ab(
    simplex: &mut Simplex,
    direction: &mut Vector3<f64>,
    ab: &Vector3<f64>,
    ao: &Vector3<f64>,
) {
    if ab.dot(ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[1]]);
        *direction = triple_product(ab, ao, ab);
    } else {
        simplex.set(&[simplex.points[0]]);
        *direction = *ao;
    }
}

fn do_simplex_tetrahedron(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    let a = simplex.points[0].point;
    let b = simplex.points[1].point;
    let c = simplex.points[2].point;
    let d = simplex.points[3].point;

    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let ao = -a;

    if ab.cross(&ac).dot(&ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[1], simplex.points[2]]);
        return do_simplex_triangle(simplex, direction);
    }

    if ac.cross(&ad).dot(&ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[2], simplex.points[3]]);
        return do_simplex_triangle(simplex, direction);
    }

    if ad.cross(&ab).dot(&ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[3], simplex.points[1]]);
        return do_simplex_triangle(simplex, direction);
    }

    true
}

/// `(a × b) × c = b(a·c) - a(b·c)`.
#[inline]
fn triple_product(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Vector3<f64> {
    b * a.dot(c) - a * b.dot(c)
}
