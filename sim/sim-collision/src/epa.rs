//! EPA (Expanding Polytope Algorithm) penetration depth.
//!
//! Starting from the tetrahedron GJK leaves around the origin, EPA grows a
//! convex polytope inside the CSO until the face closest to the origin lies
//! on the CSO boundary. That face gives the penetration depth and normal.
//!
//! ```text
//!        closest face            support along its normal
//!     ●────────────●                    ●  new vertex
//!      \    ○     /      expand        / \
//!       \ origin /      ───────►   ●──/───\──●   visible faces removed,
//!        \      /                   \/  ○  \/    hole stitched to the
//!         ●────●                     ●─────●     new vertex
//! ```
//!
//! The polytope is an index arena: faces refer to vertices by position in
//! one vector, and the horizon is a list of directed vertex-index edges.

use nalgebra::{Point3, Vector3};
use sim_types::CollisionConfig;
use tracing::{trace, warn};

use crate::{Contact, ConvexCollider, Simplex, SupportPoint};

/// Slack allowed on barycentric weights before a contact is rejected.
const BARYCENTRIC_TOLERANCE: f64 = 1e-3;

/// A triangular face of the polytope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Vertex indices, counter-clockwise seen from outside.
    pub vertices: [usize; 3],
    /// Outward unit normal.
    pub normal: Vector3<f64>,
    /// Distance from the origin to the face plane.
    pub distance: f64,
}

/// Convex polytope of CSO support points.
#[derive(Debug, Clone, Default)]
pub struct Polytope {
    vertices: Vec<SupportPoint>,
    faces: Vec<Face>,
}

impl Polytope {
    /// Build the initial tetrahedron from a full simplex.
    ///
    /// Faces are wound so every normal points away from the opposite vertex.
    /// Returns `None` if the simplex has fewer than four points or every face
    /// is degenerate.
    #[must_use]
    pub fn from_simplex(simplex: &Simplex) -> Option<Self> {
        let points = simplex.points();
        if points.len() < 4 {
            return None;
        }

        let p: Vec<Vector3<f64>> = points.iter().map(|s| s.point).collect();
        let det = (p[3] - p[0]).dot(&(p[1] - p[0]).cross(&(p[2] - p[0])));
        let windings = if det < 0.0 {
            [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]]
        } else {
            [[0, 2, 1], [0, 3, 2], [0, 1, 3], [2, 3, 1]]
        };

        let mut polytope = Self {
            vertices: points.to_vec(),
            faces: Vec::with_capacity(4),
        };
        for indices in windings {
            polytope.add_face(indices);
        }
        (!polytope.faces.is_empty()).then_some(polytope)
    }

    /// Vertices of the polytope.
    #[must_use]
    pub fn vertices(&self) -> &[SupportPoint] {
        &self.vertices
    }

    /// Faces of the polytope.
    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Add a face, skipping it when its vertices are collinear.
    fn add_face(&mut self, vertices: [usize; 3]) -> bool {
        let [a, b, c] = vertices.map(|i| self.vertices[i].point);
        let Some(normal) = (b - a).cross(&(c - a)).try_normalize(f64::EPSILON) else {
            return false;
        };
        self.faces.push(Face {
            vertices,
            normal,
            distance: a.dot(&normal),
        });
        true
    }

    /// Index of the face closest to the origin.
    #[must_use]
    pub fn closest_face(&self) -> Option<usize> {
        self.faces
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.distance.total_cmp(&b.distance))
            .map(|(i, _)| i)
    }

    /// Add a vertex, removing every face that sees it and stitching the
    /// horizon to it.
    pub fn expand(&mut self, point: SupportPoint, precision: f64) {
        let new_index = self.vertices.len();
        self.vertices.push(point);

        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i < self.faces.len() {
            let face = self.faces[i];
            let on_face = self.vertices[face.vertices[0]].point;
            if face.normal.dot(&(point.point - on_face)) > precision {
                let [a, b, c] = face.vertices;
                add_edge(&mut edges, a, b);
                add_edge(&mut edges, b, c);
                add_edge(&mut edges, c, a);
                self.faces.swap_remove(i);
            } else {
                i += 1;
            }
        }

        for (a, b) in edges {
            self.add_face([a, b, new_index]);
        }
    }

    /// Barycentric weights of the origin's projection onto a face.
    fn barycentric(&self, face: &Face) -> [f64; 3] {
        let [p0, p1, p2] = face.vertices.map(|i| self.vertices[i].point);
        let p = face.normal * face.distance;
        let u = p1 - p0;
        let v = p2 - p0;
        let w = p - p0;
        let n = u.cross(&v);
        let nn = n.dot(&n);
        let gamma = u.cross(&w).dot(&n) / nn;
        let beta = w.cross(&v).dot(&n) / nn;
        [1.0 - beta - gamma, beta, gamma]
    }

    /// Contact described by a face and the barycentric weights of the origin.
    fn contact(&self, face: &Face, weights: [f64; 3]) -> Contact {
        let [s0, s1, s2] = face.vertices.map(|i| self.vertices[i]);
        let blend = |a: Point3<f64>, b: Point3<f64>, c: Point3<f64>| {
            Point3::from(a.coords * weights[0] + b.coords * weights[1] + c.coords * weights[2])
        };
        Contact {
            penetration: face.distance.max(0.0),
            normal: face.normal,
            world_position: [
                blend(s0.world[0], s1.world[0], s2.world[0]),
                blend(s0.world[1], s1.world[1], s2.world[1]),
            ],
            local_position: [
                blend(s0.local[0], s1.local[0], s2.local[0]),
                blend(s0.local[1], s1.local[1], s2.local[1]),
            ],
        }
    }

    /// Contact from the closest face whose projection of the origin lies
    /// inside it.
    ///
    /// Coplanar faces tie on distance, so every face within `tolerance` of
    /// the minimum is considered.
    fn closest_contact(&self, tolerance: f64) -> Option<Contact> {
        let closest = self.faces[self.closest_face()?].distance;
        let inside = |w: f64| (-BARYCENTRIC_TOLERANCE..=1.0 + BARYCENTRIC_TOLERANCE).contains(&w);

        self.faces
            .iter()
            .filter(|face| face.distance <= closest + tolerance)
            .find_map(|face| {
                let weights = self.barycentric(face);
                weights
                    .iter()
                    .all(|&w| inside(w))
                    .then(|| self.contact(face, weights))
            })
    }
}

/// Add an edge, cancelling it against its reverse if already present.
fn add_edge(edges: &mut Vec<(usize, usize)>, a: usize, b: usize) {
    if let Some(index) = edges
        .iter()
        .position(|&(x, y)| (x == b && y == a) || (x == a && y == b))
    {
        edges.swap_remove(index);
    } else {
        edges.push((a, b));
    }
}

/// EPA with fixed tolerances.
#[derive(Debug, Clone)]
pub struct Epa {
    min_f_difference: f64,
    precision: f64,
    max_iterations: usize,
    max_faces: usize,
}

impl Epa {
    /// Create an EPA solver from the collision tolerances.
    #[must_use]
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            min_f_difference: config.min_f_difference,
            precision: config.contact_precision,
            max_iterations: config.max_epa_iterations,
            max_faces: config.max_epa_faces,
        }
    }

    /// Compute the contact between two overlapping colliders.
    ///
    /// `simplex` must be the tetrahedron returned by GJK for the same pair.
    /// Returns `None` when the polytope degenerates.
    #[must_use]
    pub fn calculate(
        &self,
        c1: &ConvexCollider,
        c2: &ConvexCollider,
        simplex: &Simplex,
    ) -> Option<Contact> {
        let mut polytope = Polytope::from_simplex(simplex)?;

        let mut converged = false;
        for iteration in 0..self.max_iterations {
            let face = polytope.faces[polytope.closest_face()?];
            let support = SupportPoint::new(c1, c2, &face.normal);

            if support.point.dot(&face.normal) - face.distance <= self.min_f_difference {
                trace!(iteration, depth = face.distance, "EPA converged");
                converged = true;
                break;
            }

            polytope.expand(support, self.precision);
            if polytope.faces.len() > self.max_faces {
                warn!(faces = polytope.faces.len(), "EPA face limit reached");
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(iterations = self.max_iterations, "EPA iteration limit reached");
        }

        let contact = polytope.closest_contact(self.min_f_difference);
        if contact.is_none() {
            warn!("EPA closest face rejected: origin projects outside every candidate face");
        }
        contact
    }
}
