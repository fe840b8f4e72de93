//! Collision detection for rigid bodies.
//!
//! This crate finds and maintains the contacts between colliders:
//!
//! - [`Collider`] - Convex shapes, height-field terrain and composites
//! - [`CoarseCollisionDetector`] - O(n²) AABB broad phase
//! - [`Gjk`] / [`Epa`] - Convex intersection and penetration depth
//! - [`Manifold`] - Up to four persistent contacts per pair
//! - [`FineCollisionDetector`] - Narrow phase that keeps manifolds current
//! - [`CollisionWorld`] - Owns colliders and manifolds, emits [`CollisionEvent`]s
//!
//! # Pipeline
//!
//! ```text
//! set_transforms ──► CollisionWorld::update
//!                        │
//!                        ├─► CoarseCollisionDetector   overlapping AABB pairs
//!                        │
//!                        ├─► FineCollisionDetector     per pair:
//!                        │        concave → convex parts
//!                        │        GJK → EPA → Contact
//!                        │        prune, merge, limit to 4
//!                        │
//!                        └─► CollisionEvent            Intersecting / Disjoint
//! ```
//!
//! Contact normals point from the first collider of a [`ColliderPair`] (the
//! lower id) to the second.
//!
//! # Example
//!
//! ```
//! use sim_collision::{Collider, CollisionEventKind, CollisionWorld, ConvexShape};
//! use sim_types::{CollisionConfig, Pose};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut world = CollisionWorld::new(&CollisionConfig::default());
//! let floor = Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))?
//!     .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5)));
//! let ball = Collider::convex(ConvexShape::sphere(0.5))?
//!     .with_pose(Pose::from_position(Point3::new(0.0, 0.0, 0.45)));
//! world.add_collider(floor);
//! world.add_collider(ball);
//!
//! let events = world.update();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].kind, CollisionEventKind::Intersecting);
//! # Ok::<(), sim_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/sim-collision/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::many_single_char_names, // Geometry reads best with a, b, c, p, n
    clippy::cast_possible_truncation, // Collider ids fit in usize for practical use
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
)]

mod aabb;
mod broad_phase;
mod collider;
pub mod epa;
pub mod gjk;
mod manifold;
mod narrow_phase;
mod shape;
mod terrain;
mod world;

pub use aabb::Aabb;
pub use broad_phase::CoarseCollisionDetector;
pub use collider::{ColliderGeometry, Collider, CompositeCollider, ConcaveCollider};
pub use epa::{Epa, Polytope};
pub use gjk::{Gjk, Simplex, SupportPoint};
pub use manifold::{
    ColliderPair, Contact, MAX_CONTACTS, Manifold, ManifoldState, ManifoldStates, limit,
};
pub use narrow_phase::FineCollisionDetector;
pub use shape::{ConvexCollider, ConvexShape};
pub use terrain::TerrainCollider;
pub use world::{CollisionEvent, CollisionEventKind, CollisionWorld};

pub use sim_types::{ColliderId, Pose, Result, SimError};
