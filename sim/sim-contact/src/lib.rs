//! Contact constraints for rigid-body simulation.
//!
//! This crate bridges collision detection and the constraint solver. Every
//! contact of an intersecting manifold becomes three constraint rows:
//!
//! ```text
//! normal     J = [-n, -(r1×n), n, r2×n]     λ ≥ 0
//! friction   J = [-t, -(r1×t), t, r2×t]     |λ| ≤ μ·λ_n   (t1, t2)
//! ```
//!
//! The tangents come from [`tangent_basis`], and `μ = sqrt((μ1² + μ2²)/2)`
//! mixes the friction coefficients of the two bodies.
//!
//! [`ContactConstraints`] keeps the rows 1:1 with the live contacts:
//!
//! - `Intersecting` events grow or shrink the rows of a pair and refresh
//!   their geometry, keeping λ for warm starting
//! - `Disjoint` events remove every row of the pair
//! - pairs between two immovable bodies never get rows
//!
//! # Example
//!
//! ```
//! use sim_collision::{Collider, CollisionWorld, ConvexShape};
//! use sim_constraint::ConstraintManager;
//! use sim_contact::ContactConstraints;
//! use sim_core::{BodySet, RigidBody, RigidBodyConfig};
//! use sim_types::{CollisionConfig, ContactConfig, Pose, SolverConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut bodies = BodySet::new();
//! let mut world = CollisionWorld::new(&CollisionConfig::default());
//!
//! let floor_pose = Pose::from_position(Point3::new(0.0, 0.0, -0.5));
//! let floor = bodies.insert(RigidBody::immovable(floor_pose));
//! world.add_collider(
//!     Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))?
//!         .with_body(floor)
//!         .with_pose(floor_pose),
//! );
//!
//! let cube_pose = Pose::from_position(Point3::new(0.0, 0.0, 0.45));
//! let cube = bodies.insert(RigidBody::new(RigidBodyConfig::default(), cube_pose));
//! world.add_collider(
//!     Collider::convex(ConvexShape::bounding_box(Vector3::repeat(0.5)))?
//!         .with_body(cube)
//!         .with_pose(cube_pose),
//! );
//!
//! let mut manager = ConstraintManager::new(SolverConfig::default());
//! let mut contacts = ContactConstraints::new(ContactConfig::default());
//! let events = world.update();
//! contacts.handle_events(&events, &world, &mut bodies, &mut manager)?;
//!
//! assert_eq!(manager.len(), contacts.constraint_count());
//! assert!(!manager.is_empty());
//! # Ok::<(), sim_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/sim-contact/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::missing_errors_doc)]

mod contacts;

pub use contacts::{ContactConstraints, ContactRows, tangent_basis};

pub use sim_types::{ContactConfig, Result, SimError};
