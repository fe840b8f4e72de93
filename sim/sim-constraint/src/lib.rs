//! Sequential-impulse constraint solving for rigid bodies.
//!
//! This crate resolves contacts and joints between the bodies of a
//! [`sim_core::BodySet`]:
//!
//! - [`NormalConstraint`] - Non-penetration with Baumgarte bias and restitution
//! - [`FrictionConstraint`] - Coulomb friction along one tangent, bounded by its normal row
//! - [`DistanceConstraint`] - Keeps two anchor points at a fixed distance
//! - [`ConstraintManager`] - Gauss-Seidel solver with warm starting
//!
//! # Constraint Formulation
//!
//! Every constraint is one scalar row between two bodies:
//!
//! ```text
//! J · v = bias                     (velocity target)
//! alpha_min <= λ <= alpha_max      (bounds on the multiplier)
//! J = [J_lin1, J_ang1, J_lin2, J_ang2]
//! ```
//!
//! Rows are solved one at a time in insertion order, so a given set of
//! constraints always produces the same result.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{ConstraintEquation, ConstraintManager, DistanceConstraint};
//! use sim_core::{BodySet, RigidBody, RigidBodyConfig};
//! use sim_types::{Pose, SolverConfig};
//! use nalgebra::Point3;
//!
//! let mut bodies = BodySet::new();
//! let pivot = bodies.insert(RigidBody::immovable(Pose::identity()));
//! let bob = bodies.insert(RigidBody::new(
//!     RigidBodyConfig::default(),
//!     Pose::from_position(Point3::new(0.0, 0.0, -1.0)),
//! ));
//!
//! let mut manager = ConstraintManager::new(SolverConfig::default());
//! let rod = manager.add_constraint(
//!     DistanceConstraint::new(pivot, Point3::origin(), bob, Point3::origin(), 1.0).into(),
//!     &mut bodies,
//! )?;
//!
//! manager.update(&mut bodies, 1.0 / 60.0)?;
//! assert!(manager.constraint(rod).is_some_and(|c| c.lambda().is_finite()));
//! # Ok::<(), sim_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::needless_range_loop, // Gauss-Seidel rows read earlier rows by index
    clippy::missing_errors_doc,
)]

mod constraint;
mod distance;
mod friction;
mod manager;
mod normal;

pub use constraint::{Constraint, ConstraintBounds, ConstraintEquation, Jacobian};
pub use distance::DistanceConstraint;
pub use friction::FrictionConstraint;
pub use manager::ConstraintManager;
pub use normal::NormalConstraint;

pub use sim_types::{BodyId, ConstraintId, Result, SimError};
