//! Rigid-body state and integration.
//!
//! This crate holds the bodies that the collision and constraint crates act
//! on:
//!
//! - [`RigidBody`] - Pose, velocities, force accumulators and sleep state
//! - [`BodySet`] - Arena of bodies addressed by [`BodyId`]
//! - [`ForceManager`] - Gravity and springs accumulated before integration
//! - [`integrators`] - Semi-implicit Euler with exponential damping
//!
//! # Step Contract
//!
//! ```text
//! ForceManager::apply, add_force ──► force_sum, torque_sum
//!                                          │
//!                                          ▼
//!                 integrate(dt): v += M⁻¹F dt, x += v dt, q = Δq(ω dt) q
//!                                          │
//!                                          ▼
//!                 synch_with_data: transform, R · I⁻¹ · Rᵀ
//!                                          │
//!                                          ▼
//!                 clear_forces, update_sleep
//! ```
//!
//! Bodies whose inverse mass and inverse inertia are both zero are immovable:
//! always asleep, never integrated, and deaf to forces.
//!
//! # Example
//!
//! ```
//! use sim_core::{BodySet, RigidBody, RigidBodyConfig};
//! use sim_types::Pose;
//! use nalgebra::{Point3, Vector3};
//!
//! let mut bodies = BodySet::new();
//! let id = bodies.insert(RigidBody::new(RigidBodyConfig::default(), Pose::identity()));
//!
//! if let Some(body) = bodies.get_mut(id) {
//!     body.add_force(Vector3::new(1.0, 0.0, 0.0));
//!     body.integrate(0.1);
//!     body.clear_forces();
//! }
//!
//! assert!(bodies.get(id).map_or(false, |b| b.position().x > 0.0));
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::missing_errors_doc,
)]

mod body_set;
mod forces;
pub mod integrators;
mod rigid_body;

pub use body_set::BodySet;
pub use forces::{Force, ForceManager, GravityForce, SpringForce};
pub use integrators::SemiImplicitEuler;
pub use rigid_body::{BodyState, BodyStates, RigidBody, RigidBodyConfig, RigidBodyData};

pub use sim_types::{BodyId, ForceId, Pose, Result, SimError};
