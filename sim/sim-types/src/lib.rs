//! Core types for rigid-body simulation.
//!
//! This crate provides the foundational types shared by the physics crates:
//!
//! - [`BodyId`], [`ColliderId`], [`ConstraintId`], [`ForceId`] - Handles into the arenas
//! - [`Arena`] - Generation-checked slot storage behind those handles
//! - [`Pose`] - Position and orientation
//! - [`MassProperties`] - Mass and inertia tensor
//! - [`PhysicsConfig`] - Gravity, collision, solver, sleep and contact settings
//! - [`SimError`] - Errors reported at the public boundaries
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no integration or collision
//! behavior, and every tunable is an explicit field rather than a global
//! constant.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{MassProperties, PhysicsConfig};
//! use nalgebra::Vector3;
//!
//! let config = PhysicsConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let props = MassProperties::box_shape(1.0, Vector3::new(0.5, 0.5, 0.5));
//! assert!((props.inverse_mass() - 1.0).abs() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod arena;
mod body;
mod config;
mod error;

pub use arena::Arena;
pub use body::{BodyId, ColliderId, ConstraintId, ForceId, MassProperties, Pose};
pub use config::{
    CollisionConfig, ContactConfig, Gravity, PhysicsConfig, SleepConfig, SolverConfig,
};
pub use error::SimError;

// Re-export nalgebra types for convenience
pub use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
