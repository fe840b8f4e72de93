//! Unified rigid-body physics API.
//!
//! This crate ties the physics stack together behind [`PhysicsWorld`] and
//! re-exports the sub-crates:
//!
//! - [`sim_types`] - Ids, poses, mass properties, configuration, errors
//! - [`sim_core`] - Rigid bodies and integration
//! - [`sim_collision`] - Colliders, GJK/EPA and contact manifolds
//! - [`sim_constraint`] - Normal, friction and distance constraints
//! - [`sim_contact`] - Contact constraints generated from manifolds
//!
//! # Quick Start
//!
//! ```
//! use sim_physics::prelude::*;
//!
//! let mut world = PhysicsWorld::new(PhysicsConfig::default())?;
//!
//! // An immovable floor and a box dropped onto it.
//! world.add_static_collider(
//!     Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))?
//!         .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
//! );
//! let half = Vector3::new(0.5, 0.5, 0.5);
//! let cube = world.add_body(RigidBody::new(
//!     RigidBodyConfig::from_mass_properties(&MassProperties::box_shape(1.0, half)),
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//! ));
//! world.attach_collider(cube, Collider::convex(ConvexShape::bounding_box(half))?)?;
//!
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0)?;
//! }
//! let z = world.body(cube).map_or(f64::NAN, |b| b.position().z);
//! assert!(z > 0.4 && z < 0.6);
//! # Ok::<(), SimError>(())
//! ```
//!
//! # Step Contract
//!
//! ```text
//! step(dt)
//!   ├─ validate dt, clear per-step body states
//!   ├─ ForceManager::apply           → gravity, springs
//!   ├─ sync collider poses of bodies that moved
//!   ├─ CollisionWorld::update        → CollisionEvents
//!   ├─ ContactConstraints            → normal + 2 friction rows per contact
//!   ├─ ConstraintManager::update     → solve, integrate constrained bodies
//!   ├─ integrate remaining awake bodies, clear forces
//!   └─ update sleep                  → StepReport
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      sim-physics (this crate)                   │
//! │                   PhysicsWorld / re-exports                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!          ┌───────────────────────┼───────────────────────┐
//!          │                       │                       │
//!          ▼                       ▼                       ▼
//! ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐
//! │  sim-collision  │◄──│   sim-contact   │──►│ sim-constraint  │
//! │  GJK, EPA, ...  │   │ Contact rows    │   │ Solver          │
//! └────────┬────────┘   └─────────────────┘   └────────┬────────┘
//!          │                                           │
//!          └──────────────────────┬────────────────────┘
//!                                 ▼
//!                       ┌─────────────────┐
//!                       │    sim-core     │
//!                       │  Rigid bodies   │
//!                       └────────┬────────┘
//!                                │
//!                                ▼
//!                       ┌─────────────────┐
//!                       │   sim-types     │
//!                       │  Data structs   │
//!                       └─────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/sim-physics/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::missing_errors_doc)]

mod world;

pub use world::{PhysicsWorld, StepReport};

// Re-export sub-crates
pub use sim_collision;
pub use sim_constraint;
pub use sim_contact;
pub use sim_core;
pub use sim_types;

// Re-export nalgebra for convenience
pub use nalgebra;

/// Prelude module for convenient imports.
///
/// Import everything you need with a single line:
///
/// ```
/// use sim_physics::prelude::*;
/// ```
pub mod prelude {
    // ========================================================================
    // World
    // ========================================================================

    pub use crate::{PhysicsWorld, StepReport};

    // ========================================================================
    // Core types from sim-types
    // ========================================================================

    pub use sim_types::{BodyId, ColliderId, ConstraintId, ForceId, MassProperties, Pose};

    // Configuration
    pub use sim_types::{
        CollisionConfig, ContactConfig, Gravity, PhysicsConfig, SleepConfig, SolverConfig,
    };

    // Errors
    pub use sim_types::{Result, SimError};

    // ========================================================================
    // Rigid bodies from sim-core
    // ========================================================================

    pub use sim_core::{
        BodySet, BodyState, Force, ForceManager, GravityForce, RigidBody, RigidBodyConfig,
        SpringForce,
    };

    // ========================================================================
    // Collision detection from sim-collision
    // ========================================================================

    pub use sim_collision::{
        Aabb, Collider, ColliderPair, CollisionEvent, CollisionEventKind, CollisionWorld,
        CompositeCollider, Contact, ConvexShape, Manifold, TerrainCollider,
    };

    // ========================================================================
    // Constraints from sim-constraint and sim-contact
    // ========================================================================

    pub use sim_constraint::{
        Constraint, ConstraintBounds, ConstraintEquation, ConstraintManager, DistanceConstraint,
        FrictionConstraint, NormalConstraint,
    };
    pub use sim_contact::ContactConstraints;

    // ========================================================================
    // Math from nalgebra
    // ========================================================================

    pub use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};
}
