//! Constraint equations shared by the solver.
//!
//! Every constraint is a single scalar row of the system `J · v = bias`
//! between two bodies, with its multiplier clamped into
//! [`ConstraintBounds`]:
//!
//! ```text
//! J = [J_lin1, J_ang1, J_lin2, J_ang2]      (12 floats)
//! alpha_min <= λ <= alpha_max
//! ```
//!
//! The solver only sees the [`ConstraintEquation`] capability; the concrete
//! rows are the closed set in [`Constraint`].

use nalgebra::Vector3;
use sim_core::RigidBody;
use sim_types::BodyId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{DistanceConstraint, FrictionConstraint, NormalConstraint};

/// Interval the multiplier of a constraint is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintBounds {
    /// Lower bound of λ.
    pub alpha_min: f64,
    /// Upper bound of λ.
    pub alpha_max: f64,
}

impl Default for ConstraintBounds {
    fn default() -> Self {
        Self::bilateral()
    }
}

impl ConstraintBounds {
    /// Bounds `[alpha_min, alpha_max]`.
    #[must_use]
    pub const fn new(alpha_min: f64, alpha_max: f64) -> Self {
        Self {
            alpha_min,
            alpha_max,
        }
    }

    /// `(-∞, ∞)`: an equality constraint.
    #[must_use]
    pub const fn bilateral() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// `[0, ∞)`: the constraint can only push.
    #[must_use]
    pub const fn unilateral() -> Self {
        Self::new(0.0, f64::INFINITY)
    }

    /// `[-limit, limit]`. A negative limit collapses to zero.
    #[must_use]
    pub fn symmetric(limit: f64) -> Self {
        let limit = limit.max(0.0);
        Self::new(-limit, limit)
    }

    /// Clamp a multiplier into the bounds.
    #[must_use]
    pub fn clamp(&self, lambda: f64) -> f64 {
        lambda.max(self.alpha_min).min(self.alpha_max)
    }

    /// Check whether `lambda` lies inside the bounds.
    #[must_use]
    pub fn contains(&self, lambda: f64) -> bool {
        lambda >= self.alpha_min && lambda <= self.alpha_max
    }
}

/// Jacobian row of a constraint: `[J_lin1, J_ang1, J_lin2, J_ang2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jacobian([Vector3<f64>; 4]);

impl Jacobian {
    /// Build from the four blocks.
    #[must_use]
    pub const fn new(
        linear1: Vector3<f64>,
        angular1: Vector3<f64>,
        linear2: Vector3<f64>,
        angular2: Vector3<f64>,
    ) -> Self {
        Self([linear1, angular1, linear2, angular2])
    }

    /// Row measuring the relative velocity of the two anchor points along
    /// `direction`: `[-d, -(r1 × d), d, r2 × d]`.
    #[must_use]
    pub fn along(direction: &Vector3<f64>, r1: &Vector3<f64>, r2: &Vector3<f64>) -> Self {
        Self::new(
            -direction,
            -r1.cross(direction),
            *direction,
            r2.cross(direction),
        )
    }

    /// The four 3-vector blocks.
    #[must_use]
    pub fn blocks(&self) -> &[Vector3<f64>; 4] {
        &self.0
    }

    /// Linear block for body `0` or `1`.
    #[must_use]
    pub fn linear(&self, body: usize) -> &Vector3<f64> {
        &self.0[2 * body]
    }

    /// Angular block for body `0` or `1`.
    #[must_use]
    pub fn angular(&self, body: usize) -> &Vector3<f64> {
        &self.0[2 * body + 1]
    }

    /// The row as 12 floats.
    #[must_use]
    pub fn to_array(&self) -> [f64; 12] {
        let mut row = [0.0; 12];
        for (block, chunk) in self.0.iter().zip(row.chunks_exact_mut(3)) {
            chunk.copy_from_slice(block.as_slice());
        }
        row
    }

    /// Dot product with a stacked 12-vector given as four blocks.
    #[must_use]
    pub fn dot(&self, blocks: &[Vector3<f64>; 4]) -> f64 {
        self.0.iter().zip(blocks).map(|(j, v)| j.dot(v)).sum()
    }

    /// `J · v` for the current velocities of two bodies.
    #[must_use]
    pub fn velocity(&self, bodies: [&RigidBody; 2]) -> f64 {
        self.dot(&[
            bodies[0].linear_velocity(),
            bodies[0].angular_velocity(),
            bodies[1].linear_velocity(),
            bodies[1].angular_velocity(),
        ])
    }
}

/// A scalar constraint row between two bodies.
///
/// `bias` is the target value of `J · v` after the solve, in m/s.
pub trait ConstraintEquation {
    /// The constrained bodies, in Jacobian order.
    fn bodies(&self) -> [BodyId; 2];

    /// Jacobian row for the current body state.
    fn jacobian(&self, bodies: [&RigidBody; 2]) -> Jacobian;

    /// Target velocity along the row.
    fn bias(&self, bodies: [&RigidBody; 2], dt: f64) -> f64;

    /// Interval λ is clamped into.
    fn bounds(&self) -> ConstraintBounds;

    /// Multiplier from the last solve, used for warm starting.
    fn lambda(&self) -> f64;

    /// Store the multiplier of the last solve.
    fn set_lambda(&mut self, lambda: f64);
}

/// The constraints the solver knows about.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Constraint {
    /// Non-penetration at a contact point.
    Normal(NormalConstraint),
    /// Coulomb friction along one tangent of a contact.
    Friction(FrictionConstraint),
    /// Fixed distance between two anchor points.
    Distance(DistanceConstraint),
}

impl Constraint {
    /// Human-readable kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Normal(_) => "normal",
            Self::Friction(_) => "friction",
            Self::Distance(_) => "distance",
        }
    }

    /// Get the normal constraint, if this is one.
    #[must_use]
    pub fn as_normal(&self) -> Option<&NormalConstraint> {
        match self {
            Self::Normal(c) => Some(c),
            _ => None,
        }
    }

    /// Get the normal constraint mutably, if this is one.
    pub fn as_normal_mut(&mut self) -> Option<&mut NormalConstraint> {
        match self {
            Self::Normal(c) => Some(c),
            _ => None,
        }
    }

    /// Get the friction constraint, if this is one.
    #[must_use]
    pub fn as_friction(&self) -> Option<&FrictionConstraint> {
        match self {
            Self::Friction(c) => Some(c),
            _ => None,
        }
    }

    /// Get the friction constraint mutably, if this is one.
    pub fn as_friction_mut(&mut self) -> Option<&mut FrictionConstraint> {
        match self {
            Self::Friction(c) => Some(c),
            _ => None,
        }
    }

    /// Get the distance constraint, if this is one.
    #[must_use]
    pub fn as_distance(&self) -> Option<&DistanceConstraint> {
        match self {
            Self::Distance(c) => Some(c),
            _ => None,
        }
    }
}

impl ConstraintEquation for Constraint {
    fn bodies(&self) -> [BodyId; 2] {
        match self {
            Self::Normal(c) => c.bodies(),
            Self::Friction(c) => c.bodies(),
            Self::Distance(c) => c.bodies(),
        }
    }

    fn jacobian(&self, bodies: [&RigidBody; 2]) -> Jacobian {
        match self {
            Self::Normal(c) => c.jacobian(bodies),
            Self::Friction(c) => c.jacobian(bodies),
            Self::Distance(c) => c.jacobian(bodies),
        }
    }

    fn bias(&self, bodies: [&RigidBody; 2], dt: f64) -> f64 {
        match self {
            Self::Normal(c) => c.bias(bodies, dt),
            Self::Friction(c) => c.bias(bodies, dt),
            Self::Distance(c) => c.bias(bodies, dt),
        }
    }

    fn bounds(&self) -> ConstraintBounds {
        match self {
            Self::Normal(c) => c.bounds(),
            Self::Friction(c) => c.bounds(),
            Self::Distance(c) => c.bounds(),
        }
    }

    fn lambda(&self) -> f64 {
        match self {
            Self::Normal(c) => c.lambda(),
            Self::Friction(c) => c.lambda(),
            Self::Distance(c) => c.lambda(),
        }
    }

    fn set_lambda(&mut self, lambda: f64) {
        match self {
            Self::Normal(c) => c.set_lambda(lambda),
            Self::Friction(c) => c.set_lambda(lambda),
            Self::Distance(c) => c.set_lambda(lambda),
        }
    }
}

impl From<NormalConstraint> for Constraint {
    fn from(c: NormalConstraint) -> Self {
        Self::Normal(c)
    }
}

impl From<FrictionConstraint> for Constraint {
    fn from(c: FrictionConstraint) -> Self {
        Self::Friction(c)
    }
}

impl From<DistanceConstraint> for Constraint {
    fn from(c: DistanceConstraint) -> Self {
        Self::Distance(c)
    }
}
