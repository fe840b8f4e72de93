//! Coulomb friction along one contact tangent.

use nalgebra::Vector3;
use sim_core::RigidBody;
use sim_types::{BodyId, ConstraintId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ConstraintBounds, ConstraintEquation, Jacobian};

/// Opposes sliding along a single tangent direction.
///
/// The row has no bias. Its bounds follow the multiplier of the linked
/// normal constraint, `±μ·λ_n`, and are refreshed by the solver on every
/// iteration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionConstraint {
    bodies: [BodyId; 2],
    tangent: Vector3<f64>,
    offsets: [Vector3<f64>; 2],
    normal: ConstraintId,
    coefficient: f64,
    limit: f64,
    lambda: f64,
}

impl FrictionConstraint {
    /// Create a friction row linked to the normal constraint `normal`.
    #[must_use]
    pub fn new(
        body1: BodyId,
        body2: BodyId,
        tangent: Vector3<f64>,
        offsets: [Vector3<f64>; 2],
        normal: ConstraintId,
        coefficient: f64,
    ) -> Self {
        Self {
            bodies: [body1, body2],
            tangent,
            offsets,
            normal,
            coefficient,
            limit: 0.0,
            lambda: 0.0,
        }
    }

    /// Friction coefficient of a contact between two materials:
    /// `sqrt((μ1² + μ2²) / 2)`.
    #[must_use]
    pub fn mix(mu1: f64, mu2: f64) -> f64 {
        ((mu1 * mu1 + mu2 * mu2) / 2.0).sqrt()
    }

    /// Replace the contact geometry, keeping λ for warm starting.
    pub fn update(&mut self, tangent: Vector3<f64>, offsets: [Vector3<f64>; 2]) {
        self.tangent = tangent;
        self.offsets = offsets;
    }

    /// Tangent direction.
    #[must_use]
    pub fn tangent(&self) -> &Vector3<f64> {
        &self.tangent
    }

    /// Id of the normal constraint whose λ bounds this row.
    #[must_use]
    pub fn normal(&self) -> ConstraintId {
        self.normal
    }

    /// Combined friction coefficient μ.
    #[must_use]
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Set the bounds from the multiplier of the linked normal constraint.
    pub fn set_normal_lambda(&mut self, normal_lambda: f64) {
        self.limit = self.coefficient * normal_lambda;
    }
}

impl ConstraintEquation for FrictionConstraint {
    fn bodies(&self) -> [BodyId; 2] {
        self.bodies
    }

    fn jacobian(&self, _bodies: [&RigidBody; 2]) -> Jacobian {
        Jacobian::along(&self.tangent, &self.offsets[0], &self.offsets[1])
    }

    fn bias(&self, _bodies: [&RigidBody; 2], _dt: f64) -> f64 {
        0.0
    }

    fn bounds(&self) -> ConstraintBounds {
        ConstraintBounds::symmetric(self.limit)
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }
}
