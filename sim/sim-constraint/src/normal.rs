//! Contact non-penetration constraint.

use nalgebra::Vector3;
use sim_core::RigidBody;
use sim_types::{BodyId, ContactConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ConstraintBounds, ConstraintEquation, Jacobian};

/// Keeps two bodies from interpenetrating at one contact point.
///
/// The normal points from the first body to the second, and the offsets are
/// the world-space vectors from each center of mass to its contact point.
/// The row can only push (`λ ≥ 0`). Its bias combines Baumgarte position
/// correction with restitution:
///
/// ```text
/// depth = -((x2 + r2) - (x1 + r1)) · n
/// v_n   = J · v
/// bias  = β/dt · max(depth - slop_p, 0) + e · max(-v_n - slop_r, 0)
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalConstraint {
    bodies: [BodyId; 2],
    normal: Vector3<f64>,
    offsets: [Vector3<f64>; 2],
    config: ContactConfig,
    lambda: f64,
}

impl NormalConstraint {
    /// Create a contact constraint.
    #[must_use]
    pub fn new(
        body1: BodyId,
        body2: BodyId,
        normal: Vector3<f64>,
        offsets: [Vector3<f64>; 2],
        config: ContactConfig,
    ) -> Self {
        Self {
            bodies: [body1, body2],
            normal,
            offsets,
            config,
            lambda: 0.0,
        }
    }

    /// Replace the contact geometry, keeping λ for warm starting.
    pub fn update(&mut self, normal: Vector3<f64>, offsets: [Vector3<f64>; 2]) {
        self.normal = normal;
        self.offsets = offsets;
    }

    /// Contact normal, from the first body to the second.
    #[must_use]
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// World offsets of the contact point from each center of mass.
    #[must_use]
    pub fn offsets(&self) -> &[Vector3<f64>; 2] {
        &self.offsets
    }

    /// Penetration depth along the normal for the current body positions.
    #[must_use]
    pub fn depth(&self, bodies: [&RigidBody; 2]) -> f64 {
        let p1 = bodies[0].position() + self.offsets[0];
        let p2 = bodies[1].position() + self.offsets[1];
        -(p2 - p1).dot(&self.normal)
    }
}

impl ConstraintEquation for NormalConstraint {
    fn bodies(&self) -> [BodyId; 2] {
        self.bodies
    }

    fn jacobian(&self, _bodies: [&RigidBody; 2]) -> Jacobian {
        Jacobian::along(&self.normal, &self.offsets[0], &self.offsets[1])
    }

    fn bias(&self, bodies: [&RigidBody; 2], dt: f64) -> f64 {
        let depth = self.depth(bodies);
        let v_n = self.jacobian(bodies).velocity(bodies);

        let position = self.config.beta / dt * (depth - self.config.slop_penetration).max(0.0);
        let restitution =
            self.config.restitution * (-v_n - self.config.slop_restitution).max(0.0);
        position + restitution
    }

    fn bounds(&self) -> ConstraintBounds {
        ConstraintBounds::unilateral()
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }
}
