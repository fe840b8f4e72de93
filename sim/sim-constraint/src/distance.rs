//! Rigid distance joint.

use nalgebra::{Point3, Vector3};
use sim_core::RigidBody;
use sim_types::BodyId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ConstraintBounds, ConstraintEquation, Jacobian};

/// Keeps two body-local anchor points at a fixed distance.
///
/// ```text
/// r_i  = R_i · anchor_i
/// d    = (x2 + r2) - (x1 + r1),   u = d / |d|
/// J    = [-u, -(r1 × u), u, r2 × u]
/// bias = -β/dt · (|d| - rest_length)
/// ```
///
/// When the anchors coincide the row falls back to the +X axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceConstraint {
    bodies: [BodyId; 2],
    anchors: [Point3<f64>; 2],
    rest_length: f64,
    beta: f64,
    lambda: f64,
}

impl DistanceConstraint {
    /// Default position correction factor.
    pub const DEFAULT_BETA: f64 = 0.1;

    /// Connect `anchor1` on `body1` to `anchor2` on `body2`, both in body
    /// coordinates.
    #[must_use]
    pub fn new(
        body1: BodyId,
        anchor1: Point3<f64>,
        body2: BodyId,
        anchor2: Point3<f64>,
        rest_length: f64,
    ) -> Self {
        Self {
            bodies: [body1, body2],
            anchors: [anchor1, anchor2],
            rest_length,
            beta: Self::DEFAULT_BETA,
            lambda: 0.0,
        }
    }

    /// Set the position correction factor.
    #[must_use]
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Anchors in body coordinates.
    #[must_use]
    pub fn anchors(&self) -> &[Point3<f64>; 2] {
        &self.anchors
    }

    /// Target distance between the anchors.
    #[must_use]
    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// World-space offsets of the anchors from each center of mass.
    #[must_use]
    pub fn offsets(&self, bodies: [&RigidBody; 2]) -> [Vector3<f64>; 2] {
        [
            bodies[0].orientation() * self.anchors[0].coords,
            bodies[1].orientation() * self.anchors[1].coords,
        ]
    }

    /// Vector from the first anchor to the second in world coordinates.
    #[must_use]
    pub fn separation(&self, bodies: [&RigidBody; 2]) -> Vector3<f64> {
        let [r1, r2] = self.offsets(bodies);
        (bodies[1].position() + r2) - (bodies[0].position() + r1)
    }

    /// Current distance between the anchors.
    #[must_use]
    pub fn current_length(&self, bodies: [&RigidBody; 2]) -> f64 {
        self.separation(bodies).norm()
    }

    fn direction(&self, bodies: [&RigidBody; 2]) -> Vector3<f64> {
        self.separation(bodies)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::x)
    }
}

impl ConstraintEquation for DistanceConstraint {
    fn bodies(&self) -> [BodyId; 2] {
        self.bodies
    }

    fn jacobian(&self, bodies: [&RigidBody; 2]) -> Jacobian {
        let [r1, r2] = self.offsets(bodies);
        Jacobian::along(&self.direction(bodies), &r1, &r2)
    }

    fn bias(&self, bodies: [&RigidBody; 2], dt: f64) -> f64 {
        -self.beta / dt * (self.current_length(bodies) - self.rest_length)
    }

    fn bounds(&self) -> ConstraintBounds {
        ConstraintBounds::bilateral()
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use sim_core::RigidBodyConfig;
    use sim_types::Pose;
    use std::f64::consts::FRAC_PI_2;

    fn body_at(x: f64, y: f64, z: f64) -> RigidBody {
        RigidBody::new(
            RigidBodyConfig::default(),
            Pose::from_position(Point3::new(x, y, z)),
        )
    }

    #[test]
    fn test_anchors_follow_rotation() {
        let a = body_at(0.0, 0.0, 0.0);
        let b = RigidBody::new(
            RigidBodyConfig::default(),
            Pose::from_position_rotation(
                Point3::new(2.0, 0.0, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
            ),
        );
        let c = DistanceConstraint::new(
            BodyId::new(0),
            Point3::origin(),
            BodyId::new(1),
            Point3::new(1.0, 0.0, 0.0),
            1.0,
        );

        let [_, r2] = c.offsets([&a, &b]);
        assert_relative_eq!(r2, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(
            c.separation([&a, &b]),
            Vector3::new(2.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_bias_pulls_back_to_rest_length() {
        let a = body_at(0.0, 0.0, 0.0);
        let b = body_at(1.5, 0.0, 0.0);
        let c = DistanceConstraint::new(BodyId::new(0), Point3::origin(), BodyId::new(1), Point3::origin(), 1.0)
            .with_beta(0.2);

        // Too long: the target velocity along +x is negative.
        assert_relative_eq!(c.bias([&a, &b], 0.1), -0.2 / 0.1 * 0.5, epsilon = 1e-12);
        let j = c.jacobian([&a, &b]);
        assert_relative_eq!(*j.linear(1), Vector3::x(), epsilon = 1e-12);
        assert_eq!(c.bounds(), ConstraintBounds::bilateral());
    }

    #[test]
    fn test_coincident_anchors_fall_back_to_x() {
        let a = body_at(0.0, 0.0, 0.0);
        let b = body_at(0.0, 0.0, 0.0);
        let c = DistanceConstraint::new(BodyId::new(0), Point3::origin(), BodyId::new(1), Point3::origin(), 0.0);
        let j = c.jacobian([&a, &b]);
        assert_eq!(*j.linear(1), Vector3::x());
        assert_eq!(c.bias([&a, &b], 0.01), 0.0);
    }
}
