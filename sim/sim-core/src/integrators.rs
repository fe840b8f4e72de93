//! Semi-implicit Euler integration for rigid body dynamics.
//!
//! Velocity is advanced first and the new velocity is used for the position
//! update. This is symplectic and stays stable for the stiff contact
//! stacks the constraint solver produces.
//!
//! ```text
//! v(t+dt) = v(t) * slow_down^dt + a(t) * dt
//! x(t+dt) = x(t) + v(t+dt) * dt
//! ```
//!
//! # Example
//!
//! ```
//! use sim_core::integrators::SemiImplicitEuler;
//! use nalgebra::{Point3, Vector3};
//!
//! let (velocity, position) = SemiImplicitEuler::linear(
//!     Point3::new(0.0, 0.0, 10.0),
//!     Vector3::zeros(),
//!     Vector3::new(0.0, 0.0, -9.81),
//!     1.0,
//!     0.01,
//! );
//!
//! assert!(position.z < 10.0);
//! assert!(velocity.z < 0.0);
//! ```

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Semi-implicit Euler integration (symplectic Euler).
pub struct SemiImplicitEuler;

impl SemiImplicitEuler {
    /// Advance a linear state, returning the new `(velocity, position)`.
    ///
    /// `slow_down` is the fraction of velocity kept after one second; `1.0`
    /// disables damping.
    #[must_use]
    pub fn linear(
        position: Point3<f64>,
        velocity: Vector3<f64>,
        acceleration: Vector3<f64>,
        slow_down: f64,
        dt: f64,
    ) -> (Vector3<f64>, Point3<f64>) {
        let velocity = damp(velocity, slow_down, dt) + acceleration * dt;
        (velocity, position + velocity * dt)
    }

    /// Advance an angular state, returning the new `(angular_velocity, orientation)`.
    ///
    /// The angular velocity is expressed in world coordinates.
    #[must_use]
    pub fn angular(
        orientation: UnitQuaternion<f64>,
        angular_velocity: Vector3<f64>,
        angular_acceleration: Vector3<f64>,
        slow_down: f64,
        dt: f64,
    ) -> (Vector3<f64>, UnitQuaternion<f64>) {
        let angular_velocity = damp(angular_velocity, slow_down, dt) + angular_acceleration * dt;
        (
            angular_velocity,
            integrate_rotation(orientation, &angular_velocity, dt),
        )
    }
}

/// Apply exponential damping: `v * slow_down^dt`.
#[must_use]
pub fn damp(velocity: Vector3<f64>, slow_down: f64, dt: f64) -> Vector3<f64> {
    if slow_down >= 1.0 {
        velocity
    } else {
        velocity * slow_down.max(0.0).powf(dt)
    }
}

/// Integrate an orientation by a world-space angular velocity.
///
/// The incremental rotation is applied on the left and the result is
/// renormalized so drift never accumulates.
#[must_use]
pub fn integrate_rotation(
    rotation: UnitQuaternion<f64>,
    omega: &Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    if omega.norm() < 1e-12 {
        return rotation;
    }

    let delta_q = UnitQuaternion::from_scaled_axis(omega * dt);
    UnitQuaternion::new_normalize((delta_q * rotation).into_inner())
}

/// World-space inverse inertia tensor `R · I⁻¹ · Rᵀ`.
#[must_use]
pub fn world_inverse_inertia(
    rotation: &UnitQuaternion<f64>,
    local_inverse_inertia: &Matrix3<f64>,
) -> Matrix3<f64> {
    let r = rotation.to_rotation_matrix();
    r.matrix() * local_inverse_inertia * r.matrix().transpose()
}
