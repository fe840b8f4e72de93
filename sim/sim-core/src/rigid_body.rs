//! Rigid bodies: configuration, kinematic state and sleep tracking.
//!
//! A [`RigidBody`] owns everything the solver needs about one body:
//!
//! - [`RigidBodyConfig`]: inverse mass, inverse inertia, damping, friction
//! - [`RigidBodyData`]: pose, velocities, accelerations, accumulated forces
//! - derived data recomputed after every pose change (world transform and
//!   world-space inverse inertia)
//! - [`BodyStates`]: the per-step state bits and the sleep flag
//!
//! Bodies with zero inverse mass and zero inverse inertia are immovable.
//! They are permanently asleep, never integrated, and ignore forces.
//!
//! # Example
//!
//! ```
//! use sim_core::{RigidBody, RigidBodyConfig};
//! use sim_types::{MassProperties, Pose};
//! use nalgebra::{Point3, Vector3};
//!
//! let config = RigidBodyConfig::from_mass_properties(&MassProperties::sphere(1.0, 0.5));
//! let mut body = RigidBody::new(config, Pose::from_position(Point3::new(0.0, 0.0, 1.0)));
//!
//! body.add_force(Vector3::new(0.0, 0.0, -9.81));
//! body.integrate(0.01);
//! body.clear_forces();
//!
//! assert!(body.linear_velocity().z < 0.0);
//! ```

use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};
use sim_types::{MassProperties, Pose, SleepConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::integrators::{SemiImplicitEuler, world_inverse_inertia};

/// One bit of a [`BodyStates`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyState {
    /// Simulation of the body is stopped until something wakes it.
    Sleeping,
    /// The pose or velocity changed; cleared by whoever reads it back.
    Updated,
    /// The body was integrated without constraints this step.
    Integrated,
    /// The constraint solver moved the body this step.
    ConstraintsSolved,
}

impl BodyState {
    const fn bit(self) -> u8 {
        match self {
            Self::Sleeping => 1,
            Self::Updated => 1 << 1,
            Self::Integrated => 1 << 2,
            Self::ConstraintsSolved => 1 << 3,
        }
    }
}

/// Bitset of [`BodyState`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyStates(u8);

impl BodyStates {
    /// Empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check whether a state is set.
    #[must_use]
    pub const fn contains(self, state: BodyState) -> bool {
        self.0 & state.bit() != 0
    }

    /// Set a state.
    pub fn insert(&mut self, state: BodyState) {
        self.0 |= state.bit();
    }

    /// Clear a state.
    pub fn remove(&mut self, state: BodyState) {
        self.0 &= !state.bit();
    }

    /// Set or clear a state.
    pub fn set(&mut self, state: BodyState, value: bool) {
        if value {
            self.insert(state);
        } else {
            self.remove(state);
        }
    }
}

/// Static properties of a rigid body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyConfig {
    /// Inverse of the mass. Zero means infinite mass.
    pub inverse_mass: f64,
    /// Inverse inertia tensor in body coordinates.
    pub inverse_inertia: Matrix3<f64>,
    /// Fraction of linear velocity kept after one second.
    pub linear_slow_down: f64,
    /// Fraction of angular velocity kept after one second.
    pub angular_slow_down: f64,
    /// Coulomb friction coefficient.
    pub friction_coefficient: f64,
}

impl Default for RigidBodyConfig {
    fn default() -> Self {
        Self::from_mass_properties(&MassProperties::sphere(1.0, 0.5))
    }
}

impl RigidBodyConfig {
    /// Configuration of a dynamic body with the given mass and body-space inertia.
    #[must_use]
    pub fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self::from_mass_properties(&MassProperties::new(mass, inertia))
    }

    /// Configuration derived from mass properties.
    #[must_use]
    pub fn from_mass_properties(props: &MassProperties) -> Self {
        Self {
            inverse_mass: props.inverse_mass(),
            inverse_inertia: props.inverse_inertia(),
            linear_slow_down: 0.95,
            angular_slow_down: 0.95,
            friction_coefficient: 0.5,
        }
    }

    /// Configuration of an immovable body.
    #[must_use]
    pub fn immovable() -> Self {
        Self::from_mass_properties(&MassProperties::immovable())
    }

    /// Set both damping factors.
    #[must_use]
    pub fn with_slow_down(mut self, linear: f64, angular: f64) -> Self {
        self.linear_slow_down = linear;
        self.angular_slow_down = angular;
        self
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction_coefficient = friction;
        self
    }

    /// Check whether the configuration describes an immovable body.
    #[must_use]
    pub fn is_immovable(&self) -> bool {
        self.inverse_mass == 0.0 && self.inverse_inertia == Matrix3::zeros()
    }
}

/// Kinematic and dynamic state of a rigid body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyData {
    /// Center of mass in world coordinates.
    pub position: Point3<f64>,
    /// Orientation; kept unit length.
    pub orientation: UnitQuaternion<f64>,
    /// Linear velocity (m/s).
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity in world coordinates (rad/s).
    pub angular_velocity: Vector3<f64>,
    /// Linear acceleration from the last integration.
    pub linear_acceleration: Vector3<f64>,
    /// Angular acceleration from the last integration.
    pub angular_acceleration: Vector3<f64>,
    /// Accumulated force, cleared after integration.
    pub force_sum: Vector3<f64>,
    /// Accumulated torque, cleared after integration.
    pub torque_sum: Vector3<f64>,
}

impl RigidBodyData {
    fn at_rest(pose: Pose) -> Self {
        Self {
            position: pose.position,
            orientation: pose.rotation,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            linear_acceleration: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
            force_sum: Vector3::zeros(),
            torque_sum: Vector3::zeros(),
        }
    }
}

/// A simulated rigid body.
#[derive(Debug, Clone)]
pub struct RigidBody {
    config: RigidBodyConfig,
    data: RigidBodyData,
    transform: Isometry3<f64>,
    world_inverse_inertia: Matrix3<f64>,
    motion: f64,
    resting_steps: u32,
    states: BodyStates,
}

impl RigidBody {
    /// Create a body at rest with the given pose.
    #[must_use]
    pub fn new(config: RigidBodyConfig, pose: Pose) -> Self {
        let mut body = Self {
            config,
            data: RigidBodyData::at_rest(pose),
            transform: Isometry3::identity(),
            world_inverse_inertia: Matrix3::zeros(),
            motion: 0.0,
            resting_steps: 0,
            states: BodyStates::empty(),
        };
        body.synch_with_data();
        if body.is_immovable() {
            body.states.insert(BodyState::Sleeping);
        }
        body
    }

    /// Create an immovable body.
    #[must_use]
    pub fn immovable(pose: Pose) -> Self {
        Self::new(RigidBodyConfig::immovable(), pose)
    }

    /// Set the initial linear velocity.
    #[must_use]
    pub fn with_linear_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.set_linear_velocity(velocity);
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.set_angular_velocity(velocity);
        self
    }

    /// Static configuration.
    #[must_use]
    pub fn config(&self) -> &RigidBodyConfig {
        &self.config
    }

    /// Kinematic and dynamic state.
    #[must_use]
    pub fn data(&self) -> &RigidBodyData {
        &self.data
    }

    /// Center of mass in world coordinates.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.data.position
    }

    /// Orientation.
    #[must_use]
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.data.orientation
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> Pose {
        Pose::from_position_rotation(self.data.position, self.data.orientation)
    }

    /// Linear velocity.
    #[must_use]
    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.data.linear_velocity
    }

    /// Angular velocity in world coordinates.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.data.angular_velocity
    }

    /// Cached local-to-world transform.
    #[must_use]
    pub fn transform(&self) -> &Isometry3<f64> {
        &self.transform
    }

    /// Inverse inertia tensor in world coordinates.
    #[must_use]
    pub fn world_inverse_inertia(&self) -> &Matrix3<f64> {
        &self.world_inverse_inertia
    }

    /// Inverse mass.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        self.config.inverse_mass
    }

    /// Current value of the sleep motion metric.
    #[must_use]
    pub fn motion(&self) -> f64 {
        self.motion
    }

    /// State bits.
    #[must_use]
    pub fn states(&self) -> BodyStates {
        self.states
    }

    /// Check a single state bit.
    #[must_use]
    pub fn check_state(&self, state: BodyState) -> bool {
        self.states.contains(state)
    }

    /// Whether the body is asleep.
    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.states.contains(BodyState::Sleeping)
    }

    /// Whether the body has infinite mass and inertia.
    #[must_use]
    pub fn is_immovable(&self) -> bool {
        self.config.is_immovable()
    }

    /// Overwrite the pose from an external source and wake the body.
    pub fn set_pose(&mut self, pose: Pose) {
        self.data.position = pose.position;
        self.data.orientation = pose.rotation;
        self.synch_with_data();
        self.states.insert(BodyState::Updated);
        self.wake_up();
    }

    /// Overwrite the linear velocity and wake the body.
    pub fn set_linear_velocity(&mut self, velocity: Vector3<f64>) {
        if self.is_immovable() {
            return;
        }
        self.data.linear_velocity = velocity;
        self.wake_up();
    }

    /// Overwrite the angular velocity and wake the body.
    pub fn set_angular_velocity(&mut self, velocity: Vector3<f64>) {
        if self.is_immovable() {
            return;
        }
        self.data.angular_velocity = velocity;
        self.wake_up();
    }

    /// Recompute the derived data from position and orientation.
    pub fn synch_with_data(&mut self) {
        self.data.orientation = UnitQuaternion::new_normalize(self.data.orientation.into_inner());
        self.transform =
            Isometry3::from_parts(self.data.position.coords.into(), self.data.orientation);
        self.world_inverse_inertia =
            world_inverse_inertia(&self.data.orientation, &self.config.inverse_inertia);
    }

    /// Accumulate a force through the center of mass.
    pub fn add_force(&mut self, force: Vector3<f64>) {
        if self.is_immovable() {
            return;
        }
        self.data.force_sum += force;
        self.wake_up();
    }

    /// Accumulate a force applied at a world-space point.
    pub fn add_force_at_point(&mut self, force: Vector3<f64>, point: Point3<f64>) {
        if self.is_immovable() {
            return;
        }
        self.data.force_sum += force;
        self.data.torque_sum += (point - self.data.position).cross(&force);
        self.wake_up();
    }

    /// Accumulate a force applied at a point in body coordinates.
    pub fn add_force_at_local_point(&mut self, force: Vector3<f64>, local_point: Point3<f64>) {
        let point = self.transform.transform_point(&local_point);
        self.add_force_at_point(force, point);
    }

    /// Accumulate a torque.
    pub fn add_torque(&mut self, torque: Vector3<f64>) {
        if self.is_immovable() {
            return;
        }
        self.data.torque_sum += torque;
        self.wake_up();
    }

    /// Apply an instantaneous impulse at a world-space point.
    pub fn apply_impulse(&mut self, impulse: Vector3<f64>, point: Point3<f64>) {
        if self.is_immovable() {
            return;
        }
        let r = point - self.data.position;
        self.data.linear_velocity += impulse * self.config.inverse_mass;
        self.data.angular_velocity += self.world_inverse_inertia * r.cross(&impulse);
        self.wake_up();
    }

    /// Clear the accumulated force and torque.
    pub fn clear_forces(&mut self) {
        self.data.force_sum = Vector3::zeros();
        self.data.torque_sum = Vector3::zeros();
    }

    /// Add a velocity change computed by the constraint solver.
    pub fn apply_velocity_delta(&mut self, linear: Vector3<f64>, angular: Vector3<f64>) {
        if self.is_immovable() {
            return;
        }
        self.data.linear_velocity += linear;
        self.data.angular_velocity += angular;
    }

    /// Advance the body by `dt` with semi-implicit Euler.
    ///
    /// Sleeping and immovable bodies are left untouched. Forces are not
    /// cleared here; see [`RigidBody::clear_forces`].
    pub fn integrate(&mut self, dt: f64) {
        if self.is_immovable() || self.is_sleeping() {
            return;
        }

        let linear_acceleration = self.data.force_sum * self.config.inverse_mass;
        let (linear_velocity, position) = SemiImplicitEuler::linear(
            self.data.position,
            self.data.linear_velocity,
            linear_acceleration,
            self.config.linear_slow_down,
            dt,
        );

        let angular_acceleration = self.world_inverse_inertia * self.data.torque_sum;
        let (angular_velocity, orientation) = SemiImplicitEuler::angular(
            self.data.orientation,
            self.data.angular_velocity,
            angular_acceleration,
            self.config.angular_slow_down,
            dt,
        );

        self.data.linear_acceleration = linear_acceleration;
        self.data.linear_velocity = linear_velocity;
        self.data.position = position;
        self.data.angular_acceleration = angular_acceleration;
        self.data.angular_velocity = angular_velocity;
        self.data.orientation = orientation;
        self.synch_with_data();

        self.states.insert(BodyState::Integrated);
        self.states.insert(BodyState::Updated);
    }

    /// Mark the body as moved by the constraint solver.
    pub fn mark_constraints_solved(&mut self) {
        self.states.insert(BodyState::ConstraintsSolved);
        self.states.insert(BodyState::Updated);
        self.states.remove(BodyState::Sleeping);
    }

    /// Clear the per-step bits (`Integrated`, `ConstraintsSolved`).
    pub fn reset_step_states(&mut self) {
        self.states.remove(BodyState::Integrated);
        self.states.remove(BodyState::ConstraintsSolved);
    }

    /// Clear the `Updated` bit after reading the body back.
    pub fn clear_updated(&mut self) {
        self.states.remove(BodyState::Updated);
    }

    /// Wake the body so it is integrated and solved again.
    ///
    /// Awake bodies are left as they are, so accumulating forces does not
    /// reset the rest counter.
    pub fn wake_up(&mut self) {
        if self.is_immovable() || !self.is_sleeping() {
            return;
        }
        self.states.remove(BodyState::Sleeping);
        self.resting_steps = 0;
        self.motion = self.motion.max(f64::EPSILON);
    }

    /// Put the body to sleep, zeroing its velocities.
    pub fn put_to_sleep(&mut self) {
        self.data.linear_velocity = Vector3::zeros();
        self.data.angular_velocity = Vector3::zeros();
        self.motion = 0.0;
        self.resting_steps = 0;
        self.states.insert(BodyState::Sleeping);
    }

    /// Update the motion metric and fall asleep after enough resting steps.
    ///
    /// Returns `true` if the body fell asleep during this call.
    pub fn update_sleep(&mut self, config: &SleepConfig) -> bool {
        if self.is_immovable() {
            self.states.insert(BodyState::Sleeping);
            return false;
        }
        if !config.enabled || self.is_sleeping() {
            return false;
        }

        let current = self.data.linear_velocity.norm_squared()
            + self.data.angular_velocity.norm_squared();
        let motion =
            config.motion_bias * self.motion + (1.0 - config.motion_bias) * current;
        self.motion = motion.min(10.0 * config.sleep_motion);

        if self.motion < config.sleep_motion {
            self.resting_steps += 1;
            if self.resting_steps >= config.steps_to_sleep {
                self.put_to_sleep();
                return true;
            }
        } else {
            self.resting_steps = 0;
        }
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn undamped(mass: f64) -> RigidBodyConfig {
        RigidBodyConfig::new(mass, Matrix3::identity() * (2.0 / 5.0) * mass * 4.0)
            .with_slow_down(1.0, 1.0)
    }

    #[test]
    fn test_integrate_constant_velocity() {
        let mut body = RigidBody::new(undamped(3.5), Pose::from_position(Point3::new(-3.0, 2.0, -5.0)))
            .with_linear_velocity(Vector3::new(2.5, -2.0, -0.5));

        body.integrate(0.016);

        assert_relative_eq!(body.position(), Point3::new(-2.96, 1.968, -5.008), epsilon = 1e-9);
        assert_relative_eq!(body.linear_velocity(), Vector3::new(2.5, -2.0, -0.5), epsilon = 1e-12);
        assert!(body.check_state(BodyState::Integrated));
        assert!(body.check_state(BodyState::Updated));
    }

    #[test]
    fn test_integrate_with_force() {
        let mut body = RigidBody::new(
            undamped(4.512),
            Pose::from_position(Point3::new(-3.146, 2.95, -5.2)),
        )
        .with_linear_velocity(Vector3::new(-0.13, -3.6, 10.125));

        body.add_force(Vector3::new(8.11, -10.31, -6.8124));
        body.integrate(0.016);

        assert_relative_eq!(
            body.position(),
            Point3::new(-3.147_619_724, 2.891_815_185, -5.038_386_344),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            body.linear_velocity(),
            Vector3::new(-0.101_241_126, -3.636_560_201, 10.100_842_475),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            body.data().linear_acceleration,
            Vector3::new(1.797_428_965, -2.285_017_728, -1.509_840_369),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_forces_persist_until_cleared() {
        let mut body = RigidBody::new(undamped(1.0), Pose::identity());
        body.add_force(Vector3::new(1.0, 0.0, 0.0));
        body.integrate(0.1);
        assert_eq!(body.data().force_sum, Vector3::new(1.0, 0.0, 0.0));
        body.clear_forces();
        assert_eq!(body.data().force_sum, Vector3::zeros());
    }

    #[test]
    fn test_force_at_point_produces_torque() {
        let mut body = RigidBody::new(undamped(1.0), Pose::from_position(Point3::new(1.0, 0.0, 0.0)));
        body.add_force_at_point(Vector3::new(0.0, 1.0, 0.0), Point3::new(2.0, 0.0, 0.0));
        // r = (1, 0, 0), f = (0, 1, 0) -> torque about +Z
        assert_relative_eq!(body.data().torque_sum, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_force_at_local_point_uses_orientation() {
        let pose = Pose::from_position_rotation(
            Point3::origin(),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0),
        );
        let mut body = RigidBody::new(undamped(1.0), pose);
        // Local +X is world +Y after the quarter turn.
        body.add_force_at_local_point(Vector3::new(1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(body.data().torque_sum, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_angular_integration_keeps_unit_orientation() {
        let mut body = RigidBody::new(undamped(2.0), Pose::identity())
            .with_angular_velocity(Vector3::new(0.0, 0.0, 2.0));

        for _ in 0..1000 {
            body.integrate(0.016);
        }

        assert_relative_eq!(body.orientation().norm(), 1.0, epsilon = 1e-12);
        let axis = body.orientation().axis().unwrap();
        assert_relative_eq!(axis.z.abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_torque_spins_about_its_axis() {
        let mut body = RigidBody::new(undamped(1.0), Pose::identity());
        body.add_torque(Vector3::new(0.0, 0.5, 0.0));
        body.integrate(0.1);

        let w = body.angular_velocity();
        assert!(w.y > 0.0);
        assert_relative_eq!(w.x, 0.0);
        assert_relative_eq!(w.z, 0.0);
    }

    #[test]
    fn test_damping() {
        let config = undamped(1.0).with_slow_down(0.5, 1.0);
        let mut body = RigidBody::new(config, Pose::identity())
            .with_linear_velocity(Vector3::new(2.0, 0.0, 0.0));
        body.integrate(1.0);
        assert_relative_eq!(body.linear_velocity().x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_immovable_body_never_moves() {
        let mut body = RigidBody::immovable(Pose::from_position(Point3::new(0.0, 0.0, 1.0)));
        assert!(body.is_sleeping());

        body.add_force(Vector3::new(100.0, 0.0, 0.0));
        body.apply_impulse(Vector3::new(0.0, 50.0, 0.0), Point3::new(1.0, 0.0, 1.0));
        body.set_linear_velocity(Vector3::new(1.0, 1.0, 1.0));
        body.apply_velocity_delta(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        body.wake_up();
        body.integrate(1.0);

        assert_eq!(body.position(), Point3::new(0.0, 0.0, 1.0));
        assert_eq!(body.linear_velocity(), Vector3::zeros());
        assert_eq!(body.data().force_sum, Vector3::zeros());
        assert!(body.is_sleeping());
    }

    #[test]
    fn test_sleep_after_resting_steps() {
        let config = SleepConfig::default().with_steps_to_sleep(5);
        let mut body = RigidBody::new(undamped(1.0), Pose::identity())
            .with_linear_velocity(Vector3::new(0.001, 0.0, 0.0));

        let mut fell_asleep = false;
        for _ in 0..5 {
            fell_asleep |= body.update_sleep(&config);
        }

        assert!(fell_asleep);
        assert!(body.is_sleeping());
        assert_eq!(body.linear_velocity(), Vector3::zeros());

        // Sleeping bodies are not integrated.
        body.add_torque(Vector3::zeros());
        assert!(!body.is_sleeping());
        body.put_to_sleep();
        body.integrate(1.0);
        assert!(!body.check_state(BodyState::Integrated));
    }

    #[test]
    fn test_fast_body_stays_awake() {
        let config = SleepConfig::default().with_steps_to_sleep(3);
        let mut body = RigidBody::new(undamped(1.0), Pose::identity())
            .with_linear_velocity(Vector3::new(5.0, 0.0, 0.0));

        for _ in 0..100 {
            assert!(!body.update_sleep(&config));
        }
        assert!(!body.is_sleeping());
        assert_relative_eq!(body.motion(), 10.0 * config.sleep_motion);
    }

    #[test]
    fn test_force_wakes_sleeping_body() {
        let mut body = RigidBody::new(undamped(1.0), Pose::identity());
        body.put_to_sleep();
        body.add_force(Vector3::new(0.0, 0.0, 1.0));
        assert!(!body.is_sleeping());
    }

    #[test]
    fn test_states_bitset() {
        let mut states = BodyStates::empty();
        states.insert(BodyState::Updated);
        states.set(BodyState::Sleeping, true);
        assert!(states.contains(BodyState::Updated));
        assert!(states.contains(BodyState::Sleeping));
        states.remove(BodyState::Updated);
        assert!(!states.contains(BodyState::Updated));
        assert!(!states.contains(BodyState::Integrated));
    }

    #[test]
    fn test_mark_constraints_solved() {
        let mut body = RigidBody::new(undamped(1.0), Pose::identity());
        body.put_to_sleep();
        body.mark_constraints_solved();
        assert!(!body.is_sleeping());
        assert!(body.check_state(BodyState::ConstraintsSolved));

        body.reset_step_states();
        assert!(!body.check_state(BodyState::ConstraintsSolved));
        assert!(body.check_state(BodyState::Updated));
        body.clear_updated();
        assert!(!body.check_state(BodyState::Updated));
    }
}
