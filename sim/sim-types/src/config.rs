//! Configuration types for simulation.
//!
//! Every tunable of the collision pipeline, the constraint solver and the
//! sleep heuristic is passed in explicitly through these structs, so several
//! independent worlds can coexist in one process.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Result, SimError};

fn require_positive(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn require_non_negative(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}

/// Gravity configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard Earth gravity (9.81 m/s² in -Z direction).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, 0.0, -9.81),
        }
    }

    /// No gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub const fn new(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }
}

/// Tolerances of the narrow phase and the contact manifolds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionConfig {
    /// EPA stops once a new support point improves the closest face
    /// distance by no more than this.
    pub min_f_difference: f64,
    /// Epsilon used by GJK and EPA to detect degenerate simplices.
    pub contact_precision: f64,
    /// Distance under which two contacts are considered the same point, and
    /// over which a persisted contact is considered stale.
    pub contact_separation: f64,
    /// Maximum number of GJK iterations.
    pub max_gjk_iterations: usize,
    /// Maximum number of EPA expansion iterations.
    pub max_epa_iterations: usize,
    /// Maximum number of faces in an EPA polytope.
    pub max_epa_faces: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            min_f_difference: 0.001,
            contact_precision: 1e-6,
            contact_separation: 0.02,
            max_gjk_iterations: 64,
            max_epa_iterations: 64,
            max_epa_faces: 256,
        }
    }
}

impl CollisionConfig {
    /// Tighter tolerances for small-scale scenes.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            min_f_difference: 1e-5,
            contact_precision: 1e-9,
            contact_separation: 0.005,
            max_epa_iterations: 128,
            max_epa_faces: 512,
            ..Default::default()
        }
    }

    /// Set the contact separation tolerance.
    #[must_use]
    pub fn with_contact_separation(mut self, separation: f64) -> Self {
        self.contact_separation = separation;
        self
    }

    /// Set the EPA termination threshold.
    #[must_use]
    pub fn with_min_f_difference(mut self, difference: f64) -> Self {
        self.min_f_difference = difference;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        require_positive(self.min_f_difference, "min_f_difference")?;
        require_positive(self.contact_precision, "contact_precision")?;
        require_positive(self.contact_separation, "contact_separation")?;
        if self.max_gjk_iterations == 0 || self.max_epa_iterations == 0 {
            return Err(SimError::invalid_config(
                "GJK and EPA need at least one iteration",
            ));
        }
        if self.max_epa_faces < 4 {
            return Err(SimError::invalid_config(
                "max_epa_faces must hold at least a tetrahedron",
            ));
        }
        Ok(())
    }
}

/// Configuration of the sequential-impulse constraint solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Number of Gauss-Seidel iterations per update.
    pub iterations: usize,
    /// Start each update from the impulses solved in the previous one.
    pub warm_starting: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warm_starting: true,
        }
    }
}

impl SolverConfig {
    /// Create a high-accuracy solver configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            iterations: 40,
            ..Default::default()
        }
    }

    /// Create a fast solver configuration.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            iterations: 4,
            ..Default::default()
        }
    }

    /// Set the iteration count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(SimError::invalid_config(
                "solver needs at least one iteration",
            ));
        }
        Ok(())
    }
}

/// Sleep detection parameters.
///
/// The motion metric is an exponentially decayed average of the squared
/// linear and angular speeds:
///
/// ```text
/// motion = bias * motion + (1 - bias) * (|v|² + |ω|²)
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SleepConfig {
    /// Whether bodies may fall asleep at all.
    pub enabled: bool,
    /// Weight of the previous motion value, in `[0, 1)`.
    pub motion_bias: f64,
    /// Motion below which a body counts as resting.
    pub sleep_motion: f64,
    /// Consecutive resting steps before a body falls asleep.
    pub steps_to_sleep: u32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            motion_bias: 0.8,
            sleep_motion: 0.05,
            steps_to_sleep: 30,
        }
    }
}

impl SleepConfig {
    /// Configuration that keeps every body awake.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the motion threshold.
    #[must_use]
    pub fn with_sleep_motion(mut self, sleep_motion: f64) -> Self {
        self.sleep_motion = sleep_motion;
        self
    }

    /// Set the number of resting steps before sleeping.
    #[must_use]
    pub fn with_steps_to_sleep(mut self, steps: u32) -> Self {
        self.steps_to_sleep = steps;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.motion_bias) {
            return Err(SimError::invalid_config(format!(
                "motion_bias must lie in [0, 1), got {}",
                self.motion_bias
            )));
        }
        require_positive(self.sleep_motion, "sleep_motion")
    }
}

/// Parameters of the contact constraints generated from manifolds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactConfig {
    /// Baumgarte factor for penetration correction.
    pub beta: f64,
    /// Coefficient of restitution.
    pub restitution: f64,
    /// Penetration allowed before any correction kicks in.
    pub slop_penetration: f64,
    /// Approach speed under which restitution is ignored.
    pub slop_restitution: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            beta: 0.1,
            restitution: 0.2,
            slop_penetration: 0.005,
            slop_restitution: 0.5,
        }
    }
}

impl ContactConfig {
    /// Perfectly inelastic contacts.
    #[must_use]
    pub fn inelastic() -> Self {
        Self {
            restitution: 0.0,
            ..Default::default()
        }
    }

    /// Set the restitution coefficient.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set the Baumgarte factor.
    #[must_use]
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(SimError::invalid_config(format!(
                "beta must lie in [0, 1], got {}",
                self.beta
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config(format!(
                "restitution must lie in [0, 1], got {}",
                self.restitution
            )));
        }
        require_non_negative(self.slop_penetration, "slop_penetration")?;
        require_non_negative(self.slop_restitution, "slop_restitution")
    }
}

/// Top-level configuration of a physics world.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicsConfig {
    /// Gravity applied to every awake movable body.
    pub gravity: Gravity,
    /// Narrow-phase and manifold tolerances.
    pub collision: CollisionConfig,
    /// Constraint solver settings.
    pub solver: SolverConfig,
    /// Sleep detection.
    pub sleep: SleepConfig,
    /// Contact constraint parameters.
    pub contact: ContactConfig,
}

impl PhysicsConfig {
    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set the collision configuration.
    #[must_use]
    pub fn collision(mut self, collision: CollisionConfig) -> Self {
        self.collision = collision;
        self
    }

    /// Set the sleep configuration.
    #[must_use]
    pub fn sleep(mut self, sleep: SleepConfig) -> Self {
        self.sleep = sleep;
        self
    }

    /// Set the contact configuration.
    #[must_use]
    pub fn contact(mut self, contact: ContactConfig) -> Self {
        self.contact = contact;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.acceleration.iter().all(|x| x.is_finite()) {
            return Err(SimError::invalid_config("gravity must be finite"));
        }
        self.collision.validate()?;
        self.solver.validate()?;
        self.sleep.validate()?;
        self.contact.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PhysicsConfig::default().validate().is_ok());
        assert!(CollisionConfig::precise().validate().is_ok());
        assert!(SolverConfig::high_accuracy().validate().is_ok());
        assert!(SolverConfig::fast().validate().is_ok());
        assert!(SleepConfig::disabled().validate().is_ok());
        assert!(ContactConfig::inelastic().validate().is_ok());
    }

    #[test]
    fn test_collision_config_rejects_bad_values() {
        let config = CollisionConfig::default().with_contact_separation(0.0);
        assert!(config.validate().unwrap_err().is_config_error());

        let config = CollisionConfig {
            max_epa_faces: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_solver_config_rejects_zero_iterations() {
        assert!(SolverConfig::default().with_iterations(0).validate().is_err());
    }

    #[test]
    fn test_sleep_config_bias_range() {
        let config = SleepConfig {
            motion_bias: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contact_config_ranges() {
        assert!(ContactConfig::default().with_restitution(1.5).validate().is_err());
        assert!(ContactConfig::default().with_beta(-0.1).validate().is_err());
    }

    #[test]
    fn test_physics_config_builder() {
        let config = PhysicsConfig::default()
            .zero_gravity()
            .solver(SolverConfig::fast());
        assert_eq!(config.gravity.acceleration, Vector3::zeros());
        assert_eq!(config.solver.iterations, 4);

        let bad = PhysicsConfig::default().gravity(Gravity::new(Vector3::new(f64::NAN, 0.0, 0.0)));
        assert!(bad.validate().is_err());
    }
}
