//! Error types for simulation operations.

use thiserror::Error;

/// Errors that can occur during simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid body ID referenced.
    #[error("invalid body ID: {0}")]
    InvalidBodyId(u64),

    /// Invalid collider ID referenced.
    #[error("invalid collider ID: {0}")]
    InvalidColliderId(u64),

    /// Invalid constraint ID referenced.
    #[error("invalid constraint ID: {0}")]
    InvalidConstraintId(u64),

    /// Invalid force ID referenced.
    #[error("invalid force ID: {0}")]
    InvalidForceId(u64),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid collider shape description.
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid shape error.
    #[must_use]
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    /// Validate a timestep, returning it unchanged when usable.
    pub fn check_timestep(dt: f64) -> Result<f64, Self> {
        if dt.is_finite() && dt > 0.0 {
            Ok(dt)
        } else {
            Err(Self::InvalidTimestep(dt))
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error refers to an unknown handle.
    #[must_use]
    pub fn is_invalid_id(&self) -> bool {
        matches!(
            self,
            Self::InvalidBodyId(_)
                | Self::InvalidColliderId(_)
                | Self::InvalidConstraintId(_)
                | Self::InvalidForceId(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidBodyId(42);
        assert!(err.to_string().contains("42"));

        let err = SimError::diverged("NaN in velocity");
        assert!(err.to_string().contains("NaN"));

        let err = SimError::invalid_shape("empty vertex list");
        assert!(err.to_string().contains("empty vertex list"));
    }

    #[test]
    fn test_error_predicates() {
        assert!(SimError::diverged("x").is_diverged());
        assert!(SimError::invalid_config("x").is_config_error());
        assert!(SimError::InvalidColliderId(1).is_invalid_id());
        assert!(SimError::InvalidForceId(2).is_invalid_id());
        assert!(!SimError::InvalidTimestep(0.0).is_invalid_id());
    }

    #[test]
    fn test_check_timestep() {
        assert_eq!(SimError::check_timestep(0.016).unwrap(), 0.016);
        assert!(SimError::check_timestep(0.0).is_err());
        assert!(SimError::check_timestep(-1.0).is_err());
        assert!(SimError::check_timestep(f64::NAN).is_err());
    }
}
