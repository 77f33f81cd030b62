//! Taylor test configuration.

use crate::error::{AdjointError, AdjointResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default first perturbation size.
pub const DEFAULT_INITIAL_EPSILON: f64 = 0.01;

/// Default number of perturbations.
pub const DEFAULT_STEPS: usize = 4;

/// Default ratio between successive perturbations.
pub const DEFAULT_SHRINK_FACTOR: f64 = 0.5;

/// Default relative level below which residuals count as exact.
pub const DEFAULT_RESIDUAL_FLOOR: f64 = 1e-12;

/// Perturbation sequence of a Taylor test.
///
/// The k-th perturbation is `initial_epsilon · shrink_factor^k` for
/// `k < steps`.
///
/// # Examples
///
/// ```rust
/// use adjoint_core::TaylorConfig;
///
/// let config = TaylorConfig::builder()
///     .initial_epsilon(1e-3)
///     .steps(6)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.steps(), 6);
/// assert_eq!(config.shrink_factor(), 0.5);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TaylorConfig {
    /// First perturbation size.
    initial_epsilon: f64,
    /// Number of perturbations (at least two).
    steps: usize,
    /// Ratio between successive perturbations, in (0, 1).
    shrink_factor: f64,
    /// Residuals below `residual_floor · max(1, |J(m)|)` are treated as
    /// exact and reported at the expected rate.
    residual_floor: f64,
}

impl Default for TaylorConfig {
    fn default() -> Self {
        Self {
            initial_epsilon: DEFAULT_INITIAL_EPSILON,
            steps: DEFAULT_STEPS,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            residual_floor: DEFAULT_RESIDUAL_FLOOR,
        }
    }
}

impl TaylorConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> TaylorConfigBuilder {
        TaylorConfigBuilder::default()
    }

    /// First perturbation size.
    #[inline]
    pub fn initial_epsilon(&self) -> f64 {
        self.initial_epsilon
    }

    /// Number of perturbations.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Ratio between successive perturbations.
    #[inline]
    pub fn shrink_factor(&self) -> f64 {
        self.shrink_factor
    }

    /// Relative exactness threshold for residuals.
    #[inline]
    pub fn residual_floor(&self) -> f64 {
        self.residual_floor
    }

    /// The perturbation sizes, largest first.
    pub fn epsilons(&self) -> Vec<f64> {
        (0..self.steps)
            .map(|k| self.initial_epsilon * self.shrink_factor.powi(k as i32))
            .collect()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdjointError::InvalidConfig`] if:
    /// - `initial_epsilon` is not a positive finite number
    /// - `steps` is below 2
    /// - `shrink_factor` is outside (0, 1)
    /// - `residual_floor` is negative or not finite
    pub fn validate(&self) -> AdjointResult<()> {
        if !(self.initial_epsilon.is_finite() && self.initial_epsilon > 0.0) {
            return Err(AdjointError::InvalidConfig(format!(
                "initial_epsilon must be positive, got {}",
                self.initial_epsilon
            )));
        }
        if self.steps < 2 {
            return Err(AdjointError::InvalidConfig(format!(
                "steps must be at least 2, got {}",
                self.steps
            )));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(AdjointError::InvalidConfig(format!(
                "shrink_factor must lie in (0, 1), got {}",
                self.shrink_factor
            )));
        }
        if !(self.residual_floor.is_finite() && self.residual_floor >= 0.0) {
            return Err(AdjointError::InvalidConfig(format!(
                "residual_floor must be non-negative, got {}",
                self.residual_floor
            )));
        }
        Ok(())
    }
}

/// Builder for [`TaylorConfig`].
#[derive(Clone, Debug, Default)]
pub struct TaylorConfigBuilder {
    initial_epsilon: Option<f64>,
    steps: Option<usize>,
    shrink_factor: Option<f64>,
    residual_floor: Option<f64>,
}

impl TaylorConfigBuilder {
    /// Sets the first perturbation size.
    #[inline]
    pub fn initial_epsilon(mut self, initial_epsilon: f64) -> Self {
        self.initial_epsilon = Some(initial_epsilon);
        self
    }

    /// Sets the number of perturbations.
    #[inline]
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Sets the ratio between successive perturbations.
    #[inline]
    pub fn shrink_factor(mut self, shrink_factor: f64) -> Self {
        self.shrink_factor = Some(shrink_factor);
        self
    }

    /// Sets the relative exactness threshold.
    #[inline]
    pub fn residual_floor(mut self, residual_floor: f64) -> Self {
        self.residual_floor = Some(residual_floor);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> AdjointResult<TaylorConfig> {
        let defaults = TaylorConfig::default();
        let config = TaylorConfig {
            initial_epsilon: self.initial_epsilon.unwrap_or(defaults.initial_epsilon),
            steps: self.steps.unwrap_or(defaults.steps),
            shrink_factor: self.shrink_factor.unwrap_or(defaults.shrink_factor),
            residual_floor: self.residual_floor.unwrap_or(defaults.residual_floor),
        };
        config.validate()?;
        Ok(config)
    }
}
