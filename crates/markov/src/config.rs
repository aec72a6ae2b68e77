//! Configuration for matrix estimation, steady-state solving and simulation.

use crate::error::MarkovError;

/// How the state ordering of an ingested sequence is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateOrder {
    /// States in the order they first appear in the classified history.
    /// Only observed states are included.
    #[default]
    FirstSeen,
    /// The classifier's full alphabet in rule order. States never observed
    /// still get a matrix row (the self-loop fallback).
    Declared,
}

/// What the steady-state solver returns when power iteration does not converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SteadyStateFallback {
    /// Fail with [`MarkovError::NoConvergence`].
    #[default]
    Error,
    /// Return the last iterate, flagged as unconverged.
    LastIterate,
    /// Return the uniform distribution, flagged as unconverged.
    Uniform,
}

/// Configuration for the forecasting engine.
///
/// Use the builder methods to customise parameters.
///
/// # Example
///
/// ```
/// use nimbus_markov::{MarkovConfig, SteadyStateFallback};
///
/// let config = MarkovConfig::new()
///     .with_tolerance(1e-10)
///     .with_max_days(730)
///     .with_fallback(SteadyStateFallback::LastIterate);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct MarkovConfig {
    tolerance: f64,
    max_iterations: usize,
    max_days: usize,
    state_order: StateOrder,
    allow_date_gaps: bool,
    fallback: SteadyStateFallback,
}

impl MarkovConfig {
    /// Creates a new configuration with defaults.
    ///
    /// Defaults: `tolerance = 1e-9`, `max_iterations = 10_000`,
    /// `max_days = 365`, `state_order = FirstSeen`, `allow_date_gaps = false`,
    /// `fallback = Error`.
    pub fn new() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 10_000,
            max_days: 365,
            state_order: StateOrder::FirstSeen,
            allow_date_gaps: false,
            fallback: SteadyStateFallback::Error,
        }
    }

    /// Sets the L1 convergence tolerance for power iteration.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the power-iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the largest accepted simulation horizon in days.
    pub fn with_max_days(mut self, max_days: usize) -> Self {
        self.max_days = max_days;
        self
    }

    /// Sets the state ordering policy used during ingestion.
    pub fn with_state_order(mut self, order: StateOrder) -> Self {
        self.state_order = order;
        self
    }

    /// Allows missing days between historical records.
    pub fn with_allow_date_gaps(mut self, allow: bool) -> Self {
        self.allow_date_gaps = allow;
        self
    }

    /// Sets the non-convergence policy of the steady-state solver.
    pub fn with_fallback(mut self, fallback: SteadyStateFallback) -> Self {
        self.fallback = fallback;
        self
    }

    // --- Accessors ---

    /// Returns the L1 convergence tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns the power-iteration budget.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns the largest accepted simulation horizon.
    pub fn max_days(&self) -> usize {
        self.max_days
    }

    /// Returns the state ordering policy.
    pub fn state_order(&self) -> StateOrder {
        self.state_order
    }

    /// Returns whether gaps between records are accepted.
    pub fn allow_date_gaps(&self) -> bool {
        self.allow_date_gaps
    }

    /// Returns the non-convergence policy.
    pub fn fallback(&self) -> SteadyStateFallback {
        self.fallback
    }

    /// Validates this configuration.
    ///
    /// Checks that the tolerance is finite and positive and that the
    /// iteration budget and horizon bound are non-zero.
    pub fn validate(&self) -> Result<(), MarkovError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(MarkovError::InvalidConfig {
                reason: format!(
                    "tolerance must be finite and positive, got {}",
                    self.tolerance
                ),
            });
        }
        if self.max_iterations == 0 {
            return Err(MarkovError::InvalidConfig {
                reason: "max_iterations must be at least 1".to_string(),
            });
        }
        if self.max_days == 0 {
            return Err(MarkovError::InvalidConfig {
                reason: "max_days must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self::new()
    }
}
