//! Stationary distribution by power iteration.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{MarkovConfig, SteadyStateFallback};
use crate::error::MarkovError;
use crate::transition::TransitionMatrix;

/// How a [`StationaryDistribution`] was obtained.
///
/// Serializes as `"converged"`, `"last_iterate"` or `"uniform"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SteadyStateSource {
    /// Power iteration met the tolerance.
    Converged,
    /// Iteration budget exhausted; the last iterate was kept.
    LastIterate,
    /// Iteration budget exhausted; the uniform distribution was substituted.
    Uniform,
}

/// Long-run state probabilities of a transition matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct StationaryDistribution {
    probs: Vec<f64>,
    iterations: usize,
    residual: f64,
    source: SteadyStateSource,
}

impl StationaryDistribution {
    /// Probabilities in state order; they sum to 1.0.
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Number of power-iteration steps performed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// L1 distance between the last two iterates.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Whether the vector is a converged solution or a fallback.
    pub fn source(&self) -> SteadyStateSource {
        self.source
    }

    /// Returns `true` if power iteration met the tolerance.
    pub fn is_converged(&self) -> bool {
        self.source == SteadyStateSource::Converged
    }
}

/// Outcome of the raw iteration loop: the final vector, steps and residual.
struct Iterate {
    probs: Vec<f64>,
    iterations: usize,
    residual: f64,
    converged: bool,
}

fn power_iterate(matrix: &TransitionMatrix, tolerance: f64, max_iterations: usize) -> Iterate {
    let n = matrix.dim();
    let mut pi = vec![1.0 / n as f64; n];
    let mut residual = f64::INFINITY;

    for k in 1..=max_iterations {
        let mut next = matrix.left_multiply(&pi);
        // Counter floating-point drift; a valid matrix keeps the sum positive.
        let renormalized = nimbus_stats::normalize(&mut next);
        debug_assert!(renormalized, "iterate lost its probability mass at step {k}");
        residual = nimbus_stats::l1_distance(&next, &pi);
        pi = next;
        if residual < tolerance {
            return Iterate {
                probs: pi,
                iterations: k,
                residual,
                converged: true,
            };
        }
    }

    Iterate {
        probs: pi,
        iterations: max_iterations,
        residual,
        converged: false,
    }
}

/// Computes the stationary distribution `pi` with `pi P = pi`, `sum(pi) = 1`.
///
/// Starts from the uniform distribution and repeats `pi <- pi P`
/// (renormalised each step) until the L1 change drops below
/// `config.tolerance()`. For an ergodic chain the limit is the unique
/// stationary distribution. Reducible chains (e.g. with an absorbing
/// self-loop row) converge to the stationary vector reachable from the
/// uniform start; periodic chains may oscillate and fail.
///
/// # Errors
///
/// Returns [`MarkovError::NoConvergence`] if `config.max_iterations()` is
/// reached first, regardless of `config.fallback()`.
#[tracing::instrument(skip_all, fields(n_states = matrix.dim()))]
pub fn solve_steady_state(
    matrix: &TransitionMatrix,
    config: &MarkovConfig,
) -> Result<StationaryDistribution, MarkovError> {
    config.validate()?;
    let it = power_iterate(matrix, config.tolerance(), config.max_iterations());
    if !it.converged {
        return Err(MarkovError::NoConvergence {
            iterations: it.iterations,
            residual: it.residual,
        });
    }
    debug!(
        iterations = it.iterations,
        residual = it.residual,
        "steady state converged"
    );
    Ok(StationaryDistribution {
        probs: it.probs,
        iterations: it.iterations,
        residual: it.residual,
        source: SteadyStateSource::Converged,
    })
}

/// Like [`solve_steady_state`] but applies `config.fallback()` on
/// non-convergence.
///
/// With [`SteadyStateFallback::Error`] this is identical to
/// [`solve_steady_state`]. Otherwise the returned distribution carries
/// [`SteadyStateSource::LastIterate`] or [`SteadyStateSource::Uniform`] so
/// the substitution stays visible to the caller.
#[tracing::instrument(skip_all, fields(n_states = matrix.dim(), fallback = ?config.fallback()))]
pub fn solve_steady_state_with_fallback(
    matrix: &TransitionMatrix,
    config: &MarkovConfig,
) -> Result<StationaryDistribution, MarkovError> {
    config.validate()?;
    let it = power_iterate(matrix, config.tolerance(), config.max_iterations());
    if it.converged {
        return Ok(StationaryDistribution {
            probs: it.probs,
            iterations: it.iterations,
            residual: it.residual,
            source: SteadyStateSource::Converged,
        });
    }

    let (probs, source) = match config.fallback() {
        SteadyStateFallback::Error => {
            return Err(MarkovError::NoConvergence {
                iterations: it.iterations,
                residual: it.residual,
            });
        }
        SteadyStateFallback::LastIterate => (it.probs, SteadyStateSource::LastIterate),
        SteadyStateFallback::Uniform => {
            let n = matrix.dim();
            (vec![1.0 / n as f64; n], SteadyStateSource::Uniform)
        }
    };
    warn!(
        iterations = it.iterations,
        residual = it.residual,
        source = ?source,
        "steady state did not converge: using fallback"
    );
    Ok(StationaryDistribution {
        probs,
        iterations: it.iterations,
        residual: it.residual,
        source,
    })
}
