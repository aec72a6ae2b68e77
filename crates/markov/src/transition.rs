//! Transition matrix estimation for a first-order Markov chain.

use tracing::{debug, warn};

use crate::error::MarkovError;
use crate::ingest::ObservationSequence;
use crate::state::StateSpace;

/// Row-sum tolerance for a valid transition matrix.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// A square row-stochastic transition matrix paired with its state space.
///
/// Row `i` holds the probabilities of moving from state `i` to each state
/// on the next day. Rows are stored contiguously in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    states: StateSpace,
    probs: Vec<f64>,
}

impl TransitionMatrix {
    /// Constructs a transition matrix from nested rows, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`MarkovError::DimensionMismatch`] if the rows are not
    /// `n x n` for `n = states.len()`, or [`MarkovError::InvalidMatrix`] if a
    /// row is not a probability distribution.
    pub fn from_rows(states: StateSpace, rows: &[Vec<f64>]) -> Result<Self, MarkovError> {
        let n = states.len();
        if rows.len() != n {
            return Err(MarkovError::DimensionMismatch {
                expected: n,
                got: rows.len(),
            });
        }
        let mut probs = Vec::with_capacity(n * n);
        for row in rows {
            if row.len() != n {
                return Err(MarkovError::DimensionMismatch {
                    expected: n,
                    got: row.len(),
                });
            }
            probs.extend_from_slice(row);
        }
        let tm = Self { states, probs };
        tm.validate()?;
        Ok(tm)
    }

    /// The state space indexing rows and columns.
    pub fn states(&self) -> &StateSpace {
        &self.states
    }

    /// Number of states (rows = cols).
    pub fn dim(&self) -> usize {
        self.states.len()
    }

    /// Returns the transition probabilities out of state `from`.
    ///
    /// # Panics
    ///
    /// Panics if `from >= self.dim()`.
    pub fn row(&self, from: usize) -> &[f64] {
        let n = self.dim();
        &self.probs[from * n..(from + 1) * n]
    }

    /// Returns the probability of moving from `from` to `to`.
    pub fn prob(&self, from: usize, to: usize) -> f64 {
        self.probs[from * self.dim() + to]
    }

    /// Returns the self-transition probability of `state`.
    pub fn self_prob(&self, state: usize) -> f64 {
        self.prob(state, state)
    }

    /// Iterates over rows in state order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.probs.chunks(self.dim())
    }

    /// Returns the matrix as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }

    /// Validates that the matrix is row-stochastic.
    ///
    /// Checks that all values are finite, in `[0, 1]`, and that each row
    /// sums to 1.0 within [`ROW_SUM_TOLERANCE`].
    pub fn validate(&self) -> Result<(), MarkovError> {
        for (i, row) in self.rows().enumerate() {
            let mut sum = 0.0;
            for (j, &p) in row.iter().enumerate() {
                if !p.is_finite() {
                    return Err(MarkovError::InvalidMatrix {
                        reason: format!("probs[{i}][{j}] is not finite: {p}"),
                    });
                }
                if !(0.0..=1.0).contains(&p) {
                    return Err(MarkovError::InvalidMatrix {
                        reason: format!("probs[{i}][{j}] = {p} is outside [0, 1]"),
                    });
                }
                sum += p;
            }
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(MarkovError::InvalidMatrix {
                    reason: format!("row {i} sums to {sum}, expected 1.0"),
                });
            }
        }
        Ok(())
    }

    /// Computes the row vector `pi * P`.
    ///
    /// # Panics
    ///
    /// Panics if `pi.len() != self.dim()`.
    pub fn left_multiply(&self, pi: &[f64]) -> Vec<f64> {
        let n = self.dim();
        assert_eq!(pi.len(), n, "left_multiply: vector length mismatch");
        let mut out = vec![0.0; n];
        for (row, &w) in self.rows().zip(pi) {
            if w == 0.0 {
                continue;
            }
            for (o, &p) in out.iter_mut().zip(row) {
                *o += w * p;
            }
        }
        out
    }

    /// Samples the next state given the current state, using cumulative CDF.
    ///
    /// Draws a uniform value in `[0, 1)` and walks the row's cumulative
    /// distribution in state order, returning the first state whose
    /// cumulative probability meets or exceeds the draw. Falls back to the
    /// last state with non-zero probability if rounding prevents a match.
    pub fn sample(&self, from: usize, rng: &mut impl rand::Rng) -> usize {
        let u: f64 = rng.random();
        let row = self.row(from);
        let mut cumulative = 0.0;
        for (j, &p) in row.iter().enumerate() {
            cumulative += p;
            if p > 0.0 && cumulative >= u {
                return j;
            }
        }
        // Only reached when floating-point rounding leaves the total just below u.
        row.iter().rposition(|&p| p > 0.0).unwrap_or(from)
    }
}

/// Estimates a transition matrix from an observation sequence.
///
/// Counts every consecutive `(from, to)` pair and divides each row by its
/// total. A state that never appears as a transition source (typically one
/// seen only on the last day, or never seen under
/// [`StateOrder::Declared`](crate::StateOrder::Declared)) gets a self-loop
/// row: probability 1.0 of staying, 0.0 elsewhere.
///
/// The result depends only on the sequence, so identical sequences produce
/// bit-identical matrices.
///
/// # Errors
///
/// Returns [`MarkovError::InsufficientData`] for sequences shorter than 2.
#[tracing::instrument(skip_all, fields(n_days = observations.len()))]
pub fn build_transition_matrix(
    observations: &ObservationSequence,
) -> Result<TransitionMatrix, MarkovError> {
    let seq = observations.as_indices();
    if seq.len() < 2 {
        return Err(MarkovError::InsufficientData {
            n: seq.len(),
            min: 2,
        });
    }

    let states = observations.states().clone();
    let n = states.len();

    let mut counts = vec![0u64; n * n];
    for pair in seq.windows(2) {
        counts[pair[0] * n + pair[1]] += 1;
    }

    let mut probs = vec![0.0_f64; n * n];
    for i in 0..n {
        let row_counts = &counts[i * n..(i + 1) * n];
        let row_sum: u64 = row_counts.iter().sum();
        let row = &mut probs[i * n..(i + 1) * n];
        if row_sum == 0 {
            warn!(
                state = states.name(i),
                "state never left: using self-loop row"
            );
            row[i] = 1.0;
        } else {
            let total = row_sum as f64;
            for (p, &c) in row.iter_mut().zip(row_counts) {
                *p = c as f64 / total;
            }
        }
    }

    debug!(n_states = n, n_transitions = seq.len() - 1, "built transition matrix");
    Ok(TransitionMatrix { states, probs })
}
