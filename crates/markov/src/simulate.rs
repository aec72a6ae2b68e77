//! Markov chain trajectory simulation.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::debug;

use crate::config::MarkovConfig;
use crate::error::MarkovError;
use crate::output::SimulatedDay;
use crate::state::StateSpace;
use crate::transition::TransitionMatrix;

/// Milliseconds in one simulated day.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Creates the simulation RNG.
///
/// `Some(seed)` gives a reproducible stream; `None` opts into OS entropy.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// Simulates a sequence of state indices starting at `initial`.
///
/// Element 0 is `initial` itself; each later element is drawn from the
/// matrix row of its predecessor. Returns `days` elements.
///
/// # Panics
///
/// Panics if `initial >= matrix.dim()`.
pub fn simulate_states(
    matrix: &TransitionMatrix,
    initial: usize,
    days: usize,
    rng: &mut impl rand::Rng,
) -> Vec<usize> {
    let mut out = vec![initial; days];
    for k in 1..days {
        out[k] = matrix.sample(out[k - 1], rng);
    }
    out
}

/// Simulates state indices into a pre-allocated buffer.
///
/// `out[0]` receives `initial`; the remaining elements are sampled.
///
/// # Errors
///
/// Returns [`MarkovError::BufferLengthMismatch`] if `out.len() != days` and
/// [`MarkovError::DimensionMismatch`] if `initial` is not a state index.
pub fn simulate_states_into(
    matrix: &TransitionMatrix,
    initial: usize,
    days: usize,
    rng: &mut impl rand::Rng,
    out: &mut [usize],
) -> Result<(), MarkovError> {
    if out.len() != days {
        return Err(MarkovError::BufferLengthMismatch {
            expected: days,
            got: out.len(),
        });
    }
    if initial >= matrix.dim() {
        return Err(MarkovError::DimensionMismatch {
            expected: matrix.dim(),
            got: initial + 1,
        });
    }
    let mut prev = initial;
    for (k, slot) in out.iter_mut().enumerate() {
        let next = if k == 0 {
            initial
        } else {
            matrix.sample(prev, rng)
        };
        *slot = next;
        prev = next;
    }
    Ok(())
}

/// A simulated forecast path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trajectory {
    states: StateSpace,
    seq: Vec<usize>,
    start_ms: i64,
}

impl Trajectory {
    pub(crate) fn from_parts(states: StateSpace, seq: Vec<usize>, start_ms: i64) -> Self {
        Self {
            states,
            seq,
            start_ms,
        }
    }

    /// The state space indexing this trajectory.
    pub fn states(&self) -> &StateSpace {
        &self.states
    }

    /// State indices, day 0 first.
    pub fn as_indices(&self) -> &[usize] {
        &self.seq
    }

    /// Number of simulated days (including day 0).
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns `true` for an empty trajectory.
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Timestamp of day 0 in epoch milliseconds.
    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// Iterates over `(day, state, timestamp)` records.
    ///
    /// Every timestamp fits in an `i64`; the simulators reject horizons
    /// that would overflow.
    pub fn days(&self) -> impl Iterator<Item = SimulatedDay> + '_ {
        self.seq.iter().enumerate().map(|(day, &s)| SimulatedDay {
            day,
            state: self.states.name(s).to_string(),
            timestamp: self.start_ms + day as i64 * MS_PER_DAY,
        })
    }

    /// Collects [`Self::days`] into a vector.
    pub fn to_days(&self) -> Vec<SimulatedDay> {
        self.days().collect()
    }
}

fn check_horizon(days: usize, config: &MarkovConfig) -> Result<(), MarkovError> {
    if days == 0 || days > config.max_days() {
        return Err(MarkovError::HorizonOutOfRange {
            days,
            max: config.max_days(),
        });
    }
    Ok(())
}

/// The last day's timestamp must fit in an `i64`. `days` is at least 1.
fn check_timestamps(start_ms: i64, days: usize) -> Result<(), MarkovError> {
    i64::try_from(days - 1)
        .ok()
        .and_then(|d| d.checked_mul(MS_PER_DAY))
        .and_then(|offset| start_ms.checked_add(offset))
        .map(|_| ())
        .ok_or(MarkovError::TimestampOutOfRange { start_ms, days })
}

/// Simulates a forecast of `days` days starting in `initial`.
///
/// # Arguments
///
/// * `matrix` - Transition kernel.
/// * `initial` - Name of the day-0 state.
/// * `days` - Horizon, `1..=config.max_days()`.
/// * `start_ms` - Timestamp of day 0 in epoch milliseconds.
/// * `config` - Engine configuration (horizon bound).
/// * `rng` - Random number generator; seed it for reproducible output.
///
/// # Errors
///
/// Returns [`MarkovError::UnknownState`] if `initial` is not in the matrix's
/// state space, [`MarkovError::HorizonOutOfRange`] for a bad horizon, or
/// [`MarkovError::TimestampOutOfRange`] if the last day's timestamp would
/// overflow.
#[tracing::instrument(skip(matrix, config, rng), fields(n_states = matrix.dim()))]
pub fn simulate_trajectory(
    matrix: &TransitionMatrix,
    initial: &str,
    days: usize,
    start_ms: i64,
    config: &MarkovConfig,
    rng: &mut impl rand::Rng,
) -> Result<Trajectory, MarkovError> {
    config.validate()?;
    let start = matrix.states().require(initial)?;
    check_horizon(days, config)?;
    check_timestamps(start_ms, days)?;

    let seq = simulate_states(matrix, start, days, rng);
    debug!(days, "simulated trajectory");
    Ok(Trajectory::from_parts(matrix.states().clone(), seq, start_ms))
}

/// Simulates one independent trajectory per seed, in parallel.
///
/// Output order matches `seeds`. Each trajectory equals what
/// [`simulate_trajectory`] returns for `seeded_rng(Some(seed))`.
///
/// # Errors
///
/// Same validation as [`simulate_trajectory`].
#[tracing::instrument(skip(matrix, config, seeds), fields(n_members = seeds.len()))]
pub fn simulate_ensemble(
    matrix: &TransitionMatrix,
    initial: &str,
    days: usize,
    start_ms: i64,
    config: &MarkovConfig,
    seeds: &[u64],
) -> Result<Vec<Trajectory>, MarkovError> {
    config.validate()?;
    let start = matrix.states().require(initial)?;
    check_horizon(days, config)?;
    check_timestamps(start_ms, days)?;

    seeds
        .par_iter()
        .map(|&seed| -> Result<Trajectory, MarkovError> {
            let mut rng = seeded_rng(Some(seed));
            let mut seq = vec![start; days];
            simulate_states_into(matrix, start, days, &mut rng, &mut seq)?;
            Ok(Trajectory::from_parts(matrix.states().clone(), seq, start_ms))
        })
        .collect()
}
