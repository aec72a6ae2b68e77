//! Statistics aggregation over a matrix, its steady state and a trajectory.

use serde::{Serialize, Serializer};

use crate::error::MarkovError;
use crate::output::{StateMap, StatisticsOutput};
use crate::simulate::Trajectory;
use crate::state::StateSpace;
use crate::steady::{StationaryDistribution, SteadyStateSource};
use crate::transition::TransitionMatrix;

/// Self-transition probabilities this close to 1.0 count as absorbing.
const ABSORBING_EPS: f64 = 1e-12;

/// Expected number of consecutive days in a state.
///
/// Serializes as a number, or as the string `"unbounded"` for absorbing
/// states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunLength {
    /// Mean of the geometric sojourn, `1 / (1 - p_self)`.
    Finite(f64),
    /// `p_self = 1`: the chain never leaves the state.
    Unbounded,
}

impl RunLength {
    /// Returns the finite value, if any.
    pub fn as_finite(self) -> Option<f64> {
        match self {
            Self::Finite(v) => Some(v),
            Self::Unbounded => None,
        }
    }
}

impl Serialize for RunLength {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite(v) => serializer.serialize_f64(*v),
            Self::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

/// Analytic expected run length for a self-transition probability.
///
/// # Errors
///
/// Returns [`MarkovError::NumericAnomaly`] if `p_self` is not a finite value
/// in `[0, 1]`.
pub fn expected_run_length(state: &str, p_self: f64) -> Result<RunLength, MarkovError> {
    if !p_self.is_finite() || !(0.0..=1.0).contains(&p_self) {
        return Err(MarkovError::NumericAnomaly {
            state: state.to_string(),
            reason: format!("self-transition probability {p_self} is not in [0, 1]"),
        });
    }
    let leave = 1.0 - p_self;
    if leave <= ABSORBING_EPS {
        return Ok(RunLength::Unbounded);
    }
    Ok(RunLength::Finite(1.0 / leave))
}

/// Summary statistics for one forecast request.
///
/// All vectors are in the state order of the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsReport {
    states: StateSpace,
    steady_state: Vec<f64>,
    steady_state_source: SteadyStateSource,
    distribution: Vec<f64>,
    average_streaks: Vec<RunLength>,
    observed_streaks: Vec<Option<f64>>,
}

impl StatisticsReport {
    /// State space indexing every vector in the report.
    pub fn states(&self) -> &StateSpace {
        &self.states
    }

    /// Stationary distribution of the matrix.
    pub fn steady_state(&self) -> &[f64] {
        &self.steady_state
    }

    /// Whether the stationary distribution is a converged solution.
    pub fn steady_state_converged(&self) -> bool {
        self.steady_state_source == SteadyStateSource::Converged
    }

    /// Whether the stationary distribution converged or which fallback
    /// replaced it.
    pub fn steady_state_source(&self) -> SteadyStateSource {
        self.steady_state_source
    }

    /// Relative frequency of each state in the trajectory.
    pub fn distribution(&self) -> &[f64] {
        &self.distribution
    }

    /// Analytic expected run lengths, `1 / (1 - p_self)`.
    pub fn average_streaks(&self) -> &[RunLength] {
        &self.average_streaks
    }

    /// Mean run lengths observed in the trajectory; `None` for unvisited states.
    pub fn observed_streaks(&self) -> &[Option<f64>] {
        &self.observed_streaks
    }

    /// Looks up the analytic run length of a state by name.
    pub fn average_streak(&self, state: &str) -> Option<RunLength> {
        self.states
            .index_of(state)
            .map(|i| self.average_streaks[i])
    }

    /// Converts to the keyed wire shape, keys in state-space order.
    pub fn to_output(&self) -> StatisticsOutput {
        StatisticsOutput {
            steady_state: self.keyed(&self.steady_state),
            steady_state_converged: self.steady_state_converged(),
            steady_state_source: self.steady_state_source,
            distribution: self.keyed(&self.distribution),
            average_streaks: self.keyed(&self.average_streaks),
            observed_streaks: self.keyed(&self.observed_streaks),
        }
    }

    fn keyed<T: Copy>(&self, values: &[T]) -> StateMap<T> {
        self.states
            .names()
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect()
    }
}

/// Combines a matrix, its stationary distribution and one trajectory.
///
/// # Errors
///
/// Returns [`MarkovError::DimensionMismatch`] if the steady state has the
/// wrong length, [`MarkovError::StateSpaceMismatch`] if the trajectory uses a
/// different state ordering,
/// [`MarkovError::NoTrajectory`] for an empty trajectory, or
/// [`MarkovError::NumericAnomaly`] if a diagonal entry is undefined.
#[tracing::instrument(skip_all, fields(n_states = matrix.dim(), n_days = trajectory.len()))]
pub fn aggregate(
    matrix: &TransitionMatrix,
    steady: &StationaryDistribution,
    trajectory: &Trajectory,
) -> Result<StatisticsReport, MarkovError> {
    let n = matrix.dim();
    if steady.probs().len() != n {
        return Err(MarkovError::DimensionMismatch {
            expected: n,
            got: steady.probs().len(),
        });
    }
    if trajectory.states() != matrix.states() {
        return Err(MarkovError::StateSpaceMismatch {
            expected: matrix.states().names().to_vec(),
            got: trajectory.states().names().to_vec(),
        });
    }
    if trajectory.is_empty() {
        return Err(MarkovError::NoTrajectory);
    }

    let average_streaks = (0..n)
        .map(|i| expected_run_length(matrix.states().name(i), matrix.self_prob(i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StatisticsReport {
        states: matrix.states().clone(),
        steady_state: steady.probs().to_vec(),
        steady_state_source: steady.source(),
        distribution: nimbus_stats::frequencies(trajectory.as_indices(), n),
        average_streaks,
        observed_streaks: nimbus_stats::mean_run_lengths(trajectory.as_indices(), n),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MarkovConfig, SteadyStateFallback};
    use crate::simulate::{seeded_rng, simulate_trajectory};
    use crate::steady::{solve_steady_state, solve_steady_state_with_fallback};
    use approx::assert_abs_diff_eq;

    fn matrix(names: &[&str], rows: &[Vec<f64>]) -> TransitionMatrix {
        TransitionMatrix::from_rows(StateSpace::new(names.iter().copied()).unwrap(), rows).unwrap()
    }

    #[test]
    fn run_length_half() {
        let r = expected_run_length("Sunny", 0.5).unwrap();
        assert_eq!(r, RunLength::Finite(2.0));
    }

    #[test]
    fn run_length_zero_self() {
        assert_eq!(
            expected_run_length("Sunny", 0.0).unwrap(),
            RunLength::Finite(1.0)
        );
    }

    #[test]
    fn run_length_absorbing() {
        let r = expected_run_length("Rainy", 1.0).unwrap();
        assert_eq!(r, RunLength::Unbounded);
        assert_eq!(r.as_finite(), None);
    }

    #[test]
    fn run_length_anomaly() {
        for p in [f64::NAN, f64::INFINITY, -0.1, 1.5] {
            let r = expected_run_length("Cloudy", p);
            assert!(
                matches!(r, Err(MarkovError::NumericAnomaly { ref state, .. }) if state == "Cloudy"),
                "p = {p}: {r:?}"
            );
        }
    }

    #[test]
    fn run_length_serialization() {
        assert_eq!(serde_json::to_string(&RunLength::Finite(2.5)).unwrap(), "2.5");
        assert_eq!(
            serde_json::to_string(&RunLength::Unbounded).unwrap(),
            "\"unbounded\""
        );
    }

    #[test]
    fn aggregate_absorbing_and_finite() {
        let tm = matrix(&["Sunny", "Rainy"], &[vec![0.5, 0.5], vec![0.0, 1.0]]);
        let config = MarkovConfig::new();
        let ss = solve_steady_state(&tm, &config).unwrap();
        let traj = simulate_trajectory(&tm, "Sunny", 20, 0, &config, &mut seeded_rng(Some(5)))
            .unwrap();
        let report = aggregate(&tm, &ss, &traj).unwrap();

        assert_eq!(report.average_streak("Sunny"), Some(RunLength::Finite(2.0)));
        assert_eq!(report.average_streak("Rainy"), Some(RunLength::Unbounded));
        assert_eq!(report.average_streak("Snowy"), None);
        assert!(report.steady_state_converged());

        let sum: f64 = report.distribution().iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn aggregate_known_trajectory() {
        let tm = matrix(&["Sunny", "Rainy"], &[vec![0.5, 0.5], vec![0.5, 0.5]]);
        let ss = solve_steady_state(&tm, &MarkovConfig::new()).unwrap();
        let traj = Trajectory::from_parts(tm.states().clone(), vec![0, 0, 1, 1, 1, 0], 0);
        let report = aggregate(&tm, &ss, &traj).unwrap();

        assert_abs_diff_eq!(report.distribution()[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(report.distribution()[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(report.observed_streaks()[0].unwrap(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(report.observed_streaks()[1].unwrap(), 3.0, epsilon = 1e-12);
        assert_eq!(report.steady_state(), ss.probs());
    }

    #[test]
    fn aggregate_rejects_mismatched_trajectory() {
        let tm = matrix(&["Sunny", "Rainy"], &[vec![0.5, 0.5], vec![0.5, 0.5]]);
        let other = matrix(&["Rainy", "Sunny"], &[vec![0.5, 0.5], vec![0.5, 0.5]]);
        let ss = solve_steady_state(&tm, &MarkovConfig::new()).unwrap();
        let traj = Trajectory::from_parts(other.states().clone(), vec![0, 1], 0);
        assert!(matches!(
            aggregate(&tm, &ss, &traj),
            Err(MarkovError::StateSpaceMismatch { .. })
        ));
    }

    #[test]
    fn aggregate_rejects_mismatched_steady_state() {
        let tm = matrix(&["Sunny", "Rainy"], &[vec![0.5, 0.5], vec![0.5, 0.5]]);
        let three = matrix(
            &["A", "B", "C"],
            &[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        );
        let ss = solve_steady_state(&three, &MarkovConfig::new()).unwrap();
        let traj = Trajectory::from_parts(tm.states().clone(), vec![0, 1], 0);
        assert!(matches!(
            aggregate(&tm, &ss, &traj),
            Err(MarkovError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn output_wire_shape() {
        let tm = matrix(&["Sunny", "Rainy"], &[vec![0.5, 0.5], vec![0.0, 1.0]]);
        let ss = solve_steady_state(&tm, &MarkovConfig::new()).unwrap();
        let traj = Trajectory::from_parts(tm.states().clone(), vec![0, 0, 1], 0);
        let out = aggregate(&tm, &ss, &traj).unwrap().to_output();
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["average_streaks"]["Sunny"], 2.0);
        assert_eq!(json["average_streaks"]["Rainy"], "unbounded");
        assert_eq!(json["observed_streaks"]["Rainy"], 1.0);
        assert!(json["steady_state"]["Rainy"].as_f64().unwrap() > 0.99);
        assert_eq!(json["steady_state_converged"], true);
        assert_eq!(json["steady_state_source"], "converged");
    }

    #[test]
    fn output_keys_follow_state_order() {
        // Deliberately not alphabetical.
        let tm = matrix(
            &["Sunny", "Rainy", "Cloudy"],
            &[
                vec![0.6, 0.1, 0.3],
                vec![0.2, 0.5, 0.3],
                vec![0.3, 0.3, 0.4],
            ],
        );
        let ss = solve_steady_state(&tm, &MarkovConfig::new()).unwrap();
        let traj = Trajectory::from_parts(tm.states().clone(), vec![2, 2, 0, 1], 0);
        let out = aggregate(&tm, &ss, &traj).unwrap().to_output();

        let order = ["Sunny", "Rainy", "Cloudy"];
        assert_eq!(out.steady_state.keys().collect::<Vec<_>>(), order);
        assert_eq!(out.distribution.keys().collect::<Vec<_>>(), order);
        assert_eq!(out.average_streaks.keys().collect::<Vec<_>>(), order);
        assert_eq!(out.observed_streaks.keys().collect::<Vec<_>>(), order);

        let json = serde_json::to_string(&out.distribution).unwrap();
        assert_eq!(json, r#"{"Sunny":0.25,"Rainy":0.25,"Cloudy":0.5}"#);
    }

    #[test]
    fn report_carries_fallback_source() {
        let tm = matrix(
            &["A", "B", "C"],
            &[
                vec![0.0, 1.0, 0.0],
                vec![0.5, 0.0, 0.5],
                vec![0.0, 1.0, 0.0],
            ],
        );
        let config = MarkovConfig::new()
            .with_max_iterations(10)
            .with_fallback(SteadyStateFallback::Uniform);
        let ss = solve_steady_state_with_fallback(&tm, &config).unwrap();
        let traj = Trajectory::from_parts(tm.states().clone(), vec![0, 1, 2], 0);
        let report = aggregate(&tm, &ss, &traj).unwrap();

        assert!(!report.steady_state_converged());
        assert_eq!(report.steady_state_source(), SteadyStateSource::Uniform);
        let json = serde_json::to_value(report.to_output()).unwrap();
        assert_eq!(json["steady_state_converged"], false);
        assert_eq!(json["steady_state_source"], "uniform");
    }
}
