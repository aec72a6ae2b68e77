//! Request-level orchestration.
//!
//! [`ForecastSession`] holds the transient context a host keeps between
//! calls: the most recently built matrix and the most recent trajectory.
//! [`forecast`] runs the steady-state solve and the simulation of a single
//! request side by side.

use serde::Deserialize;
use tracing::info;

use crate::classify::ConditionClassifier;
use crate::config::MarkovConfig;
use crate::error::MarkovError;
use crate::ingest::{RawRecord, ingest, parse_payload};
use crate::output::{MatrixOutput, SimulatedDay};
use crate::report::{StatisticsReport, aggregate};
use crate::simulate::{Trajectory, seeded_rng, simulate_trajectory};
use crate::steady::{StationaryDistribution, solve_steady_state_with_fallback};
use crate::transition::{TransitionMatrix, build_transition_matrix};

/// Parameters of one simulation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Horizon in days, including day 0.
    pub days: usize,
    /// Name of the day-0 state.
    pub initial_state: String,
    /// RNG seed; `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Day-0 timestamp in epoch milliseconds; `None` uses the current time.
    #[serde(default)]
    pub start_ms: Option<i64>,
}

impl SimulationRequest {
    /// Creates an unseeded request starting now.
    pub fn new(days: usize, initial_state: impl Into<String>) -> Self {
        Self {
            days,
            initial_state: initial_state.into(),
            seed: None,
            start_ms: None,
        }
    }

    /// Fixes the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fixes the day-0 timestamp.
    pub fn with_start_ms(mut self, start_ms: i64) -> Self {
        self.start_ms = Some(start_ms);
        self
    }

    /// The day-0 timestamp, falling back to the current wall-clock time.
    pub fn resolved_start_ms(&self) -> i64 {
        self.start_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
    }
}

/// Result of [`forecast`]: steady state, one trajectory and their report.
#[derive(Debug, Clone)]
pub struct Forecast {
    /// Stationary distribution of the matrix.
    pub steady_state: StationaryDistribution,
    /// The simulated path.
    pub trajectory: Trajectory,
    /// Statistics over both.
    pub report: StatisticsReport,
}

/// Solves the steady state and simulates one trajectory concurrently, then
/// aggregates them.
///
/// # Errors
///
/// Propagates validation errors from simulation, convergence errors from the
/// solver (subject to `config.fallback()`), and numeric anomalies from
/// aggregation.
#[tracing::instrument(skip_all, fields(days = request.days, initial = %request.initial_state))]
pub fn forecast(
    matrix: &TransitionMatrix,
    request: &SimulationRequest,
    config: &MarkovConfig,
) -> Result<Forecast, MarkovError> {
    let start_ms = request.resolved_start_ms();
    let (steady, trajectory) = rayon::join(
        || solve_steady_state_with_fallback(matrix, config),
        || {
            let mut rng = seeded_rng(request.seed);
            simulate_trajectory(
                matrix,
                &request.initial_state,
                request.days,
                start_ms,
                config,
                &mut rng,
            )
        },
    );
    let trajectory = trajectory?;
    let steady_state = steady?;
    let report = aggregate(matrix, &steady_state, &trajectory)?;
    Ok(Forecast {
        steady_state,
        trajectory,
        report,
    })
}

/// Host-side context for the build / simulate / statistics call sequence.
///
/// Building a new matrix discards the previous trajectory, since it was
/// drawn from the old kernel.
#[derive(Debug, Clone, Default)]
pub struct ForecastSession {
    classifier: ConditionClassifier,
    config: MarkovConfig,
    matrix: Option<TransitionMatrix>,
    trajectory: Option<Trajectory>,
}

impl ForecastSession {
    /// Creates an empty session.
    pub fn new(classifier: ConditionClassifier, config: MarkovConfig) -> Self {
        Self {
            classifier,
            config,
            matrix: None,
            trajectory: None,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &MarkovConfig {
        &self.config
    }

    /// The current matrix, if one has been built.
    pub fn matrix(&self) -> Option<&TransitionMatrix> {
        self.matrix.as_ref()
    }

    /// The most recent trajectory, if any.
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// Ingests historical records and installs the resulting matrix.
    ///
    /// On error the previous matrix and trajectory are kept.
    pub fn build_matrix(&mut self, records: &[RawRecord]) -> Result<MatrixOutput, MarkovError> {
        let observations = ingest(records, &self.classifier, &self.config)?;
        let matrix = build_transition_matrix(&observations)?;
        let output = MatrixOutput::from(&matrix);
        info!(
            n_days = observations.len(),
            states = ?output.states,
            "transition matrix built"
        );
        self.matrix = Some(matrix);
        self.trajectory = None;
        Ok(output)
    }

    /// Parses a JSON payload and calls [`Self::build_matrix`].
    pub fn build_matrix_from_json(&mut self, json: &str) -> Result<MatrixOutput, MarkovError> {
        let records = parse_payload(json)?;
        self.build_matrix(&records)
    }

    /// Simulates from the current matrix and remembers the trajectory.
    ///
    /// # Errors
    ///
    /// Returns [`MarkovError::NoMatrix`] before the first successful build,
    /// plus the validation errors of [`simulate_trajectory`].
    pub fn run_simulation(
        &mut self,
        request: &SimulationRequest,
    ) -> Result<Vec<SimulatedDay>, MarkovError> {
        let matrix = self.matrix.as_ref().ok_or(MarkovError::NoMatrix)?;
        let mut rng = seeded_rng(request.seed);
        let trajectory = simulate_trajectory(
            matrix,
            &request.initial_state,
            request.days,
            request.resolved_start_ms(),
            &self.config,
            &mut rng,
        )?;
        let days = trajectory.to_days();
        self.trajectory = Some(trajectory);
        Ok(days)
    }

    /// Statistics for the current matrix and the most recent trajectory.
    ///
    /// # Errors
    ///
    /// Returns [`MarkovError::NoMatrix`] or [`MarkovError::NoTrajectory`]
    /// when the context is incomplete.
    pub fn statistics(&self) -> Result<StatisticsReport, MarkovError> {
        let trajectory = self.trajectory.as_ref().ok_or(MarkovError::NoTrajectory)?;
        self.statistics_for(trajectory)
    }

    /// Statistics for the current matrix and a caller-chosen trajectory.
    pub fn statistics_for(&self, trajectory: &Trajectory) -> Result<StatisticsReport, MarkovError> {
        let matrix = self.matrix.as_ref().ok_or(MarkovError::NoMatrix)?;
        let steady = solve_steady_state_with_fallback(matrix, &self.config)?;
        aggregate(matrix, &steady, trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunLength;

    fn history() -> Vec<RawRecord> {
        [
            "Sunny", "Sunny", "Rain", "Rain", "Rain", "Sunny", "Cloudy", "Rain", "Sunny",
            "Cloudy",
        ]
        .iter()
        .enumerate()
        .map(|(i, c)| RawRecord::new(format!("2024-05-{:02}", i + 1), *c))
        .collect()
    }

    #[test]
    fn request_deserializes_camel_case() {
        let r: SimulationRequest =
            serde_json::from_str(r#"{"days": 7, "initialState": "Rainy"}"#).unwrap();
        assert_eq!(r, SimulationRequest::new(7, "Rainy"));

        let r: SimulationRequest = serde_json::from_str(
            r#"{"days": 7, "initialState": "Rainy", "seed": 9, "startMs": 1000}"#,
        )
        .unwrap();
        assert_eq!(r.seed, Some(9));
        assert_eq!(r.start_ms, Some(1000));
    }

    #[test]
    fn simulate_before_build() {
        let mut s = ForecastSession::default();
        let r = s.run_simulation(&SimulationRequest::new(5, "Sunny"));
        assert!(matches!(r, Err(MarkovError::NoMatrix)));
        assert!(matches!(s.statistics(), Err(MarkovError::NoTrajectory)));
    }

    #[test]
    fn statistics_before_simulate() {
        let mut s = ForecastSession::default();
        s.build_matrix(&history()).unwrap();
        assert!(matches!(s.statistics(), Err(MarkovError::NoTrajectory)));
    }

    #[test]
    fn full_sequence() {
        let mut s = ForecastSession::default();
        let m = s.build_matrix(&history()).unwrap();
        assert_eq!(m.states, vec!["Sunny", "Rainy", "Cloudy"]);
        assert_eq!((m.rows, m.cols), (3, 3));

        let req = SimulationRequest::new(30, "Rainy")
            .with_seed(4)
            .with_start_ms(0);
        let days = s.run_simulation(&req).unwrap();
        assert_eq!(days.len(), 30);
        assert_eq!(days[0].state, "Rainy");
        assert_eq!(days[29].timestamp, 29 * 86_400_000);

        let report = s.statistics().unwrap();
        assert_eq!(report.states().names(), m.states.as_slice());
        assert!(matches!(
            report.average_streak("Rainy"),
            Some(RunLength::Finite(_))
        ));
    }

    #[test]
    fn rebuild_clears_trajectory() {
        let mut s = ForecastSession::default();
        s.build_matrix(&history()).unwrap();
        s.run_simulation(&SimulationRequest::new(3, "Sunny").with_seed(1))
            .unwrap();
        assert!(s.trajectory().is_some());
        s.build_matrix(&history()).unwrap();
        assert!(s.trajectory().is_none());
    }

    #[test]
    fn failed_build_keeps_previous_matrix() {
        let mut s = ForecastSession::default();
        s.build_matrix(&history()).unwrap();
        let r = s.build_matrix(&history()[..1]);
        assert!(matches!(r, Err(MarkovError::InsufficientData { .. })));
        assert!(s.matrix().is_some());
    }

    #[test]
    fn simulate_unknown_state_keeps_trajectory() {
        let mut s = ForecastSession::default();
        s.build_matrix(&history()).unwrap();
        s.run_simulation(&SimulationRequest::new(3, "Sunny").with_seed(1))
            .unwrap();
        let r = s.run_simulation(&SimulationRequest::new(3, "Snowy"));
        assert!(matches!(r, Err(MarkovError::UnknownState { .. })));
        assert_eq!(s.trajectory().map(Trajectory::len), Some(3));
    }

    #[test]
    fn statistics_keys_follow_matrix_states() {
        let records: Vec<RawRecord> = ["Clear", "Rain", "Cloudy", "Rain", "Clear", "Cloudy"]
            .iter()
            .enumerate()
            .map(|(i, c)| RawRecord::new(format!("2024-06-{:02}", i + 1), *c))
            .collect();
        let mut s = ForecastSession::default();
        let m = s.build_matrix(&records).unwrap();
        assert_eq!(m.states, vec!["Sunny", "Rainy", "Cloudy"]);

        s.run_simulation(&SimulationRequest::new(20, "Cloudy").with_seed(3).with_start_ms(0))
            .unwrap();
        let out = s.statistics().unwrap().to_output();
        for keys in [
            out.steady_state.keys().collect::<Vec<_>>(),
            out.distribution.keys().collect(),
            out.average_streaks.keys().collect(),
            out.observed_streaks.keys().collect(),
        ] {
            assert_eq!(keys, m.states);
        }

        let json = crate::output::to_json(&out).unwrap();
        let sunny = json.find("\"Sunny\"").unwrap();
        let rainy = json.find("\"Rainy\"").unwrap();
        let cloudy = json.find("\"Cloudy\"").unwrap();
        assert!(sunny < rainy && rainy < cloudy, "{json}");
    }

    #[test]
    fn overflowing_start_is_rejected() {
        let mut s = ForecastSession::default();
        s.build_matrix(&history()).unwrap();
        let req = SimulationRequest::new(3, "Sunny")
            .with_seed(1)
            .with_start_ms(i64::MAX - 10);
        assert!(matches!(
            s.run_simulation(&req),
            Err(MarkovError::TimestampOutOfRange { days: 3, .. })
        ));
        assert!(s.trajectory().is_none());
        assert!(matches!(
            forecast(s.matrix().unwrap(), &req, s.config()),
            Err(MarkovError::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn build_from_json() {
        let mut s = ForecastSession::default();
        let m = s
            .build_matrix_from_json(
                r#"[{"date": "2024-01-02", "condition": "rain"},
                    {"date": "2024-01-01", "condition": "clear"}]"#,
            )
            .unwrap();
        assert_eq!(m.states, vec!["Sunny", "Rainy"]);
        // Rainy only occurs on the last day: self-loop row.
        assert_eq!(m.matrix[1], vec![0.0, 1.0]);
    }

    #[test]
    fn forecast_matches_session() {
        let mut s = ForecastSession::default();
        s.build_matrix(&history()).unwrap();
        let req = SimulationRequest::new(50, "Cloudy")
            .with_seed(77)
            .with_start_ms(0);
        let days = s.run_simulation(&req).unwrap();

        let f = forecast(s.matrix().unwrap(), &req, s.config()).unwrap();
        assert_eq!(f.trajectory.to_days(), days);
        assert_eq!(f.report, s.statistics().unwrap());
        assert!(f.steady_state.is_converged());
    }
}
