//! First-order Markov chain over discrete daily weather states.
//!
//! This crate turns a history of dated weather observations into a
//! row-stochastic transition matrix, solves its stationary distribution by
//! power iteration, simulates seeded future trajectories and summarises
//! them.
//!
//! # Pipeline
//!
//! ```text
//!  ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//!  │   ingest     │────▶│  transition    │──┬─▶│    simulate      │──┐
//!  │ (classify)   │     │  (estimate P)  │  │  │  (draw states)   │  │
//!  └──────────────┘     └────────────────┘  │  └──────────────────┘  │
//!                                           │  ┌──────────────────┐  │  ┌──────────────┐
//!                                           └─▶│     steady       │──┴─▶│   report     │
//!                                              │  (pi P = pi)     │     │ (aggregate)  │
//!                                              └──────────────────┘     └──────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use nimbus_markov::{
//!     ConditionClassifier, MarkovConfig, RawRecord, aggregate, build_transition_matrix,
//!     ingest, seeded_rng, simulate_trajectory, solve_steady_state,
//! };
//!
//! let records: Vec<RawRecord> = ["clear", "clear", "light rain", "rain", "clear"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, c)| RawRecord::new(format!("2024-03-{:02}", i + 1), *c))
//!     .collect();
//!
//! let config = MarkovConfig::new();
//! let obs = ingest(&records, &ConditionClassifier::default(), &config).unwrap();
//! let matrix = build_transition_matrix(&obs).unwrap();
//! let steady = solve_steady_state(&matrix, &config).unwrap();
//!
//! let mut rng = seeded_rng(Some(42));
//! let trajectory = simulate_trajectory(&matrix, "Rainy", 14, 0, &config, &mut rng).unwrap();
//! assert_eq!(trajectory.len(), 14);
//!
//! let report = aggregate(&matrix, &steady, &trajectory).unwrap();
//! let total: f64 = report.distribution().iter().sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod report;
pub mod session;
pub mod simulate;
pub mod state;
pub mod steady;
pub mod transition;

pub use classify::{ConditionClassifier, KeywordRule};
pub use config::{MarkovConfig, StateOrder, SteadyStateFallback};
pub use error::{ErrorKind, MarkovError};
pub use ingest::{ObservationSequence, RawRecord, ingest, parse_payload};
pub use output::{MatrixOutput, SimulatedDay, StateMap, StatisticsOutput, to_json};
pub use report::{RunLength, StatisticsReport, aggregate, expected_run_length};
pub use session::{Forecast, ForecastSession, SimulationRequest, forecast};
pub use simulate::{
    MS_PER_DAY, Trajectory, seeded_rng, simulate_ensemble, simulate_states, simulate_states_into,
    simulate_trajectory,
};
pub use state::StateSpace;
pub use steady::{
    StationaryDistribution, SteadyStateSource, solve_steady_state,
    solve_steady_state_with_fallback,
};
pub use transition::{TransitionMatrix, build_transition_matrix};
