//! JSON output structures for the build / simulate / statistics operations.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::MarkovError;
use crate::report::RunLength;
use crate::steady::SteadyStateSource;
use crate::transition::TransitionMatrix;

/// Result of building a matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixOutput {
    /// Nested probability grid, `matrix[from][to]`.
    pub matrix: Vec<Vec<f64>>,
    /// State names in index order.
    pub states: Vec<String>,
    pub rows: usize,
    pub cols: usize,
}

impl From<&TransitionMatrix> for MatrixOutput {
    fn from(tm: &TransitionMatrix) -> Self {
        Self {
            matrix: tm.to_rows(),
            states: tm.states().names().to_vec(),
            rows: tm.dim(),
            cols: tm.dim(),
        }
    }
}

/// One simulated day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedDay {
    /// Zero-based day index.
    pub day: usize,
    pub state: String,
    /// Epoch milliseconds: start timestamp plus `day` whole days.
    pub timestamp: i64,
}

/// Values keyed by state name.
///
/// Keeps the order entries were inserted in, which is the state-space order,
/// and serializes as a JSON object in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> StateMap<T> {
    /// State names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Looks up the value of a state by name.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// `(state, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for StateMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T: Serialize> Serialize for StateMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Statistics keyed by state name, in state-space order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsOutput {
    /// state -> stationary probability
    pub steady_state: StateMap<f64>,
    /// `false` when the steady state is a non-convergence fallback.
    pub steady_state_converged: bool,
    /// Which solver outcome produced `steady_state`.
    pub steady_state_source: SteadyStateSource,
    /// state -> relative frequency in the trajectory
    pub distribution: StateMap<f64>,
    /// state -> analytic expected run length
    pub average_streaks: StateMap<RunLength>,
    /// state -> mean observed run length in the trajectory
    pub observed_streaks: StateMap<Option<f64>>,
}

/// Serialize any output structure to a pretty-printed JSON string.
pub fn to_json<T: Serialize + ?Sized>(output: &T) -> Result<String, MarkovError> {
    serde_json::to_string_pretty(output).map_err(|e| MarkovError::Serialization {
        reason: e.to_string(),
    })
}
