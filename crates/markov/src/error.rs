//! Error types for the nimbus-markov crate.

/// Coarse classification of a [`MarkovError`].
///
/// Hosts branch on this to decide whether to ask for corrected input, opt
/// into a steady-state fallback, or surface a numeric problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or insufficient input. Recoverable by supplying corrected input.
    Validation,
    /// The steady-state solver did not reach tolerance within its iteration budget.
    Convergence,
    /// A derived computation produced an undefined value.
    NumericAnomaly,
}

/// Error type for all fallible operations in the nimbus-markov crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MarkovError {
    /// Returned when input data is empty.
    #[error("input data is empty")]
    EmptyData,

    /// Returned when there are too few observations.
    #[error("insufficient data: got {n} observations, need at least {min}")]
    InsufficientData {
        /// Number of observations provided.
        n: usize,
        /// Minimum required.
        min: usize,
    },

    /// Returned when the raw payload cannot be parsed at all.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a single record lacks a required field.
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Zero-based position of the record in the payload.
        index: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a record's date string cannot be parsed.
    #[error("invalid date at index {index}: {value:?}")]
    InvalidDate {
        /// Zero-based position of the record in the payload.
        index: usize,
        /// The unparseable date string.
        value: String,
    },

    /// Returned when two records share a date.
    #[error("duplicate date: {date}")]
    DuplicateDate {
        /// The repeated date (ISO 8601).
        date: String,
    },

    /// Returned when consecutive records are more than one day apart.
    #[error("gap in observations between {after} and {before}")]
    DateGap {
        /// Last date before the gap (ISO 8601).
        after: String,
        /// First date after the gap (ISO 8601).
        before: String,
    },

    /// Returned when a state name is not part of the state space.
    #[error("unknown state: {name:?}")]
    UnknownState {
        /// The unrecognised state name.
        name: String,
    },

    /// Returned when a state space lists the same name twice.
    #[error("duplicate state: {name:?}")]
    DuplicateState {
        /// The repeated state name.
        name: String,
    },

    /// Returned when a state space has no states.
    #[error("state space is empty")]
    EmptyStateSpace,

    /// Returned when a simulation horizon is outside `1..=max`.
    #[error("simulation horizon out of range: {days} (must be 1..={max})")]
    HorizonOutOfRange {
        /// Requested number of days.
        days: usize,
        /// Largest supported horizon.
        max: usize,
    },

    /// Returned when the last simulated day's timestamp does not fit in an `i64`.
    #[error("timestamps out of range: {days} days from {start_ms} ms overflow epoch milliseconds")]
    TimestampOutOfRange {
        /// Day-0 timestamp in epoch milliseconds.
        start_ms: i64,
        /// Requested number of days.
        days: usize,
    },

    /// Returned when a transition matrix is not row-stochastic.
    #[error("invalid transition matrix: {reason}")]
    InvalidMatrix {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a matrix or vector has the wrong size for its state space.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        got: usize,
    },

    /// Returned when two values that must share a state ordering do not.
    #[error("state space mismatch: expected {expected:?}, got {got:?}")]
    StateSpaceMismatch {
        /// State names of the reference value.
        expected: Vec<String>,
        /// State names of the offending value.
        got: Vec<String>,
    },

    /// Returned when a pre-allocated buffer has the wrong length.
    #[error("buffer length mismatch: expected {expected}, got {got}")]
    BufferLengthMismatch {
        /// Expected buffer length.
        expected: usize,
        /// Actual buffer length.
        got: usize,
    },

    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when an output structure cannot be serialized.
    #[error("serialization failed: {reason}")]
    Serialization {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a session operation needs a matrix that was never built.
    #[error("no transition matrix has been built")]
    NoMatrix,

    /// Returned when statistics are requested before any simulation ran.
    #[error("no simulated trajectory is available")]
    NoTrajectory,

    /// Returned when power iteration exhausts its iteration budget.
    #[error("steady state did not converge after {iterations} iterations (residual {residual:e})")]
    NoConvergence {
        /// Iterations performed.
        iterations: usize,
        /// L1 distance between the last two iterates.
        residual: f64,
    },

    /// Returned when a derived quantity is undefined.
    #[error("numeric anomaly for state {state:?}: {reason}")]
    NumericAnomaly {
        /// State the quantity belongs to.
        state: String,
        /// Description of the problem.
        reason: String,
    },
}

impl MarkovError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoConvergence { .. } => ErrorKind::Convergence,
            Self::NumericAnomaly { .. } => ErrorKind::NumericAnomaly,
            Self::EmptyData
            | Self::InsufficientData { .. }
            | Self::MalformedPayload { .. }
            | Self::MalformedRecord { .. }
            | Self::InvalidDate { .. }
            | Self::DuplicateDate { .. }
            | Self::DateGap { .. }
            | Self::UnknownState { .. }
            | Self::DuplicateState { .. }
            | Self::EmptyStateSpace
            | Self::HorizonOutOfRange { .. }
            | Self::TimestampOutOfRange { .. }
            | Self::InvalidMatrix { .. }
            | Self::DimensionMismatch { .. }
            | Self::StateSpaceMismatch { .. }
            | Self::BufferLengthMismatch { .. }
            | Self::InvalidConfig { .. }
            | Self::Serialization { .. }
            | Self::NoMatrix
            | Self::NoTrajectory => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_insufficient_data() {
        let e = MarkovError::InsufficientData { n: 1, min: 2 };
        assert_eq!(
            e.to_string(),
            "insufficient data: got 1 observations, need at least 2"
        );
    }

    #[test]
    fn error_malformed_record() {
        let e = MarkovError::MalformedRecord {
            index: 3,
            reason: "missing field `date`".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "malformed record at index 3: missing field `date`"
        );
    }

    #[test]
    fn error_duplicate_date() {
        let e = MarkovError::DuplicateDate {
            date: "2024-01-02".to_string(),
        };
        assert_eq!(e.to_string(), "duplicate date: 2024-01-02");
    }

    #[test]
    fn error_unknown_state() {
        let e = MarkovError::UnknownState {
            name: "Foggy".to_string(),
        };
        assert_eq!(e.to_string(), "unknown state: \"Foggy\"");
    }

    #[test]
    fn error_horizon_out_of_range() {
        let e = MarkovError::HorizonOutOfRange { days: 0, max: 365 };
        assert_eq!(
            e.to_string(),
            "simulation horizon out of range: 0 (must be 1..=365)"
        );
    }

    #[test]
    fn error_timestamp_out_of_range() {
        let e = MarkovError::TimestampOutOfRange {
            start_ms: 5,
            days: 3,
        };
        assert_eq!(
            e.to_string(),
            "timestamps out of range: 3 days from 5 ms overflow epoch milliseconds"
        );
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn error_no_convergence() {
        let e = MarkovError::NoConvergence {
            iterations: 100,
            residual: 0.5,
        };
        assert_eq!(
            e.to_string(),
            "steady state did not converge after 100 iterations (residual 5e-1)"
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(MarkovError::EmptyData.kind(), ErrorKind::Validation);
        assert_eq!(MarkovError::NoMatrix.kind(), ErrorKind::Validation);
        assert_eq!(
            MarkovError::Serialization {
                reason: "x".to_string()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MarkovError::HorizonOutOfRange { days: 400, max: 365 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MarkovError::NoConvergence {
                iterations: 1,
                residual: 1.0
            }
            .kind(),
            ErrorKind::Convergence
        );
        assert_eq!(
            MarkovError::NumericAnomaly {
                state: "Sunny".to_string(),
                reason: "NaN".to_string()
            }
            .kind(),
            ErrorKind::NumericAnomaly
        );
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<MarkovError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<MarkovError>();
    }
}
