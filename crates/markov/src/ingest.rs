//! Historical observation ingestion.
//!
//! Turns raw per-day weather records into an [`ObservationSequence`]:
//! records are parsed, sorted by date, checked for duplicates and gaps, and
//! classified into canonical states.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use crate::classify::ConditionClassifier;
use crate::config::{MarkovConfig, StateOrder};
use crate::error::MarkovError;
use crate::state::StateSpace;

/// One raw historical record as delivered by the data source.
///
/// Fields other than the date and condition text are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// Date string, `YYYY-MM-DD` or an ISO 8601 timestamp.
    #[serde(default, alias = "time", alias = "datetime")]
    pub date: Option<String>,
    /// Free-text condition description.
    #[serde(default, alias = "description", alias = "conditions")]
    pub condition: Option<String>,
}

impl RawRecord {
    /// Creates a complete record.
    pub fn new(date: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            condition: Some(condition.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    List(Vec<RawRecord>),
    Wrapped {
        #[serde(alias = "days")]
        records: Vec<RawRecord>,
    },
}

/// Parses a JSON payload into raw records.
///
/// Accepts either a bare array of records or an object with a `records`
/// (or `days`) array.
///
/// # Errors
///
/// Returns [`MarkovError::MalformedPayload`] if the text is not JSON of
/// either shape.
pub fn parse_payload(json: &str) -> Result<Vec<RawRecord>, MarkovError> {
    let payload: Payload =
        serde_json::from_str(json).map_err(|e| MarkovError::MalformedPayload {
            reason: e.to_string(),
        })?;
    Ok(match payload {
        Payload::List(records) | Payload::Wrapped { records } => records,
    })
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` or RFC 3339 into a date.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
}

/// A date-ascending sequence of classified weather states.
///
/// Immutable once built; consumed by the transition matrix builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSequence {
    states: StateSpace,
    seq: Vec<usize>,
    dates: Vec<NaiveDate>,
}

impl ObservationSequence {
    /// Builds a sequence from state names, ordering states by first appearance.
    ///
    /// # Errors
    ///
    /// Returns [`MarkovError::EmptyData`] if `labels` is empty.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, MarkovError> {
        if labels.is_empty() {
            return Err(MarkovError::EmptyData);
        }
        let labels: Vec<&str> = labels.iter().map(AsRef::as_ref).collect();
        let states = first_seen(&labels)?;
        let seq = labels
            .iter()
            .map(|l| states.require(l))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            states,
            seq,
            dates: Vec::new(),
        })
    }

    /// The state space indexing this sequence.
    pub fn states(&self) -> &StateSpace {
        &self.states
    }

    /// State indices in date order.
    pub fn as_indices(&self) -> &[usize] {
        &self.seq
    }

    /// Observation dates, parallel to [`Self::as_indices`]. Empty when the
    /// sequence was built without dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of observed days.
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns `true` if no days were observed.
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// State names in date order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.seq.iter().map(|&s| self.states.name(s))
    }
}

fn first_seen(labels: &[&str]) -> Result<StateSpace, MarkovError> {
    let mut names: Vec<&str> = Vec::new();
    for &l in labels {
        if !names.contains(&l) {
            names.push(l);
        }
    }
    StateSpace::new(names)
}

/// Normalises raw records into an [`ObservationSequence`].
///
/// Records are sorted by date before classification. The state ordering
/// follows `config.state_order()`: first appearance in the sorted history by
/// default, or the classifier's declared alphabet.
///
/// # Errors
///
/// Returns [`MarkovError`] (validation kind) if there are fewer than two
/// records, a record lacks a date or condition, a date does not parse, two
/// records share a date, or (unless gaps are allowed) days are missing.
#[tracing::instrument(skip_all, fields(n_records = records.len()))]
pub fn ingest(
    records: &[RawRecord],
    classifier: &ConditionClassifier,
    config: &MarkovConfig,
) -> Result<ObservationSequence, MarkovError> {
    config.validate()?;
    classifier.validate()?;

    if records.is_empty() {
        return Err(MarkovError::EmptyData);
    }

    let mut days: Vec<(NaiveDate, &str)> = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let raw_date = record
            .date
            .as_deref()
            .ok_or_else(|| MarkovError::MalformedRecord {
                index,
                reason: "missing field `date`".to_string(),
            })?;
        let condition =
            record
                .condition
                .as_deref()
                .ok_or_else(|| MarkovError::MalformedRecord {
                    index,
                    reason: "missing field `condition`".to_string(),
                })?;
        let date = parse_date(raw_date).ok_or_else(|| MarkovError::InvalidDate {
            index,
            value: raw_date.to_string(),
        })?;
        days.push((date, condition));
    }

    if days.len() < 2 {
        return Err(MarkovError::InsufficientData {
            n: days.len(),
            min: 2,
        });
    }

    // Stable sort keeps payload order for equal dates, which are rejected below anyway.
    days.sort_by_key(|&(d, _)| d);

    for pair in days.windows(2) {
        let (prev, next) = (pair[0].0, pair[1].0);
        if prev == next {
            return Err(MarkovError::DuplicateDate {
                date: next.to_string(),
            });
        }
        if !config.allow_date_gaps() && (next - prev).num_days() != 1 {
            return Err(MarkovError::DateGap {
                after: prev.to_string(),
                before: next.to_string(),
            });
        }
    }

    let labels: Vec<&str> = days.iter().map(|&(_, c)| classifier.classify(c)).collect();
    let states = match config.state_order() {
        StateOrder::FirstSeen => first_seen(&labels)?,
        StateOrder::Declared => classifier.state_space()?,
    };
    let seq = labels
        .iter()
        .map(|l| states.require(l))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        n_days = seq.len(),
        n_states = states.len(),
        first = %days[0].0,
        last = %days[days.len() - 1].0,
        "ingested observations"
    );

    Ok(ObservationSequence {
        states,
        seq,
        dates: days.into_iter().map(|(d, _)| d).collect(),
    })
}
