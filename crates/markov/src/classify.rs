//! Condition classification.
//!
//! Maps free-text weather descriptions ("Light rain showers", "Overcast
//! clouds") onto canonical state names with an ordered list of keyword
//! rules. The first rule whose keyword occurs in the lowercased description
//! wins; descriptions matching no rule fall through to the default state.

use crate::error::MarkovError;
use crate::state::StateSpace;

/// One `keyword -> state` classification rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    keyword: String,
    state: String,
}

impl KeywordRule {
    /// Creates a rule. The keyword is matched case-insensitively.
    pub fn new(keyword: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            state: state.into(),
        }
    }

    /// Returns the lowercased keyword.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Returns the target state name.
    pub fn state(&self) -> &str {
        &self.state
    }
}

/// Ordered keyword rules plus a catch-all default state.
///
/// # Example
///
/// ```
/// use nimbus_markov::{ConditionClassifier, KeywordRule};
///
/// let classifier = ConditionClassifier::new("Sunny")
///     .with_rule(KeywordRule::new("thunder", "Stormy"))
///     .with_rule(KeywordRule::new("rain", "Rainy"));
///
/// assert_eq!(classifier.classify("Thunderstorm with rain"), "Stormy");
/// assert_eq!(classifier.classify("Light rain"), "Rainy");
/// assert_eq!(classifier.classify("Clear sky"), "Sunny");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionClassifier {
    rules: Vec<KeywordRule>,
    default_state: String,
}

impl ConditionClassifier {
    /// Creates a classifier with no rules; everything maps to `default_state`.
    pub fn new(default_state: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_state: default_state.into(),
        }
    }

    /// Appends a rule. Rules are evaluated in insertion order.
    pub fn with_rule(mut self, rule: KeywordRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Returns the catch-all state name.
    pub fn default_state(&self) -> &str {
        &self.default_state
    }

    /// Checks that no keyword is empty and no state name is blank.
    pub fn validate(&self) -> Result<(), MarkovError> {
        if self.default_state.trim().is_empty() {
            return Err(MarkovError::InvalidConfig {
                reason: "default state name must not be blank".to_string(),
            });
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.keyword.is_empty() {
                return Err(MarkovError::InvalidConfig {
                    reason: format!("rule {i}: keyword must not be empty"),
                });
            }
            if rule.state.trim().is_empty() {
                return Err(MarkovError::InvalidConfig {
                    reason: format!("rule {i}: state name must not be blank"),
                });
            }
        }
        Ok(())
    }

    /// Classifies one description into a state name.
    pub fn classify(&self, description: &str) -> &str {
        let lowered = description.to_lowercase();
        self.rules
            .iter()
            .find(|r| lowered.contains(r.keyword.as_str()))
            .map_or(self.default_state.as_str(), |r| r.state.as_str())
    }

    /// Every state this classifier can emit: rule targets in rule order,
    /// then the default, without duplicates.
    pub fn state_space(&self) -> Result<StateSpace, MarkovError> {
        let mut names: Vec<&str> = Vec::new();
        for name in self
            .rules
            .iter()
            .map(|r| r.state.as_str())
            .chain(std::iter::once(self.default_state.as_str()))
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        StateSpace::new(names)
    }
}

impl Default for ConditionClassifier {
    /// Rain before cloud, everything else sunny.
    fn default() -> Self {
        Self::new("Sunny")
            .with_rule(KeywordRule::new("rain", "Rainy"))
            .with_rule(KeywordRule::new("cloud", "Cloudy"))
    }
}
