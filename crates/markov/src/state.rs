//! Ordered weather-state alphabet.

use crate::error::MarkovError;

/// An ordered, duplicate-free set of weather state names.
///
/// The position of a name is its index into every matrix row, probability
/// vector and simulated sequence derived from it. A state space never
/// changes once built, so the same ordering is used throughout a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateSpace {
    names: Vec<String>,
}

impl StateSpace {
    /// Creates a state space from names in index order.
    ///
    /// # Errors
    ///
    /// Returns [`MarkovError::EmptyStateSpace`] for an empty list and
    /// [`MarkovError::DuplicateState`] if a name repeats.
    pub fn new<I, S>(names: I) -> Result<Self, MarkovError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if out.contains(&name) {
                return Err(MarkovError::DuplicateState { name });
            }
            out.push(name);
        }
        if out.is_empty() {
            return Err(MarkovError::EmptyStateSpace);
        }
        Ok(Self { names: out })
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`; construction rejects empty alphabets.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the index of `name`, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns the index of `name` or [`MarkovError::UnknownState`].
    pub fn require(&self, name: &str) -> Result<usize, MarkovError> {
        self.index_of(name).ok_or_else(|| MarkovError::UnknownState {
            name: name.to_string(),
        })
    }

    /// Returns the name at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// All names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
