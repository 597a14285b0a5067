//! Error types shared across the modlog crates

use thiserror::Error;

/// A string that is not a valid platform identifier
///
/// Identifiers are non-empty decimal digit strings that fit in a `u64`.
/// Callers should skip the computation that needed the identifier (for
/// example an "account created" line) rather than abort the whole event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid identifier: {0:?}")]
pub struct InvalidIdentifier(pub String);

impl InvalidIdentifier {
    /// Create a new error for the given input
    pub fn new(input: impl Into<String>) -> Self {
        Self(input.into())
    }

    /// The rejected input
    pub fn input(&self) -> &str {
        &self.0
    }
}
