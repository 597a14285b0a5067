//! Error types for the audit log coordinator

use thiserror::Error;

use modlog_core::InvalidIdentifier;
use modlog_fetch::FetchError;
use modlog_storage::StorageError;

/// Errors that can occur in the audit log
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The attachment fetcher could not be built
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed identifier
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// A blocking or spawned task failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl AuditError {
    /// Whether this wraps a missing-record storage error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }
}

impl From<tokio::task::JoinError> for AuditError {
    fn from(e: tokio::task::JoinError) -> Self {
        AuditError::Task(e.to_string())
    }
}

impl From<std::io::Error> for AuditError {
    fn from(e: std::io::Error) -> Self {
        AuditError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for AuditError {
    fn from(e: toml::de::Error) -> Self {
        AuditError::Config(e.to_string())
    }
}

/// Result type alias for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_passthrough() {
        let err: AuditError = StorageError::not_found("member 1/2").into();
        assert!(err.is_not_found());

        let err: AuditError = StorageError::database("disk on fire").into();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_invalid_identifier_display() {
        let err: AuditError = InvalidIdentifier::new("abc").into();
        assert!(err.to_string().contains("abc"));
    }
}
