//! Error types for the invoice reconciliation system.

use thiserror::Error;

/// Main error type for reconciliation operations.
#[derive(Error, Debug)]
pub enum ReconError {
    /// Configuration error (bad thresholds, weights not summing to 1.0)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error (malformed input data)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Business rule violation
    #[error("Business rule violated: {0}")]
    BusinessRuleViolated(String),

    /// Duplicate record (in-batch or unique-constraint collision)
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation cancelled via cooperative signal
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel closed (progress fanout)
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

impl ReconError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a business rule error.
    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRuleViolated(msg.into())
    }

    /// Create a duplicate error.
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Check if this error represents a duplicate collision.
    ///
    /// Unique-constraint races surface as duplicates and are handled
    /// per-row rather than aborting a batch.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Check if this error is a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type alias for reconciliation operations.
pub type ReconResult<T> = Result<T, ReconError>;
