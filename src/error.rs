//! Error types for a3s-attribution

use thiserror::Error;

/// Errors that can occur outside the attribution run itself
///
/// A pipeline run never fails; these surface from configuration loading,
/// construction, and the fallible helpers the run recovers from internally.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// Configuration error (loading or validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured parameter name cannot be used as a cookie/query key
    #[error("Invalid eligible parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL failed to parse
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Status reporter failed to accept a phase notification
    #[error("Status reporter error: {0}")]
    Reporter(String),
}

/// Result type alias for attribution operations
pub type Result<T> = std::result::Result<T, AttributionError>;
