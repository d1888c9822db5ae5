//! Error types for httpvcr

use thiserror::Error;

/// Result type for httpvcr operations
pub type Result<T> = std::result::Result<T, VcrError>;

/// Errors that can occur while recording or replaying
#[derive(Debug, Error)]
pub enum VcrError {
    /// Incompatible settings, detected before any request is made
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Replay or auto mode found no recorded interaction for the request
    #[error("No matching interaction found for {method} {uri}")]
    NoMatch {
        /// Request method
        method: String,
        /// Request URI (after censoring)
        uri: String,
    },

    /// A matching interaction exists but is older than the configured time frame
    #[error("Recording for {uri} (recorded at {recorded_at}) has expired")]
    ExpiredRecording {
        /// Request URI of the stale interaction
        uri: String,
        /// Epoch seconds when the interaction was recorded
        recorded_at: i64,
    },

    /// Request configuration changed after the interaction was resolved
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Cassette is locked, unreadable or unwritable
    #[error("Storage error: {0}")]
    Storage(String),

    /// The transport failed before an HTTP status was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Cassette name cannot be turned into a safe file name
    #[error("Invalid cassette name: {0}")]
    InvalidCassetteName(String),

    /// Regular expression in a censor or match rule failed to compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Compilation failure
        source: regex::Error,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VcrError {
    /// Whether this error means "nothing recorded yet", the only failure auto
    /// mode recovers from
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }
}
