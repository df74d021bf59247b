//! Error types for replay operations

use std::path::PathBuf;

/// Result type for replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Error types for the replay engine
///
/// Every variant here is fatal for the run: the recording could not be
/// loaded or the configuration is unusable. Problems with a single record are
/// reported through [`crate::recording::FieldError`] and never surface as a
/// `ReplayError`.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Recording file could not be read
    #[error("could not open {path} for reading: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recording is not a JSON array of event objects
    #[error("failed to parse recording {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Recording has no timing to reconstruct
    #[error("recording must have at least 2 messages to play back, found {found}")]
    TooFewRecords { found: usize },

    /// A record's envelope (`name`/`timestamp`) is unusable
    #[error("record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReplayError {
    /// Whether this error came from reading or parsing the recording itself.
    pub fn is_recording_error(&self) -> bool {
        matches!(
            self,
            ReplayError::Io { .. }
                | ReplayError::Parse { .. }
                | ReplayError::TooFewRecords { .. }
                | ReplayError::InvalidRecord { .. }
        )
    }
}

impl From<figment::Error> for ReplayError {
    fn from(err: figment::Error) -> Self {
        ReplayError::Configuration(format!("Failed to load configuration: {}", err))
    }
}
