//! Configuration error types.

use thiserror::Error;

/// Error raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required SQL template is absent or blank
    #[error("Required template '{0}' not found")]
    MissingTemplate(&'static str),

    /// A `${...}` placeholder names no known variable
    #[error("Unknown template variable '{0}'")]
    UnknownVariable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
