//! Dispatcher error types.

use thiserror::Error;

/// Failure reaching the remote endpoint. Any HTTP response, whatever its
/// status, is not a transport error.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request could not be sent or its response could not be read
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// Failure reported by a non-HTTP transport
    #[error("Connection failed: {0}")]
    Connect(String),
}

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Invalid dispatcher configuration
    #[error("Configuration error: {0}")]
    Config(#[from] outbox_config_and_utils::CoreError),

    /// Queue store error
    #[error("Database error: {0}")]
    Database(#[from] outbox_database::DatabaseError),

    /// Delivery failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Queued row carries a method other than GET or POST
    #[error("Request {id} has unsupported method {method:?}")]
    ProtocolViolation { id: i64, method: String },

    /// A dispatcher with this name is already registered
    #[error("Dispatcher already registered: {0}")]
    DuplicateName(String),

    /// No dispatcher registered under this name or URL prefix
    #[error("Unknown dispatcher: {0}")]
    UnknownDispatcher(String),

    /// Background task failed
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
