//! Queue record types.

use serde::{Deserialize, Serialize};

/// A request about to be written to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub url: String,
    /// Stored verbatim; interpreted only at delivery time.
    pub method: String,
    pub payload: String,
}

impl NewRequest {
    pub fn new(url: impl Into<String>, method: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            payload: payload.into(),
        }
    }
}

/// A request read back from the queue.
///
/// Its presence in the queue is the only record that it has not been
/// delivered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Store-assigned, unique and stable for the row's lifetime.
    pub id: i64,
    pub url: String,
    pub method: String,
    /// Empty when the column was NULL.
    pub payload: String,
}
