//! Health status derived from queue depth.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// Severity attached to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusLevel {
    Unimportant,
    Warning,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unimportant => "unimportant",
            Self::Warning => "warning",
        }
    }
}

/// Queue status computed from a pending count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    Empty,
    One,
    /// Two or more pending requests.
    Many(u64),
}

impl QueueStatus {
    /// Project a count onto a status. Negative counts read as empty.
    pub fn from_count(count: i64) -> Self {
        match count {
            i64::MIN..=0 => Self::Empty,
            1 => Self::One,
            n => Self::Many(n as u64),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::One | Self::Many(_) => "pending",
        }
    }

    pub fn level(&self) -> StatusLevel {
        match self {
            Self::Empty => StatusLevel::Unimportant,
            Self::One | Self::Many(_) => StatusLevel::Warning,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Empty => "Output queue is empty".to_string(),
            Self::One => "One pending request in the output queue".to_string(),
            Self::Many(n) => format!("{} pending requests in the output queue", n),
        }
    }

    pub fn pending(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::One => 1,
            Self::Many(n) => *n,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Receives the status of a dispatcher after each sweep.
pub trait StatusSink: Send + Sync {
    /// Replace the published status of `dispatcher`.
    fn publish(&self, dispatcher: &str, status: QueueStatus);
}

/// In-memory [`StatusSink`] keyed by dispatcher name.
#[derive(Debug, Default)]
pub struct StatusBoard {
    statuses: RwLock<HashMap<String, QueueStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last status published by `dispatcher`.
    pub fn get(&self, dispatcher: &str) -> Option<QueueStatus> {
        self.statuses.read().get(dispatcher).copied()
    }

    /// All published statuses, sorted by dispatcher name.
    pub fn snapshot(&self) -> Vec<(String, QueueStatus)> {
        let mut all: Vec<_> = self
            .statuses
            .read()
            .iter()
            .map(|(name, status)| (name.clone(), *status))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl StatusSink for StatusBoard {
    fn publish(&self, dispatcher: &str, status: QueueStatus) {
        self.statuses.write().insert(dispatcher.to_string(), status);
    }
}
