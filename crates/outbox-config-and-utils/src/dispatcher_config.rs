//! Dispatcher configuration: SQL templates and retry tunables.

use crate::template::expand;
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default dispatcher name.
pub const DEFAULT_NAME: &str = "sql";
/// Default pause between deliveries within one sweep, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
/// Default period between sweeps, in seconds.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;
/// Default re-arm period while a sweep is running, in seconds.
pub const DEFAULT_RETRY_WHEN_BUSY_SECS: u64 = 10;

/// What a sweep does with a queued row it cannot interpret
/// (unknown HTTP method or unparsable URL).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log and leave the row queued; it is retried on every sweep.
    #[default]
    Retain,
    /// Log and delete the row.
    Discard,
}

/// Immutable retry settings derived from [`DispatcherConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Pause between successive deliveries within one sweep.
    pub delay: Duration,
    /// Timer period while idle. Zero disables the timer.
    pub interval: Duration,
    /// Re-arm period applied when a tick fires.
    pub when_busy: Duration,
    /// Publish a status after each sweep.
    pub notify: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            when_busy: Duration::from_secs(DEFAULT_RETRY_WHEN_BUSY_SECS),
            notify: false,
        }
    }
}

/// SQL statements after placeholder expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    /// Binds `?1` url, `?2` method, `?3` payload.
    pub insert: String,
    /// Binds `?1` id.
    pub delete: String,
    /// Yields rows of `(id, url, method, payload)`.
    pub select: String,
    /// Scalar count of queued rows.
    pub pending: Option<String>,
    /// One-shot setup statements, in document order.
    pub init: Vec<String>,
}

/// Configuration of one outbox dispatcher.
///
/// ```json
/// {
///   "name": "sql",
///   "vars": { "table": "outbox" },
///   "init": ["CREATE TABLE IF NOT EXISTS ${table} (...)"],
///   "insert": "INSERT INTO ${table} (url, action, payload) VALUES (?1, ?2, ?3)",
///   "select": "SELECT id, url, action, payload FROM ${table} ORDER BY id",
///   "delete": "DELETE FROM ${table} WHERE id = ?1",
///   "pending": "SELECT COUNT(*) FROM ${table}",
///   "retry-interval": 60
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatcherConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Values for `${key}` placeholders. `name` is implied.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub init: Vec<String>,
    #[serde(default)]
    pub insert: Option<String>,
    #[serde(default)]
    pub delete: Option<String>,
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default)]
    pub pending: Option<String>,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
    #[serde(default = "default_retry_when_busy")]
    pub retry_when_busy: u64,
    /// Defaults to whether a `pending` template is configured.
    #[serde(default)]
    pub notify: Option<bool>,
    #[serde(default)]
    pub unknown_method: MalformedPolicy,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_retry_interval() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

fn default_retry_when_busy() -> u64 {
    DEFAULT_RETRY_WHEN_BUSY_SECS
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            vars: BTreeMap::new(),
            init: Vec::new(),
            insert: None,
            delete: None,
            select: None,
            pending: None,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            retry_interval: DEFAULT_RETRY_INTERVAL_SECS,
            retry_when_busy: DEFAULT_RETRY_WHEN_BUSY_SECS,
            notify: None,
            unknown_method: MalformedPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    /// Create a configuration with the three required templates.
    pub fn new(
        name: impl Into<String>,
        insert: impl Into<String>,
        select: impl Into<String>,
        delete: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            insert: Some(insert.into()),
            select: Some(select.into()),
            delete: Some(delete.into()),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: DispatcherConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check that the name is usable and every template expands.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Config("Dispatcher name must not be empty".to_string()));
        }
        self.templates().map(|_| ())
    }

    /// Whether a non-blank `pending` template is configured.
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_deref()
            .map(|sql| !sql.trim().is_empty())
            .unwrap_or(false)
    }

    /// Expand all SQL templates.
    pub fn templates(&self) -> CoreResult<Templates> {
        let vars = self.variables();

        let pending = match self.pending.as_deref() {
            Some(sql) if !sql.trim().is_empty() => Some(expand(sql, &vars)?),
            _ => None,
        };

        let init = self
            .init
            .iter()
            .map(|sql| expand(sql, &vars))
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Templates {
            insert: required(&self.insert, "insert", &vars)?,
            delete: required(&self.delete, "delete", &vars)?,
            select: required(&self.select, "select", &vars)?,
            pending,
            init,
        })
    }

    /// Retry settings with seconds converted to durations.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            delay: Duration::from_secs(self.retry_delay),
            interval: Duration::from_secs(self.retry_interval),
            when_busy: Duration::from_secs(self.retry_when_busy),
            notify: self.notify.unwrap_or_else(|| self.has_pending()),
        }
    }

    fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = self.vars.clone();
        vars.entry("name".to_string())
            .or_insert_with(|| self.name.clone());
        vars
    }
}

fn required(
    template: &Option<String>,
    key: &'static str,
    vars: &BTreeMap<String, String>,
) -> CoreResult<String> {
    match template.as_deref() {
        Some(sql) if !sql.trim().is_empty() => expand(sql, vars),
        _ => Err(CoreError::MissingTemplate(key)),
    }
}
