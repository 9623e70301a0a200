//! Service-level configuration for the `sql-outbox` binary.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "OUTBOX_LOG_LEVEL";

/// Environment variable overriding the database location.
pub const DATABASE_ENV: &str = "OUTBOX_DATABASE";

/// Process-wide settings shared by every dispatcher in the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// SQLite database holding the queues. Relative names resolve against
    /// the base directory; `None` means `outbox.sqlite` there.
    #[serde(default)]
    pub database: Option<String>,
    /// Write JSONL logs under the logs directory.
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            database: None,
            log_to_file: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the base directory, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the base directory.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Resolved database path.
    pub fn database_file(&self, paths: &Paths) -> PathBuf {
        match self.database.as_deref() {
            Some(name) => paths.data_file(name),
            None => paths.database_file(),
        }
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var(LOG_LEVEL_ENV) {
            self.log_level = log_level;
        }
        if let Ok(database) = std::env::var(DATABASE_ENV) {
            if !database.trim().is_empty() {
                self.database = Some(database);
            }
        }
    }
}
