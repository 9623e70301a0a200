//! File system paths for the outbox service.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Base directory name under the home directory.
const BASE_DIR_NAME: &str = ".sql-outbox";
/// Default SQLite database filename.
const DATABASE_FILE_NAME: &str = "outbox.sqlite";
/// JSONL log filename under the logs directory.
const LOG_FILE_NAME: &str = "sql-outbox.jsonl";

/// Resolves file locations used by the `sql-outbox` binary.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.sql-outbox)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.sql-outbox`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Service config file (~/.sql-outbox/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Default dispatcher config file (~/.sql-outbox/dispatcher.json).
    pub fn dispatcher_file(&self) -> PathBuf {
        self.base_dir.join("dispatcher.json")
    }

    /// Default queue database (~/.sql-outbox/outbox.sqlite).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join(DATABASE_FILE_NAME)
    }

    /// Resolve a relative data file name against the base directory.
    /// Absolute paths are returned unchanged.
    pub fn data_file(&self, name: &str) -> PathBuf {
        let path = PathBuf::from(name);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file (~/.sql-outbox/logs/sql-outbox.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
