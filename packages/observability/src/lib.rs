//! # Observability
//!
//! Logging setup shared by the SQL outbox crates.
//!
//! Library crates never configure logging; they only use `tracing` macros.
//! The process entry point calls [`init_with_config`] once:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "sql-outbox".into(),
//!     default_level: "debug".into(),
//!     log_path: Some(paths.log_file()),
//!     also_stderr: true,
//! });
//! ```
//!
//! With a `log_path`, events are appended to that file as JSONL (see
//! [`JsonLayer`]) and optionally mirrored to stderr. Without one, a compact
//! human-readable subscriber writes to stderr. `RUST_LOG` always overrides
//! the configured default level.

mod json_layer;
mod writer;

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{LogFileWriter, WriterFactory};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written to every JSONL line.
    pub service_name: String,

    /// Default filter directive (e.g. "info", "outbox_dispatcher=debug").
    pub default_level: String,

    /// Append structured JSONL to this file.
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr when writing to a file.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber installed. If the log file cannot be opened, logging falls
/// back to stderr and the failure is reported as a warning.
pub fn init_with_config(config: LogConfig) {
    let file_writer = config.log_path.as_deref().map(LogFileWriter::new);

    match file_writer {
        Some(Ok(writer)) => {
            let log_path = writer.path().display().to_string();
            let json_layer = JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                .with_filter(env_filter(&config.default_level));
            let stderr_layer = config.also_stderr.then(|| {
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .compact()
                    .with_writer(io::stderr)
                    .with_filter(env_filter(&config.default_level))
            });

            if tracing_subscriber::registry()
                .with(json_layer)
                .with(stderr_layer)
                .try_init()
                .is_ok()
            {
                tracing::info!(log_path = %log_path, "observability initialized");
            }
        }
        Some(Err(e)) => {
            init_stderr(&config.default_level);
            tracing::warn!(
                log_path = ?config.log_path,
                error = %e,
                "Failed to open log file, logging to stderr only"
            );
        }
        None => init_stderr(&config.default_level),
    }
}

fn init_stderr(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
