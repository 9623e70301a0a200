//! Logging initialization for the outbox service.
//!
//! Thin wrapper over the observability crate so binaries only pass the
//! service settings they already loaded.

use crate::{Paths, ServiceConfig};

/// Service name written to every structured log line.
pub const SERVICE_NAME: &str = "sql-outbox";

/// Initialize logging at `level`, optionally appending JSONL to the
/// service log file.
///
/// ```ignore
/// init_logging(&config, &paths);
/// tracing::info!("Dispatcher started");
/// ```
pub fn init_logging(config: &ServiceConfig, paths: &Paths) {
    observability::init_with_config(observability::LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: config.log_level.clone(),
        log_path: config.log_to_file.then(|| paths.log_file()),
        also_stderr: true,
    });
}
