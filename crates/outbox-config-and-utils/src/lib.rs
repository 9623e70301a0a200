//! Configuration, SQL template expansion, paths, and logging setup for the
//! SQL outbox.

mod config;
mod dispatcher_config;
mod error;
mod logging;
mod paths;
pub mod template;

pub use config::{ServiceConfig, DATABASE_ENV, DEFAULT_LOG_LEVEL, LOG_LEVEL_ENV};
pub use dispatcher_config::{
    DispatcherConfig, MalformedPolicy, RetryConfig, Templates, DEFAULT_NAME,
    DEFAULT_RETRY_DELAY_SECS, DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_RETRY_WHEN_BUSY_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, SERVICE_NAME};
pub use paths::Paths;
