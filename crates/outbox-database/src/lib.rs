//! SQLite queue store for the SQL outbox.
//!
//! This crate provides:
//! - `AsyncDatabase`: async SQLite executor with a dedicated thread
//! - `QueueStore`: insert, ordered scan, delete and count over
//!   caller-supplied SQL templates
//! - Record types for queued requests
//!
//! **Important**: Only SQL runs on the executor thread. Delivery and
//! pacing happen on the caller's task between store calls.

mod error;
mod executor;
mod models;
mod store;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use models::{NewRequest, QueuedRequest};
pub use store::{PendingScan, QueueStore, SCAN_PAGE_SIZE};
