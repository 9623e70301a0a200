//! Durable outbox for outbound HTTP requests.
//!
//! This crate provides:
//! - Dispatcher: persists requests before acknowledging them, then
//!   delivers them in order with a retry timer and single-flight sweeps
//! - DeliverySweep: one pass over the queue
//! - Transport: delivery seam, with a reqwest implementation
//! - QueueStatus / StatusSink: health signal derived from queue depth
//! - DispatcherRegistry: named lookup and `name+scheme://` routing

mod dispatcher;
mod error;
mod record;
mod registry;
mod status;
mod sweep;
mod transport;

pub use dispatcher::{Activity, Dispatcher, ENQUEUE_KICK};
pub use error::{OutboxError, OutboxResult, TransportError};
pub use record::{HttpMethod, ParseMethodError};
pub use registry::DispatcherRegistry;
pub use status::{QueueStatus, StatusBoard, StatusLevel, StatusSink};
pub use sweep::{DeliverySweep, SweepOutcome, SweepReport};
pub use transport::{HttpTransport, HttpTransportConfig, Transport, TransportResponse};
