//! Delivery sweep: drain the queue in id order.
//!
//! A sweep walks the queue page by page in id order. For each request in
//! turn it calls the transport and deletes the row once any response
//! arrived. The first transport or store failure ends the sweep and leaves
//! the remaining rows for the next one.

use crate::{HttpMethod, OutboxError, Transport};
use outbox_config_and_utils::MalformedPolicy;
use outbox_database::{QueueStore, QueuedRequest};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use url::Url;

/// How a sweep ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every queued row was handled.
    Drained,
    /// Shutdown was requested before the queue was exhausted.
    Cancelled,
    /// A transport or store failure stopped the sweep.
    Aborted(String),
}

impl fmt::Display for SweepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drained => f.write_str("drained"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Counters reported by a finished sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows delivered and removed.
    pub delivered: usize,
    /// Malformed rows left in place.
    pub skipped: usize,
    /// Malformed rows removed without delivery.
    pub discarded: usize,
    pub outcome: SweepOutcome,
}

impl SweepReport {
    fn new() -> Self {
        Self {
            delivered: 0,
            skipped: 0,
            discarded: 0,
            outcome: SweepOutcome::Drained,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.outcome == SweepOutcome::Drained
    }
}

/// One pass over the queue.
pub struct DeliverySweep<'a> {
    pub dispatcher: &'a str,
    pub store: &'a QueueStore,
    pub transport: &'a dyn Transport,
    /// Pause after each delivery attempt.
    pub delay: Duration,
    pub policy: MalformedPolicy,
    pub shutdown: &'a CancellationToken,
}

enum Step {
    Delivered,
    Skipped,
    Discarded,
}

impl DeliverySweep<'_> {
    /// Run the sweep to completion. Failures are reported, never returned.
    pub async fn run(&self) -> SweepReport {
        let mut report = SweepReport::new();

        let mut scan = match self.store.scan_pending().await {
            Ok(scan) => scan,
            Err(e) => {
                report.outcome = SweepOutcome::Aborted(e.to_string());
                return report;
            }
        };

        debug!(dispatcher = %self.dispatcher, "Starting delivery sweep");

        let mut pace = false;
        loop {
            if pace && !self.delay.is_zero() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            if self.shutdown.is_cancelled() {
                info!(dispatcher = %self.dispatcher, "Shutdown requested, stopping delivery");
                report.outcome = SweepOutcome::Cancelled;
                break;
            }

            let request = match scan.next_request().await {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    report.outcome = SweepOutcome::Aborted(e.to_string());
                    break;
                }
            };

            match self.handle(&request).await {
                Ok(Step::Delivered) => {
                    report.delivered += 1;
                    pace = true;
                }
                Ok(Step::Skipped) => {
                    report.skipped += 1;
                    pace = false;
                }
                Ok(Step::Discarded) => {
                    report.discarded += 1;
                    pace = false;
                }
                Err(e) => {
                    report.outcome = SweepOutcome::Aborted(e.to_string());
                    break;
                }
            }
        }

        report
    }

    async fn handle(&self, request: &QueuedRequest) -> Result<Step, OutboxError> {
        let (method, url) = match parse_target(request) {
            Ok(target) => target,
            Err(e) => {
                error!(
                    dispatcher = %self.dispatcher,
                    id = request.id,
                    method = %request.method,
                    url = %request.url,
                    error = %e,
                    "Unable to send queued request"
                );
                return match self.policy {
                    MalformedPolicy::Retain => Ok(Step::Skipped),
                    MalformedPolicy::Discard => {
                        self.store.delete(request.id).await?;
                        info!(dispatcher = %self.dispatcher, id = request.id, "Discarded malformed request");
                        Ok(Step::Discarded)
                    }
                };
            }
        };

        info!(
            dispatcher = %self.dispatcher,
            id = request.id,
            method = %method,
            url = %url,
            "Sending queued request"
        );
        trace!(id = request.id, payload = %request.payload, "Request payload");

        let response = match method {
            HttpMethod::Get => self.transport.get(&url).await?,
            HttpMethod::Post => self.transport.post(&url, &request.payload).await?,
        };
        trace!(id = request.id, status = response.status, body = %response.body, "Response received");

        if self.store.delete(request.id).await? {
            info!(dispatcher = %self.dispatcher, id = request.id, "Removed request from queue");
        } else {
            debug!(dispatcher = %self.dispatcher, id = request.id, "Request was already removed");
        }

        Ok(Step::Delivered)
    }
}

fn parse_target(request: &QueuedRequest) -> Result<(HttpMethod, Url), OutboxError> {
    let method = request
        .method
        .parse::<HttpMethod>()
        .map_err(|_| OutboxError::ProtocolViolation {
            id: request.id,
            method: request.method.clone(),
        })?;
    let url = Url::parse(&request.url)?;
    Ok((method, url))
}
