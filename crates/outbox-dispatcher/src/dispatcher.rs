//! Outbox dispatcher: durable enqueue, retry timer and single-flight
//! delivery.
//!
//! `enqueue` returns once the request is committed to the queue store.
//! Delivery happens later on a sweep started by the retry timer, by the
//! early tick that every enqueue schedules, or by [`Dispatcher::sweep_now`].
//! At most one sweep runs per dispatcher at any time.
//!
//! Timer and sweep tasks share an `Arc<DispatcherCore>` and never reference
//! the `Dispatcher` itself, so dropping it while a sweep is running is safe.
//!
//! Two tokens are involved. `host` follows the caller's shutdown token and
//! is the only thing a running sweep listens to. `stop` is a child of it
//! that the dispatcher cancels on teardown: it ends the timer and refuses
//! new sweeps but lets a running one drain.

use crate::sweep::{DeliverySweep, SweepOutcome, SweepReport};
use crate::{HttpMethod, OutboxError, OutboxResult, QueueStatus, StatusSink, Transport};
use outbox_config_and_utils::{DispatcherConfig, MalformedPolicy, RetryConfig};
use outbox_database::{AsyncDatabase, NewRequest, QueueStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;

/// Delay before the sweep that follows an enqueue.
pub const ENQUEUE_KICK: Duration = Duration::from_millis(100);

/// Stand-in deadline for retry periods too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// What the dispatcher is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Sweeping,
    Stopped,
}

/// Claim on the busy flag, released on drop.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State shared with the timer and sweep tasks.
struct DispatcherCore {
    name: String,
    store: QueueStore,
    transport: Arc<dyn Transport>,
    sink: Option<Arc<dyn StatusSink>>,
    retry: RetryConfig,
    policy: MalformedPolicy,
    busy: Arc<AtomicBool>,
    /// Child of the caller's shutdown token; never cancelled here.
    host: CancellationToken,
    /// Child of `host`, cancelled by teardown.
    stop: CancellationToken,
    /// Present only when the retry timer runs.
    reschedule: Option<mpsc::UnboundedSender<Duration>>,
    tracker: TaskTracker,
}

impl DispatcherCore {
    fn reschedule(&self, after: Duration) {
        if let Some(tx) = &self.reschedule {
            // Only fails once the timer has exited.
            let _ = tx.send(after);
        }
    }

    /// Start a sweep task unless one is already running.
    fn spawn_sweep(self: &Arc<Self>) -> bool {
        if self.stop.is_cancelled() {
            return false;
        }
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            debug!(dispatcher = %self.name, "Sweep already running");
            return false;
        };

        let core = Arc::clone(self);
        self.tracker.spawn(async move {
            core.run_sweep(guard).await;
        });
        true
    }

    async fn run_sweep(self: Arc<Self>, guard: BusyGuard) -> SweepReport {
        let report = DeliverySweep {
            dispatcher: &self.name,
            store: &self.store,
            transport: self.transport.as_ref(),
            delay: self.retry.delay,
            policy: self.policy,
            shutdown: &self.host,
        }
        .run()
        .instrument(info_span!("sweep", dispatcher = %self.name))
        .await;

        match &report.outcome {
            SweepOutcome::Aborted(reason) => {
                warn!(dispatcher = %self.name, error = %reason, "Error sending queued requests");
            }
            outcome => {
                debug!(
                    dispatcher = %self.name,
                    delivered = report.delivered,
                    skipped = report.skipped,
                    discarded = report.discarded,
                    outcome = %outcome,
                    "Delivery sweep finished"
                );
            }
        }

        if self.retry.notify {
            self.publish().await;
        }
        if !self.retry.interval.is_zero() {
            self.reschedule(self.retry.interval);
        }

        drop(guard);
        report
    }

    async fn publish(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        match self.store.count_pending().await {
            Ok(count) => {
                let status = QueueStatus::from_count(count);
                info!(dispatcher = %self.name, status = status.name(), "{}", status);
                sink.publish(&self.name, status);
            }
            Err(e) => {
                warn!(dispatcher = %self.name, error = %e, "Unable to count pending requests");
            }
        }
    }
}

/// Deadline `after` from now, clamped to the far future when the sum
/// overflows.
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn run_timer(
    core: Arc<DispatcherCore>,
    mut reschedule: mpsc::UnboundedReceiver<Duration>,
    stop: CancellationToken,
) {
    let mut deadline = deadline_after(core.retry.interval);

    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => break,

            Some(after) = reschedule.recv() => {
                deadline = deadline_after(after);
            }

            _ = tokio::time::sleep_until(deadline) => {
                // A finished sweep moves this back to the full interval.
                deadline = deadline_after(core.retry.when_busy);
                core.spawn_sweep();
            }
        }
    }

    debug!(dispatcher = %core.name, "Retry timer stopped");
}

/// Durable outbox for HTTP requests.
pub struct Dispatcher {
    core: Arc<DispatcherCore>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.core.name)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Build a dispatcher and start its retry timer.
    ///
    /// Runs the configured init statements first; any failure there is
    /// returned and nothing is started. `shutdown` belongs to the host:
    /// cancelling it stops this dispatcher and interrupts a running sweep
    /// before its next request, while [`Dispatcher::shutdown`] never
    /// cancels it.
    pub async fn new(
        config: &DispatcherConfig,
        db: AsyncDatabase,
        transport: Arc<dyn Transport>,
        sink: Option<Arc<dyn StatusSink>>,
        shutdown: &CancellationToken,
    ) -> OutboxResult<Self> {
        config.validate()?;
        let templates = config.templates()?;
        let retry = config.retry();

        let store = QueueStore::new(db, &templates);
        store.initialize().await?;

        if store.has_pending_query() {
            match store.count_pending().await {
                Ok(0) => info!(dispatcher = %config.name, "No pending requests"),
                Ok(1) => warn!(dispatcher = %config.name, "1 pending request"),
                Ok(n) => warn!(dispatcher = %config.name, pending = n, "{} pending requests", n),
                Err(e) => {
                    error!(dispatcher = %config.name, error = %e, "Unable to count pending requests")
                }
            }
        }

        let (tx, rx) = if retry.interval.is_zero() {
            (None, None)
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        };

        let host = shutdown.child_token();
        let stop = host.child_token();

        let core = Arc::new(DispatcherCore {
            name: config.name.clone(),
            store,
            transport,
            sink,
            retry,
            policy: config.unknown_method,
            busy: Arc::new(AtomicBool::new(false)),
            host,
            stop,
            reschedule: tx,
            tracker: TaskTracker::new(),
        });

        let timer = rx.map(|rx| tokio::spawn(run_timer(Arc::clone(&core), rx, core.stop.clone())));

        info!(
            dispatcher = %core.name,
            interval_secs = retry.interval.as_secs(),
            delay_secs = retry.delay.as_secs(),
            "Dispatcher started"
        );

        Ok(Self {
            core,
            timer: Mutex::new(timer),
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Queue store backing this dispatcher.
    pub fn store(&self) -> &QueueStore {
        &self.core.store
    }

    /// Persist a request for later delivery and return its queue id.
    ///
    /// The URL is validated first. A sweep is scheduled shortly after the
    /// insert commits.
    pub async fn enqueue(&self, url: &str, method: HttpMethod, payload: &str) -> OutboxResult<i64> {
        let url = Url::parse(url)?;
        let request = NewRequest::new(url.as_str(), method.as_str(), payload);
        let id = self.core.store.insert(&request).await?;

        info!(
            dispatcher = %self.core.name,
            id,
            method = %method,
            url = %url,
            "Queued request"
        );

        if self.core.reschedule.is_some() {
            self.core.reschedule(ENQUEUE_KICK);
        } else {
            self.core.spawn_sweep();
        }
        Ok(id)
    }

    /// Run a sweep on the calling task.
    ///
    /// Returns `None` without doing anything when a sweep is already
    /// running or the dispatcher is stopped.
    pub async fn sweep_now(&self) -> Option<SweepReport> {
        if self.core.stop.is_cancelled() {
            return None;
        }
        let guard = BusyGuard::acquire(&self.core.busy)?;
        let core = Arc::clone(&self.core);
        Some(self.core.tracker.track_future(core.run_sweep(guard)).await)
    }

    /// Number of queued requests; 0 without a pending statement.
    pub async fn count_pending(&self) -> OutboxResult<i64> {
        Ok(self.core.store.count_pending().await?)
    }

    /// Status projected from the current pending count.
    pub async fn state(&self) -> OutboxResult<QueueStatus> {
        Ok(QueueStatus::from_count(self.count_pending().await?))
    }

    pub fn is_busy(&self) -> bool {
        self.core.busy.load(Ordering::Acquire)
    }

    pub fn activity(&self) -> Activity {
        if self.core.stop.is_cancelled() && !self.is_busy() {
            Activity::Stopped
        } else if self.is_busy() {
            Activity::Sweeping
        } else {
            Activity::Idle
        }
    }

    /// Stop the timer and wait for any running sweep to finish.
    ///
    /// A running sweep is not interrupted: it keeps draining the queue until
    /// it runs out of rows, hits a failure or the host token is cancelled.
    /// No new sweep starts afterwards. Calling this more than once is
    /// harmless.
    pub async fn shutdown(&self) -> OutboxResult<()> {
        self.core.stop.cancel();

        let timer = self.timer.lock().take();
        if let Some(handle) = timer {
            handle
                .await
                .map_err(|e| OutboxError::Task(format!("retry timer failed: {}", e)))?;
        }

        self.core.tracker.close();
        self.core.tracker.wait().await;

        info!(dispatcher = %self.core.name, "Dispatcher stopped");
        Ok(())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.core.stop.cancel();
    }
}
