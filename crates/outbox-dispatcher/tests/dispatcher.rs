//! Dispatcher behavior against a real SQLite queue and a stub transport.

use async_trait::async_trait;
use outbox_config_and_utils::{CoreError, DispatcherConfig, MalformedPolicy};
use outbox_database::{AsyncDatabase, NewRequest};
use outbox_dispatcher::{
    Activity, Dispatcher, DispatcherRegistry, HttpMethod, OutboxError, QueueStatus, StatusBoard,
    StatusSink, SweepOutcome, Transport, TransportError, TransportResponse,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

const CREATE: &str = "CREATE TABLE IF NOT EXISTS ${table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    action TEXT NOT NULL,
    payload TEXT
)";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    method: &'static str,
    path: String,
    payload: String,
    at: Instant,
}

#[derive(Default)]
struct StubTransport {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    latency: Duration,
    started: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubTransport {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    fn fail_path(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    fn paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.path.clone()).collect()
    }

    async fn respond(
        &self,
        method: &'static str,
        url: &Url,
        payload: &str,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(Call {
            method,
            path: url.path().to_string(),
            payload: payload.to_string(),
            at: Instant::now(),
        });
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.started.notify_one();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fail = self.fail_all.load(Ordering::SeqCst) || self.failing.lock().contains(url.path());
        if fail {
            return Err(TransportError::Connect(format!("{} refused", url)));
        }
        Ok(TransportResponse {
            status: 404,
            body: "not found".to_string(),
        })
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        self.respond("GET", url, "").await
    }

    async fn post(&self, url: &Url, payload: &str) -> Result<TransportResponse, TransportError> {
        self.respond("POST", url, payload).await
    }
}

#[derive(Default)]
struct RecordingSink {
    published: Mutex<Vec<QueueStatus>>,
}

impl StatusSink for RecordingSink {
    fn publish(&self, _dispatcher: &str, status: QueueStatus) {
        self.published.lock().push(status);
    }
}

fn config(name: &str) -> DispatcherConfig {
    let mut config = DispatcherConfig::new(
        name,
        "INSERT INTO ${table} (url, action, payload) VALUES (?1, ?2, ?3)",
        "SELECT id, url, action, payload FROM ${table} ORDER BY id",
        "DELETE FROM ${table} WHERE id = ?1",
    );
    config.vars.insert("table".to_string(), format!("{}_outbox", name));
    config.init = vec![CREATE.to_string()];
    config.pending = Some("SELECT COUNT(*) FROM ${table}".to_string());
    config.retry_delay = 0;
    config.retry_interval = 60;
    config
}

async fn start(
    config: &DispatcherConfig,
    db: AsyncDatabase,
    transport: Arc<StubTransport>,
    sink: Option<Arc<dyn StatusSink>>,
) -> (Dispatcher, CancellationToken) {
    let shutdown = CancellationToken::new();
    let dispatcher = Dispatcher::new(config, db, transport, sink, &shutdown)
        .await
        .unwrap();
    (dispatcher, shutdown)
}

/// Queue a row without scheduling a sweep.
async fn push(dispatcher: &Dispatcher, path: &str, method: &str, payload: &str) -> i64 {
    dispatcher
        .store()
        .insert(&NewRequest::new(
            format!("http://localhost{}", path),
            method,
            payload,
        ))
        .await
        .unwrap()
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_failed_post_stays_queued() {
    let transport = Arc::new(StubTransport::default());
    transport.fail_path("/b");
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport.clone(), None).await;

    push(&dispatcher, "/a", "GET", "").await;
    push(&dispatcher, "/b", "POST", "{\"k\":1}").await;

    let report = dispatcher.sweep_now().await.unwrap();
    assert_eq!(report.delivered, 1);
    assert!(matches!(report.outcome, SweepOutcome::Aborted(_)));

    assert_eq!(dispatcher.count_pending().await.unwrap(), 1);
    let remaining = dispatcher
        .store()
        .scan_pending()
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(remaining[0].url, "http://localhost/b");
    assert_eq!(remaining[0].payload, "{\"k\":1}");

    let calls = transport.calls.lock().clone();
    assert_eq!(calls[0].method, "GET");
    assert_eq!(calls[1].method, "POST");
    assert_eq!(calls[1].payload, "{\"k\":1}");

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_requests_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outbox.sqlite");
    let config = config("sql");

    {
        // Nothing can be delivered before the restart.
        let transport = Arc::new(StubTransport::default());
        transport.fail_all.store(true, Ordering::SeqCst);
        let db = AsyncDatabase::open(&path).await.unwrap();
        let (dispatcher, _shutdown) = start(&config, db, transport.clone(), None).await;

        for p in ["/1", "/2", "/3"] {
            dispatcher
                .enqueue(&format!("http://localhost{}", p), HttpMethod::Get, "")
                .await
                .unwrap();
        }
        dispatcher.shutdown().await.unwrap();
    }

    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open(&path).await.unwrap();
    let (dispatcher, _shutdown) = start(&config, db, transport.clone(), None).await;

    assert_eq!(dispatcher.count_pending().await.unwrap(), 3);
    let report = dispatcher.sweep_now().await.unwrap();
    assert_eq!(report.delivered, 3);
    assert_eq!(transport.paths(), vec!["/1", "/2", "/3"]);
    assert_eq!(dispatcher.count_pending().await.unwrap(), 0);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delivery_follows_insertion_order() {
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport.clone(), None).await;

    let expected: Vec<String> = (0..6).map(|i| format!("/r{}", i)).collect();
    for path in &expected {
        push(&dispatcher, path, "GET", "").await;
    }

    dispatcher.sweep_now().await.unwrap();
    assert_eq!(transport.paths(), expected);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failure_retried_on_next_sweep() {
    let transport = Arc::new(StubTransport::default());
    transport.fail_path("/r2");
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport.clone(), None).await;

    for i in 0..5 {
        push(&dispatcher, &format!("/r{}", i), "GET", "").await;
    }

    let first = dispatcher.sweep_now().await.unwrap();
    assert_eq!(first.delivered, 2);
    assert_eq!(dispatcher.count_pending().await.unwrap(), 3);

    transport.failing.lock().clear();
    transport.calls.lock().clear();

    let second = dispatcher.sweep_now().await.unwrap();
    assert!(second.is_drained());
    assert_eq!(transport.paths(), vec!["/r2", "/r3", "/r4"]);
    assert_eq!(dispatcher.count_pending().await.unwrap(), 0);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_only_one_sweep_at_a_time() {
    let transport = Arc::new(StubTransport::with_latency(Duration::from_millis(50)));
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport.clone(), None).await;

    push(&dispatcher, "/a", "GET", "").await;
    push(&dispatcher, "/b", "GET", "").await;

    let (first, second) = tokio::join!(dispatcher.sweep_now(), dispatcher.sweep_now());
    assert_eq!(
        [first.is_some(), second.is_some()].iter().filter(|ran| **ran).count(),
        1
    );
    assert_eq!(transport.paths(), vec!["/a", "/b"]);
    assert!(!dispatcher.is_busy());

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_state_tracks_pending_count() {
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport, None).await;

    assert_eq!(dispatcher.state().await.unwrap(), QueueStatus::Empty);
    push(&dispatcher, "/a", "GET", "").await;
    assert_eq!(dispatcher.state().await.unwrap(), QueueStatus::One);
    push(&dispatcher, "/b", "GET", "").await;
    push(&dispatcher, "/c", "GET", "").await;

    let status = dispatcher.state().await.unwrap();
    assert_eq!(status, QueueStatus::Many(3));
    assert_eq!(status.summary(), "3 pending requests in the output queue");

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_state_without_pending_query() {
    let mut config = config("sql");
    config.pending = None;
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config, db, transport, None).await;

    push(&dispatcher, "/a", "GET", "").await;
    assert_eq!(dispatcher.count_pending().await.unwrap(), 0);
    assert_eq!(dispatcher.state().await.unwrap(), QueueStatus::Empty);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_enqueue_schedules_early_sweep() {
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport.clone(), None).await;

    let id = dispatcher
        .enqueue("http://localhost/hook", HttpMethod::Post, "payload")
        .await
        .unwrap();
    assert!(id > 0);

    // Interval is a minute; only the enqueue kick can deliver this.
    let d = &dispatcher;
    wait_for(move || async move { d.count_pending().await.unwrap() == 0 }).await;
    assert_eq!(transport.paths(), vec!["/hook"]);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_enqueue_without_timer_sweeps_immediately() {
    let mut config = config("sql");
    config.retry_interval = 0;
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config, db, transport.clone(), None).await;

    dispatcher
        .enqueue("http://localhost/now", HttpMethod::Get, "")
        .await
        .unwrap();

    let d = &dispatcher;
    wait_for(move || async move { d.count_pending().await.unwrap() == 0 }).await;
    assert_eq!(transport.paths(), vec!["/now"]);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_url() {
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport, None).await;

    let err = dispatcher
        .enqueue("not a url", HttpMethod::Get, "")
        .await
        .unwrap_err();
    assert!(matches!(err, OutboxError::InvalidUrl(_)));
    assert_eq!(dispatcher.count_pending().await.unwrap(), 0);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timer_delivers_and_publishes_status() {
    let mut config = config("sql");
    config.retry_interval = 1;
    let board = Arc::new(StatusBoard::new());
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(
        &config,
        db,
        transport.clone(),
        Some(board.clone() as Arc<dyn StatusSink>),
    )
    .await;

    push(&dispatcher, "/tick", "GET", "").await;

    let b: &StatusBoard = &board;
    wait_for(move || async move { b.get("sql") == Some(QueueStatus::Empty) }).await;
    assert_eq!(transport.paths(), vec!["/tick"]);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_sweep_publishes_pending_status() {
    let board = Arc::new(StatusBoard::new());
    let transport = Arc::new(StubTransport::default());
    transport.fail_all.store(true, Ordering::SeqCst);
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(
        &config("sql"),
        db,
        transport,
        Some(board.clone() as Arc<dyn StatusSink>),
    )
    .await;

    push(&dispatcher, "/a", "GET", "").await;
    push(&dispatcher, "/b", "GET", "").await;
    dispatcher.sweep_now().await.unwrap();

    assert_eq!(board.get("sql"), Some(QueueStatus::Many(2)));

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_token_stops_sweep() {
    let transport = Arc::new(StubTransport::with_latency(Duration::from_millis(100)));
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, shutdown) = start(&config("sql"), db, transport.clone(), None).await;
    let dispatcher = Arc::new(dispatcher);

    for p in ["/a", "/b", "/c"] {
        push(&dispatcher, p, "GET", "").await;
    }

    let sweeping = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.sweep_now().await })
    };

    transport.started.notified().await;
    shutdown.cancel();

    let report = sweeping.await.unwrap().unwrap();
    assert_eq!(report.outcome, SweepOutcome::Cancelled);
    assert_eq!(report.delivered, 1);
    assert_eq!(dispatcher.count_pending().await.unwrap(), 2);
    assert!(dispatcher.sweep_now().await.is_none());
}

#[tokio::test]
async fn test_shutdown_cuts_pause_short() {
    let mut config = config("sql");
    config.retry_delay = 5;
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, shutdown) = start(&config, db, transport.clone(), None).await;
    let dispatcher = Arc::new(dispatcher);

    push(&dispatcher, "/a", "GET", "").await;
    push(&dispatcher, "/b", "GET", "").await;

    let began = Instant::now();
    let sweeping = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.sweep_now().await })
    };

    transport.started.notified().await;
    shutdown.cancel();

    let report = sweeping.await.unwrap().unwrap();
    assert_eq!(report.outcome, SweepOutcome::Cancelled);
    assert!(began.elapsed() < Duration::from_secs(4));
    assert_eq!(transport.paths(), vec!["/a"]);
}

#[tokio::test]
async fn test_shutdown_lets_running_sweep_drain() {
    let mut config = config("sql");
    config.retry_interval = 0;
    let transport = Arc::new(StubTransport::with_latency(Duration::from_millis(100)));
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, shutdown) = start(&config, db, transport.clone(), None).await;

    push(&dispatcher, "/a", "GET", "").await;
    push(&dispatcher, "/b", "GET", "").await;
    push(&dispatcher, "/c", "GET", "").await;
    dispatcher
        .enqueue("http://localhost/d", HttpMethod::Get, "")
        .await
        .unwrap();

    transport.started.notified().await;
    assert_eq!(dispatcher.activity(), Activity::Sweeping);

    dispatcher.shutdown().await.unwrap();

    assert!(!shutdown.is_cancelled());
    assert_eq!(transport.paths(), vec!["/a", "/b", "/c", "/d"]);
    assert_eq!(dispatcher.count_pending().await.unwrap(), 0);
    assert!(!dispatcher.is_busy());
    assert_eq!(dispatcher.activity(), Activity::Stopped);

    push(&dispatcher, "/e", "GET", "").await;
    assert!(dispatcher.sweep_now().await.is_none());
    assert_eq!(dispatcher.count_pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_huge_retry_interval_still_delivers() {
    let mut config = config("sql");
    config.retry_interval = u64::MAX;
    config.retry_when_busy = u64::MAX;
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config, db, transport.clone(), None).await;

    dispatcher
        .enqueue("http://localhost/far", HttpMethod::Get, "")
        .await
        .unwrap();

    let d = &dispatcher;
    wait_for(move || async move { d.count_pending().await.unwrap() == 0 }).await;
    assert_eq!(transport.paths(), vec!["/far"]);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timer_ticks_while_busy_start_nothing() {
    let mut config = config("sql");
    config.retry_interval = 1;
    config.retry_when_busy = 1;
    let board = Arc::new(RecordingSink::default());
    let transport = Arc::new(StubTransport::with_latency(Duration::from_millis(200)));
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(
        &config,
        db,
        transport.clone(),
        Some(board.clone() as Arc<dyn StatusSink>),
    )
    .await;

    for p in ["/a", "/b", "/c", "/d"] {
        push(&dispatcher, p, "GET", "").await;
    }

    // First tick after one second starts the sweep.
    transport.started.notified().await;
    assert!(dispatcher.is_busy());
    assert!(dispatcher.sweep_now().await.is_none());

    // The enqueue kick fires while the timer sweep is still running.
    dispatcher
        .enqueue("http://localhost/late", HttpMethod::Get, "")
        .await
        .unwrap();

    let d = &dispatcher;
    wait_for(move || async move { d.count_pending().await.unwrap() == 0 }).await;

    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(transport.paths(), vec!["/a", "/b", "/c", "/d", "/late"]);

    // The busy tick re-armed after a short wait; the finished sweep put the
    // timer back on the full interval.
    let calls = transport.calls.lock().clone();
    assert!(calls[4].at - calls[3].at >= Duration::from_millis(900));

    let published = board.published.lock().clone();
    assert_eq!(published[..2], [QueueStatus::One, QueueStatus::Empty]);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropped_dispatcher_stops_timer() {
    let mut config = config("sql");
    config.retry_interval = 1;
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config, db, transport.clone(), None).await;

    push(&dispatcher, "/late", "GET", "").await;
    drop(dispatcher);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(transport.calls.lock().is_empty());
}

#[tokio::test]
async fn test_unknown_method_discarded_when_configured() {
    let mut config = config("sql");
    config.unknown_method = MalformedPolicy::Discard;
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config, db, transport.clone(), None).await;

    push(&dispatcher, "/put", "PUT", "").await;
    push(&dispatcher, "/get", "get", "").await;

    let report = dispatcher.sweep_now().await.unwrap();
    assert_eq!(report.discarded, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(transport.paths(), vec!["/get"]);
    assert_eq!(dispatcher.count_pending().await.unwrap(), 0);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_method_retained_by_default() {
    let transport = Arc::new(StubTransport::default());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let (dispatcher, _shutdown) = start(&config("sql"), db, transport.clone(), None).await;

    push(&dispatcher, "/put", "PUT", "").await;

    let report = dispatcher.sweep_now().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(report.is_drained());
    assert!(transport.calls.lock().is_empty());
    assert_eq!(dispatcher.count_pending().await.unwrap(), 1);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_template_rejected() {
    let mut config = config("sql");
    config.delete = None;
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let shutdown = CancellationToken::new();

    let result = Dispatcher::new(
        &config,
        db,
        Arc::new(StubTransport::default()),
        None,
        &shutdown,
    )
    .await;
    assert!(matches!(
        result,
        Err(OutboxError::Config(CoreError::MissingTemplate("delete")))
    ));
}

#[tokio::test]
async fn test_failing_init_statement_is_fatal() {
    let mut config = config("sql");
    config.init.push("CREATE TABLE broken (".to_string());
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    let shutdown = CancellationToken::new();

    let result = Dispatcher::new(
        &config,
        db,
        Arc::new(StubTransport::default()),
        None,
        &shutdown,
    )
    .await;
    assert!(matches!(result, Err(OutboxError::Database(_))));
}

#[tokio::test]
async fn test_registry_routes_by_name() {
    let transport = Arc::new(StubTransport::default());
    transport.fail_all.store(true, Ordering::SeqCst);
    let db = AsyncDatabase::open_in_memory().await.unwrap();

    let (sql, _s1) = start(&config("sql"), db.clone(), transport.clone(), None).await;
    let (audit, _s2) = start(&config("audit"), db.clone(), transport.clone(), None).await;
    let sql = Arc::new(sql);
    let audit = Arc::new(audit);

    let registry = DispatcherRegistry::new();
    registry.register(sql.clone()).await.unwrap();
    registry.register(audit.clone()).await.unwrap();
    assert_eq!(registry.names().await, vec!["audit", "sql"]);

    let (duplicate, _s3) = start(&config("sql"), db.clone(), transport.clone(), None).await;
    let err = registry.register(Arc::new(duplicate)).await.unwrap_err();
    assert!(matches!(err, OutboxError::DuplicateName(ref name) if name == "sql"));

    let (routed, target) = registry.route("audit+https://example.com/hook").await.unwrap();
    assert_eq!(routed.name(), "audit");
    assert_eq!(target.as_str(), "https://example.com/hook");

    registry
        .enqueue_routed("audit+http://localhost/event", HttpMethod::Post, "{}")
        .await
        .unwrap();
    assert_eq!(audit.count_pending().await.unwrap(), 1);
    assert_eq!(sql.count_pending().await.unwrap(), 0);

    assert!(matches!(
        registry.route("http://localhost/plain").await,
        Err(OutboxError::UnknownDispatcher(_))
    ));
    assert!(matches!(
        registry.route("other+http://localhost/x").await,
        Err(OutboxError::UnknownDispatcher(_))
    ));

    registry.shutdown_all().await;
    assert_eq!(registry.count().await, 0);
    assert_eq!(sql.activity(), Activity::Stopped);
    assert_eq!(audit.activity(), Activity::Stopped);
}
