//! `sql-outbox` binary entry point.
//!
//! Usage: sql-outbox [--config <file>] [--database <path>] <command>
//!
//! The dispatcher configuration defaults to `~/.sql-outbox/dispatcher.json`
//! and the queue database to `~/.sql-outbox/outbox.sqlite`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use outbox_config_and_utils::{init_logging, DispatcherConfig, Paths, ServiceConfig};
use outbox_database::AsyncDatabase;
use outbox_dispatcher::{
    Dispatcher, HttpMethod, HttpTransport, HttpTransportConfig, StatusBoard, StatusSink,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// SQL outbox: queue HTTP requests in SQLite and deliver them later.
#[derive(Parser, Debug)]
#[command(name = "sql-outbox")]
#[command(about = "Durable outbox for outbound HTTP requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Dispatcher configuration (JSON).
    #[arg(long, env = "OUTBOX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Queue database, overriding the service configuration.
    #[arg(long, global = true)]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deliver queued requests until interrupted
    Run,

    /// Queue a request for delivery
    Enqueue {
        /// Target URL
        url: String,
        /// HTTP method (GET or POST)
        #[arg(short, long, default_value = "GET")]
        method: HttpMethod,
        /// Request body, sent with POST
        #[arg(short, long, default_value = "")]
        payload: String,
    },

    /// Run a single delivery sweep and exit
    Flush,

    /// Show the queue status
    Status,

    /// Print queued requests as JSON lines
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Paths::new()?;
    let mut service = ServiceConfig::load(&paths).context("Failed to load service configuration")?;
    if let Some(level) = cli.log_level.clone() {
        service.log_level = level;
    }
    if let Some(database) = cli.database.clone() {
        service.database = Some(database);
    }

    init_logging(&service, &paths);

    let config_path = cli.config.clone().unwrap_or_else(|| paths.dispatcher_file());
    let config = DispatcherConfig::load_from_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let db_path = service.database_file(&paths);
    let db = AsyncDatabase::open(&db_path).await?;
    let transport = Arc::new(HttpTransport::new(&HttpTransportConfig::default())?);
    let board = Arc::new(StatusBoard::new());
    let shutdown = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        &config,
        db,
        transport,
        Some(board.clone() as Arc<dyn StatusSink>),
        &shutdown,
    )
    .await?;

    match cli.command {
        Commands::Run => {
            info!(
                dispatcher = %dispatcher.name(),
                database = %db_path.display(),
                "Delivering queued requests"
            );
            serve(&dispatcher, &shutdown, tokio::signal::ctrl_c()).await?;
            info!("Received shutdown signal, exiting...");
        }
        Commands::Enqueue {
            url,
            method,
            payload,
        } => {
            let id = dispatcher.enqueue(&url, method, &payload).await?;
            println!("{}", id);
        }
        Commands::Flush => {
            if let Some(report) = dispatcher.sweep_now().await {
                println!(
                    "{} delivered, {} skipped, {} discarded ({})",
                    report.delivered, report.skipped, report.discarded, report.outcome
                );
            }
        }
        Commands::Status => {
            let status = dispatcher.state().await?;
            println!("{}: {}", dispatcher.name(), status);
        }
        Commands::List => {
            let mut scan = dispatcher.store().scan_pending().await?;
            while let Some(request) = scan.next_request().await? {
                println!("{}", serde_json::to_string(&request)?);
            }
        }
    }

    dispatcher.shutdown().await?;
    Ok(())
}

/// Deliver the backlog, then wait for `signal` and cancel `shutdown`.
///
/// A signal that arrives during the first sweep cancels it before its next
/// request; this returns once that sweep has stopped.
async fn serve<S>(
    dispatcher: &Dispatcher,
    shutdown: &CancellationToken,
    signal: S,
) -> std::io::Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    // Deliver whatever survived the last run without waiting a full
    // interval.
    let initial = dispatcher.sweep_now();
    tokio::pin!(initial);
    tokio::pin!(signal);

    let drained = tokio::select! {
        _ = &mut initial => true,
        result = &mut signal => {
            result?;
            false
        }
    };
    if drained {
        signal.await?;
    }

    shutdown.cancel();
    if !drained {
        initial.await;
    }
    Ok(())
}
