//! Async SQLite executor using a dedicated background thread.
//!
//! All statements for one database run on a single thread owned by
//! `tokio-rusqlite`, in FIFO order. Callers await results without blocking
//! the Tokio runtime. Only SQL and lightweight row mapping belong inside
//! [`AsyncDatabase::call`]; network calls and sleeps must happen outside.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let count = db
//!     .call_sqlite(|conn| conn.query_row("SELECT COUNT(*) FROM outbox", [], |r| r.get(0)))
//!     .await?;
//! ```

use crate::{DatabaseError, DatabaseResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// In-memory databases report this instead of a file path.
const MEMORY_PATH: &str = ":memory:";

fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => DatabaseError::Connection("Connection closed".to_string()),
        other => DatabaseError::Connection(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
///
/// Clones share the same connection and thread, so a queue store and the
/// code that created it see each other's writes immediately.
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open a database file, creating it and its parent directory if needed.
    ///
    /// Enables WAL mode and a busy timeout so several processes (or several
    /// dispatchers) can share the same file.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening queue database");

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Open a private in-memory database. Used by tests and by embedders
    /// that do not need durability.
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            path: MEMORY_PATH.to_string(),
        })
    }

    /// Execute a closure on the database connection.
    ///
    /// The closure runs on the dedicated SQLite thread; the caller's task is
    /// parked until the result is ready.
    pub async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        // The executor only knows tokio_rusqlite::Error, so our own result
        // travels inside its Ok variant and is flattened afterwards.
        let outer = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that only produces rusqlite errors.
    pub async fn call_sqlite<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Database file path, or `:memory:`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check that the executor thread still answers.
    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.call_sqlite(|conn| conn.execute_batch("SELECT 1")).await?;
        debug!(path = %self.path, "Database health check passed");
        Ok(())
    }

    /// Close the connection after pending operations complete.
    pub async fn close(self) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close database: {:?}", e)))?;
        info!(path = %self.path, "Queue database closed");
        Ok(())
    }
}
