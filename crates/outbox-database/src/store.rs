//! Queue store driven by configured SQL templates.
//!
//! The store knows nothing about table layout. It binds positional
//! parameters into the statements it was given:
//!
//! | statement | parameters | result |
//! |---|---|---|
//! | insert | `?1` url, `?2` method, `?3` payload | new row id |
//! | select | none | rows of `(id, url, method, payload)` |
//! | delete | `?1` id | rows affected |
//! | pending | none | one scalar count |
//!
//! The select statement may return rows in any order. Scans read it in pages
//! of at most [`SCAN_PAGE_SIZE`] rows, keeping the lowest ids above the last
//! row handed out, so memory stays bounded however long the queue is.

use crate::{AsyncDatabase, DatabaseResult, NewRequest, QueuedRequest};
use outbox_config_and_utils::Templates;
use rusqlite::types::ValueRef;
use rusqlite::{params, OptionalExtension, Row};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Rows read per page by [`PendingScan`].
pub const SCAN_PAGE_SIZE: usize = 64;

/// Durable queue of pending requests.
///
/// Cheap to clone; clones share the database thread and statements.
#[derive(Clone)]
pub struct QueueStore {
    db: AsyncDatabase,
    insert_sql: Arc<str>,
    select_sql: Arc<str>,
    delete_sql: Arc<str>,
    pending_sql: Option<Arc<str>>,
    init_sql: Arc<[String]>,
    page_size: usize,
}

impl QueueStore {
    /// Create a store over `db` using already-expanded templates.
    pub fn new(db: AsyncDatabase, templates: &Templates) -> Self {
        Self {
            db,
            insert_sql: Arc::from(templates.insert.as_str()),
            select_sql: Arc::from(templates.select.as_str()),
            delete_sql: Arc::from(templates.delete.as_str()),
            pending_sql: templates.pending.as_deref().map(Arc::from),
            init_sql: Arc::from(templates.init.clone()),
            page_size: SCAN_PAGE_SIZE,
        }
    }

    /// Override the scan page size. Values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Underlying database handle.
    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    /// Whether a pending-count statement is configured.
    pub fn has_pending_query(&self) -> bool {
        self.pending_sql.is_some()
    }

    /// Run the configured setup statements in order. Stops at the first
    /// failure.
    pub async fn initialize(&self) -> DatabaseResult<()> {
        for (index, sql) in self.init_sql.iter().enumerate() {
            self.exec(sql).await?;
            debug!(index, "Ran init statement");
        }
        Ok(())
    }

    /// Persist a request and return its id. The row is committed when this
    /// returns.
    pub async fn insert(&self, request: &NewRequest) -> DatabaseResult<i64> {
        let sql = Arc::clone(&self.insert_sql);
        let request = request.clone();

        let id = self
            .db
            .call_sqlite(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                stmt.execute(params![request.url, request.method, request.payload])?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(id, "Inserted queued request");
        Ok(id)
    }

    /// Start a scan over the queued requests in ascending id order.
    ///
    /// The first page is read before this returns. Each later page re-runs
    /// the select statement and starts after the last row handed out; a
    /// short page ends the scan.
    pub async fn scan_pending(&self) -> DatabaseResult<PendingScan> {
        let mut scan = PendingScan {
            store: self.clone(),
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        scan.fill().await?;
        Ok(scan)
    }

    /// Up to `limit` rows with an id above `after`, lowest ids first.
    pub async fn page_after(
        &self,
        after: Option<i64>,
        limit: usize,
    ) -> DatabaseResult<Vec<QueuedRequest>> {
        let sql = Arc::clone(&self.select_sql);
        let limit = limit.max(1);

        self.db
            .call_sqlite(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let mut rows = stmt.query([])?;

                // Max-heap on id: the top is the row to evict when full.
                let mut page: BinaryHeap<ById> = BinaryHeap::with_capacity(limit + 1);
                while let Some(row) = rows.next()? {
                    let id: i64 = row.get(0)?;
                    if after.is_some_and(|after| id <= after) {
                        continue;
                    }
                    if page.len() == limit && page.peek().is_some_and(|top| top.0.id < id) {
                        continue;
                    }
                    page.push(ById(map_request(row)?));
                    if page.len() > limit {
                        page.pop();
                    }
                }

                Ok(page.into_sorted_vec().into_iter().map(|row| row.0).collect())
            })
            .await
    }

    /// Remove a request. Returns `false` if no row had that id.
    pub async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let sql = Arc::clone(&self.delete_sql);

        let affected = self
            .db
            .call_sqlite(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                stmt.execute(params![id])
            })
            .await?;

        Ok(affected > 0)
    }

    /// Number of queued requests, or 0 when no pending statement is
    /// configured.
    pub async fn count_pending(&self) -> DatabaseResult<i64> {
        let Some(sql) = self.pending_sql.clone() else {
            return Ok(0);
        };

        let count = self
            .db
            .call_sqlite(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                stmt.query_row([], |row| row.get::<_, Option<i64>>(0))
                    .optional()
            })
            .await?;

        Ok(count.flatten().unwrap_or(0))
    }

    /// Execute arbitrary SQL, possibly several statements.
    pub async fn exec(&self, sql: &str) -> DatabaseResult<()> {
        let sql = sql.to_string();
        self.db
            .call_sqlite(move |conn| conn.execute_batch(&sql))
            .await
    }
}

/// Paged walk over the queue started by [`QueueStore::scan_pending`].
pub struct PendingScan {
    store: QueueStore,
    /// Id of the last row handed out.
    after: Option<i64>,
    buffer: VecDeque<QueuedRequest>,
    exhausted: bool,
}

impl PendingScan {
    /// Next request in id order, reading another page when needed.
    pub async fn next_request(&mut self) -> DatabaseResult<Option<QueuedRequest>> {
        if self.buffer.is_empty() {
            self.fill().await?;
        }

        let next = self.buffer.pop_front();
        if let Some(request) = &next {
            self.after = Some(request.id);
        }
        Ok(next)
    }

    /// Rows already read and not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Read the rest of the scan into memory.
    pub async fn collect_all(mut self) -> DatabaseResult<Vec<QueuedRequest>> {
        let mut rows = Vec::new();
        while let Some(request) = self.next_request().await? {
            rows.push(request);
        }
        Ok(rows)
    }

    async fn fill(&mut self) -> DatabaseResult<()> {
        if self.exhausted {
            return Ok(());
        }

        let after = self.buffer.back().map(|r| r.id).or(self.after);
        let page = self.store.page_after(after, self.store.page_size).await?;
        if page.len() < self.store.page_size {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

/// Orders queued rows by id alone.
struct ById(QueuedRequest);

impl PartialEq for ById {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ById {}

impl PartialOrd for ById {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ById {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

fn map_request(row: &Row<'_>) -> rusqlite::Result<QueuedRequest> {
    Ok(QueuedRequest {
        id: row.get(0)?,
        url: column_text(row, 1)?,
        method: column_text(row, 2)?,
        payload: column_text(row, 3)?,
    })
}

/// Read a column as text whatever its storage class. NULL becomes empty.
fn column_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    })
}
