//! Paginated list state shared by admin screens.
//!
//! # Design
//! - [`ListState`] is plain data: ordered rows, a pending marker per row, and
//!   the next page cursor.
//! - [`ListController`] owns the state behind a synchronous mutex that is
//!   never held across an await, plus the per-record locks used by
//!   optimistic mutations.
//! - Overlapping loads are not cancelled; whichever response arrives last is
//!   applied. Once the controller is closed every late result is dropped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tavola_api_models::{Campaign, Customer, MenuItem, Page, PageRequest, Pagination, Store, Withdrawal};
use tavola_session::{SnapshotCache, SnapshotKey};

use crate::error::{ApiError, ErrorCategory};
use crate::optimistic::RecordLocks;

/// A row type that can be addressed by id.
pub trait ListItem: Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable identifier.
    fn key(&self) -> &str;
}

impl ListItem for Customer {
    fn key(&self) -> &str {
        &self.id
    }
}

impl ListItem for Withdrawal {
    fn key(&self) -> &str {
        &self.id
    }
}

impl ListItem for MenuItem {
    fn key(&self) -> &str {
        &self.id
    }
}

impl ListItem for Store {
    fn key(&self) -> &str {
        &self.id
    }
}

impl ListItem for Campaign {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Marker for a row whose change is awaiting server confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingMutation {
    /// Short label of the change (`block`, `availability`, ...).
    pub label: &'static str,
}

/// One displayed record.
#[derive(Clone, Debug, PartialEq)]
pub struct Row<T> {
    /// Current record contents.
    pub record: T,
    /// In-flight change, if any.
    pub pending: Option<PendingMutation>,
}

/// Rows plus paging metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ListState<T> {
    rows: Vec<Row<T>>,
    pagination: Option<Pagination>,
    last_request: Option<PageRequest>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            pagination: None,
            last_request: None,
        }
    }
}

impl<T: ListItem> ListState<T> {
    /// Replace all rows with a freshly loaded first page.
    pub fn set_rows(&mut self, page: Page<T>, request: PageRequest) {
        self.rows = page
            .data
            .into_iter()
            .map(|record| Row {
                record,
                pending: None,
            })
            .collect();
        self.pagination = page.pagination;
        self.last_request = Some(request);
    }

    /// Append a following page, skipping ids already present.
    pub fn append_rows(&mut self, page: Page<T>, request: PageRequest) {
        for record in page.data {
            if self.position(record.key()).is_none() {
                self.rows.push(Row {
                    record,
                    pending: None,
                });
            }
        }
        self.pagination = page.pagination;
        self.last_request = Some(request);
    }

    /// Row with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Row<T>> {
        self.position(id).map(|index| &self.rows[index])
    }

    /// Copy of the record with the given id.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<T> {
        self.get(id).map(|row| row.record.clone())
    }

    /// Overwrite the record with the same id; returns whether it existed.
    pub fn replace(&mut self, record: T) -> bool {
        match self.position(record.key()) {
            Some(index) => {
                self.rows[index].record = record;
                true
            }
            None => false,
        }
    }

    /// Flag a row as awaiting confirmation.
    pub fn mark_pending(&mut self, id: &str, label: &'static str) {
        if let Some(index) = self.position(id) {
            self.rows[index].pending = Some(PendingMutation { label });
        }
    }

    /// Clear the pending flag on a row.
    pub fn clear_pending(&mut self, id: &str) {
        if let Some(index) = self.position(id) {
            self.rows[index].pending = None;
        }
    }

    /// All rows in display order.
    #[must_use]
    pub fn rows(&self) -> &[Row<T>] {
        &self.rows
    }

    /// Records in display order.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.rows.iter().map(|row| row.record.clone()).collect()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the backend reported another page.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.pagination.is_some_and(|pagination| pagination.has_next)
    }

    /// Request for the page after the last one loaded.
    #[must_use]
    pub fn next_request(&self) -> Option<PageRequest> {
        if !self.has_next() {
            return None;
        }
        Some(self.last_request.map_or_else(PageRequest::first, PageRequest::next))
    }

    /// Pagination metadata of the last page loaded.
    #[must_use]
    pub const fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.record.key() == id)
    }
}

/// Result of a load request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh rows were applied; `rows` is the total now shown.
    Applied {
        /// Rows in the list after the load.
        rows: usize,
    },
    /// The network was unreachable and the cached snapshot is shown instead.
    Cached {
        /// Rows restored from the snapshot.
        rows: usize,
    },
    /// There is no further page to load.
    Exhausted,
    /// The controller was closed before the response arrived.
    Abandoned,
}

/// Owner of one list screen's state.
#[derive(Clone, Debug)]
pub struct ListController<T> {
    state: Arc<Mutex<ListState<T>>>,
    locks: Arc<RecordLocks>,
    closed: Arc<AtomicBool>,
    snapshot: Option<(SnapshotCache, SnapshotKey)>,
    page_size: u32,
}

impl<T: ListItem> Default for ListController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ListItem> ListController<T> {
    /// Empty controller without an offline snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ListState::default())),
            locks: Arc::new(RecordLocks::default()),
            closed: Arc::new(AtomicBool::new(false)),
            snapshot: None,
            page_size: PageRequest::DEFAULT_LIMIT,
        }
    }

    /// Use `limit` rows per page; zero keeps the default.
    #[must_use]
    pub fn with_page_size(mut self, limit: u32) -> Self {
        if limit > 0 {
            self.page_size = limit;
        }
        self
    }

    /// Controller that saves each first page to the snapshot cache and falls
    /// back to it when the backend is unreachable.
    #[must_use]
    pub fn with_snapshot(cache: SnapshotCache, key: SnapshotKey) -> Self {
        Self {
            snapshot: Some((cache, key)),
            ..Self::new()
        }
    }

    /// Load the first page, replacing current rows.
    ///
    /// # Errors
    ///
    /// Returns the fetch error unless a snapshot could stand in for it.
    pub async fn reload<F, Fut>(&self, fetch: F) -> Result<LoadOutcome, ApiError>
    where
        F: FnOnce(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, ApiError>>,
    {
        let request = PageRequest {
            page: 1,
            limit: self.page_size,
        };
        let result = fetch(request).await;
        if self.is_closed() {
            return Ok(LoadOutcome::Abandoned);
        }
        match result {
            Ok(page) => {
                let mut state = self.lock();
                state.set_rows(page, request);
                if let Some((cache, key)) = &self.snapshot {
                    cache.save(*key, &state.records());
                }
                Ok(LoadOutcome::Applied { rows: state.len() })
            }
            Err(error) if is_offline(&error) => match self.restore_snapshot() {
                Some(rows) => {
                    tracing::info!(rows, "backend unreachable; showing cached rows");
                    Ok(LoadOutcome::Cached { rows })
                }
                None => Err(error),
            },
            Err(error) => Err(error),
        }
    }

    /// Load the page after the last one and append it.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; current rows are kept.
    pub async fn load_next<F, Fut>(&self, fetch: F) -> Result<LoadOutcome, ApiError>
    where
        F: FnOnce(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, ApiError>>,
    {
        let Some(request) = self.lock().next_request() else {
            return Ok(LoadOutcome::Exhausted);
        };
        let page = fetch(request).await;
        if self.is_closed() {
            return Ok(LoadOutcome::Abandoned);
        }
        let page = page?;
        let mut state = self.lock();
        state.append_rows(page, request);
        Ok(LoadOutcome::Applied { rows: state.len() })
    }

    /// Stop applying results; in-flight work completes but is discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether [`Self::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ListState<T> {
        self.lock().clone()
    }

    /// Copy of one record.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<T> {
        self.lock().record(id)
    }

    /// Pending marker of one record.
    #[must_use]
    pub fn pending(&self, id: &str) -> Option<PendingMutation> {
        self.lock().get(id).and_then(|row| row.pending)
    }

    /// Seed rows directly, as if a first page had been loaded.
    pub fn set_rows(&self, page: Page<T>) {
        let request = PageRequest {
            page: 1,
            limit: self.page_size,
        };
        self.lock().set_rows(page, request);
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ListState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    fn restore_snapshot(&self) -> Option<usize> {
        let (cache, key) = self.snapshot.as_ref()?;
        let rows = cache.load::<T>(*key)?;
        let page = Page {
            data: rows,
            pagination: None,
        };
        self.set_rows(page);
        Some(self.lock().len())
    }
}

const fn is_offline(error: &ApiError) -> bool {
    matches!(
        error.category,
        ErrorCategory::NoConnection | ErrorCategory::Timeout
    )
}
