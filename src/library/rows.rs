use super::format::{format_size, format_timestamp};
use super::models::BookRecord;
use super::pdf::{self, MAX_PREVIEW_BYTES};
use super::CATEGORIES_PATH;
use crate::database::Database;
use crate::storage::BlobStore;
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// A reusable visual row slot, bound to one record at a time.
///
/// Slots are recycled: by the time an asynchronous lookup completes, the
/// slot may already display a different record. Results are therefore
/// applied only after re-checking the bound record id under the slot lock;
/// in-flight lookups for a previous record are never cancelled, just
/// discarded on arrival.
#[derive(Clone, Default)]
pub struct RowSlot {
    state: Arc<Mutex<RowState>>,
}

/// What the slot currently displays.
#[derive(Debug, Clone, Default)]
pub struct RowState {
    pub bound_id: Option<String>,
    pub title: String,
    pub description: String,
    pub date_text: String,
    pub category_name: Option<String>,
    pub size_text: Option<String>,
    pub page_count: Option<u32>,
    pub preview: Option<Bytes>,
}

impl RowSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the slot's current display state.
    pub fn state(&self) -> RowState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RowState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_if_bound(&self, record_id: &str, apply: impl FnOnce(&mut RowState)) {
        let mut state = self.lock();
        if state.bound_id.as_deref() == Some(record_id) {
            apply(&mut state);
        } else {
            tracing::debug!(record_id = %record_id, "discarding resolution for a rebound slot");
        }
    }
}

/// Resolves a row's denormalized fields.
///
/// `present` fills the synchronous fields immediately, then issues three
/// independent lookups (category name, blob size, bounded preview fetch)
/// that complete in any order. A failed lookup leaves the row's prior state
/// untouched; there is no retry and no error surface on the row itself.
pub struct RowPresenter {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
}

impl RowPresenter {
    pub fn new(db: Arc<dyn Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// Binds `book` to `slot` and kicks off the asynchronous lookups.
    ///
    /// Returns the lookup task handles; callers may detach them or await
    /// them for quiescence.
    pub fn present(&self, book: &BookRecord, slot: &RowSlot) -> Vec<JoinHandle<()>> {
        {
            let mut state = slot.lock();
            *state = RowState {
                bound_id: Some(book.id.clone()),
                title: book.title.clone(),
                description: book.description.clone(),
                date_text: format_timestamp(book.timestamp),
                ..RowState::default()
            };
        }

        vec![
            self.spawn_category_lookup(book, slot),
            self.spawn_size_lookup(book, slot),
            self.spawn_preview_fetch(book, slot),
        ]
    }

    fn spawn_category_lookup(&self, book: &BookRecord, slot: &RowSlot) -> JoinHandle<()> {
        let db = Arc::clone(&self.db);
        let slot = slot.clone();
        let record_id = book.id.clone();
        let path = format!("{}/{}/category", CATEGORIES_PATH, book.category_id);

        tokio::spawn(async move {
            match db.read_once(&path).await {
                Ok(Some(value)) => {
                    if let Some(name) = value.as_str() {
                        let name = name.to_string();
                        slot.apply_if_bound(&record_id, |state| {
                            state.category_name = Some(name);
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(record_id = %record_id, error = %e, "category lookup failed"),
            }
        })
    }

    fn spawn_size_lookup(&self, book: &BookRecord, slot: &RowSlot) -> JoinHandle<()> {
        let blobs = Arc::clone(&self.blobs);
        let slot = slot.clone();
        let record_id = book.id.clone();
        let locator = book.url.clone();

        tokio::spawn(async move {
            match blobs.fetch_metadata(&locator).await {
                Ok(metadata) => {
                    slot.apply_if_bound(&record_id, |state| {
                        state.size_text = Some(format_size(metadata.size_bytes));
                    });
                }
                Err(e) => tracing::debug!(record_id = %record_id, error = %e, "size lookup failed"),
            }
        })
    }

    fn spawn_preview_fetch(&self, book: &BookRecord, slot: &RowSlot) -> JoinHandle<()> {
        let blobs = Arc::clone(&self.blobs);
        let slot = slot.clone();
        let record_id = book.id.clone();
        let locator = book.url.clone();

        tokio::spawn(async move {
            match blobs.fetch_bytes(&locator, MAX_PREVIEW_BYTES).await {
                Ok(bytes) => {
                    let pages = pdf::page_count(&bytes);
                    slot.apply_if_bound(&record_id, |state| {
                        state.page_count = pages;
                        state.preview = Some(bytes);
                    });
                }
                Err(e) => tracing::debug!(record_id = %record_id, error = %e, "preview fetch failed"),
            }
        })
    }
}
