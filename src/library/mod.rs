//! Book-library core.
//!
//! This module holds the backend-agnostic pieces of the library application:
//! live collection synchronization, the filterable list adapter, row
//! presentation with stale-result guarding, the two-phase delete, and the
//! maintenance operations (view counting, category creation, book edits).
//!
//! Everything here talks to the backend exclusively through the
//! [`Database`](crate::database::Database) and
//! [`BlobStore`](crate::storage::BlobStore) traits, so the whole core runs
//! against the in-memory fakes in `crate::testing`.

pub mod adapter;
pub mod delete;
pub mod format;
pub mod models;
pub mod pdf;
pub mod rows;
pub mod sync;


use crate::database::{Database, DatabaseError};
use crate::storage::BlobStore;
use chrono::Utc;
use delete::DeletionOrchestrator;
use models::{BookRecord, CategoryRecord};
use rows::RowPresenter;
use serde_json::{Map, Value};
use std::sync::Arc;
use sync::ListSynchronizer;
use thiserror::Error;

/// Collection paths mirroring the production database layout.
pub const BOOKS_PATH: &str = "Books";
pub const CATEGORIES_PATH: &str = "Categories";

/// Errors from the maintenance operations.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// The initiating action carried invalid input; nothing was mutated.
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Entry point for the admin surface: vends synchronizers and presenters
/// for the `Books` and `Categories` collections and performs the
/// maintenance writes.
pub struct LibraryService {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
}

impl LibraryService {
    pub fn new(db: Arc<dyn Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// Synchronizer for the book collection.
    pub fn books(&self) -> ListSynchronizer<BookRecord> {
        ListSynchronizer::new(Arc::clone(&self.db), BOOKS_PATH)
    }

    /// Synchronizer for the category collection.
    pub fn categories(&self) -> ListSynchronizer<CategoryRecord> {
        ListSynchronizer::new(Arc::clone(&self.db), CATEGORIES_PATH)
    }

    pub fn presenter(&self) -> RowPresenter {
        RowPresenter::new(Arc::clone(&self.db), Arc::clone(&self.blobs))
    }

    pub fn deletion(&self) -> DeletionOrchestrator {
        DeletionOrchestrator::new(Arc::clone(&self.db), Arc::clone(&self.blobs))
    }

    /// Bumps a book's view counter by one and returns the new count.
    ///
    /// Legacy records store the counter as a decimal string; those read as
    /// their numeric value. A missing, null, or malformed counter reads as
    /// zero, so the first view of such a record writes 1.
    pub async fn increment_view_count(&self, book_id: &str) -> Result<i64, LibraryError> {
        let counter_path = format!("{}/{}/viewsCount", BOOKS_PATH, book_id);
        let current = match self.db.read_once(&counter_path).await? {
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .unwrap_or(0),
            None => 0,
        };
        let next = current + 1;

        let mut fields = Map::new();
        fields.insert("viewsCount".to_string(), Value::from(next));
        self.db
            .update(&format!("{}/{}", BOOKS_PATH, book_id), &fields)
            .await?;

        Ok(next)
    }

    /// Creates a category named `name`, keyed by its creation timestamp.
    pub async fn add_category(&self, name: &str, uid: &str) -> Result<CategoryRecord, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::Validation(
                "category name is required".to_string(),
            ));
        }

        let timestamp = Utc::now().timestamp_millis();
        let record = CategoryRecord {
            id: timestamp.to_string(),
            category: name.to_string(),
            timestamp,
            uid: uid.to_string(),
        };

        let value = serde_json::to_value(&record).map_err(DatabaseError::SerializationError)?;
        self.db
            .write(&format!("{}/{}", CATEGORIES_PATH, record.id), &value)
            .await?;

        Ok(record)
    }

    /// Updates a book's editable fields in place.
    pub async fn edit_book(
        &self,
        book_id: &str,
        title: &str,
        description: &str,
        category_id: &str,
    ) -> Result<(), LibraryError> {
        if title.trim().is_empty() {
            return Err(LibraryError::Validation(
                "book title is required".to_string(),
            ));
        }

        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::from(title));
        fields.insert("description".to_string(), Value::from(description));
        fields.insert("categoryId".to_string(), Value::from(category_id));
        self.db
            .update(&format!("{}/{}", BOOKS_PATH, book_id), &fields)
            .await?;

        Ok(())
    }
}
