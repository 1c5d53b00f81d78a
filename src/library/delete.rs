use super::BOOKS_PATH;
use crate::database::{Database, DatabaseError};
use crate::storage::{BlobStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

/// Failure taxonomy for the two-phase delete. The variant tells the caller
/// whether anything changed: `Blob` means the record and its file are both
/// still present; `Record` means the file is gone but the record survived.
#[derive(Error, Debug)]
pub enum DeleteBookError {
    #[error("failed to delete stored file (record untouched): {0}")]
    Blob(#[source] StorageError),
    #[error("stored file deleted but record removal failed: {0}")]
    Record(#[source] DatabaseError),
}

/// Removes a book's blob and then its database record, in that order.
///
/// The two phases are not transactional: if the record removal fails after
/// the blob is gone, the dangling record remains and the error says so.
/// There is no automatic retry or rollback.
pub struct DeletionOrchestrator {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
}

impl DeletionOrchestrator {
    pub fn new(db: Arc<dyn Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    pub async fn delete_book(&self, book_id: &str, book_url: &str) -> Result<(), DeleteBookError> {
        tracing::debug!(book_id, "deleting stored file");
        self.blobs
            .delete_blob(book_url)
            .await
            .map_err(DeleteBookError::Blob)?;

        tracing::debug!(book_id, "stored file deleted, removing record");
        self.db
            .delete(&format!("{}/{}", BOOKS_PATH, book_id))
            .await
            .map_err(DeleteBookError::Record)?;

        tracing::debug!(book_id, "book deleted");
        Ok(())
    }
}
