//! booklib — headless core for a Firebase-backed PDF book library.
//!
//! The crate splits into two layers:
//!
//! - Backend clients for the two vendor services the library persists to:
//!   [`database::RealtimeDatabase`] (records, live snapshots) and
//!   [`storage::FileStorage`] (the PDF blobs). Both sit behind traits so the
//!   core runs against the in-memory fakes in [`testing`].
//! - The [`library`] module: collection synchronization, filterable list
//!   adapters, row presentation, the two-phase delete, and the admin
//!   maintenance operations.

pub mod core;
pub mod database;
pub mod library;
pub mod storage;
pub mod testing;

use crate::core::middleware::AuthMiddleware;
use database::RealtimeDatabase;
use library::LibraryService;
use std::sync::Arc;
use storage::FileStorage;
use yup_oauth2::ServiceAccountKey;

/// Root handle holding the service-account credentials and project
/// configuration; vends the per-service clients.
pub struct LibraryApp {
    key: ServiceAccountKey,
    database_url: String,
}

impl LibraryApp {
    /// # Arguments
    ///
    /// * `service_account_key` - Credentials for both backend services.
    /// * `database_url` - Realtime Database root URL
    ///   (e.g. "https://my-project-default-rtdb.firebaseio.com").
    pub fn new(service_account_key: ServiceAccountKey, database_url: impl Into<String>) -> Self {
        Self {
            key: service_account_key,
            database_url: database_url.into(),
        }
    }

    pub fn database(&self) -> RealtimeDatabase {
        RealtimeDatabase::new(AuthMiddleware::new(self.key.clone()), self.database_url.clone())
    }

    pub fn storage(&self) -> FileStorage {
        FileStorage::new(AuthMiddleware::new(self.key.clone()))
    }

    /// The assembled library core, wired to the production backends.
    pub fn library(&self) -> LibraryService {
        LibraryService::new(Arc::new(self.database()), Arc::new(self.storage()))
    }
}
