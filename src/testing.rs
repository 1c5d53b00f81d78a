//! In-memory backend fakes.
//!
//! `MemoryDatabase` and `MemoryBlobStore` implement the backend traits over
//! plain in-process state so the library core can be exercised without a
//! network. Both support targeted fault injection, and the blob store can
//! hold individual fetches open to reproduce completion-order races.

use crate::database::listen::{apply_patch, apply_put};
use crate::database::{Database, DatabaseError, SnapshotStream};
use crate::storage::{BlobMetadata, BlobStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::watch;

/// An in-memory JSON-tree database with live subscriptions.
pub struct MemoryDatabase {
    tree: watch::Sender<Value>,
    fail_mutations: Mutex<HashSet<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let (tree, _) = watch::channel(Value::Null);
        Self {
            tree,
            fail_mutations: Mutex::new(HashSet::new()),
        }
    }

    /// Makes every subsequent mutation (`write`/`update`/`delete`) of `path`
    /// fail. Reads and subscriptions are unaffected.
    pub fn fail_mutations_at(&self, path: &str) {
        self.fail_mutations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(normalize(path));
    }

    fn check_mutation(&self, path: &str) -> Result<(), DatabaseError> {
        let denied = self
            .fail_mutations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&normalize(path));
        if denied {
            Err(DatabaseError::ApiError("injected backend failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn subtree(root: &Value, path: &str) -> Value {
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn read_once(&self, path: &str) -> Result<Option<Value>, DatabaseError> {
        let value = subtree(&self.tree.borrow(), path);
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    async fn write(&self, path: &str, value: &Value) -> Result<(), DatabaseError> {
        self.check_mutation(path)?;
        let path = normalize(path);
        let value = value.clone();
        self.tree
            .send_modify(|root| apply_put(root, &path, value));
        Ok(())
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), DatabaseError> {
        self.check_mutation(path)?;
        let path = normalize(path);
        let fields = Value::Object(fields.clone());
        self.tree
            .send_modify(|root| apply_patch(root, &path, fields));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), DatabaseError> {
        self.check_mutation(path)?;
        let path = normalize(path);
        self.tree
            .send_modify(|root| apply_put(root, &path, Value::Null));
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<SnapshotStream, DatabaseError> {
        let rx = self.tree.subscribe();
        let path = normalize(path);

        // Emit the current state first, then one snapshot per change, the
        // same shape the streaming REST feed produces.
        let snapshots = stream::unfold((rx, path, true), |(mut rx, path, first)| async move {
            if first {
                let value = subtree(&rx.borrow_and_update(), &path);
                return Some((Ok(value), (rx, path, false)));
            }
            match rx.changed().await {
                Ok(()) => {
                    let value = subtree(&rx.borrow_and_update(), &path);
                    Some((Ok(value), (rx, path, false)))
                }
                Err(_) => None,
            }
        });

        Ok(snapshots.boxed())
    }
}

/// Opens a gate created by [`MemoryBlobStore::hold`], releasing any fetches
/// waiting on it.
pub struct GateHandle {
    open: watch::Sender<bool>,
}

impl GateHandle {
    pub fn release(&self) {
        let _ = self.open.send(true);
    }
}

/// An in-memory blob store keyed by locator string.
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_deletes: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            fail_deletes: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, locator: &str, bytes: impl Into<Bytes>) {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(locator.to_string(), bytes.into());
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(locator)
    }

    /// Makes every subsequent delete of `locator` fail.
    pub fn fail_deletes_of(&self, locator: &str) {
        self.fail_deletes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(locator.to_string());
    }

    /// Holds metadata and byte fetches of `locator` until the returned gate
    /// is released, so tests can control completion order.
    pub fn hold(&self, locator: &str) -> GateHandle {
        let (open, waiter) = watch::channel(false);
        self.gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(locator.to_string(), waiter);
        GateHandle { open }
    }

    async fn wait_for_gate(&self, locator: &str) {
        let gate = self
            .gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(locator)
            .cloned();
        if let Some(mut waiter) = gate {
            let _ = waiter.wait_for(|open| *open).await;
        }
    }

    fn get(&self, locator: &str) -> Result<Bytes, StorageError> {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::ApiError(format!("no such blob: {}", locator)))
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch_metadata(&self, blob_locator: &str) -> Result<BlobMetadata, StorageError> {
        self.wait_for_gate(blob_locator).await;
        let bytes = self.get(blob_locator)?;
        Ok(BlobMetadata {
            size_bytes: bytes.len() as u64,
        })
    }

    async fn fetch_bytes(
        &self,
        blob_locator: &str,
        max_bytes: u64,
    ) -> Result<Bytes, StorageError> {
        self.wait_for_gate(blob_locator).await;
        let bytes = self.get(blob_locator)?;
        if bytes.len() as u64 > max_bytes {
            Ok(bytes.slice(0..max_bytes as usize))
        } else {
            Ok(bytes)
        }
    }

    async fn delete_blob(&self, blob_locator: &str) -> Result<(), StorageError> {
        let denied = self
            .fail_deletes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(blob_locator);
        if denied {
            return Err(StorageError::ApiError(
                "injected delete failure".to_string(),
            ));
        }

        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(blob_locator)
            .map(|_| ())
            .ok_or_else(|| StorageError::ApiError(format!("no such blob: {}", blob_locator)))
    }
}
