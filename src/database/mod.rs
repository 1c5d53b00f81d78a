//! Firebase Realtime Database module.
//!
//! This module provides a REST client for the Realtime Database: single-shot
//! reads, writes, partial updates, deletes, and a live `subscribe()` feed.
//!
//! # Live snapshots
//!
//! `subscribe()` opens the streaming REST endpoint (`Accept:
//! text/event-stream`) and folds the server's `put`/`patch` events into a
//! local JSON tree, emitting the full materialized state after every change.
//! Consumers therefore only ever observe complete collection snapshots,
//! never partial or interleaved states.

pub mod listen;

#[cfg(test)]
mod tests;

use crate::core::middleware::AuthMiddleware;
use crate::core::parse_database_error;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use listen::EventStream;
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur during Realtime Database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Realtime Database REST API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A live, unbounded sequence of full-collection states.
///
/// Each item is the complete JSON value at the subscribed path after one
/// backend change. The stream ends when the connection closes or, after
/// yielding an error, when the server cancels the listen.
pub type SnapshotStream = BoxStream<'static, Result<Value, DatabaseError>>;

/// Backend database contract.
///
/// `RealtimeDatabase` is the production implementation; components take this
/// trait so tests can substitute an in-memory database (see `crate::testing`).
#[async_trait]
pub trait Database: Send + Sync {
    /// Reads the value at `path` once. Returns `None` if the location is
    /// empty (the REST API reports empty locations as JSON `null`).
    async fn read_once(&self, path: &str) -> Result<Option<Value>, DatabaseError>;

    /// Replaces the value at `path`.
    async fn write(&self, path: &str, value: &Value) -> Result<(), DatabaseError>;

    /// Merges `fields` into the object at `path`, leaving other children
    /// untouched.
    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), DatabaseError>;

    /// Removes the value at `path`.
    async fn delete(&self, path: &str) -> Result<(), DatabaseError>;

    /// Opens a live feed of full snapshots of the value at `path`.
    async fn subscribe(&self, path: &str) -> Result<SnapshotStream, DatabaseError>;
}

/// REST client for the Firebase Realtime Database.
pub struct RealtimeDatabase {
    client: ClientWithMiddleware,
    base_url: String,
}

impl RealtimeDatabase {
    /// Creates a new `RealtimeDatabase` instance.
    ///
    /// # Arguments
    ///
    /// * `middleware` - Auth middleware attaching service-account tokens.
    /// * `database_url` - The database root URL
    ///   (e.g. "https://my-project-default-rtdb.firebaseio.com").
    pub fn new(middleware: AuthMiddleware, database_url: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        Self {
            client,
            base_url: database_url.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}.json",
            self.base_url.trim_end_matches('/'),
            path.trim_matches('/')
        )
    }
}

#[async_trait]
impl Database for RealtimeDatabase {
    async fn read_once(&self, path: &str) -> Result<Option<Value>, DatabaseError> {
        let response = self.client.get(self.url_for(path)).send().await?;

        if !response.status().is_success() {
            return Err(DatabaseError::ApiError(
                parse_database_error(response, "Read failed").await,
            ));
        }

        let value: Value = response.json().await?;
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    async fn write(&self, path: &str, value: &Value) -> Result<(), DatabaseError> {
        let response = self
            .client
            .put(self.url_for(path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(value)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DatabaseError::ApiError(
                parse_database_error(response, "Write failed").await,
            ));
        }

        Ok(())
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), DatabaseError> {
        let response = self
            .client
            .patch(self.url_for(path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(fields)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DatabaseError::ApiError(
                parse_database_error(response, "Update failed").await,
            ));
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), DatabaseError> {
        let response = self.client.delete(self.url_for(path)).send().await?;

        if !response.status().is_success() {
            return Err(DatabaseError::ApiError(
                parse_database_error(response, "Delete failed").await,
            ));
        }

        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<SnapshotStream, DatabaseError> {
        let response = self
            .client
            .get(self.url_for(path))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DatabaseError::ApiError(
                parse_database_error(response, "Listen failed").await,
            ));
        }

        // Turn the chunked response body into a byte stream, then into
        // parsed server events, then into materialized snapshots.
        let bytes = stream::unfold(response, |mut resp| async move {
            match resp.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), resp)),
                Ok(None) => None,
                Err(e) => Some((Err(e), resp)),
            }
        });

        let events = EventStream::new(Box::pin(bytes));
        Ok(listen::snapshots(events).boxed())
    }
}
