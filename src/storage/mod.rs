//! Cloud Storage module.
//!
//! This module provides the blob-side collaborator for the library: metadata
//! lookups (size), bounded partial downloads for previews, and deletes.
//! Blobs are addressed by opaque locator strings in either `gs://` or
//! Firebase download-URL form; see [`locator::BlobLocator`].

pub mod locator;

#[cfg(test)]
mod tests;

use crate::core::middleware::AuthMiddleware;
use crate::core::parse_storage_error;
use async_trait::async_trait;
use bytes::Bytes;
use locator::BlobLocator;
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use thiserror::Error;

const STORAGE_V1_API: &str = "https://storage.googleapis.com/storage/v1";

/// Errors that can occur during Storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Cloud Storage API.
    #[error("API error: {0}")]
    ApiError(String),
    /// The locator string could not be parsed into a bucket and object.
    #[error("Invalid blob locator: {0}")]
    InvalidLocator(String),
}

/// The metadata subset read for a stored object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobMetadata {
    pub size_bytes: u64,
}

/// Raw object resource as returned by the JSON API; `size` is a decimal
/// string per the API contract.
#[derive(Debug, Deserialize)]
struct ObjectResource {
    size: Option<String>,
}

/// Backend blob-store contract.
///
/// `FileStorage` is the production implementation; components take this
/// trait so tests can substitute an in-memory store (see `crate::testing`).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetches the object's metadata.
    async fn fetch_metadata(&self, blob_locator: &str) -> Result<BlobMetadata, StorageError>;

    /// Downloads at most `max_bytes` bytes from the start of the object.
    async fn fetch_bytes(&self, blob_locator: &str, max_bytes: u64)
        -> Result<Bytes, StorageError>;

    /// Deletes the object.
    async fn delete_blob(&self, blob_locator: &str) -> Result<(), StorageError>;
}

/// Client for interacting with Cloud Storage objects.
pub struct FileStorage {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FileStorage {
    /// Creates a new `FileStorage` instance.
    ///
    /// This is typically called via `LibraryApp::storage()`.
    pub fn new(middleware: AuthMiddleware) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        Self {
            client,
            base_url: STORAGE_V1_API.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn object_url(&self, locator: &BlobLocator) -> String {
        let encoded_name =
            url::form_urlencoded::byte_serialize(locator.object.as_bytes()).collect::<String>();
        format!("{}/b/{}/o/{}", self.base_url, locator.bucket, encoded_name)
    }
}

#[async_trait]
impl BlobStore for FileStorage {
    async fn fetch_metadata(&self, blob_locator: &str) -> Result<BlobMetadata, StorageError> {
        let locator = BlobLocator::parse(blob_locator)?;
        let response = self.client.get(self.object_url(&locator)).send().await?;

        if !response.status().is_success() {
            return Err(StorageError::ApiError(
                parse_storage_error(response, "Get metadata failed").await,
            ));
        }

        let resource: ObjectResource = response.json().await?;
        let size_bytes = resource
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                StorageError::ApiError("object metadata is missing a size".to_string())
            })?;

        Ok(BlobMetadata { size_bytes })
    }

    async fn fetch_bytes(
        &self,
        blob_locator: &str,
        max_bytes: u64,
    ) -> Result<Bytes, StorageError> {
        let locator = BlobLocator::parse(blob_locator)?;
        if max_bytes == 0 {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .get(self.object_url(&locator))
            .query(&[("alt", "media")])
            .header(header::RANGE, format!("bytes=0-{}", max_bytes - 1))
            .send()
            .await?;

        let status = response.status();
        if !(status.is_success() || status == reqwest::StatusCode::PARTIAL_CONTENT) {
            return Err(StorageError::ApiError(
                parse_storage_error(response, "Download failed").await,
            ));
        }

        // Servers are free to ignore the range request; enforce the cap.
        let body = response.bytes().await?;
        if body.len() as u64 > max_bytes {
            Ok(body.slice(0..max_bytes as usize))
        } else {
            Ok(body)
        }
    }

    async fn delete_blob(&self, blob_locator: &str) -> Result<(), StorageError> {
        let locator = BlobLocator::parse(blob_locator)?;
        let response = self.client.delete(self.object_url(&locator)).send().await?;

        if !response.status().is_success() {
            return Err(StorageError::ApiError(
                parse_storage_error(response, "Delete failed").await,
            ));
        }

        Ok(())
    }
}
