pub mod middleware;

use serde::Deserialize;

/// Error body shape returned by the Cloud Storage JSON API.
#[derive(Debug, Deserialize)]
pub struct StorageErrorResponse {
    pub error: StorageErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct StorageErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

impl StorageErrorResponse {
    pub fn display_message(&self) -> String {
        format!("{} (code: {})", self.error.message, self.error.code)
    }
}

/// Error body shape returned by the Realtime Database REST API.
///
/// Unlike the Storage API, the Realtime Database reports a bare string:
/// `{"error": "Permission denied"}`.
#[derive(Debug, Deserialize)]
pub struct DatabaseErrorResponse {
    pub error: String,
}

pub async fn parse_storage_error(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<StorageErrorResponse>().await {
        Ok(error_resp) => error_resp.display_message(),
        Err(_) => format!("{}: {}", default_msg, status),
    }
}

pub async fn parse_database_error(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<DatabaseErrorResponse>().await {
        Ok(error_resp) => error_resp.error,
        Err(_) => format!("{}: {}", default_msg, status),
    }
}
