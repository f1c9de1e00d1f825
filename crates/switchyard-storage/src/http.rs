//! HTTP plumbing shared by the network adapters.

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use crate::traits::{StorageError, StorageResult};

/// Build a client whose every request is bounded by `timeout`
pub(crate) fn build_client(timeout: Duration) -> StorageResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| StorageError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-success response into `StorageError::Rejected`, keeping status and body
pub(crate) async fn ensure_success(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(StorageError::Rejected {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}
