//! Storage adapter trait
//!
//! This module defines the trait every storage backend implements, the adapter-level
//! record it returns, and the error type shared by all adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use thiserror::Error;

use switchyard_core::{ErrorMetadata, FileCategory, LogLevel, ProviderKind, UploadFile};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connectivity(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::Timeout(err.to_string())
        } else if err.is_decode() {
            StorageError::MalformedResponse(err.to_string())
        } else if err.is_builder() {
            StorageError::InvalidInput(err.to_string())
        } else {
            StorageError::Connectivity(err.to_string())
        }
    }
}

impl ErrorMetadata for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            StorageError::Config(_) => "STORAGE_CONFIG_ERROR",
            StorageError::Connectivity(_) => "STORAGE_UNREACHABLE",
            StorageError::Timeout(_) => "STORAGE_TIMEOUT",
            StorageError::Rejected { .. } => "BACKEND_REJECTED",
            StorageError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            StorageError::InvalidKey(_) => "INVALID_STORAGE_KEY",
            StorageError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            StorageError::Connectivity(_) | StorageError::Timeout(_) => true,
            StorageError::Rejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            StorageError::Config(_) => "Storage provider is not configured".to_string(),
            StorageError::Connectivity(_) | StorageError::Timeout(_) => {
                "Storage provider is unreachable".to_string()
            }
            StorageError::Rejected { status, .. } => {
                format!("Storage provider rejected the file (status {})", status)
            }
            StorageError::MalformedResponse(_) => {
                "Storage provider returned an unexpected response".to_string()
            }
            StorageError::InvalidKey(msg) | StorageError::InvalidInput(msg) => msg.clone(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            StorageError::InvalidKey(_) | StorageError::InvalidInput(_) => LogLevel::Debug,
            StorageError::Connectivity(_)
            | StorageError::Timeout(_)
            | StorageError::Rejected { .. } => LogLevel::Warn,
            StorageError::Config(_) | StorageError::MalformedResponse(_) => LogLevel::Error,
        }
    }
}

/// Location of a stored object: a bucket or collection plus a backend-specific path.
///
/// Displays as `namespace/path` and parses back from that form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub path: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Reject keys that are empty, absolute or contain traversal segments
    pub fn validate(&self) -> StorageResult<()> {
        if self.namespace.is_empty() || self.namespace.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "invalid namespace '{}'",
                self.namespace
            )));
        }
        if self.path.is_empty()
            || self.path.starts_with('/')
            || self.path.split('/').any(|segment| segment.is_empty() || segment == "..")
        {
            return Err(StorageError::InvalidKey(format!(
                "invalid object path '{}'",
                self.path
            )));
        }
        Ok(())
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.namespace, self.path)
    }
}

impl FromStr for ObjectKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, path) = s
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidKey(format!("missing namespace in '{}'", s)))?;
        let key = ObjectKey::new(namespace, path);
        key.validate()?;
        Ok(key)
    }
}

/// What an adapter reports back after a successful upload or when listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendFileRecord {
    pub key: ObjectKey,
    pub url: String,
    pub public_url: String,
    pub size: u64,
    pub mime_type: String,
    pub original_name: String,
    pub category: FileCategory,
    pub created_at: DateTime<Utc>,
    pub extensions: BTreeMap<String, JsonValue>,
}

/// Static configuration snapshot of an adapter, for operator diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterDescription {
    pub kind: ProviderKind,
    pub base_url: String,
    pub has_credential: bool,
    pub namespaces: BTreeMap<FileCategory, String>,
}

/// Storage adapter trait
///
/// One implementation per backend kind. Adapters translate canonical operations into
/// their backend's wire protocol and never decide on fallback themselves.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// The backend kind this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Store a file under a freshly generated key
    async fn upload(&self, file: &UploadFile) -> StorageResult<BackendFileRecord>;

    /// Delete an object.
    ///
    /// Returns `Ok(false)` when the backend reports the object missing, so callers can
    /// tell a no-op apart from a real deletion.
    async fn delete(&self, key: &ObjectKey) -> StorageResult<bool>;

    /// Most recently stored objects across every namespace this adapter writes to,
    /// newest first
    async fn list_recent(&self, limit: usize, offset: usize)
        -> StorageResult<Vec<BackendFileRecord>>;

    /// Lightweight read-only reachability check
    async fn check_health(&self) -> StorageResult<bool>;

    /// Public retrieval URL for a stored object. Pure, no I/O.
    fn build_public_url(&self, key: &ObjectKey) -> String;

    /// Static configuration snapshot
    fn describe(&self) -> AdapterDescription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_round_trip() {
        let key: ObjectKey = "images/acme/images/1700-abc.png".parse().unwrap();
        assert_eq!(key.namespace, "images");
        assert_eq!(key.path, "acme/images/1700-abc.png");
        assert_eq!(key.to_string(), "images/acme/images/1700-abc.png");
    }

    #[test]
    fn test_object_key_rejects_traversal() {
        assert!("images".parse::<ObjectKey>().is_err());
        assert!("images/../secrets".parse::<ObjectKey>().is_err());
        assert!("images//a.png".parse::<ObjectKey>().is_err());
        assert!(matches!(
            "/etc/passwd".parse::<ObjectKey>(),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_error_metadata() {
        let err = StorageError::Rejected {
            status: 413,
            body: "too large".to_string(),
        };
        assert_eq!(err.error_code(), "BACKEND_REJECTED");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("413"));
        assert_eq!(err.log_level(), LogLevel::Warn);

        let err = StorageError::Timeout("probe".to_string());
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "STORAGE_TIMEOUT");
    }
}
