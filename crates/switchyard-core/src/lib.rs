//! Switchyard Core Library
//!
//! This crate provides the domain models, error metadata and configuration shared by
//! the storage switcher and its infrastructure helpers.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{CategoryNamespaces, HostedStorageConfig, RecordStorageConfig, StorageConfig};
pub use error::{ErrorMetadata, LogLevel};
pub use models::{
    BatchFileError, BatchProgress, CanonicalFileRecord, FileCategory, ProviderInfo,
    UploadBatchResult, UploadFile,
};
pub use storage_types::{join_providers, ProviderKind};
