//! Switchyard Storage Library
//!
//! Multi-provider file storage: adapters for each backend kind, a health monitor that
//! keeps the provider table current, a selector that picks a provider from that table and
//! the upload coordinator that ties them together with single-shot fallback.
//!
//! # Object key format
//!
//! Every adapter generates paths with the same layout:
//!
//! - `{site_id}/{category}/{timestamp}-{random}.{ext}`
//!
//! The namespace (bucket or collection) is chosen from the file category. Keys must not
//! contain `..` or a leading `/`; key generation lives in the `keys` module so adapters
//! stay consistent.

pub mod coordinator;
pub mod events;
pub mod factory;
pub mod health;
#[cfg(feature = "provider-hosted")]
pub mod hosted;
pub(crate) mod http;
pub mod keys;
#[cfg(feature = "provider-record")]
pub mod record;
pub mod registry;
pub mod selector;
pub mod traits;

// Re-export commonly used types
pub use coordinator::{CoordinatorOptions, ProviderDiagnostics, UploadCoordinator, UploadError};
pub use events::{EventListeners, StorageEvent, StorageEventListener};
pub use factory::{create_adapter, create_registry};
pub use health::HealthMonitor;
#[cfg(feature = "provider-hosted")]
pub use hosted::HostedObjectStorage;
#[cfg(feature = "provider-record")]
pub use record::RecordStorage;
pub use registry::{ProviderRegistry, ProviderTable, RegisteredProvider};
pub use selector::ProviderSelector;
pub use switchyard_core::ProviderKind;
pub use traits::{
    AdapterDescription, BackendFileRecord, ObjectKey, StorageAdapter, StorageError, StorageResult,
};
