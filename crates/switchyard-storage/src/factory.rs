#[cfg(feature = "provider-hosted")]
use crate::HostedObjectStorage;
#[cfg(feature = "provider-record")]
use crate::RecordStorage;
use crate::{ProviderRegistry, StorageAdapter, StorageError, StorageResult};
use std::sync::Arc;
use switchyard_core::{ProviderKind, StorageConfig};

/// Build the provider registry from configuration.
///
/// Every known provider kind is registered, in [`ProviderKind::ALL`] order. Providers
/// missing required settings are registered as unconfigured and never selected.
pub fn create_registry(config: &StorageConfig) -> StorageResult<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    for kind in ProviderKind::ALL {
        let priority = config.priority(kind);

        if let Some(reason) = config.unusable_reason(kind) {
            tracing::warn!(provider = %kind, reason = %reason, "Storage provider not configured");
            registry.register_unconfigured(kind, priority, reason);
            continue;
        }

        match create_adapter(kind, config) {
            Ok(adapter) => {
                tracing::info!(provider = %kind, priority, "Storage provider registered");
                registry.register(adapter, priority);
            }
            Err(StorageError::Config(reason)) => {
                tracing::warn!(provider = %kind, reason = %reason, "Storage provider not available");
                registry.register_unconfigured(kind, priority, reason);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(registry)
}

/// Create the adapter for a single provider kind
pub fn create_adapter(
    kind: ProviderKind,
    config: &StorageConfig,
) -> StorageResult<Arc<dyn StorageAdapter>> {
    match kind {
        #[cfg(feature = "provider-hosted")]
        ProviderKind::Hosted => Ok(Arc::new(HostedObjectStorage::from_config(config)?)),

        #[cfg(not(feature = "provider-hosted"))]
        ProviderKind::Hosted => {
            let _ = config;
            Err(StorageError::Config(
                "Hosted storage not available (provider-hosted feature not enabled)".to_string(),
            ))
        }

        #[cfg(feature = "provider-record")]
        ProviderKind::Record => Ok(Arc::new(RecordStorage::from_config(config)?)),

        #[cfg(not(feature = "provider-record"))]
        ProviderKind::Record => {
            let _ = config;
            Err(StorageError::Config(
                "Record storage not available (provider-record feature not enabled)".to_string(),
            ))
        }
    }
}
