//! Storage runtime
//!
//! Owns the upload coordinator together with its background health monitor so a host
//! process can start and stop both as one unit.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use switchyard_core::StorageConfig;
use switchyard_storage::{EventListeners, StorageEvent, StorageEventListener, UploadCoordinator};

/// Logs every storage event through `tracing`
#[derive(Debug, Default)]
pub struct TracingEventListener;

impl StorageEventListener for TracingEventListener {
    fn on_event(&self, event: &StorageEvent) {
        match event {
            StorageEvent::HealthChanged { provider, healthy } => {
                tracing::debug!(provider = %provider, healthy, "Provider health changed")
            }
            StorageEvent::ProviderPinned { provider } => {
                tracing::debug!(provider = ?provider, "Provider preference changed")
            }
            StorageEvent::UploadSucceeded {
                provider,
                record_id,
                used_fallback,
            } => tracing::debug!(provider = %provider, record_id = %record_id, used_fallback, "Upload succeeded"),
            StorageEvent::UploadFailed {
                file_name,
                attempted,
            } => tracing::debug!(file_name = %file_name, attempted = ?attempted, "Upload failed"),
            StorageEvent::BatchProgress(progress) => tracing::debug!(
                completed = progress.completed,
                total = progress.total,
                failed = progress.failed,
                "Batch progress"
            ),
        }
    }
}

pub struct StorageRuntime {
    coordinator: Arc<UploadCoordinator>,
    cancel_token: CancellationToken,
    monitor: JoinHandle<()>,
}

impl StorageRuntime {
    /// Validate configuration, build the coordinator and start health monitoring.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &StorageConfig, mut listeners: EventListeners) -> anyhow::Result<Self> {
        config.validate()?;
        listeners.push(Arc::new(TracingEventListener));

        let coordinator = Arc::new(UploadCoordinator::from_config(config, listeners)?);
        Ok(Self::with_coordinator(coordinator))
    }

    /// Start monitoring for an already assembled coordinator
    pub fn with_coordinator(coordinator: Arc<UploadCoordinator>) -> Self {
        let cancel_token = CancellationToken::new();
        let monitor = coordinator.start_health_monitor(cancel_token.clone());

        Self {
            coordinator,
            cancel_token,
            monitor,
        }
    }

    pub fn coordinator(&self) -> Arc<UploadCoordinator> {
        self.coordinator.clone()
    }

    /// Stop the health monitor and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        if let Err(e) = self.monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
    }
}
