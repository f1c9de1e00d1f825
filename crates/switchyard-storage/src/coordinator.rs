//! Upload coordinator
//!
//! Public entry point of the switcher. Resolves the target provider, delegates to its
//! adapter, converts the result into a [`CanonicalFileRecord`] and performs at most one
//! fallback attempt when the caller did not pin a provider.

use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::events::{EventListeners, StorageEvent};
use crate::factory::create_registry;
use crate::health::HealthMonitor;
use crate::keys::{file_name_of, generate_record_id};
use crate::registry::{ProviderRegistry, ProviderTable};
use crate::selector::ProviderSelector;
use crate::traits::{BackendFileRecord, ObjectKey, StorageAdapter, StorageError, StorageResult};
use switchyard_core::{
    join_providers, BatchFileError, BatchProgress, CanonicalFileRecord, ErrorMetadata, LogLevel,
    ProviderInfo, ProviderKind, StorageConfig, UploadBatchResult, UploadFile,
};

/// Upload failures surfaced to callers
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Storage provider '{provider}' is not configured: {reason}")]
    NotConfigured {
        provider: ProviderKind,
        reason: String,
    },

    #[error("No storage provider is configured")]
    NoProviderAvailable,

    #[error(
        "Upload failed on {providers}: {source}{fallback}",
        providers = join_providers(.attempted),
        fallback = fallback_suffix(.fallback_error)
    )]
    Failed {
        /// Providers tried, in order
        attempted: Vec<ProviderKind>,
        /// Error from the first attempt
        source: StorageError,
        /// Error from the fallback attempt, if one was made
        fallback_error: Option<StorageError>,
    },
}

fn fallback_suffix(fallback_error: &Option<StorageError>) -> String {
    match fallback_error {
        Some(e) => format!(" (fallback: {})", e),
        None => String::new(),
    }
}

impl UploadError {
    /// Providers a network call was made against
    pub fn attempted_providers(&self) -> &[ProviderKind] {
        match self {
            UploadError::Failed { attempted, .. } => attempted,
            _ => &[],
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::NotConfigured { .. } => "PROVIDER_NOT_CONFIGURED",
            UploadError::NoProviderAvailable => "NO_PROVIDER_AVAILABLE",
            UploadError::Failed { .. } => "UPLOAD_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            UploadError::Failed {
                source,
                fallback_error,
                ..
            } => {
                source.is_recoverable()
                    || fallback_error.as_ref().is_some_and(|e| e.is_recoverable())
            }
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::NotConfigured { provider, .. } => {
                format!("{} is not available", provider.display_name())
            }
            UploadError::NoProviderAvailable => "File storage is not available".to_string(),
            UploadError::Failed { source, .. } => source.client_message(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            UploadError::NotConfigured { .. } => LogLevel::Warn,
            UploadError::NoProviderAvailable => LogLevel::Error,
            UploadError::Failed { .. } if self.is_recoverable() => LogLevel::Warn,
            UploadError::Failed { .. } => LogLevel::Error,
        }
    }
}

/// Coordinator behaviour knobs
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub fallback_enabled: bool,
    pub default_provider: ProviderKind,
    pub upload_timeout: Duration,
    pub batch_delay: Duration,
    pub health_check_interval: Duration,
    pub probe_timeout: Duration,
}

impl CoordinatorOptions {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            fallback_enabled: config.fallback_enabled,
            default_provider: config.default_provider,
            upload_timeout: config.upload_timeout(),
            batch_delay: config.batch_upload_delay(),
            health_check_interval: config.health_check_interval(),
            probe_timeout: config.health_check_timeout(),
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Result of an operator-triggered provider test
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDiagnostics {
    pub success: bool,
    pub message: String,
    pub diagnostics: serde_json::Value,
}

pub struct UploadCoordinator {
    registry: Arc<ProviderRegistry>,
    table: ProviderTable,
    monitor: Arc<HealthMonitor>,
    selector: ProviderSelector,
    options: CoordinatorOptions,
    preferred: Mutex<Option<ProviderKind>>,
    listeners: EventListeners,
}

impl UploadCoordinator {
    pub fn new(
        registry: ProviderRegistry,
        options: CoordinatorOptions,
        listeners: EventListeners,
    ) -> Self {
        let registry = Arc::new(registry);
        let table = ProviderTable::from_registry(&registry);
        let monitor = HealthMonitor::new(
            registry.clone(),
            table.clone(),
            options.health_check_interval,
            options.probe_timeout,
        )
        .with_listeners(listeners.clone());

        Self {
            registry,
            table,
            monitor: Arc::new(monitor),
            selector: ProviderSelector::new(options.default_provider),
            options,
            preferred: Mutex::new(None),
            listeners,
        }
    }

    /// Build adapters for every configured provider and wire them together
    pub fn from_config(config: &StorageConfig, listeners: EventListeners) -> StorageResult<Self> {
        let registry = create_registry(config)?;
        Ok(Self::new(
            registry,
            CoordinatorOptions::from_config(config),
            listeners,
        ))
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// Set or clear the standing provider preference. While set, uploads without an
    /// explicit provider are pinned to it.
    pub fn set_provider(&self, provider: Option<ProviderKind>) {
        {
            let mut preferred = self.preferred.lock().unwrap_or_else(|e| e.into_inner());
            if *preferred == provider {
                return;
            }
            *preferred = provider;
        }

        match provider {
            Some(kind) => tracing::info!(provider = %kind, "Storage provider pinned"),
            None => tracing::info!("Storage provider preference cleared"),
        }
        self.listeners.emit(StorageEvent::ProviderPinned { provider });
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        *self.preferred.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the monitored provider table
    pub async fn providers(&self) -> Vec<ProviderInfo> {
        self.table.snapshot().await
    }

    /// Probe every configured provider now
    pub async fn refresh_health(&self) -> Vec<ProviderInfo> {
        self.monitor.refresh().await
    }

    /// Spawn the periodic health monitor
    pub fn start_health_monitor(&self, cancel_token: CancellationToken) -> JoinHandle<()> {
        self.monitor.clone().start(cancel_token)
    }

    /// Upload one file.
    ///
    /// `preferred` (or the standing preference) pins the provider: a pinned upload is
    /// attempted exactly once, even when the provider is currently unhealthy, and never
    /// falls back.
    pub async fn upload_one(
        &self,
        file: &UploadFile,
        preferred: Option<ProviderKind>,
    ) -> Result<CanonicalFileRecord, UploadError> {
        let result = self.upload_inner(file, preferred).await;

        if let Err(e) = &result {
            log_upload_error(e, &file.original_name);
            self.listeners.emit(StorageEvent::UploadFailed {
                file_name: file.original_name.clone(),
                attempted: e.attempted_providers().to_vec(),
            });
        }

        result
    }

    async fn upload_inner(
        &self,
        file: &UploadFile,
        preferred: Option<ProviderKind>,
    ) -> Result<CanonicalFileRecord, UploadError> {
        let pinned = preferred.or_else(|| self.provider());

        let primary = match pinned {
            Some(kind) => {
                self.configured_adapter(kind)?;
                kind
            }
            None => {
                let providers = self.table.snapshot().await;
                self.selector
                    .select(&providers)
                    .ok_or(UploadError::NoProviderAvailable)?
            }
        };

        let mut attempted = vec![primary];
        let primary_error = match self.attempt(primary, file).await {
            Ok(backend) => return Ok(self.accept(primary, file, backend, false)),
            Err(e) => e,
        };

        if pinned.is_some() || !self.options.fallback_enabled {
            return Err(UploadError::Failed {
                attempted,
                source: primary_error,
                fallback_error: None,
            });
        }

        let providers = self.table.snapshot().await;
        let Some(fallback) = self.selector.fallback_for(&providers, &attempted) else {
            return Err(UploadError::Failed {
                attempted,
                source: primary_error,
                fallback_error: None,
            });
        };

        tracing::info!(
            file_name = %file.original_name,
            failed = %primary,
            fallback = %fallback,
            "Retrying upload on fallback provider"
        );
        attempted.push(fallback);

        match self.attempt(fallback, file).await {
            Ok(backend) => Ok(self.accept(fallback, file, backend, true)),
            Err(e) => Err(UploadError::Failed {
                attempted,
                source: primary_error,
                fallback_error: Some(e),
            }),
        }
    }

    fn configured_adapter(&self, kind: ProviderKind) -> Result<Arc<dyn StorageAdapter>, UploadError> {
        match self.registry.get(kind) {
            Some(entry) => entry.adapter.clone().ok_or_else(|| UploadError::NotConfigured {
                provider: kind,
                reason: entry
                    .unconfigured_reason
                    .clone()
                    .unwrap_or_else(|| "missing settings".to_string()),
            }),
            None => Err(UploadError::NotConfigured {
                provider: kind,
                reason: "provider is not registered".to_string(),
            }),
        }
    }

    async fn attempt(&self, kind: ProviderKind, file: &UploadFile) -> StorageResult<BackendFileRecord> {
        let adapter = self
            .registry
            .adapter(kind)
            .ok_or_else(|| StorageError::Config(format!("{} is not configured", kind)))?;

        let start = Instant::now();
        let result = match timeout(self.options.upload_timeout, adapter.upload(file)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "upload to {} exceeded {}ms",
                kind,
                self.options.upload_timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            tracing::warn!(
                provider = %kind,
                file_name = %file.original_name,
                error = %e,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload attempt failed"
            );
        }
        result
    }

    fn accept(
        &self,
        provider: ProviderKind,
        file: &UploadFile,
        backend: BackendFileRecord,
        used_fallback: bool,
    ) -> CanonicalFileRecord {
        let record = canonical_record(provider, generate_record_id(), backend, Some(file));

        tracing::info!(
            provider = %provider,
            namespace = %record.storage_namespace,
            path = %record.path,
            size = record.size,
            used_fallback,
            "File stored"
        );
        self.listeners.emit(StorageEvent::UploadSucceeded {
            provider,
            record_id: record.id.clone(),
            used_fallback,
        });
        record
    }

    /// Upload files sequentially, in order. Failures are collected and never abort the
    /// batch.
    pub async fn upload_many(
        &self,
        files: &[UploadFile],
        preferred: Option<ProviderKind>,
    ) -> UploadBatchResult {
        self.upload_many_with_progress(files, preferred, |_| {}).await
    }

    /// Like [`upload_many`](Self::upload_many), reporting progress after each file
    pub async fn upload_many_with_progress<F>(
        &self,
        files: &[UploadFile],
        preferred: Option<ProviderKind>,
        mut on_progress: F,
    ) -> UploadBatchResult
    where
        F: FnMut(BatchProgress) + Send,
    {
        let mut result = UploadBatchResult::default();
        let total = files.len();

        for (index, file) in files.iter().enumerate() {
            if index > 0 && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }

            match self.upload_one(file, preferred).await {
                Ok(record) => result.records.push(record),
                Err(e) => result.errors.push(BatchFileError {
                    index,
                    file_name: file.original_name.clone(),
                    attempted_providers: e.attempted_providers().to_vec(),
                    message: e.to_string(),
                }),
            }

            let progress = BatchProgress {
                completed: index + 1,
                total,
                succeeded: result.records.len(),
                failed: result.errors.len(),
            };
            on_progress(progress);
            self.listeners.emit(StorageEvent::BatchProgress(progress));
        }

        tracing::info!(
            total,
            succeeded = result.records.len(),
            failed = result.errors.len(),
            "Batch upload finished"
        );
        result
    }

    /// Probe a provider directly and report its configuration. Monitoring state is left
    /// untouched.
    pub async fn test_provider(&self, provider: ProviderKind) -> ProviderDiagnostics {
        let monitored = self.table.get(provider).await;

        let adapter = match self.configured_adapter(provider) {
            Ok(adapter) => adapter,
            Err(e) => {
                return ProviderDiagnostics {
                    success: false,
                    message: e.to_string(),
                    diagnostics: json!({
                        "provider": provider,
                        "configured": false,
                        "monitored": monitored,
                    }),
                };
            }
        };

        let start = Instant::now();
        let outcome = timeout(self.options.probe_timeout, adapter.check_health()).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let (success, message) = match outcome {
            Ok(Ok(true)) => (true, format!("{} is reachable", provider.display_name())),
            Ok(Ok(false)) => (
                false,
                format!("{} reported itself unhealthy", provider.display_name()),
            ),
            Ok(Err(e)) => (false, e.to_string()),
            Err(_) => (
                false,
                format!(
                    "{} did not answer within {}ms",
                    provider.display_name(),
                    self.options.probe_timeout.as_millis()
                ),
            ),
        };

        tracing::info!(provider = %provider, success, latency_ms = latency_ms, "Provider test finished");

        ProviderDiagnostics {
            success,
            message,
            diagnostics: json!({
                "provider": provider,
                "configured": true,
                "latencyMs": latency_ms,
                "adapter": adapter.describe(),
                "monitored": monitored,
            }),
        }
    }

    /// Delete a stored file. `Ok(false)` when the backend no longer has it.
    pub async fn delete(&self, record: &CanonicalFileRecord) -> StorageResult<bool> {
        let key = ObjectKey::new(&record.storage_namespace, &record.path);
        self.delete_key(record.provider, &key).await
    }

    pub async fn delete_key(&self, provider: ProviderKind, key: &ObjectKey) -> StorageResult<bool> {
        key.validate()?;
        let adapter = self.adapter_or_config_error(provider)?;
        let deleted = adapter.delete(key).await?;
        tracing::info!(provider = %provider, key = %key, deleted, "Delete finished");
        Ok(deleted)
    }

    /// Most recent files stored on one provider, newest first.
    ///
    /// Listed records carry `namespace/path` as their id.
    pub async fn list_recent(
        &self,
        provider: ProviderKind,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<CanonicalFileRecord>> {
        let adapter = self.adapter_or_config_error(provider)?;
        let records = adapter.list_recent(limit, offset).await?;
        Ok(records
            .into_iter()
            .map(|backend| {
                let id = backend.key.to_string();
                canonical_record(provider, id, backend, None)
            })
            .collect())
    }

    /// Rebuild the public URL of a stored file from its namespace and path
    pub fn public_url(&self, record: &CanonicalFileRecord) -> StorageResult<String> {
        let adapter = self.adapter_or_config_error(record.provider)?;
        let key = ObjectKey::new(&record.storage_namespace, &record.path);
        key.validate()?;
        Ok(adapter.build_public_url(&key))
    }

    fn adapter_or_config_error(&self, provider: ProviderKind) -> StorageResult<Arc<dyn StorageAdapter>> {
        self.configured_adapter(provider)
            .map_err(|e| StorageError::Config(e.to_string()))
    }
}

fn canonical_record(
    provider: ProviderKind,
    id: String,
    backend: BackendFileRecord,
    file: Option<&UploadFile>,
) -> CanonicalFileRecord {
    let original_name = match file {
        Some(file) if backend.original_name.is_empty() => file.original_name.clone(),
        _ => backend.original_name,
    };

    CanonicalFileRecord {
        id,
        name: file_name_of(&backend.key.path).to_string(),
        original_name,
        category: backend.category,
        url: backend.url,
        public_url: backend.public_url,
        size: backend.size,
        mime_type: backend.mime_type,
        upload_date: backend.created_at,
        provider,
        storage_namespace: backend.key.namespace,
        path: backend.key.path,
        extensions: backend.extensions,
    }
}

fn log_upload_error(error: &UploadError, file_name: &str) {
    let code = error.error_code();
    let attempted = join_providers(error.attempted_providers());
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(file_name, code, attempted = %attempted, error = %error, "Upload failed")
        }
        LogLevel::Warn => {
            tracing::warn!(file_name, code, attempted = %attempted, error = %error, "Upload failed")
        }
        LogLevel::Error => {
            tracing::error!(file_name, code, attempted = %attempted, error = %error, "Upload failed")
        }
    }
}
