//! Provider registry and the shared provider table.
//!
//! The registry is fixed at startup: one entry per known provider kind, with an adapter
//! only when the provider is configured. The table holds the mutable monitoring state
//! (`ProviderInfo`) and is written by the health monitor only.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::StorageAdapter;
use switchyard_core::{ProviderInfo, ProviderKind};

/// One registered provider
#[derive(Clone)]
pub struct RegisteredProvider {
    pub kind: ProviderKind,
    pub priority: u32,
    pub adapter: Option<Arc<dyn StorageAdapter>>,
    /// Why the provider is unusable, when it has no adapter
    pub unconfigured_reason: Option<String>,
}

/// Providers in registration order
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a usable provider. Re-registering a kind replaces the earlier entry in place.
    pub fn register(&mut self, adapter: Arc<dyn StorageAdapter>, priority: u32) -> &mut Self {
        let entry = RegisteredProvider {
            kind: adapter.kind(),
            priority,
            adapter: Some(adapter),
            unconfigured_reason: None,
        };
        self.insert(entry);
        self
    }

    /// Register a provider that can never be used during this process lifetime
    pub fn register_unconfigured(
        &mut self,
        kind: ProviderKind,
        priority: u32,
        reason: impl Into<String>,
    ) -> &mut Self {
        let entry = RegisteredProvider {
            kind,
            priority,
            adapter: None,
            unconfigured_reason: Some(reason.into()),
        };
        self.insert(entry);
        self
    }

    fn insert(&mut self, entry: RegisteredProvider) {
        match self.entries.iter_mut().find(|e| e.kind == entry.kind) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn adapter(&self, kind: ProviderKind) -> Option<Arc<dyn StorageAdapter>> {
        self.get(kind).and_then(|e| e.adapter.clone())
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&RegisteredProvider> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn entries(&self) -> &[RegisteredProvider] {
        &self.entries
    }

    /// Configured providers with their adapters, in registration order
    pub fn configured(&self) -> impl Iterator<Item = (ProviderKind, Arc<dyn StorageAdapter>)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.adapter.clone().map(|adapter| (e.kind, adapter)))
    }

    /// Initial monitoring state: nothing is healthy until probed
    pub fn initial_infos(&self) -> Vec<ProviderInfo> {
        self.entries
            .iter()
            .map(|e| ProviderInfo::new(e.kind, e.priority, e.adapter.is_some()))
            .collect()
    }
}

/// Shared provider table. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct ProviderTable {
    inner: Arc<RwLock<Vec<ProviderInfo>>>,
}

impl ProviderTable {
    pub fn new(infos: Vec<ProviderInfo>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(infos)),
        }
    }

    pub fn from_registry(registry: &ProviderRegistry) -> Self {
        Self::new(registry.initial_infos())
    }

    /// Copy of the current state, in registration order
    pub async fn snapshot(&self) -> Vec<ProviderInfo> {
        self.inner.read().await.clone()
    }

    pub async fn get(&self, kind: ProviderKind) -> Option<ProviderInfo> {
        self.inner.read().await.iter().find(|i| i.kind == kind).cloned()
    }

    /// Record a completed probe. Returns the previous health value.
    pub(crate) async fn record_probe(
        &self,
        kind: ProviderKind,
        healthy: bool,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Option<bool> {
        let mut infos = self.inner.write().await;
        let info = infos.iter_mut().find(|i| i.kind == kind)?;
        let previous = info.is_healthy;
        info.is_healthy = healthy;
        info.last_checked_at = Some(at);
        info.last_error = error;
        Some(previous)
    }
}
