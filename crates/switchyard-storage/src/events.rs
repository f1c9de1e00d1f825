//! Storage events and listener hooks
//!
//! Listeners are injected into the coordinator and the health monitor explicitly; there
//! is no global event bus.

use std::sync::Arc;

use switchyard_core::{BatchProgress, ProviderKind};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageEvent {
    /// A probe flipped a provider's health
    HealthChanged { provider: ProviderKind, healthy: bool },
    /// The standing provider preference changed
    ProviderPinned { provider: Option<ProviderKind> },
    UploadSucceeded {
        provider: ProviderKind,
        record_id: String,
        used_fallback: bool,
    },
    UploadFailed {
        file_name: String,
        attempted: Vec<ProviderKind>,
    },
    BatchProgress(BatchProgress),
}

/// Receives storage events. Implementations must not block.
pub trait StorageEventListener: Send + Sync {
    fn on_event(&self, event: &StorageEvent);
}

/// Ordered list of listeners
#[derive(Clone, Default)]
pub struct EventListeners {
    listeners: Vec<Arc<dyn StorageEventListener>>,
}

impl EventListeners {
    pub fn push(&mut self, listener: Arc<dyn StorageEventListener>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: StorageEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}
