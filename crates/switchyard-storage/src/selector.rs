//! Provider selection
//!
//! Pure functions over a snapshot of the provider table. Selection is deterministic:
//! lowest priority wins, ties go to the earlier registration.

use switchyard_core::{ProviderInfo, ProviderKind};

#[derive(Debug, Clone, Copy)]
pub struct ProviderSelector {
    default_provider: ProviderKind,
}

impl ProviderSelector {
    pub fn new(default_provider: ProviderKind) -> Self {
        Self { default_provider }
    }

    /// Provider to use when the caller expresses no preference.
    ///
    /// The healthy configured provider with the lowest priority; when none is healthy,
    /// the default provider if it is configured, else the configured provider with the
    /// lowest priority. `None` only when nothing is configured.
    pub fn select(&self, providers: &[ProviderInfo]) -> Option<ProviderKind> {
        if let Some(best) = providers
            .iter()
            .filter(|p| p.is_available())
            .min_by_key(|p| p.priority)
        {
            return Some(best.kind);
        }

        if providers
            .iter()
            .any(|p| p.kind == self.default_provider && p.is_configured)
        {
            return Some(self.default_provider);
        }

        providers
            .iter()
            .filter(|p| p.is_configured)
            .min_by_key(|p| p.priority)
            .map(|p| p.kind)
    }

    /// Alternate provider after the ones in `tried` failed: configured and untried,
    /// healthy before unhealthy, then by priority and registration order.
    pub fn fallback_for(
        &self,
        providers: &[ProviderInfo],
        tried: &[ProviderKind],
    ) -> Option<ProviderKind> {
        providers
            .iter()
            .filter(|p| p.is_configured && !tried.contains(&p.kind))
            .min_by_key(|p| (!p.is_healthy, p.priority))
            .map(|p| p.kind)
    }
}
