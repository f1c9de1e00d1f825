use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_types::ProviderKind;

/// Monitoring and selection state for one backend.
///
/// One instance exists per known provider kind for the life of the process.
/// `is_healthy`, `last_checked_at` and `last_error` are written by the health monitor only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    pub display_name: String,
    /// Static: false when the provider lacks a usable base URL or credential
    pub is_configured: bool,
    /// Result of the most recent completed probe
    pub is_healthy: bool,
    /// Lower is preferred
    pub priority: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Failure message of the most recent probe, cleared when a probe succeeds
    pub last_error: Option<String>,
}

impl ProviderInfo {
    pub fn new(kind: ProviderKind, priority: u32, is_configured: bool) -> Self {
        Self {
            kind,
            display_name: kind.display_name().to_string(),
            is_configured,
            is_healthy: false,
            priority,
            last_checked_at: None,
            last_error: None,
        }
    }

    /// Configured and healthy as of the last probe
    pub fn is_available(&self) -> bool {
        self.is_configured && self.is_healthy
    }
}
