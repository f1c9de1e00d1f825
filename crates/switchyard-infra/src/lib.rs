//! Switchyard Infrastructure Library
//!
//! Process-level plumbing around the storage switcher:
//! - Telemetry initialization
//! - Storage runtime (coordinator plus background health monitor)

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "runtime")]
pub mod runtime;

// Re-export commonly used types
#[cfg(feature = "runtime")]
pub use runtime::{StorageRuntime, TracingEventListener};
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, init_telemetry_from_config};
