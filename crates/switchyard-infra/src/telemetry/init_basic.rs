use switchyard_core::StorageConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "switchyard=info";

/// `RUST_LOG` when set and valid, otherwise [`DEFAULT_FILTER`]
pub fn build_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global subscriber: JSON lines when `json` is set, human-readable otherwise.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = tracing_subscriber::registry().with(build_filter());

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!(format = if json { "json" } else { "text" }, "Tracing initialized");
    Ok(())
}

/// Install the global subscriber in the format selected by `LOG_FORMAT`
pub fn init_telemetry_from_config(config: &StorageConfig) -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry(config.log_json)
}
