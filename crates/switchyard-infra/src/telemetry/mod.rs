//! Tracing initialization

mod init_basic;

pub use init_basic::{build_filter, init_telemetry, init_telemetry_from_config, DEFAULT_FILTER};
