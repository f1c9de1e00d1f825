//! Error metadata
//!
//! Storage and upload errors are defined next to the code that raises them. This module
//! holds the shared trait those errors implement so callers can log, classify and present
//! them uniformly without matching on every variant.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like a missing object
    Debug,
    /// Warning level - for recoverable issues like an unreachable backend
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be reported
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "BACKEND_REJECTED")
    fn error_code(&self) -> &'static str;

    /// Whether the same operation may succeed if repeated later or elsewhere
    fn is_recoverable(&self) -> bool;

    /// Message safe to show to an end user
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}
