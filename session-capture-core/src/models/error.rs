use std::time::Duration;

use thiserror::Error;

use super::endpoint::EndpointId;

/// Errors that can occur while enumerating devices, capturing, or
/// committing a recording.
///
/// Every variant renders as a short human-readable string suitable for a
/// status line. Resource-acquisition failures surface synchronously from
/// `start`; in-flight failures move the state machine to `Failed` and are
/// surfaced on the next `status()`/`stop()` call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("audio host unavailable: {0}")]
    DeviceQuery(String),

    #[error("failed to open endpoint {endpoint}: {reason}")]
    DeviceOpen { endpoint: EndpointId, reason: String },

    #[error("invalid device selection: {0}")]
    InvalidDeviceSelection(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("no active recording session")]
    NoActiveSession,

    #[error("stream failure: {0}")]
    StreamFailed(String),

    #[error("reader did not shut down within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("file write failed: {0}")]
    FileWrite(String),
}
