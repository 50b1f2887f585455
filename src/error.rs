//! Centralized error types for the playback engine.
//!
//! Mirrors the error code -> domain enum split the rest of the crate expects:
//! [`PlaybackError`] carries the user-facing message, [`ErrorCode`] gives each
//! variant a stable machine-readable code a control frontend could log or
//! branch on without string-matching the display text.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

/// Engine-wide error type.
///
/// Every variant is local to the command that produced it — the engine never
/// aborts the process because a collaborator (transcoder, sink, device)
/// misbehaved; see §7 of the design document for the full taxonomy.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The queue holds no items (or none remain after filtering disabled rows).
    #[error("queue is empty")]
    EmptyQueue,

    /// Every candidate item from the wrap limit onward failed to open.
    #[error("exhausted queue without finding a playable item")]
    QueueExhausted,

    /// The textual query could not be parsed into a filter.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The transcoder failed to open, read, or seek a media item.
    #[error("transcoder error: {0}")]
    Transcode(String),

    /// Reading the monotonic clock failed.
    #[error("clock read failed: {0}")]
    Clock(String),

    /// The referenced device id is not known to the registry.
    #[error("unknown device: {0:#x}")]
    UnknownDevice(u64),

    /// A device requires a password that is not on file.
    #[error("device {0:#x} requires a password")]
    PasswordRequired(u64),

    /// A local-sink or remote-driver operation failed outright.
    #[error("device operation failed: {0}")]
    DeviceFailure(String),

    /// A command was issued while the engine was mid-shutdown.
    #[error("player is shutting down")]
    ShuttingDown,

    /// A second command arrived while one with outstanding async device
    /// callbacks was still pending (§4.F exclusivity).
    #[error("a command is already in flight")]
    CommandBusy,

    /// Persisted configuration could not be read or written.
    #[error("config store error: {0}")]
    ConfigStore(String),
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyQueue => "empty_queue",
            Self::QueueExhausted => "queue_exhausted",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Transcode(_) => "transcode_error",
            Self::Clock(_) => "clock_error",
            Self::UnknownDevice(_) => "unknown_device",
            Self::PasswordRequired(_) => "password_required",
            Self::DeviceFailure(_) => "device_failure",
            Self::ShuttingDown => "shutting_down",
            Self::CommandBusy => "command_busy",
            Self::ConfigStore(_) => "config_store_error",
        }
    }
}

/// Convenient Result alias for engine operations.
pub type PlaybackResult<T> = Result<T, PlaybackError>;
