//! Error kinds shared by every `cw-*` crate.
//!
//! Mirrors the `errno`-style error kinds from the design: callers get a
//! `Result`, nothing in the core aborts except `debug_assert!` invariant
//! checks.

use thiserror::Error;

/// Core error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CwError {
    /// Argument out of documented range (frequency, volume, speed, capacity, level, ...).
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// Tone queue is full; retry after drain.
    #[error("tone queue is full")]
    Again,

    /// Operation blocked by a competing input source (kept for API parity).
    #[error("busy")]
    Busy,

    /// Caller blocked the signalling path used by a `wait_for_*` call.
    #[error("wait would deadlock: wake-up path is blocked")]
    Deadlk,

    /// Requested sound sink is not built in / not available at runtime.
    #[error("sound sink not supported: {0}")]
    NotSupported(String),

    /// Underlying sink reported a write error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Allocation failure during construction or capacity change.
    #[error("allocation failure: {0}")]
    NoMemory(String),
}

impl From<std::io::Error> for CwError {
    fn from(e: std::io::Error) -> Self {
        CwError::Io(e.to_string())
    }
}

/// Result type used throughout the `cw-*` crates.
pub type Result<T> = std::result::Result<T, CwError>;
