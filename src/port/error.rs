//! Port-specific error types.
//!
//! Every fault the core can observe maps onto one `PortError` variant. The
//! variants carry rendered detail strings rather than error sources so that a
//! single value can be both returned to the caller and emitted on the event
//! channel.

use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The named port is not present among the system's enumerated ports.
    #[error("serial port {0} does not exist")]
    Unavailable(String),

    /// The platform refused to open the port.
    #[error("failed to open serial port {name}: {reason}")]
    OpenFailed { name: String, reason: String },

    /// The transport rejected a write.
    #[error("write to {name} failed: {reason}")]
    WriteFailed { name: String, reason: String },

    /// A read pass failed. Non-fatal; data queued before the failure remains.
    #[error("read from {name} failed: {reason}")]
    ReadFailed { name: String, reason: String },

    /// A hardware-level fault (framing, overrun) was reported. Non-fatal.
    #[error("hardware error on {name}: {reason}")]
    Hardware { name: String, reason: String },

    /// The caller's per-byte handler faulted. Processing continues with the
    /// next byte.
    #[error("receive handler failed on byte {byte:#04x}: {reason}")]
    Handler { byte: u8, reason: String },

    /// Discovery exhausted every candidate port without a validation match.
    #[error("no serial port is receiving the expected data")]
    NoPortFound,

    /// An operation was attempted on a disposed session.
    #[error("port session has been disposed")]
    Disposed,
}

impl PortError {
    /// Create an `OpenFailed` error for a port name.
    pub fn open_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a `WriteFailed` error for a port name.
    pub fn write_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a `ReadFailed` error for a port name.
    pub fn read_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a `Hardware` error for a port name.
    pub fn hardware(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Hardware {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a `Handler` error for a faulted byte.
    pub fn handler(byte: u8, reason: impl Into<String>) -> Self {
        Self::Handler {
            byte,
            reason: reason.into(),
        }
    }
}
