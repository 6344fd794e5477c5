//! Core traits and configuration types for the port abstraction.
//!
//! `RawPort` covers raw transport I/O; `PortProvider` covers system port
//! enumeration and open. Both real serial hardware and mock implementations
//! plug in behind these seams.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default baud rate for serial port configuration (9600 bps).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default transport I/O timeout (1000 ms).
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Configuration identifying a physical serial endpoint.
///
/// Immutable once a session is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// System name of the port (e.g. "/dev/ttyUSB0" or "COM3").
    pub name: String,

    /// Baud rate (bits per second).
    #[serde(default = "default_baud")]
    pub baud_rate: u32,

    /// Number of data bits per character.
    #[serde(default = "default_data_bits")]
    pub data_bits: DataBits,

    /// Parity-checking protocol.
    #[serde(default = "default_parity")]
    pub parity: Parity,

    /// Number of stop bits per character.
    #[serde(default = "default_stop_bits")]
    pub stop_bits: StopBits,

    /// Transport read/write timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl PortConfig {
    /// Configuration for the named port with 9600 8N1 defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            baud_rate: default_baud(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            timeout_ms: default_timeout(),
        }
    }

    /// The transport I/O timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> DataBits {
    DataBits::Eight
}

fn default_parity() -> Parity {
    Parity::None
}

fn default_stop_bits() -> StopBits {
    StopBits::One
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

/// Parity-checking modes.
///
/// `Mark` and `Space` are part of the data model but not supported by the
/// `serialport` backend; opening with them fails with
/// [`PortError::OpenFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Number of stop bits per character.
///
/// `OnePointFive` is part of the data model but not supported by the
/// `serialport` backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

/// Raw transport I/O for one open serial port.
///
/// Implementations are driven from a blocking reader task; reads honor the
/// configured transport timeout and report "no data this pass" as `Ok(0)`.
pub trait RawPort: Send + std::fmt::Debug {
    /// The name/path of this port.
    fn name(&self) -> &str;

    /// Write the whole buffer to the port, honoring the transport timeout.
    fn write_all(&mut self, data: &[u8]) -> Result<(), PortError>;

    /// Read available bytes into the buffer. Returns `Ok(0)` when no data
    /// arrived within the transport timeout.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Number of bytes currently available to read.
    fn bytes_to_read(&self) -> Result<usize, PortError>;
}

/// System port enumeration and open.
pub trait PortProvider: Send + Sync {
    /// Names of the currently visible serial ports. No stability assumption
    /// is made about enumeration order across calls.
    fn port_names(&self) -> Result<Vec<String>, PortError>;

    /// Open the port described by `config`.
    fn open(&self, config: &PortConfig) -> Result<Box<dyn RawPort>, PortError>;
}
