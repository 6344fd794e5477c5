//! Serial port implementation backed by the `serialport` crate.

use super::error::PortError;
use super::traits::{DataBits, Parity, PortConfig, PortProvider, RawPort, StopBits};
use std::io::{ErrorKind, Read, Write};

/// Provider over the system's real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortProvider;

impl PortProvider for SystemPortProvider {
    fn port_names(&self) -> Result<Vec<String>, PortError> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .map_err(|e| PortError::hardware("system", e.to_string()))
    }

    fn open(&self, config: &PortConfig) -> Result<Box<dyn RawPort>, PortError> {
        Ok(Box::new(SyncSerialPort::open(config)?))
    }
}

/// One open serial port wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &PortConfig) -> Result<Self, PortError> {
        let parity = convert_parity(config.parity).ok_or_else(|| {
            PortError::open_failed(
                &config.name,
                format!("parity {:?} is not supported by this backend", config.parity),
            )
        })?;
        let stop_bits = convert_stop_bits(config.stop_bits).ok_or_else(|| {
            PortError::open_failed(
                &config.name,
                format!(
                    "stop bits {:?} are not supported by this backend",
                    config.stop_bits
                ),
            )
        })?;

        let port = serialport::new(&config.name, config.baud_rate)
            .data_bits(convert_data_bits(config.data_bits))
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(config.timeout())
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::Unavailable(config.name.clone()),
                _ => PortError::open_failed(&config.name, e.to_string()),
            })?;

        Ok(Self {
            port,
            name: config.name.clone(),
        })
    }
}

impl RawPort for SyncSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), PortError> {
        self.port
            .write_all(data)
            .map_err(|e| PortError::write_failed(&self.name, e.to_string()))
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            // A timed-out read just means no data arrived within the window.
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(PortError::read_failed(&self.name, e.to_string())),
        }
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| PortError::hardware(&self.name, e.to_string()))
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

fn convert_data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn convert_parity(parity: Parity) -> Option<serialport::Parity> {
    match parity {
        Parity::None => Some(serialport::Parity::None),
        Parity::Odd => Some(serialport::Parity::Odd),
        Parity::Even => Some(serialport::Parity::Even),
        Parity::Mark | Parity::Space => None,
    }
}

fn convert_stop_bits(bits: StopBits) -> Option<serialport::StopBits> {
    match bits {
        StopBits::One => Some(serialport::StopBits::One),
        StopBits::Two => Some(serialport::StopBits::Two),
        StopBits::OnePointFive => None,
    }
}
