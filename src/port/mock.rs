//! Mock port and provider for testing without hardware.
//!
//! A `MockPort` handle shares state with the instance the provider hands to a
//! session, so tests can feed inbound bytes, inspect writes, inject faults,
//! and assert open/closed transitions while the session is running.

use super::error::PortError;
use super::traits::{PortConfig, PortProvider, RawPort};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockPortState {
    read_queue: VecDeque<u8>,
    write_log: Vec<Vec<u8>>,
    open: bool,
    open_count: u32,
    fail_open: Option<String>,
    fail_next_read: Option<String>,
    fail_next_available: Option<String>,
    fail_writes: Option<String>,
}

/// Mock serial port. Cloning yields an inspection handle sharing the same
/// state; only the instance created by [`MockProvider::open`] owns the
/// simulated transport (dropping it marks the port closed).
pub struct MockPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
    session_owned: bool,
}

impl MockPort {
    /// Create a standalone mock port handle.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
            session_owned: false,
        }
    }

    /// Feed bytes that subsequent read passes will pick up, in order.
    pub fn push_bytes(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Bytes fed but not yet read by the session.
    pub fn available(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Copy of everything written to the port, one entry per write call.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Whether the simulated transport is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// How many times the port has been opened.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Make every subsequent open attempt fail, or clear with `None`.
    pub fn set_fail_open(&self, reason: Option<&str>) {
        self.state.lock().fail_open = reason.map(str::to_string);
    }

    /// Make the next read pass fail once.
    pub fn fail_next_read(&self, reason: &str) {
        self.state.lock().fail_next_read = Some(reason.to_string());
    }

    /// Make the next availability check fail once, simulating a hardware
    /// fault (framing/overrun).
    pub fn fail_next_available(&self, reason: &str) {
        self.state.lock().fail_next_available = Some(reason.to_string());
    }

    /// Make every write fail, or clear with `None`.
    pub fn set_fail_writes(&self, reason: Option<&str>) {
        self.state.lock().fail_writes = reason.map(str::to_string);
    }
}

impl Clone for MockPort {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            // clones are inspection handles, never transport owners
            session_owned: false,
        }
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        if self.session_owned {
            self.state.lock().open = false;
        }
    }
}

impl RawPort for MockPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.fail_writes {
            return Err(PortError::write_failed(&self.name, reason.clone()));
        }
        state.write_log.push(data.to_vec());
        Ok(())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next_read.take() {
            return Err(PortError::read_failed(&self.name, reason));
        }
        let mut bytes_read = 0;
        for slot in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    bytes_read += 1;
                }
                None => break,
            }
        }
        Ok(bytes_read)
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next_available.take() {
            return Err(PortError::hardware(&self.name, reason));
        }
        Ok(state.read_queue.len())
    }
}

impl std::fmt::Debug for MockPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPort")
            .field("name", &self.name)
            .field("available", &self.available())
            .finish()
    }
}

/// Mock provider exposing a scripted set of ports.
#[derive(Clone, Default)]
pub struct MockProvider {
    ports: Arc<Mutex<Vec<MockPort>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port under `name` and return its inspection handle.
    pub fn add_port(&self, name: impl Into<String>) -> MockPort {
        let port = MockPort::new(name);
        self.ports.lock().push(port.clone());
        port
    }
}

impl PortProvider for MockProvider {
    fn port_names(&self) -> Result<Vec<String>, PortError> {
        Ok(self.ports.lock().iter().map(|p| p.name.clone()).collect())
    }

    fn open(&self, config: &PortConfig) -> Result<Box<dyn RawPort>, PortError> {
        let ports = self.ports.lock();
        let Some(port) = ports.iter().find(|p| p.name == config.name) else {
            return Err(PortError::Unavailable(config.name.clone()));
        };

        let mut state = port.state.lock();
        if let Some(reason) = &state.fail_open {
            return Err(PortError::open_failed(&config.name, reason.clone()));
        }
        state.open = true;
        state.open_count += 1;

        Ok(Box::new(MockPort {
            name: port.name.clone(),
            state: Arc::clone(&port.state),
            session_owned: true,
        }))
    }
}
