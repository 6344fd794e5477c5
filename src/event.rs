//! Notifications emitted by the core toward its caller.
//!
//! The core never logs or presents faults itself; everything an owner needs
//! to observe flows through this channel. There is exactly one subscriber per
//! session and producers must never block, so the channel is unbounded.

use crate::port::PortError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A notification from a port session or discovery probe.
#[derive(Debug, Clone)]
pub enum PortEvent {
    /// Emitted once per successful `start()`, carrying the resolved port name.
    Connected { port_name: String },
    /// A recovered fault, reported per occurrence.
    Error(PortError),
}

/// Sending half handed to a session at construction.
pub type EventSender = UnboundedSender<PortEvent>;

/// Receiving half kept by the caller.
pub type EventReceiver = UnboundedReceiver<PortEvent>;

/// Create an event channel pair.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
