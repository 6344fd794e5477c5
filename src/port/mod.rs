//! Port abstraction layer.
//!
//! Provides traits and implementations for serial transport I/O and port
//! enumeration, enabling dependency injection and testing via mocks.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockPort, MockProvider};
pub use sync_port::{SyncSerialPort, SystemPortProvider};
pub use traits::*;
