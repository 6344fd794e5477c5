//! Self-healing serial port sessions.
//!
//! This library manages one serial connection end to end: it opens a physical
//! or virtual device, streams inbound bytes into an ordered queue for
//! asynchronous processing, detects link idleness, and automatically tears
//! down and re-establishes the connection without losing the caller's
//! processing pipeline.
//!
//! # Modules
//!
//! - `port`: transport abstraction (real `serialport` backend plus mocks)
//! - `event`: the error/connected notification channel toward the caller
//! - `session`: the port session lifecycle, receive queue, and consumer task
//! - `watchdog`: idle-detection and automatic reconnect
//! - `discovery`: automatic selection of the port emitting expected traffic
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use comport::{
//!     event_channel, ByteHandler, PortConfig, PortProvider, PortSession, SessionOptions,
//!     SystemPortProvider,
//! };
//!
//! # async fn example() -> Result<(), comport::PortError> {
//! let provider: Arc<dyn PortProvider> = Arc::new(SystemPortProvider);
//! let (events, mut event_rx) = event_channel();
//!
//! let handler: ByteHandler = Arc::new(|byte| {
//!     println!("received {byte:#04x}");
//!     Ok(())
//! });
//! let options = SessionOptions {
//!     byte_handler: Some(handler),
//!     ..SessionOptions::default()
//! };
//!
//! let session = PortSession::new(PortConfig::new("/dev/ttyUSB0"), provider, events, options);
//! session.start().await?;
//! session.send_text("PING\r\n").await?;
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod event;
pub mod port;
pub mod session;
pub mod watchdog;

pub use discovery::{connect, find_port, BufferValidator, DEFAULT_SETTLE};
pub use event::{channel as event_channel, EventReceiver, EventSender, PortEvent};
pub use port::{
    DataBits, MockPort, MockProvider, Parity, PortConfig, PortError, PortProvider, RawPort,
    StopBits, SyncSerialPort, SystemPortProvider,
};
pub use session::{ByteHandler, PortSession, SessionOptions, DEFAULT_POLL_INTERVAL};
pub use watchdog::WatchdogConfig;
