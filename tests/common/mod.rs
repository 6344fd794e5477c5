//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use comport::{
    event_channel, ByteHandler, EventReceiver, MockProvider, PortConfig, PortProvider,
    PortSession, SessionOptions,
};

/// Install a test subscriber once; RUST_LOG controls verbosity.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `cond` every 10 ms until it holds or `timeout` elapses.
pub async fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// A byte handler that appends everything it sees to a shared buffer.
pub fn collecting_handler() -> (ByteHandler, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: ByteHandler = Arc::new(move |byte| {
        sink.lock().unwrap().push(byte);
        Ok(())
    });
    (handler, seen)
}

/// Build a session over the mock provider with the watchdog disabled.
pub fn session_with(
    provider: &MockProvider,
    name: &str,
    byte_handler: Option<ByteHandler>,
) -> (PortSession, EventReceiver) {
    let (events, event_rx) = event_channel();
    let options = SessionOptions {
        byte_handler,
        watchdog: None,
        ..SessionOptions::default()
    };
    let provider: Arc<dyn PortProvider> = Arc::new(provider.clone());
    let session = PortSession::new(PortConfig::new(name), provider, events, options);
    (session, event_rx)
}

/// Drain every event currently queued on the receiver.
pub fn drain_events(event_rx: &mut EventReceiver) -> Vec<comport::PortEvent> {
    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    events
}
