//! Idle watchdog supervision over the mock provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{drain_events, wait_for};
use comport::{
    event_channel, EventReceiver, MockProvider, PortConfig, PortError, PortEvent, PortProvider,
    PortSession, SessionOptions, WatchdogConfig,
};

fn supervised_session(
    provider: &MockProvider,
    name: &str,
    watchdog: WatchdogConfig,
) -> (PortSession, EventReceiver) {
    let (events, event_rx) = event_channel();
    let options = SessionOptions {
        byte_handler: None,
        watchdog: Some(watchdog),
        ..SessionOptions::default()
    };
    let provider: Arc<dyn PortProvider> = Arc::new(provider.clone());
    let session = PortSession::new(PortConfig::new(name), provider, events, options);
    (session, event_rx)
}

fn count_connected(events: &[PortEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, PortEvent::Connected { .. }))
        .count()
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_link_is_reconnected_with_a_fresh_connected_event() {
    common::init_tracing();
    let provider = MockProvider::new();
    let port = provider.add_port("COM3");
    let (session, mut event_rx) = supervised_session(
        &provider,
        "COM3",
        WatchdogConfig::new(Duration::from_millis(100), Duration::from_millis(50)),
    );

    session.start().await.expect("start");
    assert_eq!(port.open_count(), 1);

    // no data ever arrives, so every tick finds the link idle
    assert!(
        wait_for(|| port.open_count() >= 3, Duration::from_secs(3)).await,
        "expected reconnect cycles on an idle link"
    );
    assert!(session.is_open().await);

    let events = drain_events(&mut event_rx);
    assert!(count_connected(&events) >= 3, "each cycle re-emits Connected");

    session.dispose().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn steady_data_prevents_reconnects() {
    common::init_tracing();
    let provider = MockProvider::new();
    let port = provider.add_port("COM3");
    let (session, _event_rx) = supervised_session(
        &provider,
        "COM3",
        WatchdogConfig::new(Duration::from_millis(50), Duration::from_millis(150)),
    );

    session.start().await.expect("start");

    let feeder = port.clone();
    for _ in 0..20 {
        feeder.push_bytes(b"k");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(port.open_count(), 1, "a live link must not be recycled");
    assert!(session.is_open().await);

    session.dispose().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_reconnect_waits_for_the_next_tick() {
    common::init_tracing();
    let provider = MockProvider::new();
    let port = provider.add_port("COM3");
    let (session, mut event_rx) = supervised_session(
        &provider,
        "COM3",
        WatchdogConfig::new(Duration::from_millis(100), Duration::from_millis(50)),
    );

    session.start().await.expect("start");
    port.set_fail_open(Some("device removed"));

    // the idle tick tears the link down but cannot reopen it
    assert!(
        wait_for(|| !port.is_open(), Duration::from_secs(3)).await,
        "idle tick should close the link even when reopen fails"
    );
    let events = drain_events(&mut event_rx);
    assert!(events
        .iter()
        .any(|event| matches!(event, PortEvent::Error(PortError::OpenFailed { .. }))));

    // the device comes back; the next tick restores the link on its own
    port.set_fail_open(None);
    assert!(
        wait_for(|| port.is_open(), Duration::from_secs(3)).await,
        "watchdog should recover once the device returns"
    );
    assert!(session.is_open().await);

    session.dispose().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_disarms_the_watchdog() {
    common::init_tracing();
    let provider = MockProvider::new();
    let port = provider.add_port("COM3");
    let (session, _event_rx) = supervised_session(
        &provider,
        "COM3",
        WatchdogConfig::new(Duration::from_millis(50), Duration::from_millis(30)),
    );

    session.start().await.expect("start");
    session.stop().await.expect("stop");
    assert_eq!(port.open_count(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        port.open_count(),
        1,
        "a stopped session must not be reopened by the watchdog"
    );
    assert!(!session.is_open().await);

    session.dispose().await;
}
