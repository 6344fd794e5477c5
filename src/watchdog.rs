//! Idle watchdog: timer-driven liveness check for a port session.
//!
//! Serial links, especially over USB-to-serial adapters, can drop silently
//! without a hardware disconnect signal; data recency is the only portable
//! liveness signal. The watchdog ticks on a fixed interval, and whenever the
//! time since the last received byte exceeds the idle threshold it runs one
//! stop+start cycle of the owning session's link. A reconnect that fails to
//! open is not retried until the next tick, so a removed device never causes
//! a busy-loop.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::Inner;

/// Default tick interval and idle threshold (both one minute).
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60);

/// Tunables for the idle watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// How often to inspect the session for idleness.
    pub tick: Duration,
    /// How long the link may stay silent before a reconnect cycle.
    pub idle_threshold: Duration,
}

impl WatchdogConfig {
    pub fn new(tick: Duration, idle_threshold: Duration) -> Self {
        Self {
            tick,
            idle_threshold,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

/// Spawn the watchdog task supervising `session`.
///
/// The task holds only a weak reference, so an armed watchdog can never keep
/// a dropped session alive; it exits when the session goes away or the token
/// is cancelled.
pub(crate) fn spawn(
    session: Weak<Inner>,
    config: WatchdogConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // an interval fires immediately; the first inspection belongs one
        // full period after arming
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(session) = session.upgrade() else { break };
                    let idle = session.idle_for();
                    if idle >= config.idle_threshold {
                        session.reconnect(&cancel).await;
                    } else {
                        debug!(idle = ?idle, "watchdog tick, link live");
                    }
                }
            }
        }
    })
}
