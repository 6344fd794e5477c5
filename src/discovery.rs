//! Port discovery: find the port already emitting the expected traffic.
//!
//! Each system-visible port is probed in enumeration order with an ephemeral
//! direct-drain session: open, wait a settle period for inbound data to
//! accumulate, evaluate the caller's validation predicate, then dispose the
//! probe unconditionally before the next candidate so no two ports are ever
//! held open at once. Transport errors on a candidate are swallowed; a busy
//! or faulty port simply does not validate. Only the aggregate failure
//! ([`PortError::NoPortFound`]) propagates.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::event::{self, EventSender};
use crate::port::{PortConfig, PortError, PortProvider};
use crate::session::{PortSession, SessionOptions};

/// Default settle period letting a candidate accumulate inbound data.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// Predicate deciding whether accumulated bytes came from the expected
/// device.
pub type BufferValidator = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Probe every enumerated port and return the first name whose settled
/// buffer satisfies `validate`.
///
/// `template.name` is ignored; every other field applies to each candidate.
/// Fails with [`PortError::NoPortFound`] when no candidate validates.
pub async fn find_port(
    provider: &Arc<dyn PortProvider>,
    template: &PortConfig,
    validate: &BufferValidator,
    settle: Duration,
) -> Result<String, PortError> {
    let names = match provider.port_names() {
        Ok(names) => names,
        Err(error) => {
            debug!(%error, "port enumeration failed during discovery");
            return Err(PortError::NoPortFound);
        }
    };

    for name in names {
        let config = PortConfig {
            name: name.clone(),
            ..template.clone()
        };
        // probe events go nowhere; per-candidate faults must not propagate
        let (probe_events, _probe_rx) = event::channel();
        let session = PortSession::new(
            config,
            Arc::clone(provider),
            probe_events,
            SessionOptions {
                byte_handler: None,
                watchdog: None,
                ..SessionOptions::default()
            },
        );
        let matched = probe(&session, validate, settle).await;
        session.dispose().await;
        if matched {
            info!(port = %name, "discovery selected port");
            return Ok(name);
        }
        debug!(port = %name, "candidate did not validate");
    }

    Err(PortError::NoPortFound)
}

/// Run discovery and build the long-lived session from the winning port.
///
/// The returned session is already started, with `options` and `events`
/// applying to it (not to the ephemeral probes).
pub async fn connect(
    provider: &Arc<dyn PortProvider>,
    template: &PortConfig,
    validate: &BufferValidator,
    settle: Duration,
    events: EventSender,
    options: SessionOptions,
) -> Result<PortSession, PortError> {
    let name = find_port(provider, template, validate, settle).await?;
    let config = PortConfig {
        name,
        ..template.clone()
    };
    let session = PortSession::new(config, Arc::clone(provider), events, options);
    session.start().await?;
    Ok(session)
}

async fn probe(session: &PortSession, validate: &BufferValidator, settle: Duration) -> bool {
    if session.start().await.is_err() {
        return false;
    }
    tokio::time::sleep(settle).await;

    let Some(mut queue_rx) = session.take_receiver().await else {
        return false;
    };
    let mut accumulated = Vec::new();
    while let Ok(byte) = queue_rx.try_recv() {
        accumulated.push(byte);
    }
    debug!(port = %session.config().name, bytes = accumulated.len(), "probe settled");
    validate(&accumulated)
}
