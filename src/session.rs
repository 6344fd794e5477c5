//! The port session: one active (or stoppable/restartable) serial connection.
//!
//! A session composes the port handle, the receive queue, the consumer task,
//! and the idle watchdog. Inbound bytes are pulled off the transport by a
//! blocking reader task and pushed into an unbounded ordered queue; a
//! cancellable consumer task drains the queue into the caller's per-byte
//! handler. Each stop/start cycle replaces the queue wholesale, so no byte
//! received before a stop is ever delivered after the following start.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::{EventSender, PortEvent};
use crate::port::{PortConfig, PortError, PortProvider, RawPort};
use crate::watchdog::{self, WatchdogConfig};

/// Default interval at which the reader task polls the transport for data.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Caller-supplied handler invoked for each received byte, in arrival order.
///
/// A returned error is reported as [`PortError::Handler`] on the event
/// channel and processing continues with the next byte.
pub type ByteHandler =
    Arc<dyn Fn(u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Optional collaborators and tunables for a [`PortSession`].
#[derive(Clone)]
pub struct SessionOptions {
    /// Per-byte handler. When absent, no consumer task is spawned and the
    /// caller drains the receive queue directly via
    /// [`PortSession::take_receiver`].
    pub byte_handler: Option<ByteHandler>,

    /// Idle watchdog configuration. `None` disables supervision entirely
    /// (used by discovery's ephemeral probes).
    pub watchdog: Option<WatchdogConfig>,

    /// Reader poll interval; bounds both data latency and stop latency.
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            byte_handler: None,
            watchdog: Some(WatchdogConfig::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct ConsumerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) struct WatchdogHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

enum LinkState {
    Closed,
    Open {
        port: Arc<Mutex<Box<dyn RawPort>>>,
        reader_stop: Arc<AtomicBool>,
        reader: JoinHandle<()>,
        consumer: Option<ConsumerHandle>,
        /// Receive queue endpoint for direct-drain mode (no byte handler).
        drain_rx: Option<UnboundedReceiver<u8>>,
    },
    Disposed,
}

pub(crate) struct Inner {
    config: PortConfig,
    provider: Arc<dyn PortProvider>,
    events: EventSender,
    handler: Option<ByteHandler>,
    watchdog_config: Option<WatchdogConfig>,
    poll_interval: Duration,
    /// Reference instant for the last-data-received timestamp.
    epoch: Instant,
    /// Milliseconds since `epoch` of the last received byte; 0 = never.
    /// Written only by the reader task, read by the watchdog.
    last_rx_ms: AtomicU64,
    link: AsyncMutex<LinkState>,
    watchdog: Mutex<Option<WatchdogHandle>>,
}

impl Inner {
    fn touch(&self) {
        let elapsed = (self.epoch.elapsed().as_millis() as u64).max(1);
        self.last_rx_ms.store(elapsed, Ordering::Release);
    }

    pub(crate) fn emit_error(&self, error: PortError) {
        let _ = self.events.send(PortEvent::Error(error));
    }

    /// Time since the last received byte, or since session creation if no
    /// byte has ever arrived.
    pub(crate) fn idle_for(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_rx_ms.load(Ordering::Acquire)))
    }

    /// One full reconnect cycle of the link, leaving the watchdog untouched.
    /// An open failure is reported and left for the next tick to retry.
    ///
    /// `cancel` is the owning watchdog's token. `stop()`/`dispose()` cancel
    /// it before taking the link lock, so re-checking it under the lock
    /// guarantees a racing reconnect can never reopen a stopped session.
    pub(crate) async fn reconnect(self: &Arc<Self>, cancel: &CancellationToken) {
        let mut link = self.link.lock().await;
        if cancel.is_cancelled() || matches!(*link, LinkState::Disposed) {
            return;
        }
        warn!(port = %self.config.name, idle = ?self.idle_for(), "link idle, reconnecting");
        self.shutdown_link(&mut link).await;
        if let Err(error) = self.open_link(&mut link) {
            self.emit_error(error);
        }
    }

    /// Open the transport and spawn the reader and (if configured) consumer.
    /// On success the link is `Open` and a `Connected` event has been sent.
    fn open_link(self: &Arc<Self>, link: &mut LinkState) -> Result<(), PortError> {
        let names = self.provider.port_names()?;
        if !names.iter().any(|candidate| candidate == &self.config.name) {
            return Err(PortError::Unavailable(self.config.name.clone()));
        }

        let port = self.provider.open(&self.config)?;
        info!(port = %self.config.name, baud = self.config.baud_rate, "serial port opened");

        let port = Arc::new(Mutex::new(port));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let reader_stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(
            Arc::clone(self),
            Arc::clone(&port),
            queue_tx,
            Arc::clone(&reader_stop),
        );

        let (consumer, drain_rx) = match &self.handler {
            Some(handler) => {
                let cancel = CancellationToken::new();
                let task = spawn_consumer(
                    Arc::clone(handler),
                    queue_rx,
                    self.events.clone(),
                    cancel.clone(),
                );
                (Some(ConsumerHandle { cancel, task }), None)
            }
            None => (None, Some(queue_rx)),
        };

        *link = LinkState::Open {
            port,
            reader_stop,
            reader,
            consumer,
            drain_rx,
        };
        let _ = self.events.send(PortEvent::Connected {
            port_name: self.config.name.clone(),
        });
        Ok(())
    }

    /// Tear down an open link: cancel the consumer, join the reader, close
    /// the transport, discard the queue. No-op when not open. Does not
    /// return until the consumer has observed cancellation and the
    /// transport is closed.
    async fn shutdown_link(&self, link: &mut LinkState) {
        match std::mem::replace(link, LinkState::Closed) {
            LinkState::Open {
                port,
                reader_stop,
                reader,
                consumer,
                drain_rx,
            } => {
                if let Some(consumer) = consumer {
                    consumer.cancel.cancel();
                    let _ = consumer.task.await;
                }
                reader_stop.store(true, Ordering::Release);
                let _ = reader.await;
                // undrained bytes are discarded with the queue
                drop(drain_rx);
                // the reader has exited, so this is the last transport
                // reference; dropping it closes the port (best-effort)
                drop(port);
                debug!(port = %self.config.name, "link closed");
            }
            other => *link = other,
        }
    }
}

/// The externally visible unit of one serial connection.
///
/// All methods take `&self`; the session is internally synchronized so the
/// owning application, the consumer task, and the idle watchdog may operate
/// on it concurrently.
pub struct PortSession {
    inner: Arc<Inner>,
}

impl PortSession {
    /// Create a session in the `Closed` state. Nothing is opened until
    /// [`start`](Self::start).
    pub fn new(
        config: PortConfig,
        provider: Arc<dyn PortProvider>,
        events: EventSender,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                provider,
                events,
                handler: options.byte_handler,
                watchdog_config: options.watchdog,
                poll_interval: options.poll_interval,
                epoch: Instant::now(),
                last_rx_ms: AtomicU64::new(0),
                link: AsyncMutex::new(LinkState::Closed),
                watchdog: Mutex::new(None),
            }),
        }
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &PortConfig {
        &self.inner.config
    }

    /// Open the transport, start the consumer task (if a byte handler was
    /// supplied), and arm the idle watchdog.
    ///
    /// An open failure is emitted on the event channel and returned; the
    /// session stays `Closed` and a later `start()` may succeed. Starting an
    /// already started session discards the prior link state first.
    pub async fn start(&self) -> Result<(), PortError> {
        let mut link = self.inner.link.lock().await;
        if matches!(*link, LinkState::Disposed) {
            return Err(PortError::Disposed);
        }
        self.inner.shutdown_link(&mut link).await;
        match self.inner.open_link(&mut link) {
            Ok(()) => {
                drop(link);
                self.arm_watchdog();
                Ok(())
            }
            Err(error) => {
                self.inner.emit_error(error.clone());
                Err(error)
            }
        }
    }

    /// Stop communications: disarm the watchdog, cancel the consumer task,
    /// close the transport, and discard the receive queue.
    ///
    /// Does not return until the consumer has observed cancellation and the
    /// transport is closed, so no read or write can race a following
    /// `start()`.
    pub async fn stop(&self) -> Result<(), PortError> {
        let watchdog = self.disarm_watchdog();
        let mut link = self.inner.link.lock().await;
        if matches!(*link, LinkState::Disposed) {
            return Err(PortError::Disposed);
        }
        self.inner.shutdown_link(&mut link).await;
        drop(link);
        if let Some(watchdog) = watchdog {
            let _ = watchdog.task.await;
        }
        Ok(())
    }

    /// Write bytes to the port.
    ///
    /// Fails with [`PortError::Disposed`] after disposal. Transport-level
    /// write failures (including writing while closed) are reported on the
    /// event channel and do not unwind into the caller; retry policy belongs
    /// to the caller.
    pub async fn send_bytes(&self, data: &[u8]) -> Result<(), PortError> {
        let link = self.inner.link.lock().await;
        match &*link {
            LinkState::Disposed => Err(PortError::Disposed),
            LinkState::Closed => {
                self.inner
                    .emit_error(PortError::write_failed(&self.inner.config.name, "port is not open"));
                Ok(())
            }
            LinkState::Open { port, .. } => {
                let port = Arc::clone(port);
                let data = data.to_vec();
                let name = self.inner.config.name.clone();
                // hold the link lock across the write so stop() cannot close
                // a half-written transport
                let outcome = tokio::task::spawn_blocking(move || port.lock().write_all(&data))
                    .await
                    .unwrap_or_else(|e| Err(PortError::write_failed(name, e.to_string())));
                if let Err(error) = outcome {
                    self.inner.emit_error(error);
                }
                Ok(())
            }
        }
    }

    /// Write a string to the port. See [`send_bytes`](Self::send_bytes).
    pub async fn send_text(&self, text: &str) -> Result<(), PortError> {
        self.send_bytes(text.as_bytes()).await
    }

    /// Stop communications and release all resources. Terminal and
    /// idempotent; every later operation fails with [`PortError::Disposed`].
    pub async fn dispose(&self) {
        let watchdog = self.disarm_watchdog();
        let mut link = self.inner.link.lock().await;
        if !matches!(*link, LinkState::Disposed) {
            self.inner.shutdown_link(&mut link).await;
            *link = LinkState::Disposed;
        }
        drop(link);
        if let Some(watchdog) = watchdog {
            let _ = watchdog.task.await;
        }
    }

    /// Whether the transport is currently open.
    pub async fn is_open(&self) -> bool {
        matches!(*self.inner.link.lock().await, LinkState::Open { .. })
    }

    /// Take the receive queue endpoint in direct-drain mode.
    ///
    /// Returns `None` when the session is not open, when a byte handler owns
    /// the queue, or when the receiver was already taken. The endpoint is
    /// tied to the current link: after a stop/start or watchdog reconnect it
    /// yields no further data and must be re-taken.
    pub async fn take_receiver(&self) -> Option<UnboundedReceiver<u8>> {
        let mut link = self.inner.link.lock().await;
        match &mut *link {
            LinkState::Open { drain_rx, .. } => drain_rx.take(),
            _ => None,
        }
    }

    /// Time since the last received byte, or since session creation if no
    /// byte has ever arrived.
    pub fn idle_for(&self) -> Duration {
        self.inner.idle_for()
    }

    /// How long ago the last byte arrived, or `None` if none ever has.
    pub fn last_data_received(&self) -> Option<Duration> {
        let last = self.inner.last_rx_ms.load(Ordering::Acquire);
        if last == 0 {
            None
        } else {
            Some(self.inner.idle_for())
        }
    }

    fn arm_watchdog(&self) {
        let Some(config) = self.inner.watchdog_config else {
            return;
        };
        let mut slot = self.inner.watchdog.lock();
        if slot.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let task = watchdog::spawn(Arc::downgrade(&self.inner), config, cancel.clone());
        *slot = Some(WatchdogHandle { cancel, task });
    }

    fn disarm_watchdog(&self) -> Option<WatchdogHandle> {
        let handle = self.inner.watchdog.lock().take();
        if let Some(handle) = &handle {
            handle.cancel.cancel();
        }
        handle
    }
}

impl std::fmt::Debug for PortSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSession")
            .field("port", &self.inner.config.name)
            .finish()
    }
}

/// Reader task: polls the transport and appends every available byte, in
/// order, to the receive queue. A failed pass is reported and aborts only
/// that pass. Runs on the blocking pool since serial reads are blocking.
fn spawn_reader(
    inner: Arc<Inner>,
    port: Arc<Mutex<Box<dyn RawPort>>>,
    queue_tx: UnboundedSender<u8>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buffer = [0u8; 4096];
        loop {
            // queue closure doubles as a backstop so a leaked reader cannot
            // outlive its session's runtime
            if stop.load(Ordering::Acquire) || queue_tx.is_closed() {
                break;
            }
            let pass = {
                let mut port = port.lock();
                match port.bytes_to_read() {
                    Ok(0) => Ok(0),
                    Ok(_) => port.read_bytes(&mut buffer),
                    Err(error) => Err(error),
                }
            };
            match pass {
                Ok(0) => std::thread::sleep(inner.poll_interval),
                Ok(n) => {
                    inner.touch();
                    for &byte in &buffer[..n] {
                        if queue_tx.send(byte).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    debug!(port = %inner.config.name, %error, "read pass failed");
                    inner.emit_error(error);
                    std::thread::sleep(inner.poll_interval);
                }
            }
        }
    })
}

/// Consumer task: drains the receive queue into the caller's handler in
/// strict arrival order. Cancellation is cooperative and observed at the
/// next wait point; remaining queued bytes are not drained.
fn spawn_consumer(
    handler: ByteHandler,
    mut queue_rx: UnboundedReceiver<u8>,
    events: EventSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let byte = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = queue_rx.recv() => match received {
                    Some(byte) => byte,
                    None => break,
                },
            };
            if let Err(error) = handler(byte) {
                let _ = events.send(PortEvent::Error(PortError::handler(
                    byte,
                    error.to_string(),
                )));
            }
        }
    })
}
