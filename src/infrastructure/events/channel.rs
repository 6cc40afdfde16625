//! Reconnecting, at-least-once event channel.
//!
//! The channel owns a single transport connection and a three-state machine:
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──ok──▶ Connected
//!      ▲                          │                  │
//!      └──────────fail────────────┘◀──────lost───────┘
//! ```
//!
//! Every failure schedules a reconnect through [`Backoff`]. Once the schedule
//! is exhausted the channel stays disconnected until [`EventChannel::connect`]
//! is called again. `publish` and `consume` never block on or fail because of
//! the transport: while disconnected they simply report `false`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backoff::{Backoff, BackoffPolicy};
use super::transport::{Connector, Delivery, Envelope, Transport, TransportError, TransportResult};
use crate::domain::events::EventChannelName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Handles one decoded payload.
///
/// `Ok` acknowledges the message, `Err` returns it to the channel. The same
/// message may be handled more than once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct EventChannelConfig {
    pub reconnect: BackoffPolicy,
    /// Messages older than this are dropped instead of delivered.
    pub retention: Duration,
    /// Pause between polls of an empty channel.
    pub poll_interval: Duration,
}

impl Default for EventChannelConfig {
    fn default() -> Self {
        Self {
            reconnect: BackoffPolicy::default(),
            retention: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Clone)]
struct Link {
    generation: u64,
    transport: Arc<dyn Transport>,
}

struct Inner {
    connector: Option<Arc<dyn Connector>>,
    config: EventChannelConfig,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    link: Mutex<Option<Link>>,
    generation: AtomicU64,
    backoff: Mutex<Backoff>,
    gave_up: AtomicBool,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn current(&self) -> Option<Link> {
        lock(&self.link).clone()
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn connect(self: &Arc<Self>) -> bool {
        let Some(connector) = self.connector.clone() else {
            debug!("Event channel is disabled, not connecting");
            return false;
        };
        if self.is_shut_down() {
            return false;
        }

        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return *self.state.borrow() == ConnectionState::Connected;
        }

        info!("Connecting event channel");

        match open(connector.as_ref()).await {
            Ok(transport) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *lock(&self.link) = Some(Link {
                    generation,
                    transport,
                });
                lock(&self.backoff).reset();
                self.gave_up.store(false, Ordering::SeqCst);
                self.state.send_replace(ConnectionState::Connected);
                info!("✓ Event channel connected");

                if self.is_shut_down() {
                    let link = lock(&self.link).take();
                    self.state.send_replace(ConnectionState::Disconnected);
                    if let Some(link) = link {
                        link.transport.close().await;
                    }
                    return false;
                }
                true
            }
            Err(e) => {
                warn!("Event channel connection failed: {}", e);
                self.state.send_replace(ConnectionState::Disconnected);
                self.schedule_reconnect();
                false
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if self.is_shut_down() {
            return;
        }

        let mut slot = lock(&self.reconnect);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let (delay, attempt) = {
            let mut backoff = lock(&self.backoff);
            (backoff.next_delay(), backoff.attempts())
        };
        let Some(delay) = delay else {
            self.gave_up.store(true, Ordering::SeqCst);
            error!(
                "Event channel gave up reconnecting after {} attempts; events are disabled until restart",
                attempt
            );
            return;
        };

        info!(
            "Reconnecting event channel in {}ms (attempt {}/{})",
            delay.as_millis(),
            attempt,
            self.config.reconnect.max_attempts
        );

        let deadline = tokio::time::Instant::now() + delay;
        let inner = Arc::downgrade(self);
        let mut shutdown = self.shutdown.subscribe();
        *slot = Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = shutdown.changed() => return,
            }
            if let Some(inner) = inner.upgrade() {
                lock(&inner.reconnect).take();
                inner.connect().await;
            }
        }));
    }

    /// Reacts to a failed transport call made on connection `generation`.
    fn transport_failed(self: &Arc<Self>, generation: u64, error: &TransportError) {
        if !error.is_connection_loss() {
            warn!("Event transport operation failed: {}", error);
            return;
        }

        let lost = {
            let mut link = lock(&self.link);
            if link
                .as_ref()
                .is_some_and(|current| current.generation == generation)
            {
                link.take()
            } else {
                None
            }
        };
        if lost.is_none() {
            return;
        }

        warn!("Event channel connection lost: {}", error);
        self.state.send_replace(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }
}

async fn open(connector: &dyn Connector) -> TransportResult<Arc<dyn Transport>> {
    let transport = connector.connect().await?;

    for channel in EventChannelName::ALL {
        match transport.recover(channel).await {
            Ok(0) => {}
            Ok(moved) => info!("Requeued {} unacknowledged messages on {}", moved, channel),
            Err(e) => {
                transport.close().await;
                return Err(e);
            }
        }
    }

    Ok(transport)
}

/// Durable publish/consume channel for click, analytics and activity events.
///
/// Cheap to clone; clones share one connection and one state machine.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<Inner>,
}

impl EventChannel {
    pub fn new(connector: Arc<dyn Connector>, config: EventChannelConfig) -> Self {
        Self::build(Some(connector), config)
    }

    /// A channel with no transport. It never connects and every publish
    /// reports `false`.
    pub fn disabled() -> Self {
        Self::build(None, EventChannelConfig::default())
    }

    fn build(connector: Option<Arc<dyn Connector>>, config: EventChannelConfig) -> Self {
        let backoff = Backoff::new(config.reconnect);
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                state: watch::channel(ConnectionState::Disconnected).0,
                shutdown: watch::channel(false).0,
                link: Mutex::new(None),
                generation: AtomicU64::new(0),
                backoff: Mutex::new(backoff),
                gave_up: AtomicBool::new(false),
                reconnect: Mutex::new(None),
                consumers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connects the channel. On failure a reconnect is scheduled and `false`
    /// is returned; the caller never has to retry itself.
    pub async fn connect(&self) -> bool {
        if self.inner.gave_up.swap(false, Ordering::SeqCst) {
            lock(&self.inner.backoff).reset();
        }
        self.inner.connect().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// False for a channel built with [`EventChannel::disabled`].
    pub fn is_enabled(&self) -> bool {
        self.inner.connector.is_some()
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True once the reconnect schedule is exhausted.
    pub fn has_given_up(&self) -> bool {
        self.inner.gave_up.load(Ordering::SeqCst)
    }

    /// Publishes `event` on `channel`.
    ///
    /// Returns `false` when the channel is disconnected or the transport
    /// rejects the message. Never returns an error.
    pub async fn publish<T: Serialize + ?Sized>(&self, channel: EventChannelName, event: &T) -> bool {
        let Some(link) = self.inner.current() else {
            debug!("Event channel disconnected, dropping {} event", channel);
            return false;
        };

        let raw = match serde_json::to_value(event)
            .map(Envelope::new)
            .and_then(|envelope| serde_json::to_string(&envelope))
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode {} event: {}", channel, e);
                return false;
            }
        };

        match link.transport.push(channel, raw).await {
            Ok(()) => {
                debug!("Published event to {}", channel);
                true
            }
            Err(e) => {
                self.inner.transport_failed(link.generation, &e);
                false
            }
        }
    }

    /// Starts a consumer for `channel`.
    ///
    /// Returns `false` and does nothing while disconnected. A started consumer
    /// outlives reconnects and stops only on [`EventChannel::shutdown`].
    pub fn consume(&self, channel: EventChannelName, handler: Arc<dyn EventHandler>) -> bool {
        if !self.is_healthy() {
            warn!("Event channel disconnected, not consuming {}", channel);
            return false;
        }

        let task = tokio::spawn(run_consumer(
            Arc::downgrade(&self.inner),
            channel,
            handler,
            self.inner.state.subscribe(),
            self.inner.shutdown.subscribe(),
        ));
        lock(&self.inner.consumers).push(task);

        info!("Consuming events from {}", channel);
        true
    }

    /// Messages waiting on `channel`, or `None` while disconnected.
    pub async fn queue_depth(&self, channel: EventChannelName) -> Option<u64> {
        let link = self.inner.current()?;

        match link.transport.depth(channel).await {
            Ok(depth) => Some(depth),
            Err(e) => {
                self.inner.transport_failed(link.generation, &e);
                None
            }
        }
    }

    /// Cancels any pending reconnect, lets every consumer settle its current
    /// message, waits for them and closes the connection. Idempotent.
    pub async fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        info!("Shutting down event channel");

        let reconnect = lock(&self.inner.reconnect).take();
        if let Some(task) = reconnect {
            let _ = task.await;
        }

        let consumers = std::mem::take(&mut *lock(&self.inner.consumers));
        for task in consumers {
            if let Err(e) = task.await {
                warn!("Event consumer ended abnormally: {}", e);
            }
        }

        let link = lock(&self.inner.link).take();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        if let Some(link) = link {
            link.transport.close().await;
        }

        info!("Event channel closed");
    }
}

enum Settlement {
    Acked,
    Requeued,
    Dropped,
}

async fn run_consumer(
    inner: Weak<Inner>,
    channel: EventChannelName,
    handler: Arc<dyn EventHandler>,
    mut state: watch::Receiver<ConnectionState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some((poll_interval, retention)) = inner
        .upgrade()
        .map(|inner| (inner.config.poll_interval, inner.config.retention))
    else {
        return;
    };

    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(current) = inner.upgrade() else {
            break;
        };
        let link = current.current();
        drop(current);

        let Some(link) = link else {
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {}
            }
            continue;
        };

        let pause = match link.transport.fetch(channel).await {
            Ok(Some(delivery)) => {
                match settle(link.transport.as_ref(), &delivery, handler.as_ref(), retention).await {
                    Ok(Settlement::Requeued) => true,
                    Ok(Settlement::Acked | Settlement::Dropped) => false,
                    Err(e) => {
                        report(&inner, link.generation, &e);
                        true
                    }
                }
            }
            Ok(None) => true,
            Err(e) => {
                report(&inner, link.generation, &e);
                true
            }
        };

        if pause {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    debug!("Consumer for {} stopped", channel);
}

fn report(inner: &Weak<Inner>, generation: u64, error: &TransportError) {
    if let Some(inner) = inner.upgrade() {
        inner.transport_failed(generation, error);
    }
}

async fn settle(
    transport: &dyn Transport,
    delivery: &Delivery,
    handler: &dyn EventHandler,
    retention: Duration,
) -> TransportResult<Settlement> {
    let channel = delivery.channel;

    let envelope: Envelope = match serde_json::from_str(&delivery.raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Dropping undecodable message on {}: {}", channel, e);
            transport.ack(delivery).await?;
            return Ok(Settlement::Dropped);
        }
    };

    if envelope.is_expired(retention, Utc::now()) {
        debug!("Dropping expired message {} on {}", envelope.id, channel);
        transport.ack(delivery).await?;
        return Ok(Settlement::Dropped);
    }

    let id = envelope.id;
    match handler.handle(envelope.payload).await {
        Ok(()) => {
            transport.ack(delivery).await?;
            debug!("Acknowledged message {} on {}", id, channel);
            Ok(Settlement::Acked)
        }
        Err(e) => {
            warn!("Handler failed for message {} on {}, requeueing: {:#}", id, channel, e);
            transport.requeue(delivery).await?;
            Ok(Settlement::Requeued)
        }
    }
}
