//! In-process event transport.
//!
//! [`MemoryBroker`] plays the role of the external server: its queues outlive
//! individual connections, it can refuse new connections and it can sever the
//! live ones, which is enough to drive the channel's reconnect logic in tests
//! and in deployments without a transport.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::transport::{Connector, Delivery, Transport, TransportError, TransportResult};
use crate::domain::events::EventChannelName;

#[derive(Default)]
struct Queues {
    ready: HashMap<EventChannelName, VecDeque<String>>,
    in_flight: HashMap<EventChannelName, Vec<String>>,
}

#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<Queues>,
    unreachable: AtomicBool,
    generation: AtomicU64,
    connect_attempts: AtomicUsize,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// When false, new connections are refused. Live ones are unaffected.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Breaks every live connection; their next operation fails.
    pub fn drop_connections(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Messages waiting in `channel`, excluding in-flight ones.
    pub fn ready_len(&self, channel: EventChannelName) -> usize {
        self.lock().ready.get(&channel).map_or(0, VecDeque::len)
    }

    pub fn in_flight_len(&self, channel: EventChannelName) -> usize {
        self.lock().in_flight.get(&channel).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Connector that hands out connections to a shared [`MemoryBroker`].
pub struct MemoryConnector {
    broker: Arc<MemoryBroker>,
}

impl MemoryConnector {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> TransportResult<Arc<dyn Transport>> {
        self.broker.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if self.broker.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Connection(
                "Broker is unreachable".to_string(),
            ));
        }

        Ok(Arc::new(MemoryTransport {
            broker: Arc::clone(&self.broker),
            generation: self.broker.generation.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MemoryTransport {
    broker: Arc<MemoryBroker>,
    generation: u64,
    closed: AtomicBool,
}

impl MemoryTransport {
    fn queues(&self) -> TransportResult<MutexGuard<'_, Queues>> {
        let severed = self.broker.generation.load(Ordering::SeqCst) != self.generation;
        if severed || self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        Ok(self.broker.lock())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn push(&self, channel: EventChannelName, raw: String) -> TransportResult<()> {
        self.queues()?
            .ready
            .entry(channel)
            .or_default()
            .push_back(raw);
        Ok(())
    }

    async fn fetch(&self, channel: EventChannelName) -> TransportResult<Option<Delivery>> {
        let mut queues = self.queues()?;

        let Some(raw) = queues.ready.get_mut(&channel).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        queues
            .in_flight
            .entry(channel)
            .or_default()
            .push(raw.clone());

        Ok(Some(Delivery { channel, raw }))
    }

    async fn ack(&self, delivery: &Delivery) -> TransportResult<()> {
        let mut queues = self.queues()?;
        take_in_flight(&mut queues, delivery);
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> TransportResult<()> {
        let mut queues = self.queues()?;
        if take_in_flight(&mut queues, delivery) {
            queues
                .ready
                .entry(delivery.channel)
                .or_default()
                .push_front(delivery.raw.clone());
        }
        Ok(())
    }

    async fn recover(&self, channel: EventChannelName) -> TransportResult<u64> {
        let mut queues = self.queues()?;

        let parked = queues.in_flight.remove(&channel).unwrap_or_default();
        let moved = parked.len() as u64;
        let ready = queues.ready.entry(channel).or_default();
        for raw in parked.into_iter().rev() {
            ready.push_front(raw);
        }

        Ok(moved)
    }

    async fn depth(&self, channel: EventChannelName) -> TransportResult<u64> {
        let queues = self.queues()?;
        Ok(queues.ready.get(&channel).map_or(0, VecDeque::len) as u64)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn take_in_flight(queues: &mut Queues, delivery: &Delivery) -> bool {
    let Some(parked) = queues.in_flight.get_mut(&delivery.channel) else {
        return false;
    };
    match parked.iter().position(|raw| *raw == delivery.raw) {
        Some(index) => {
            parked.remove(index);
            true
        }
        None => false,
    }
}
