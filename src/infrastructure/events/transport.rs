//! Transport seam under the event channel.
//!
//! A [`Connector`] opens [`Transport`] connections; the channel owns the
//! connection state machine and only ever talks to a transport while connected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::events::EventChannelName;

/// Errors raised by a transport. They stop at the channel boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is disconnected")]
    Disconnected,

    #[error("Transport connection error: {0}")]
    Connection(String),

    #[error("Transport operation error: {0}")]
    Operation(String),

    #[error("Message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<redis::RedisError> for TransportError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
            TransportError::Connection(e.to_string())
        } else {
            TransportError::Operation(e.to_string())
        }
    }
}

impl TransportError {
    /// True when the connection itself is gone, as opposed to a single
    /// rejected operation.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            TransportError::Disconnected | TransportError::Connection(_)
        )
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Wire wrapper around every published payload.
///
/// `id` keeps otherwise identical payloads distinct inside the transport;
/// `published_at` drives the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: Uuid,
    pub published_at: DateTime<Utc>,
    pub payload: Value,
}

impl Envelope {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            published_at: Utc::now(),
            payload,
        }
    }

    /// Returns true once the envelope is older than `retention`.
    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(retention)
            .map(|retention| self.published_at + retention < now)
            .unwrap_or(false)
    }
}

/// A message taken from a channel and awaiting acknowledgment.
///
/// Until [`Transport::ack`] or [`Transport::requeue`] is called the message is
/// parked in the channel's in-flight area and is recovered on the next connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: EventChannelName,
    pub raw: String,
}

/// One live connection to the message transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Appends an encoded envelope to `channel`.
    async fn push(&self, channel: EventChannelName, raw: String) -> TransportResult<()>;

    /// Takes the oldest message from `channel` into its in-flight area.
    async fn fetch(&self, channel: EventChannelName) -> TransportResult<Option<Delivery>>;

    /// Removes a processed message from the in-flight area.
    async fn ack(&self, delivery: &Delivery) -> TransportResult<()>;

    /// Returns an in-flight message to the front of its channel for redelivery.
    async fn requeue(&self, delivery: &Delivery) -> TransportResult<()>;

    /// Moves every in-flight message of `channel` back to the front of the
    /// channel in fetch order, returning how many were moved.
    async fn recover(&self, channel: EventChannelName) -> TransportResult<u64>;

    /// Number of messages waiting in `channel`.
    async fn depth(&self, channel: EventChannelName) -> TransportResult<u64>;

    /// Releases the connection.
    async fn close(&self);
}

/// Opens transport connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> TransportResult<Arc<dyn Transport>>;
}
