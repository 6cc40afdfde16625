//! Redis-backed event transport.
//!
//! Each channel is a Redis list used as a reliable queue:
//!
//! - publish: `LPUSH events:{channel}`
//! - fetch: `LMOVE events:{channel} events:{channel}:processing RIGHT LEFT`
//! - ack: `LREM` from the processing list
//! - requeue: `LREM` + `RPUSH` back onto the channel in one `MULTI`
//!
//! Messages survive restarts of both Redis (with persistence on) and the
//! service; anything left in a processing list is moved back on connect,
//! ahead of newer messages and in its original order.

use async_trait::async_trait;
use redis::Client;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use tracing::{debug, info};

use super::transport::{Connector, Delivery, Transport, TransportError, TransportResult};
use crate::domain::events::EventChannelName;

fn queue_key(channel: EventChannelName) -> String {
    format!("events:{}", channel)
}

fn processing_key(channel: EventChannelName) -> String {
    format!("events:{}:processing", channel)
}

/// Opens plain multiplexed connections.
///
/// Unlike `ConnectionManager` a multiplexed connection does not reconnect by
/// itself, so a dropped connection surfaces as an error and the event channel's
/// own reconnect schedule takes over.
pub struct RedisConnector {
    client: Client,
}

impl RedisConnector {
    pub fn new(url: &str) -> TransportResult<Self> {
        let client = Client::open(url).map_err(|e| {
            TransportError::Connection(format!("Failed to create Redis client: {}", e))
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> TransportResult<Arc<dyn Transport>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TransportError::Connection(format!("Failed to connect: {}", e)))?;

        let _: () = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| TransportError::Connection(format!("PING failed: {}", e)))?;

        info!("Event transport connected to Redis");
        Ok(Arc::new(RedisTransport { conn }))
    }
}

pub struct RedisTransport {
    conn: MultiplexedConnection,
}

#[async_trait]
impl Transport for RedisTransport {
    async fn push(&self, channel: EventChannelName, raw: String) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(queue_key(channel))
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn fetch(&self, channel: EventChannelName) -> TransportResult<Option<Delivery>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("LMOVE")
            .arg(queue_key(channel))
            .arg(processing_key(channel))
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await?;

        Ok(raw.map(|raw| Delivery { channel, raw }))
    }

    async fn ack(&self, delivery: &Delivery) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LREM")
            .arg(processing_key(delivery.channel))
            .arg(1)
            .arg(&delivery.raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(processing_key(delivery.channel))
            .arg(1)
            .arg(&delivery.raw)
            .ignore()
            .cmd("RPUSH")
            .arg(queue_key(delivery.channel))
            .arg(&delivery.raw)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn recover(&self, channel: EventChannelName) -> TransportResult<u64> {
        let mut conn = self.conn.clone();
        let mut moved = 0;

        // Newest fetch first onto the consuming end, so the oldest ends up next.
        loop {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(processing_key(channel))
                .arg(queue_key(channel))
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;

            match raw {
                Some(_) => moved += 1,
                None => break,
            }
        }

        if moved > 0 {
            debug!("Recovered {} in-flight messages on {}", moved, channel);
        }
        Ok(moved)
    }

    async fn depth(&self, channel: EventChannelName) -> TransportResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("LLEN")
            .arg(queue_key(channel))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn close(&self) {
        // Multiplexed connections close when the last clone is dropped.
        debug!("Event transport connection released");
    }
}
