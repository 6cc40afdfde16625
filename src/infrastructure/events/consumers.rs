//! Built-in consumers that log every event they receive.
//!
//! They stand in for downstream analytics: decode, log, acknowledge. A payload
//! that does not decode is logged and acknowledged so it cannot loop forever.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

use super::channel::{EventChannel, EventHandler};
use crate::domain::events::{ClickEvent, EventChannelName, UrlAnalyticsEvent, UserActivityEvent};

/// Renders a decoded event as one log line.
pub trait LoggedEvent: DeserializeOwned + Send + Sync + 'static {
    const CHANNEL: EventChannelName;

    fn log(&self);
}

impl LoggedEvent for ClickEvent {
    const CHANNEL: EventChannelName = EventChannelName::UrlClicks;

    fn log(&self) {
        info!(
            short_code = %self.short_code,
            url_id = %self.url_id,
            owner_id = %self.owner_id,
            referrer = self.referrer.as_deref().unwrap_or("-"),
            "Click recorded"
        );
    }
}

impl LoggedEvent for UrlAnalyticsEvent {
    const CHANNEL: EventChannelName = EventChannelName::UrlAnalytics;

    fn log(&self) {
        info!(
            url_id = %self.url_id,
            owner_id = %self.owner_id,
            action = self.action.as_str(),
            "URL lifecycle event"
        );
    }
}

impl LoggedEvent for UserActivityEvent {
    const CHANNEL: EventChannelName = EventChannelName::UserActivities;

    fn log(&self) {
        info!(
            owner_id = %self.owner_id,
            action = %self.action,
            resource = %self.resource,
            resource_id = self.resource_id.as_deref().unwrap_or("-"),
            "User activity"
        );
    }
}

/// Decodes payloads as `E` and logs them.
pub struct LoggingConsumer<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E> LoggingConsumer<E> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<E> Default for LoggingConsumer<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: LoggedEvent> EventHandler for LoggingConsumer<E> {
    async fn handle(&self, payload: Value) -> anyhow::Result<()> {
        match serde_json::from_value::<E>(payload) {
            Ok(event) => event.log(),
            Err(e) => warn!("Dropping malformed {} event: {}", E::CHANNEL, e),
        }
        Ok(())
    }
}

fn start<E: LoggedEvent>(channel: &EventChannel) -> bool {
    channel.consume(E::CHANNEL, Arc::new(LoggingConsumer::<E>::new()))
}

/// Registers the logging consumers on all three channels. Returns how many
/// were started; none are while the channel is disconnected.
pub fn start_default_consumers(channel: &EventChannel) -> usize {
    [
        start::<ClickEvent>(channel),
        start::<UrlAnalyticsEvent>(channel),
        start::<UserActivityEvent>(channel),
    ]
    .into_iter()
    .filter(|started| *started)
    .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::events::memory_transport::{MemoryBroker, MemoryConnector};
    use crate::infrastructure::events::EventChannelConfig;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_malformed_payload_is_acknowledged() {
        let consumer = LoggingConsumer::<ClickEvent>::new();

        assert!(consumer.handle(json!({ "unexpected": true })).await.is_ok());
    }

    #[tokio::test]
    async fn test_valid_payload_is_acknowledged() {
        let consumer = LoggingConsumer::<UserActivityEvent>::new();
        let payload = json!({
            "ownerId": "u1",
            "action": "created",
            "resource": "url",
            "resourceId": "42",
            "timestamp": "2025-01-01T00:00:00Z"
        });

        assert!(consumer.handle(payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_requires_connection() {
        let broker = MemoryBroker::new();
        let channel = EventChannel::new(
            Arc::new(MemoryConnector::new(Arc::clone(&broker))),
            EventChannelConfig {
                poll_interval: Duration::from_millis(5),
                ..Default::default()
            },
        );

        assert_eq!(start_default_consumers(&channel), 0);

        channel.connect().await;
        assert_eq!(start_default_consumers(&channel), 3);

        channel.shutdown().await;
    }
}
