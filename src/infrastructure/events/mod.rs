//! Event channel: durable, reconnecting publish/consume of domain events.
//!
//! - [`EventChannel`] - connection state machine, publish and consume
//! - [`RedisConnector`] - Redis lists as reliable queues
//! - [`MemoryConnector`] - in-process broker for tests and local runs
//! - [`start_default_consumers`] - logging consumers for every channel

mod backoff;
mod channel;
mod consumers;
mod memory_transport;
mod redis_transport;
mod transport;

pub use backoff::{Backoff, BackoffPolicy};
pub use channel::{ConnectionState, EventChannel, EventChannelConfig, EventHandler};
pub use consumers::{LoggedEvent, LoggingConsumer, start_default_consumers};
pub use memory_transport::{MemoryBroker, MemoryConnector, MemoryTransport};
pub use redis_transport::{RedisConnector, RedisTransport};
pub use transport::{Connector, Delivery, Envelope, Transport, TransportError, TransportResult};
