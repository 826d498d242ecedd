//! events.rs
//!
//! Outbound port for `ReservationCreated`.
//!
//! Delivery is best-effort: the reservation workflow has already committed when it
//! publishes, and a failed publish is only logged. The consumers (user
//! notification, hold expiry) must therefore tolerate both lost and duplicated
//! events.

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::ReservationCreated;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("could not serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("event channel is closed")]
    ChannelClosed,
}

#[async_trait]
pub trait ReservationEventPublisher: Send + Sync {
    async fn publish(&self, event: &ReservationCreated) -> Result<(), PublishError>;
}

/// Publishes events as JSON on a Redis pub/sub channel.
#[derive(Clone)]
pub struct RedisEventPublisher {
    conn: MultiplexedConnection,
    channel: String,
}

impl RedisEventPublisher {
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        let channel = channel.into();
        info!("Redis connected, publishing reservation events on '{}'", channel);
        Ok(Self { conn, channel })
    }
}

#[async_trait]
impl ReservationEventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &ReservationCreated) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.channel, payload).await?;
        debug!(
            "Published reservation {} to '{}' ({} receivers)",
            event.reservation_id, self.channel, receivers
        );
        Ok(())
    }
}

/// Hands events to an in-process consumer.
#[derive(Clone)]
pub struct ChannelEventPublisher {
    tx: mpsc::UnboundedSender<ReservationCreated>,
}

impl ChannelEventPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReservationCreated>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReservationEventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: &ReservationCreated) -> Result<(), PublishError> {
        self.tx
            .send(event.clone())
            .map_err(|_| PublishError::ChannelClosed)
    }
}
