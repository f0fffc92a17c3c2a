//! Redis broker backend.
//!
//! Queues are Redis lists: senders `RPUSH`, the receiver polls with `BLPOP`.
//! Topics are Redis pub/sub channels. Messages travel as the JSON envelope
//! produced by [`BrokerMessage::to_envelope`], so attributes survive the trip
//! and subscribers can filter on them locally.

use crate::broker::{MessagePublisher, MessageReceiver};
use crate::error::{BrokerError, BrokerResult};
use crate::filter::AttributeFilter;
use crate::message::BrokerMessage;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

fn default_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_poll_timeout_secs() -> f64 {
    1.0
}

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisBrokerConfig {
    /// Redis connection URI
    #[serde(default = "default_url")]
    pub url: String,
    /// Seconds each `BLPOP` waits before polling again
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: f64,
}

impl Default for RedisBrokerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl RedisBrokerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Connection to a Redis server acting as broker.
#[derive(Clone)]
pub struct RedisBroker {
    config: RedisBrokerConfig,
    client: redis::Client,
    connection: ConnectionManager,
}

impl RedisBroker {
    /// Connects to the server named in `config`.
    pub async fn connect(config: RedisBrokerConfig) -> BrokerResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| BrokerError::Connection(format!("{}: {}", config.url, e)))?;

        let connection = client.get_connection_manager().await.map_err(|e| {
            BrokerError::Connection(format!("Failed to create connection manager: {}", e))
        })?;

        info!(url = %config.url, "Connected to Redis broker");
        Ok(Self {
            config,
            client,
            connection,
        })
    }

    pub fn config(&self) -> &RedisBrokerConfig {
        &self.config
    }

    pub fn queue_sender(&self, name: &str) -> RedisQueueSender {
        RedisQueueSender {
            key: name.to_string(),
            connection: self.connection.clone(),
        }
    }

    /// Returns a receiver polling queue `name` on its own connection, so a
    /// pending `BLPOP` never holds up commands sent through the shared one.
    ///
    /// Redis lists allow competing consumers; the bridge attaches exactly
    /// one receiver per queue.
    pub async fn queue_receiver(&self, name: &str) -> BrokerResult<RedisQueueReceiver> {
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to open connection: {}", e)))?;

        debug!(queue = name, "Attached Redis queue receiver");
        Ok(RedisQueueReceiver {
            key: name.to_string(),
            connection,
            timeout_secs: self.config.poll_timeout_secs,
        })
    }

    pub fn topic_publisher(&self, name: &str) -> RedisTopicPublisher {
        RedisTopicPublisher {
            channel: name.to_string(),
            connection: self.connection.clone(),
        }
    }

    /// Subscribes to topic `name` on a dedicated pub/sub connection.
    pub async fn subscribe(
        &self,
        name: &str,
        filter: AttributeFilter,
    ) -> BrokerResult<RedisSubscription> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to open pub/sub: {}", e)))?;
        pubsub
            .subscribe(name)
            .await
            .map_err(|e| BrokerError::Command(format!("SUBSCRIBE failed: {}", e)))?;

        debug!(topic = name, %filter, "Subscribed to Redis channel");
        Ok(RedisSubscription {
            topic: name.to_string(),
            filter,
            messages: pubsub.into_on_message().boxed(),
        })
    }
}

/// Sends envelopes to a Redis list.
pub struct RedisQueueSender {
    key: String,
    connection: ConnectionManager,
}

#[async_trait]
impl MessagePublisher for RedisQueueSender {
    async fn publish(&self, message: BrokerMessage) -> BrokerResult<()> {
        let envelope = message.to_envelope()?;
        let mut connection = self.connection.clone();
        let _: () = connection
            .rpush(&self.key, envelope)
            .await
            .map_err(|e| BrokerError::Command(format!("RPUSH {} failed: {}", self.key, e)))?;
        Ok(())
    }
}

/// Polls a Redis list with `BLPOP`.
pub struct RedisQueueReceiver {
    key: String,
    connection: MultiplexedConnection,
    timeout_secs: f64,
}

#[async_trait]
impl MessageReceiver for RedisQueueReceiver {
    async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>> {
        loop {
            let popped: Option<(String, String)> = self
                .connection
                .blpop(&self.key, self.timeout_secs)
                .await
                .map_err(|e| BrokerError::Command(format!("BLPOP {} failed: {}", self.key, e)))?;

            if let Some((_, raw)) = popped {
                return BrokerMessage::from_envelope(&raw).map(Some);
            }
        }
    }
}

/// Publishes envelopes to a Redis channel.
pub struct RedisTopicPublisher {
    channel: String,
    connection: ConnectionManager,
}

#[async_trait]
impl MessagePublisher for RedisTopicPublisher {
    async fn publish(&self, message: BrokerMessage) -> BrokerResult<()> {
        let envelope = message.to_envelope()?;
        let mut connection = self.connection.clone();
        let receivers: i64 = connection
            .publish(&self.channel, envelope)
            .await
            .map_err(|e| BrokerError::Command(format!("PUBLISH {} failed: {}", self.channel, e)))?;
        debug!(topic = %self.channel, receivers, "Published message");
        Ok(())
    }
}

/// A filtered subscription to a Redis channel.
pub struct RedisSubscription {
    topic: String,
    filter: AttributeFilter,
    messages: BoxStream<'static, redis::Msg>,
}

impl RedisSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl MessageReceiver for RedisSubscription {
    async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>> {
        while let Some(msg) = self.messages.next().await {
            let raw: String = match msg.get_payload() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "Skipping non-text payload");
                    continue;
                }
            };
            let message = match BrokerMessage::from_envelope(&raw) {
                Ok(message) => message,
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "Skipping malformed envelope");
                    continue;
                }
            };
            if self.filter.matches(&message) {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }
}
