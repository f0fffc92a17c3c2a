//! Receive/publish seams between the bridge and a broker backend.

use crate::error::BrokerResult;
use crate::message::BrokerMessage;
use async_trait::async_trait;

/// Source of messages for one queue or topic subscription.
#[async_trait]
pub trait MessageReceiver: Send {
    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the source is closed and no further messages
    /// will arrive.
    async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>>;
}

/// Sink for messages addressed to one queue or topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Sends one message. Delivery is at most once.
    async fn publish(&self, message: BrokerMessage) -> BrokerResult<()>;
}

#[async_trait]
impl<R: MessageReceiver + ?Sized> MessageReceiver for Box<R> {
    async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>> {
        (**self).receive().await
    }
}

#[async_trait]
impl<P: MessagePublisher + ?Sized> MessagePublisher for std::sync::Arc<P> {
    async fn publish(&self, message: BrokerMessage) -> BrokerResult<()> {
        (**self).publish(message).await
    }
}
