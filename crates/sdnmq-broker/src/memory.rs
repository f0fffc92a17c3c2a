//! In-process broker backed by tokio channels.
//!
//! Queues are point-to-point: each queue has exactly one receiver and any
//! number of senders. Topics fan out to every live subscription whose filter
//! accepts the message.

use crate::broker::{MessagePublisher, MessageReceiver};
use crate::error::{BrokerError, BrokerResult};
use crate::filter::AttributeFilter;
use crate::message::BrokerMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

struct QueueState {
    sender: mpsc::UnboundedSender<BrokerMessage>,
    receiver: Option<mpsc::UnboundedReceiver<BrokerMessage>>,
}

struct Subscriber {
    filter: AttributeFilter,
    sender: mpsc::UnboundedSender<BrokerMessage>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    topics: HashMap<String, Vec<Subscriber>>,
}

/// In-memory broker. Cloning yields another handle to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_entry<'a>(state: &'a mut BrokerState, name: &str) -> &'a mut QueueState {
        state.queues.entry(name.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            QueueState {
                sender,
                receiver: Some(receiver),
            }
        })
    }

    /// Returns a sender for queue `name`, creating the queue if needed.
    pub fn queue_sender(&self, name: &str) -> QueueSender {
        let mut state = self.state.lock();
        let queue = Self::queue_entry(&mut state, name);
        QueueSender {
            name: name.to_string(),
            sender: queue.sender.clone(),
        }
    }

    /// Takes the single receiver of queue `name`, creating the queue if
    /// needed.
    pub fn queue_receiver(&self, name: &str) -> BrokerResult<QueueReceiver> {
        let mut state = self.state.lock();
        let queue = Self::queue_entry(&mut state, name);
        let receiver = queue
            .receiver
            .take()
            .ok_or_else(|| BrokerError::ReceiverTaken(name.to_string()))?;
        debug!(queue = name, "Attached queue receiver");
        Ok(QueueReceiver {
            name: name.to_string(),
            receiver,
        })
    }

    /// Returns a publisher for topic `name`.
    pub fn topic_publisher(&self, name: &str) -> TopicPublisher {
        TopicPublisher {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        }
    }

    /// Subscribes to topic `name`. Only messages accepted by `filter` are
    /// delivered; messages published before the subscription are not.
    pub fn subscribe(&self, name: &str, filter: AttributeFilter) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(topic = name, %filter, "Added topic subscription");
        self.state
            .lock()
            .topics
            .entry(name.to_string())
            .or_default()
            .push(Subscriber { filter, sender });
        Subscription {
            topic: name.to_string(),
            receiver,
        }
    }

    /// Returns the number of live subscriptions on topic `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .topics
            .get(name)
            .map(|subs| subs.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }
}

/// Sending side of a memory queue.
#[derive(Clone)]
pub struct QueueSender {
    name: String,
    sender: mpsc::UnboundedSender<BrokerMessage>,
}

#[async_trait]
impl MessagePublisher for QueueSender {
    async fn publish(&self, message: BrokerMessage) -> BrokerResult<()> {
        self.sender
            .send(message)
            .map_err(|_| BrokerError::Closed(self.name.clone()))
    }
}

/// Receiving side of a memory queue.
pub struct QueueReceiver {
    name: String,
    receiver: mpsc::UnboundedReceiver<BrokerMessage>,
}

impl QueueReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl MessageReceiver for QueueReceiver {
    async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>> {
        Ok(self.receiver.recv().await)
    }
}

/// Publishing side of a memory topic.
#[derive(Clone)]
pub struct TopicPublisher {
    name: String,
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl MessagePublisher for TopicPublisher {
    async fn publish(&self, message: BrokerMessage) -> BrokerResult<()> {
        let mut state = self.state.lock();
        let Some(subscribers) = state.topics.get_mut(&self.name) else {
            trace!(topic = %self.name, "No subscribers, message dropped");
            return Ok(());
        };

        subscribers.retain(|s| !s.sender.is_closed());
        for subscriber in subscribers.iter() {
            if subscriber.filter.matches(&message) {
                // Closed between retain and send; dropped like any
                // message without a subscriber.
                let _ = subscriber.sender.send(message.clone());
            }
        }
        Ok(())
    }
}

/// A filtered subscription to a memory topic.
pub struct Subscription {
    topic: String,
    receiver: mpsc::UnboundedReceiver<BrokerMessage>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns a message if one is already waiting.
    pub fn try_receive(&mut self) -> Option<BrokerMessage> {
        self.receiver.try_recv().ok()
    }
}

#[async_trait]
impl MessageReceiver for Subscription {
    async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>> {
        Ok(self.receiver.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_queue_delivers_in_order() {
        let broker = MemoryBroker::new();
        let sender = broker.queue_sender("q");
        let mut receiver = broker.queue_receiver("q").unwrap();

        sender.publish(BrokerMessage::text("one")).await.unwrap();
        sender.publish(BrokerMessage::text("two")).await.unwrap();

        let first = receiver.receive().await.unwrap().unwrap();
        let second = receiver.receive().await.unwrap().unwrap();
        assert_eq!(first.body_text(), Some("one"));
        assert_eq!(second.body_text(), Some("two"));
    }

    #[test]
    fn test_queue_single_receiver() {
        let broker = MemoryBroker::new();
        assert!(broker.queue_receiver("q").is_ok());
        assert!(matches!(
            broker.queue_receiver("q"),
            Err(BrokerError::ReceiverTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_queue_closed() {
        let broker = MemoryBroker::new();
        let sender = broker.queue_sender("q");
        drop(broker.queue_receiver("q").unwrap());

        let result = sender.publish(BrokerMessage::text("lost")).await;
        assert!(matches!(result, Err(BrokerError::Closed(_))));
    }

    #[tokio::test]
    async fn test_topic_filters() {
        let broker = MemoryBroker::new();
        let publisher = broker.topic_publisher("t");
        let mut all = broker.subscribe("t", AttributeFilter::any());
        let mut node2 = broker.subscribe("t", AttributeFilter::equals("node", "2"));
        assert_eq!(broker.subscriber_count("t"), 2);

        publisher
            .publish(BrokerMessage::text("a").with_attribute("node", "1"))
            .await
            .unwrap();
        publisher
            .publish(BrokerMessage::text("b").with_attribute("node", "2"))
            .await
            .unwrap();

        assert_eq!(all.try_receive().unwrap().body_text(), Some("a"));
        assert_eq!(all.try_receive().unwrap().body_text(), Some("b"));
        assert!(all.try_receive().is_none());

        assert_eq!(node2.try_receive().unwrap().body_text(), Some("b"));
        assert!(node2.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_topic_without_subscribers() {
        let broker = MemoryBroker::new();
        let publisher = broker.topic_publisher("t");
        publisher.publish(BrokerMessage::text("x")).await.unwrap();

        let sub = broker.subscribe("t", AttributeFilter::any());
        drop(sub);
        publisher.publish(BrokerMessage::text("y")).await.unwrap();
        assert_eq!(broker.subscriber_count("t"), 0);
    }
}
