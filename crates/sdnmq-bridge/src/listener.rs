//! Request stream listeners.
//!
//! Each request queue is served by one task that takes messages off the
//! queue and hands them to a [`MessageHandler`] one at a time, in delivery
//! order. A message that fails translation is logged and dropped by the
//! handler; the listener moves on to the next one.

use sdnmq_broker::{BrokerError, BrokerMessage, MessageReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay before receiving again after a broker failure.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Consumer of messages from one request stream.
pub trait MessageHandler: Send + Sync {
    /// Processes one message to completion. Errors are logged, never
    /// returned.
    fn on_message(&self, message: &BrokerMessage);
}

/// Feeds messages from `receiver` to `handler` until the stream closes or
/// `shutdown` is cancelled. Returns the number of messages handled.
///
/// Cancellation is only observed between messages; a message that has been
/// received is always handled.
pub async fn run_listener<R>(
    name: &str,
    mut receiver: R,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
) -> u64
where
    R: MessageReceiver,
{
    info!(listener = name, "Listener started");
    let mut handled: u64 = 0;

    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(listener = name, "Shutdown requested");
                break;
            }
            received = receiver.receive() => received,
        };

        match received {
            Ok(Some(message)) => {
                handler.on_message(&message);
                handled += 1;
            }
            Ok(None) => {
                debug!(listener = name, "Request stream closed");
                break;
            }
            Err(e @ BrokerError::InvalidEnvelope(_)) => {
                warn!(listener = name, error = %e, "Dropping undecodable message");
            }
            Err(e) => {
                warn!(listener = name, error = %e, "Receive failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                }
            }
        }
    }

    info!(listener = name, handled, "Listener stopped");
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use sdnmq_broker::{BrokerResult, MemoryBroker, MessagePublisher};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Collect {
        bodies: Mutex<Vec<String>>,
    }

    impl MessageHandler for Collect {
        fn on_message(&self, message: &BrokerMessage) {
            self.bodies
                .lock()
                .push(message.body_text().unwrap_or_default().to_string());
        }
    }

    #[tokio::test]
    async fn test_handles_messages_in_order() {
        let broker = MemoryBroker::new();
        let sender = broker.queue_sender("q");
        let receiver = broker.queue_receiver("q").unwrap();

        for body in ["a", "b", "c"] {
            sender.publish(BrokerMessage::text(body)).await.unwrap();
        }
        drop(sender);
        drop(broker);

        let handler = Arc::new(Collect::default());
        let handled = run_listener("q", receiver, handler.clone(), CancellationToken::new()).await;

        assert_eq!(handled, 3);
        assert_eq!(*handler.bodies.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let broker = MemoryBroker::new();
        let receiver = broker.queue_receiver("q").unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let handled = run_listener("q", receiver, Arc::new(Collect::default()), shutdown).await;
        assert_eq!(handled, 0);
    }

    struct Scripted {
        results: VecDeque<BrokerResult<Option<BrokerMessage>>>,
    }

    #[async_trait]
    impl MessageReceiver for Scripted {
        async fn receive(&mut self) -> BrokerResult<Option<BrokerMessage>> {
            self.results.pop_front().unwrap_or(Ok(None))
        }
    }

    #[tokio::test]
    async fn test_broker_errors_are_not_fatal() {
        let receiver = Scripted {
            results: VecDeque::from(vec![
                Err(BrokerError::InvalidEnvelope("garbage".to_string())),
                Ok(Some(BrokerMessage::text("after"))),
            ]),
        };
        let handler = Arc::new(Collect::default());
        let handled = run_listener("q", receiver, handler.clone(), CancellationToken::new()).await;

        assert_eq!(handled, 1);
        assert_eq!(*handler.bodies.lock(), vec!["after"]);
    }
}
