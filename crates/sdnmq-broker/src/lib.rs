//! Message broker abstractions for SDN-MQ.
//!
//! The bridge only ever needs two things from a broker: take the next message
//! off a queue, and send one message to a queue or topic. This crate defines
//! those two seams ([`MessageReceiver`], [`MessagePublisher`]) together with
//! the message model and two backends:
//!
//! - [`memory`]: in-process queues and topics on tokio channels
//! - `redis_backend`: Redis lists for queues, Redis pub/sub for topics
//!   (feature `redis`)
//!
//! Topic subscribers may attach an [`AttributeFilter`] that is evaluated
//! against the message attributes, so consumers can select packet-in events
//! without parsing the JSON body.

mod broker;
mod error;
pub mod filter;
pub mod memory;
mod message;
#[cfg(feature = "redis")]
pub mod redis_backend;

pub use broker::{MessagePublisher, MessageReceiver};
pub use error::{BrokerError, BrokerResult};
pub use filter::AttributeFilter;
pub use memory::MemoryBroker;
pub use message::{AttributeValue, BrokerMessage, MessageBody};
#[cfg(feature = "redis")]
pub use redis_backend::{RedisBroker, RedisBrokerConfig};
