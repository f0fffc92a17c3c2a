//! Broker error types.

use thiserror::Error;

/// Errors raised by broker backends.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("Destination closed: {0}")]
    Closed(String),

    #[error("Queue {0} already has a receiver")]
    ReceiverTaken(String),

    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Broker command error: {0}")]
    Command(String),

    #[error("Invalid message envelope: {0}")]
    InvalidEnvelope(String),
}

/// Result type for broker operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
