//! SDN-MQ bridge daemon.
//!
//! Loads the daemon configuration and runs the translation engine against
//! the configured broker and a simulated controller.

pub mod config;
pub mod daemon;

pub use config::{BrokerBackend, ConfigError, SdnmqConfig};
pub use daemon::{run, Bridge, DaemonError};
