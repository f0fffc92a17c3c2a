//! SDN-MQ translation engine.
//!
//! Bridges a controller's flow programming and packet I/O services with a
//! message broker:
//!
//! - flow programming requests (JSON, one queue) are decoded into
//!   [`flow::FlowRule`]s and installed, replaced or removed through
//!   [`services::FlowTableService`], tracked by name in a
//!   [`flow::FlowRegistry`]
//! - packet forwarding requests (JSON, one queue) are decoded and handed to
//!   [`services::DataPacketService`] for transmission
//! - frames punted to the controller are projected into JSON documents with
//!   flat filter attributes and published on a topic
//!
//! Each request queue is served by one [`listener::run_listener`] task.
//! Malformed requests are logged and dropped; nothing is retried and no
//! reply is sent.

pub mod attributes;
pub mod controller;
pub mod error;
pub mod flow;
pub mod flow_programmer;
mod json;
pub mod listener;
pub mod packet;
pub mod request;
pub mod services;

pub use controller::SimulatedController;
pub use error::{BridgeError, BridgeResult};
pub use flow_programmer::FlowProgrammer;
pub use listener::{run_listener, MessageHandler};
pub use packet::{PacketForwarder, PacketInHandler};
pub use request::{FlowProgrammerRequest, PacketForwardRequest};
pub use services::{
    DataPacketListener, DataPacketService, FlowTableService, Status, StatusCode, TopologyService,
};
