//! Packet I/O: layer decoding, packet-in projection and packet-out requests.

pub mod builder;
pub mod decode;
pub mod forwarder;
pub mod handler;
pub mod layer;

pub use decode::decode_frame;
pub use forwarder::PacketForwarder;
pub use handler::{
    project, run_publisher, FilterAttributes, PacketInHandler, PacketInProjection, PacketResult,
};
pub use layer::{Dot1QLayer, EthernetLayer, Ipv4Layer, Layer, TransportLayer};

use sdnmq_types::{NodeRef, PortRef};

/// A frame received from a switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub ingress: PortRef,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn new(ingress: PortRef, data: impl Into<Vec<u8>>) -> Self {
        Self {
            ingress,
            data: data.into(),
        }
    }

    pub fn node(&self) -> &NodeRef {
        self.ingress.node()
    }
}

/// A frame to be sent out of a switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    pub egress: PortRef,
    pub data: Vec<u8>,
}

impl OutboundPacket {
    pub fn new(egress: PortRef, data: impl Into<Vec<u8>>) -> Self {
        Self {
            egress,
            data: data.into(),
        }
    }

    pub fn node(&self) -> &NodeRef {
        self.egress.node()
    }
}
