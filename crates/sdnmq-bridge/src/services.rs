//! Capability interfaces of the controller platform.
//!
//! The bridge never talks to switches itself. Flow installation, topology
//! lookups and packet I/O are delegated to these traits, which are
//! implemented by the controller integration (or by
//! [`crate::controller::SimulatedController`]).

use crate::error::{BridgeError, BridgeResult};
use crate::flow::FlowRule;
use crate::packet::{Layer, OutboundPacket, PacketResult, RawPacket};
use sdnmq_types::{NodeRef, PortRef};
use std::fmt;

/// Outcome codes reported by controller services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    BadRequest,
    NotFound,
    Conflict,
    NotAcceptable,
    Unavailable,
    InternalError,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::BadRequest => "BADREQUEST",
            StatusCode::NotFound => "NOTFOUND",
            StatusCode::Conflict => "CONFLICT",
            StatusCode::NotAcceptable => "NOTACCEPTABLE",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::InternalError => "INTERNALERROR",
        };
        write!(f, "{}", s)
    }
}

/// Status returned by a controller service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub description: String,
}

impl Status {
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            description: String::new(),
        }
    }

    pub fn failure(code: StatusCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }

    /// Converts to a Result; a failure becomes an
    /// [`BridgeError::ExternalServiceFailure`] for `operation`.
    pub fn into_result(self, operation: &str) -> BridgeResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(BridgeError::external(operation, self.to_string()))
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.description)
        }
    }
}

/// Flow table programming on forwarding devices.
pub trait FlowTableService: Send + Sync {
    fn install(&self, node: &NodeRef, rule: &FlowRule) -> Status;

    fn replace(&self, node: &NodeRef, old: &FlowRule, new: &FlowRule) -> Status;

    fn remove(&self, node: &NodeRef, rule: &FlowRule) -> Status;
}

/// Node and port lookup.
pub trait TopologyService: Send + Sync {
    fn has_node(&self, node: &NodeRef) -> bool;

    fn has_port(&self, port: &PortRef) -> bool;
}

/// Packet decoding and transmission.
pub trait DataPacketService: Send + Sync {
    /// Decodes a captured frame into its layer chain, outermost first.
    fn decode_data_packet(&self, packet: &RawPacket) -> Vec<Layer>;

    /// Sends a frame out of a port.
    fn transmit_data_packet(&self, packet: &OutboundPacket) -> Status;
}

/// Receiver of frames punted to the controller.
pub trait DataPacketListener: Send + Sync {
    fn receive_data_packet(&self, packet: &RawPacket) -> PacketResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_into_result() {
        assert_eq!(Status::success().into_result("install"), Ok(()));

        let err = Status::failure(StatusCode::Conflict, "flow exists")
            .into_result("install")
            .unwrap_err();
        assert_eq!(err.to_string(), "install failed: CONFLICT: flow exists");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::success().to_string(), "SUCCESS");
        assert_eq!(
            Status::failure(StatusCode::NotFound, "").to_string(),
            "NOTFOUND"
        );
    }
}
