//! Packet-out requests.
//!
//! ```json
//! {
//!   "node": {"id": "1", "type": "OF"},
//!   "egressPort": "2",
//!   "packet": "AAAAAAACAAAAAAABCABFAA..."
//! }
//! ```
//!
//! All three fields are required, including the node type.

use crate::attributes::forward_request as keys;
use crate::error::{BridgeError, BridgeResult};
use crate::json::{as_object, parse_message, parse_node, require, require_id, require_str};
use crate::listener::MessageHandler;
use crate::packet::OutboundPacket;
use crate::services::{DataPacketService, TopologyService};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sdnmq_broker::BrokerMessage;
use sdnmq_types::PortRef;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Translates packet-out requests into frame transmissions.
pub struct PacketForwarder {
    topology: Arc<dyn TopologyService>,
    packet_service: Arc<dyn DataPacketService>,
}

impl PacketForwarder {
    pub fn new(
        topology: Arc<dyn TopologyService>,
        packet_service: Arc<dyn DataPacketService>,
    ) -> Self {
        Self {
            topology,
            packet_service,
        }
    }

    /// Decodes one packet-out request and transmits the frame.
    ///
    /// Returns the transmitted packet.
    pub fn translate_forward_request(&self, json: &Value) -> BridgeResult<OutboundPacket> {
        let request = as_object(json, "request")?;

        let node = parse_node(require(request, keys::NODE)?, keys::NODE, true)?;
        let port = require_id(request, keys::EGRESS_PORT)?;
        let data = BASE64
            .decode(require_str(request, keys::PACKET)?)
            .map_err(|e| BridgeError::invalid(keys::PACKET, e.to_string()))?;

        let egress =
            PortRef::resolve(&node, &port).map_err(|e| BridgeError::parse(keys::EGRESS_PORT, e))?;

        if !self.topology.has_node(&node) {
            return Err(BridgeError::not_found("node", node.to_string()));
        }
        if !self.topology.has_port(&egress) {
            return Err(BridgeError::not_found("port", egress.to_string()));
        }

        let packet = OutboundPacket::new(egress, data);
        self.packet_service
            .transmit_data_packet(&packet)
            .into_result("transmit")?;

        debug!(port = %packet.egress, len = packet.data.len(), "Packet transmitted");
        Ok(packet)
    }
}

impl MessageHandler for PacketForwarder {
    fn on_message(&self, message: &BrokerMessage) {
        trace!("Received packet forwarding request");

        let result = parse_message(message).and_then(|json| self.translate_forward_request(&json));

        if let Err(e) = result {
            error!(error = %e, "Dropping packet forwarding request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Layer, RawPacket};
    use crate::services::{Status, StatusCode};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use sdnmq_types::NodeRef;
    use serde_json::json;

    #[derive(Default)]
    struct FakeSwitch {
        sent: Mutex<Vec<OutboundPacket>>,
        fail: bool,
    }

    impl TopologyService for FakeSwitch {
        fn has_node(&self, node: &NodeRef) -> bool {
            node.id() == "1"
        }

        fn has_port(&self, port: &PortRef) -> bool {
            matches!(port.id(), "1" | "2")
        }
    }

    impl DataPacketService for FakeSwitch {
        fn decode_data_packet(&self, _packet: &RawPacket) -> Vec<Layer> {
            Vec::new()
        }

        fn transmit_data_packet(&self, packet: &OutboundPacket) -> Status {
            if self.fail {
                return Status::failure(StatusCode::Unavailable, "link down");
            }
            self.sent.lock().push(packet.clone());
            Status::success()
        }
    }

    fn forwarder(switch: &Arc<FakeSwitch>) -> PacketForwarder {
        PacketForwarder::new(switch.clone(), switch.clone())
    }

    #[test]
    fn test_forward_packet() {
        let switch = Arc::new(FakeSwitch::default());
        let request = json!({
            "node": {"id": "1", "type": "OF"},
            "egressPort": "2",
            "packet": BASE64.encode([1u8, 2, 3]),
        });

        let packet = forwarder(&switch).translate_forward_request(&request).unwrap();
        assert_eq!(packet.egress.id(), "2");
        assert_eq!(packet.data, vec![1, 2, 3]);
        assert_eq!(*switch.sent.lock(), vec![packet]);
    }

    #[test]
    fn test_required_fields() {
        let switch = Arc::new(FakeSwitch::default());
        let f = forwarder(&switch);
        let cases = [
            (json!({"egressPort": "2", "packet": "AA=="}), "node"),
            (json!({"node": {"id": "1"}, "egressPort": "2", "packet": "AA=="}), "type"),
            (json!({"node": {"id": "1", "type": "OF"}, "packet": "AA=="}), "egressPort"),
            (json!({"node": {"id": "1", "type": "OF"}, "egressPort": "2"}), "packet"),
        ];
        for (request, field) in cases {
            assert_eq!(f.translate_forward_request(&request), Err(BridgeError::missing(field)));
        }
        assert!(switch.sent.lock().is_empty());
    }

    #[test]
    fn test_invalid_and_unknown_targets() {
        let switch = Arc::new(FakeSwitch::default());
        let f = forwarder(&switch);

        let bad_packet =
            json!({"node": {"id": "1", "type": "OF"}, "egressPort": "2", "packet": "!!"});
        assert!(matches!(
            f.translate_forward_request(&bad_packet),
            Err(BridgeError::InvalidFieldValue { ref field, .. }) if field == "packet"
        ));

        let bad_port =
            json!({"node": {"id": "1", "type": "OF"}, "egressPort": "eth0", "packet": "AA=="});
        assert!(matches!(
            f.translate_forward_request(&bad_port),
            Err(BridgeError::InvalidFieldValue { ref field, .. }) if field == "egressPort"
        ));

        let unknown_node =
            json!({"node": {"id": "9", "type": "OF"}, "egressPort": "2", "packet": "AA=="});
        assert!(matches!(
            f.translate_forward_request(&unknown_node),
            Err(BridgeError::NotFound { ref kind, .. }) if kind == "node"
        ));

        let unknown_port =
            json!({"node": {"id": "1", "type": "OF"}, "egressPort": "7", "packet": "AA=="});
        assert!(matches!(
            f.translate_forward_request(&unknown_port),
            Err(BridgeError::NotFound { ref kind, .. }) if kind == "port"
        ));

        assert!(switch.sent.lock().is_empty());
    }

    #[test]
    fn test_transmit_failure() {
        let switch = Arc::new(FakeSwitch {
            fail: true,
            ..FakeSwitch::default()
        });
        let request = json!({"node": {"id": "1", "type": "OF"}, "egressPort": 1, "packet": "AA=="});
        assert!(matches!(
            forwarder(&switch).translate_forward_request(&request),
            Err(BridgeError::ExternalServiceFailure { .. })
        ));
    }

    #[test]
    fn test_on_message() {
        let switch = Arc::new(FakeSwitch::default());
        let f = forwarder(&switch);
        f.on_message(&BrokerMessage::text("[]"));
        let request =
            json!({"node": {"id": "1", "type": "OF"}, "egressPort": "1", "packet": "AA=="});
        f.on_message(&BrokerMessage::text(request.to_string()));
        assert_eq!(switch.sent.lock().len(), 1);
    }
}
