//! Packet-in events.
//!
//! Every frame the controller hands to the bridge is projected into a JSON
//! document (the message body) and a flat set of broker attributes, and
//! published on the packet-in topic:
//!
//! ```json
//! {
//!   "node": {"id": "1", "type": "OF"},
//!   "ingressPort": "3",
//!   "dlSrc": "00:00:00:00:00:01",
//!   "dlDst": "00:00:00:00:00:02",
//!   "etherType": 2048,
//!   "nwSrc": "10.0.0.1",
//!   "nwDst": "10.0.0.2",
//!   "nwTos": 0,
//!   "protocol": 17,
//!   "tpSrc": 68,
//!   "tpDst": 67,
//!   "packet": "AAAAAAACAAAAAAABCABFAA..."
//! }
//! ```
//!
//! The attributes carry the same fields plus `nwSrcBin`/`nwDstBin`, the
//! 32 character binary form of the IPv4 addresses, so subscribers can filter
//! on subnets with a prefix match.

use crate::attributes::{filter_attributes as attr, packet_in as keys};
use crate::json::node_to_json;
use crate::packet::layer::Layer;
use crate::packet::RawPacket;
use crate::services::{DataPacketListener, DataPacketService};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sdnmq_broker::{AttributeValue, BrokerMessage, MessagePublisher};
use sdnmq_types::{ipv4_to_binary_text, ipv4_to_text, mac_to_text};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Broker attributes of one packet-in event.
pub type FilterAttributes = BTreeMap<String, AttributeValue>;

/// JSON body and attributes of one packet-in event.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketInProjection {
    pub document: Value,
    pub attributes: FilterAttributes,
}

impl PacketInProjection {
    /// Builds the broker message for this event.
    pub fn into_message(self) -> BrokerMessage {
        let mut message = BrokerMessage::text(self.document.to_string());
        message.attributes = self.attributes;
        message
    }
}

/// Accumulates the document and the attributes side by side.
struct Projector {
    document: Map<String, Value>,
    attributes: FilterAttributes,
    tagged: bool,
}

impl Projector {
    fn new() -> Self {
        Self {
            document: Map::new(),
            attributes: FilterAttributes::new(),
            tagged: false,
        }
    }

    fn set<V>(&mut self, key: &str, attr_key: &str, value: V)
    where
        V: Into<Value> + Into<AttributeValue> + Clone,
    {
        self.document
            .insert(key.to_string(), Into::<Value>::into(value.clone()));
        self.attributes
            .insert(attr_key.to_string(), Into::<AttributeValue>::into(value));
    }

    fn visit(&mut self, layer: &Layer) {
        match layer {
            Layer::Ethernet(eth) => {
                self.set(keys::DL_SRC, attr::DL_SRC, mac_to_text(&eth.src));
                self.set(keys::DL_DST, attr::DL_DST, mac_to_text(&eth.dst));
                self.set(keys::DL_TYPE, attr::DL_TYPE, eth.ether_type);
            }
            Layer::Dot1Q(tag) => {
                // With stacked tags the outermost one identifies the VLAN.
                if self.tagged {
                    trace!(vlan = tag.vlan_id, "Skipping inner 802.1q tag");
                    return;
                }
                self.tagged = true;
                self.set(keys::DL_VLAN, attr::DL_VLAN, tag.vlan_id);
                self.set(keys::DL_VLAN_PR, attr::DL_VLAN_PR, tag.priority);
            }
            Layer::Ipv4(ip) => {
                let src = u32::from(ip.src);
                let dst = u32::from(ip.dst);
                self.set(keys::NW_SRC, attr::NW_SRC, ipv4_to_text(src));
                self.attributes
                    .insert(attr::NW_SRC_BINARY.to_string(), ipv4_to_binary_text(src).into());
                self.set(keys::NW_DST, attr::NW_DST, ipv4_to_text(dst));
                self.attributes
                    .insert(attr::NW_DST_BINARY.to_string(), ipv4_to_binary_text(dst).into());
                self.set(keys::NW_TOS, attr::NW_TOS, ip.tos);
                self.set(keys::NW_PROTO, attr::NW_PROTO, ip.protocol);
            }
            Layer::Tcp(tp) | Layer::Udp(tp) => {
                self.set(keys::TP_SRC, attr::TP_SRC, tp.src_port);
                self.set(keys::TP_DST, attr::TP_DST, tp.dst_port);
            }
            Layer::Unknown { offset, reason } => {
                debug!(offset, reason = %reason, "Payload not projected");
            }
        }
    }
}

/// Projects a received frame and its decoded layers.
///
/// Never fails: layers that cannot be projected are skipped.
pub fn project(raw: &RawPacket, layers: &[Layer]) -> PacketInProjection {
    let mut projector = Projector::new();
    let node = raw.node();

    projector
        .document
        .insert(keys::NODE.to_string(), node_to_json(node));
    projector
        .attributes
        .insert(attr::NODE.to_string(), node.id().into());
    projector
        .attributes
        .insert(attr::NODE_TYPE.to_string(), node.node_type().into());
    projector.set(keys::INGRESS_PORT, attr::INGRESS_PORT, raw.ingress.id().to_string());

    for layer in layers {
        projector.visit(layer);
    }

    projector
        .document
        .insert(keys::PACKET.to_string(), Value::from(BASE64.encode(&raw.data)));

    PacketInProjection {
        document: Value::Object(projector.document),
        attributes: projector.attributes,
    }
}

/// What the controller should do with a packet after a listener saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketResult {
    /// Stop handing the packet to further listeners.
    Consumed,
    /// Let other listeners see the packet too.
    KeepProcessing,
    /// The listener did not handle the packet.
    Ignored,
}

/// Receives packets from the controller and queues packet-in events.
///
/// Projection happens on the controller's thread; publishing is done by
/// [`run_publisher`] so the controller never waits on the broker.
pub struct PacketInHandler {
    packet_service: Arc<dyn DataPacketService>,
    outbox: mpsc::UnboundedSender<BrokerMessage>,
}

impl PacketInHandler {
    /// Creates the handler and the queue drained by [`run_publisher`].
    pub fn new(
        packet_service: Arc<dyn DataPacketService>,
    ) -> (Self, mpsc::UnboundedReceiver<BrokerMessage>) {
        let (outbox, events) = mpsc::unbounded_channel();
        (
            Self {
                packet_service,
                outbox,
            },
            events,
        )
    }

    pub fn receive_data_packet(&self, raw: &RawPacket) -> PacketResult {
        trace!(port = %raw.ingress, len = raw.data.len(), "Received data packet");

        let layers = self.packet_service.decode_data_packet(raw);
        let message = project(raw, &layers).into_message();

        match self.outbox.send(message) {
            Ok(()) => PacketResult::KeepProcessing,
            Err(_) => {
                warn!(port = %raw.ingress, "Packet-in publisher stopped, dropping packet");
                PacketResult::Ignored
            }
        }
    }
}

impl DataPacketListener for PacketInHandler {
    fn receive_data_packet(&self, raw: &RawPacket) -> PacketResult {
        PacketInHandler::receive_data_packet(self, raw)
    }
}

/// Publishes queued packet-in events until the queue closes or `shutdown`
/// is cancelled. Returns the number of events published.
pub async fn run_publisher<P>(
    mut events: mpsc::UnboundedReceiver<BrokerMessage>,
    publisher: P,
    shutdown: CancellationToken,
) -> u64
where
    P: MessagePublisher,
{
    let mut published: u64 = 0;

    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            message = events.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        match publisher.publish(message).await {
            Ok(()) => published += 1,
            Err(e) => warn!(error = %e, "Failed to publish packet-in event"),
        }
    }

    debug!(published, "Packet-in publisher stopped");
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::builder::{FrameBuilder, Transport};
    use crate::packet::decode::decode_frame;
    use crate::packet::OutboundPacket;
    use crate::services::Status;
    use pretty_assertions::assert_eq;
    use sdnmq_broker::{AttributeFilter, MemoryBroker, MessageReceiver};
    use sdnmq_types::{NodeRef, PortRef};
    use serde_json::json;
    use std::net::Ipv4Addr;

    fn ingress() -> PortRef {
        PortRef::resolve(&NodeRef::openflow("1").unwrap(), "3").unwrap()
    }

    fn tcp_frame() -> Vec<u8> {
        FrameBuilder::new([0, 0, 0, 0, 0, 1], [0, 0, 0, 0, 0, 2])
            .vlan(5, 100)
            .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
            .transport(Transport::Tcp, 1024, 80)
            .build().unwrap()
    }

    #[test]
    fn test_project_tagged_tcp() {
        let raw = RawPacket::new(ingress(), tcp_frame());
        let projection = project(&raw, &decode_frame(&raw.data));

        assert_eq!(
            projection.document,
            json!({
                "node": {"id": "1", "type": "OF"},
                "ingressPort": "3",
                "dlSrc": "00:00:00:00:00:01",
                "dlDst": "00:00:00:00:00:02",
                "etherType": 0x8100,
                "dlVlan": 100,
                "dlVlanPriority": 5,
                "nwSrc": "10.0.0.1",
                "nwDst": "10.0.0.2",
                "nwTos": 0,
                "protocol": 6,
                "tpSrc": 1024,
                "tpDst": 80,
                "packet": BASE64.encode(&raw.data),
            })
        );

        let attrs = &projection.attributes;
        assert_eq!(attrs["node"], AttributeValue::from("1"));
        assert_eq!(attrs["nodeType"], AttributeValue::from("OF"));
        assert_eq!(attrs["ingressPort"], AttributeValue::from("3"));
        assert_eq!(attrs["dlVlan"], AttributeValue::Int(100));
        assert_eq!(attrs["nwSrc"], AttributeValue::from("10.0.0.1"));
        assert_eq!(
            attrs["nwSrcBin"],
            AttributeValue::from("00001010000000000000000000000001")
        );
        assert_eq!(
            attrs["nwDstBin"],
            AttributeValue::from("00001010000000000000000000000010")
        );
        assert_eq!(attrs["protocol"], AttributeValue::Int(6));
        assert_eq!(attrs["tpDst"], AttributeValue::Int(80));
        assert!(!attrs.contains_key("packet"));
        assert_eq!(attrs.len(), 16);
    }

    #[test]
    fn test_project_unknown_layers() {
        let raw = RawPacket::new(ingress(), vec![0u8; 4]);
        let projection = project(&raw, &decode_frame(&raw.data));

        assert_eq!(
            projection.document,
            json!({
                "node": {"id": "1", "type": "OF"},
                "ingressPort": "3",
                "packet": "AAAAAA==",
            })
        );
        assert_eq!(projection.attributes.len(), 3);
    }

    struct Decoder;

    impl DataPacketService for Decoder {
        fn decode_data_packet(&self, packet: &RawPacket) -> Vec<Layer> {
            decode_frame(&packet.data)
        }

        fn transmit_data_packet(&self, _packet: &OutboundPacket) -> Status {
            Status::success()
        }
    }

    #[tokio::test]
    async fn test_receive_and_publish() {
        let broker = MemoryBroker::new();
        let filter = AttributeFilter::subnet("nwDstBin", Ipv4Addr::new(10, 0, 0, 0), 24).unwrap();
        let mut subscription = broker.subscribe("packetin", filter);

        let (handler, events) = PacketInHandler::new(Arc::new(Decoder));
        assert_eq!(
            handler.receive_data_packet(&RawPacket::new(ingress(), tcp_frame())),
            PacketResult::KeepProcessing
        );
        drop(handler);

        let published = run_publisher(
            events,
            broker.topic_publisher("packetin"),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(published, 1);

        let message = subscription.receive().await.unwrap().unwrap();
        let body: Value = serde_json::from_str(message.body_text().unwrap()).unwrap();
        assert_eq!(body["tpDst"], json!(80));
        assert_eq!(message.attribute("tpSrc"), Some(&AttributeValue::Int(1024)));
    }

    #[test]
    fn test_receive_without_publisher() {
        let (handler, events) = PacketInHandler::new(Arc::new(Decoder));
        drop(events);
        assert_eq!(
            handler.receive_data_packet(&RawPacket::new(ingress(), tcp_frame())),
            PacketResult::Ignored
        );
    }
}
