//! In-memory controller.
//!
//! Implements the flow table, topology and packet services against a static
//! topology, for running the bridge without a real controller and for
//! end-to-end tests. Frames transmitted out of a linked port are delivered
//! as packet-in on the peer port, so a packet-out request on one end shows
//! up as a packet-in event on the other.

use crate::flow::FlowRule;
use crate::packet::{decode_frame, Layer, OutboundPacket, PacketResult, RawPacket};
use crate::services::{
    DataPacketListener, DataPacketService, FlowTableService, Status, StatusCode, TopologyService,
};
use parking_lot::RwLock;
use sdnmq_types::{NodeRef, PortRef};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct Inventory {
    ports: HashMap<NodeRef, BTreeSet<String>>,
    links: HashMap<PortRef, PortRef>,
}

/// Simulated controller with per-node flow tables.
#[derive(Default)]
pub struct SimulatedController {
    inventory: RwLock<Inventory>,
    flow_tables: RwLock<HashMap<NodeRef, Vec<FlowRule>>>,
    transmitted: RwLock<Vec<OutboundPacket>>,
    listeners: RwLock<Vec<Arc<dyn DataPacketListener>>>,
    unavailable: RwLock<bool>,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with the given ports. Adding a known node adds ports.
    pub fn add_node<I, S>(&self, node: NodeRef, ports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inventory = self.inventory.write();
        let entry = inventory.ports.entry(node.clone()).or_default();
        entry.extend(ports.into_iter().map(Into::into));
        info!(node = %node, ports = entry.len(), "Added node");
    }

    /// Connects two ports; frames sent out of one arrive at the other.
    pub fn add_link(&self, a: PortRef, b: PortRef) {
        debug!(a = %a, b = %b, "Added link");
        let mut inventory = self.inventory.write();
        inventory.links.insert(a.clone(), b.clone());
        inventory.links.insert(b, a);
    }

    pub fn nodes(&self) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = self.inventory.read().ports.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    /// Registers a receiver for packet-in frames.
    pub fn register_listener(&self, listener: Arc<dyn DataPacketListener>) {
        self.listeners.write().push(listener);
    }

    /// Makes every service call fail with `UNAVAILABLE` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    /// Rules currently installed on `node`, in installation order.
    pub fn flows(&self, node: &NodeRef) -> Vec<FlowRule> {
        self.flow_tables
            .read()
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    /// Every frame transmitted so far.
    pub fn transmitted(&self) -> Vec<OutboundPacket> {
        self.transmitted.read().clone()
    }

    /// Hands a frame received on `packet.ingress` to the listeners, in
    /// registration order, until one consumes it.
    pub fn punt(&self, packet: &RawPacket) -> PacketResult {
        let listeners = self.listeners.read().clone();
        let mut result = PacketResult::Ignored;

        for listener in listeners {
            match listener.receive_data_packet(packet) {
                PacketResult::Consumed => return PacketResult::Consumed,
                PacketResult::KeepProcessing => result = PacketResult::KeepProcessing,
                PacketResult::Ignored => {}
            }
        }
        result
    }

    fn check_available(&self) -> Option<Status> {
        if *self.unavailable.read() {
            Some(Status::failure(StatusCode::Unavailable, "controller unavailable"))
        } else {
            None
        }
    }

    fn check_node(&self, node: &NodeRef) -> Option<Status> {
        if let Some(status) = self.check_available() {
            return Some(status);
        }
        if !self.has_node(node) {
            return Some(Status::failure(StatusCode::NotFound, format!("node {}", node)));
        }
        None
    }
}

impl FlowTableService for SimulatedController {
    fn install(&self, node: &NodeRef, rule: &FlowRule) -> Status {
        if let Some(status) = self.check_node(node) {
            return status;
        }

        let mut tables = self.flow_tables.write();
        let table = tables.entry(node.clone()).or_default();
        if table.contains(rule) {
            return Status::failure(StatusCode::Conflict, "flow already installed");
        }
        table.push(rule.clone());
        Status::success()
    }

    fn replace(&self, node: &NodeRef, old: &FlowRule, new: &FlowRule) -> Status {
        if let Some(status) = self.check_node(node) {
            return status;
        }

        let mut tables = self.flow_tables.write();
        let table = tables.entry(node.clone()).or_default();
        match table.iter().position(|r| r == old) {
            Some(index) => {
                table[index] = new.clone();
                Status::success()
            }
            None => Status::failure(StatusCode::NotFound, "flow to modify not installed"),
        }
    }

    fn remove(&self, node: &NodeRef, rule: &FlowRule) -> Status {
        if let Some(status) = self.check_node(node) {
            return status;
        }

        let mut tables = self.flow_tables.write();
        let Some(table) = tables.get_mut(node) else {
            return Status::failure(StatusCode::NotFound, "flow to remove not installed");
        };
        match table.iter().position(|r| r == rule) {
            Some(index) => {
                table.remove(index);
                Status::success()
            }
            None => Status::failure(StatusCode::NotFound, "flow to remove not installed"),
        }
    }
}

impl TopologyService for SimulatedController {
    fn has_node(&self, node: &NodeRef) -> bool {
        self.inventory.read().ports.contains_key(node)
    }

    fn has_port(&self, port: &PortRef) -> bool {
        self.inventory
            .read()
            .ports
            .get(port.node())
            .is_some_and(|ports| ports.contains(port.id()))
    }
}

impl DataPacketService for SimulatedController {
    fn decode_data_packet(&self, packet: &RawPacket) -> Vec<Layer> {
        decode_frame(&packet.data)
    }

    fn transmit_data_packet(&self, packet: &OutboundPacket) -> Status {
        if let Some(status) = self.check_node(packet.node()) {
            return status;
        }
        if !self.has_port(&packet.egress) {
            return Status::failure(StatusCode::NotFound, format!("port {}", packet.egress));
        }

        self.transmitted.write().push(packet.clone());

        let peer = self.inventory.read().links.get(&packet.egress).cloned();
        if let Some(peer) = peer {
            debug!(from = %packet.egress, to = %peer, "Delivering frame over link");
            self.punt(&RawPacket::new(peer, packet.data.clone()));
        }
        Status::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{ActionSpec, MatchSpec};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn node(id: &str) -> NodeRef {
        NodeRef::openflow(id).unwrap()
    }

    fn port(n: &str, p: &str) -> PortRef {
        PortRef::resolve(&node(n), p).unwrap()
    }

    fn controller() -> SimulatedController {
        let c = SimulatedController::new();
        c.add_node(node("1"), ["1", "2"]);
        c.add_node(node("2"), ["1"]);
        c.add_link(port("1", "2"), port("2", "1"));
        c
    }

    fn rule(priority: i16) -> FlowRule {
        FlowRule::new(node("1"), MatchSpec::default(), vec![ActionSpec::Drop], priority)
    }

    #[test]
    fn test_topology() {
        let c = controller();
        assert_eq!(c.nodes(), vec![node("1"), node("2")]);
        assert!(c.has_node(&node("1")));
        assert!(!c.has_node(&node("3")));
        assert!(c.has_port(&port("1", "2")));
        assert!(!c.has_port(&port("2", "2")));
    }

    #[test]
    fn test_flow_table() {
        let c = controller();
        let n = node("1");

        assert!(c.install(&n, &rule(1)).is_success());
        assert_eq!(c.install(&n, &rule(1)).code, StatusCode::Conflict);
        assert!(c.replace(&n, &rule(1), &rule(2)).is_success());
        assert_eq!(c.flows(&n), vec![rule(2)]);
        assert_eq!(c.replace(&n, &rule(1), &rule(3)).code, StatusCode::NotFound);
        assert!(c.remove(&n, &rule(2)).is_success());
        assert!(c.flows(&n).is_empty());
        assert_eq!(c.remove(&n, &rule(2)).code, StatusCode::NotFound);

        assert_eq!(c.install(&node("9"), &rule(1)).code, StatusCode::NotFound);
    }

    #[test]
    fn test_unavailable() {
        let c = controller();
        c.set_unavailable(true);
        assert_eq!(c.install(&node("1"), &rule(1)).code, StatusCode::Unavailable);
        c.set_unavailable(false);
        assert!(c.install(&node("1"), &rule(1)).is_success());
    }

    #[derive(Default)]
    struct Recorder {
        packets: Mutex<Vec<RawPacket>>,
    }

    impl DataPacketListener for Recorder {
        fn receive_data_packet(&self, packet: &RawPacket) -> PacketResult {
            self.packets.lock().push(packet.clone());
            PacketResult::KeepProcessing
        }
    }

    #[test]
    fn test_transmit_over_link() {
        let c = controller();
        let recorder = Arc::new(Recorder::default());
        c.register_listener(recorder.clone());

        let out = OutboundPacket::new(port("1", "2"), vec![1, 2, 3]);
        assert!(c.transmit_data_packet(&out).is_success());
        assert_eq!(c.transmitted(), vec![out]);
        assert_eq!(
            *recorder.packets.lock(),
            vec![RawPacket::new(port("2", "1"), vec![1, 2, 3])]
        );

        // Port without a link: transmitted, nothing punted.
        let out = OutboundPacket::new(port("1", "1"), vec![4]);
        assert!(c.transmit_data_packet(&out).is_success());
        assert_eq!(recorder.packets.lock().len(), 1);

        let bad = OutboundPacket::new(port("2", "5"), vec![4]);
        assert_eq!(c.transmit_data_packet(&bad).code, StatusCode::NotFound);
    }

    #[test]
    fn test_punt_without_listeners() {
        let c = controller();
        assert_eq!(
            c.punt(&RawPacket::new(port("1", "1"), vec![0])),
            PacketResult::Ignored
        );
    }
}
