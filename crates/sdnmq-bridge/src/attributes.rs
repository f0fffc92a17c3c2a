//! JSON keys and message attribute names of the wire format.

/// Flow programming requests
pub mod flow_request {
    pub const COMMAND: &str = "command";
    pub const FLOW_NAME: &str = "flowName";
    pub const NODE: &str = "node";
    pub const FLOW: &str = "flow";
}

/// Flow objects inside flow programming requests
pub mod flow {
    pub const MATCH: &str = "match";
    pub const ACTIONS: &str = "actions";
    pub const PRIORITY: &str = "priority";
}

/// Node objects
pub mod node {
    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
}

/// Match fields
pub mod match_fields {
    pub const INGRESS_PORT: &str = "ingressPort";
    pub const DL_SRC: &str = "dlSrc";
    pub const DL_DST: &str = "dlDst";
    pub const DL_VLAN: &str = "dlVlan";
    pub const DL_VLAN_PR: &str = "dlVlanPriority";
    pub const DL_TYPE: &str = "etherType";
    pub const NW_SRC: &str = "nwSrc";
    pub const NW_SRC_MASK: &str = "nwSrcMask";
    pub const NW_DST: &str = "nwDst";
    pub const NW_DST_MASK: &str = "nwDstMask";
    pub const NW_TOS: &str = "nwTos";
    pub const NW_PROTO: &str = "protocol";
    pub const TP_SRC: &str = "tpSrc";
    pub const TP_DST: &str = "tpDst";
}

/// Action fields
pub mod action_fields {
    pub const ACTION: &str = "action";
    pub const PORT: &str = "port";
    pub const DL_ADDRESS: &str = "dlAddress";
    pub const NW_ADDRESS: &str = "nwAddress";
    pub const TP_ADDRESS: &str = "tpAddress";
    pub const PCP: &str = "pcp";
    pub const DEI: &str = "dei";
    pub const VLAN_ID: &str = "vlanId";
}

/// Packet forwarding requests
pub mod forward_request {
    pub const NODE: &str = "node";
    pub const EGRESS_PORT: &str = "egressPort";
    pub const PACKET: &str = "packet";
}

/// Packet-in JSON documents
pub mod packet_in {
    pub const NODE: &str = "node";
    pub const INGRESS_PORT: &str = "ingressPort";
    pub const DL_SRC: &str = "dlSrc";
    pub const DL_DST: &str = "dlDst";
    pub const DL_TYPE: &str = "etherType";
    pub const DL_VLAN: &str = "dlVlan";
    pub const DL_VLAN_PR: &str = "dlVlanPriority";
    pub const NW_SRC: &str = "nwSrc";
    pub const NW_DST: &str = "nwDst";
    pub const NW_TOS: &str = "nwTos";
    pub const NW_PROTO: &str = "protocol";
    pub const TP_SRC: &str = "tpSrc";
    pub const TP_DST: &str = "tpDst";
    pub const PACKET: &str = "packet";
}

/// Broker attributes set on packet-in messages, for subscriber filters
pub mod filter_attributes {
    pub const NODE: &str = "node";
    pub const NODE_TYPE: &str = "nodeType";
    pub const INGRESS_PORT: &str = "ingressPort";
    pub const DL_SRC: &str = "dlSrc";
    pub const DL_DST: &str = "dlDst";
    pub const DL_TYPE: &str = "etherType";
    pub const DL_VLAN: &str = "dlVlan";
    pub const DL_VLAN_PR: &str = "dlVlanPriority";
    pub const NW_SRC: &str = "nwSrc";
    pub const NW_SRC_BINARY: &str = "nwSrcBin";
    pub const NW_DST: &str = "nwDst";
    pub const NW_DST_BINARY: &str = "nwDstBin";
    pub const NW_TOS: &str = "nwTos";
    pub const NW_PROTO: &str = "protocol";
    pub const TP_SRC: &str = "tpSrc";
    pub const TP_DST: &str = "tpDst";
}

// Default destinations
pub const DEFAULT_FLOW_PROGRAMMER_QUEUE: &str = "org.sdnmq.flowprogrammer";
pub const DEFAULT_PACKET_OUT_QUEUE: &str = "org.sdnmq.packetout";
pub const DEFAULT_PACKET_IN_TOPIC: &str = "org.sdnmq.packetin";
