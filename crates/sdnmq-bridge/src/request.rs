//! Typed builders for the requests the bridge consumes.
//!
//! Clients use these to produce the wire JSON instead of assembling it by
//! hand.

use crate::attributes::{flow as flow_keys, flow_request, forward_request};
use crate::flow::{encode_action_list, encode_match, FlowCommand, FlowRule};
use crate::json::node_to_json;
use crate::packet::OutboundPacket;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sdnmq_broker::BrokerMessage;
use serde_json::{Map, Value};

/// A flow programming request.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowProgrammerRequest {
    pub command: FlowCommand,
    pub flow_name: String,
    /// Absent for deletes.
    pub rule: Option<FlowRule>,
}

impl FlowProgrammerRequest {
    pub fn add(flow_name: impl Into<String>, rule: FlowRule) -> Self {
        Self {
            command: FlowCommand::Add,
            flow_name: flow_name.into(),
            rule: Some(rule),
        }
    }

    pub fn modify(flow_name: impl Into<String>, rule: FlowRule) -> Self {
        Self {
            command: FlowCommand::Modify,
            flow_name: flow_name.into(),
            rule: Some(rule),
        }
    }

    pub fn delete(flow_name: impl Into<String>) -> Self {
        Self {
            command: FlowCommand::Delete,
            flow_name: flow_name.into(),
            rule: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(flow_request::COMMAND.into(), Value::from(self.command.as_str()));
        obj.insert(flow_request::FLOW_NAME.into(), Value::from(self.flow_name.as_str()));

        if let Some(rule) = &self.rule {
            obj.insert(flow_request::NODE.into(), node_to_json(&rule.node));

            let mut flow = Map::new();
            flow.insert(flow_keys::MATCH.into(), encode_match(&rule.match_spec));
            flow.insert(flow_keys::ACTIONS.into(), encode_action_list(&rule.actions));
            flow.insert(flow_keys::PRIORITY.into(), Value::from(rule.priority));
            obj.insert(flow_request::FLOW.into(), Value::Object(flow));
        }

        Value::Object(obj)
    }

    pub fn to_message(&self) -> BrokerMessage {
        BrokerMessage::text(self.to_json().to_string())
    }
}

/// A packet forwarding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketForwardRequest {
    pub packet: OutboundPacket,
}

impl PacketForwardRequest {
    pub fn new(packet: OutboundPacket) -> Self {
        Self { packet }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(forward_request::NODE.into(), node_to_json(self.packet.node()));
        obj.insert(
            forward_request::EGRESS_PORT.into(),
            Value::from(self.packet.egress.id()),
        );
        obj.insert(
            forward_request::PACKET.into(),
            Value::from(BASE64.encode(&self.packet.data)),
        );
        Value::Object(obj)
    }

    pub fn to_message(&self) -> BrokerMessage {
        BrokerMessage::text(self.to_json().to_string())
    }
}
