//! Flow programming requests.
//!
//! ```json
//! {
//!   "command": "add",
//!   "flowName": "web",
//!   "node": {"id": "00:00:00:00:00:00:00:01", "type": "OF"},
//!   "flow": {
//!     "match": {"etherType": 2048, "protocol": 6, "tpDst": 80},
//!     "actions": [{"action": "output", "port": "2"}],
//!     "priority": 100
//!   }
//! }
//! ```
//!
//! `delete` only needs `command` and `flowName`. Node `type` defaults to
//! `"OF"`, `priority` to 0.

use crate::attributes::{flow as flow_keys, flow_request as keys};
use crate::error::BridgeResult;
use crate::flow::{
    decode_action_list, decode_match, FlowCommand, FlowOutcome, FlowRegistry, FlowRule,
};
use crate::json::{as_object, get_int, parse_message, parse_node, require, require_str, Object};
use crate::listener::MessageHandler;
use crate::services::FlowTableService;
use sdnmq_broker::BrokerMessage;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, trace};

/// Translates flow programming requests into flow table operations.
pub struct FlowProgrammer {
    registry: FlowRegistry,
}

impl FlowProgrammer {
    pub fn new(flow_table: Arc<dyn FlowTableService>) -> Self {
        Self {
            registry: FlowRegistry::new(flow_table),
        }
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// Decodes and executes one flow programming request.
    ///
    /// Nothing is sent to the flow table unless the whole request decodes.
    pub fn translate_flow_request(&self, json: &Value) -> BridgeResult<FlowOutcome> {
        let request = as_object(json, "request")?;
        let command: FlowCommand = require_str(request, keys::COMMAND)?.parse()?;
        let flow_name = require_str(request, keys::FLOW_NAME)?;

        match command {
            FlowCommand::Add | FlowCommand::Modify => {
                let rule = decode_flow_rule(request)?;
                self.registry.install_or_replace(flow_name, rule)
            }
            FlowCommand::Delete => self.registry.remove(flow_name),
        }
    }
}

fn decode_flow_rule(request: &Object) -> BridgeResult<FlowRule> {
    let flow = as_object(require(request, keys::FLOW)?, keys::FLOW)?;
    let node = parse_node(require(request, keys::NODE)?, keys::NODE, false)?;

    let match_spec = decode_match(&node, require(flow, flow_keys::MATCH)?)?;
    let actions = decode_action_list(&node, require(flow, flow_keys::ACTIONS)?)?;
    let priority = get_int(flow, flow_keys::PRIORITY)?.map_or(0, |p| p as i16);

    Ok(FlowRule::new(node, match_spec, actions, priority))
}

impl MessageHandler for FlowProgrammer {
    fn on_message(&self, message: &BrokerMessage) {
        trace!("Received flow programming request");

        let result = parse_message(message).and_then(|json| {
            trace!(request = %json, "Flow programming request");
            self.translate_flow_request(&json)
        });

        if let Err(e) = result {
            error!(error = %e, "Dropping flow programming request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::flow::ActionSpec;
    use crate::services::Status;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use sdnmq_types::NodeRef;
    use serde_json::json;

    #[derive(Default)]
    struct CountingFlowTable {
        calls: Mutex<Vec<&'static str>>,
    }

    impl FlowTableService for CountingFlowTable {
        fn install(&self, _node: &NodeRef, _rule: &FlowRule) -> Status {
            self.calls.lock().push("install");
            Status::success()
        }

        fn replace(&self, _node: &NodeRef, _old: &FlowRule, _new: &FlowRule) -> Status {
            self.calls.lock().push("replace");
            Status::success()
        }

        fn remove(&self, _node: &NodeRef, _rule: &FlowRule) -> Status {
            self.calls.lock().push("remove");
            Status::success()
        }
    }

    fn setup() -> (Arc<CountingFlowTable>, FlowProgrammer) {
        let table = Arc::new(CountingFlowTable::default());
        let programmer = FlowProgrammer::new(table.clone());
        (table, programmer)
    }

    fn add_request(name: &str, priority: Value) -> Value {
        json!({
            "command": "add",
            "flowName": name,
            "node": {"id": "1"},
            "flow": {
                "match": {"etherType": 2048, "protocol": 17, "tpDst": 53},
                "actions": [{"action": "output", "port": "2"}],
                "priority": priority
            }
        })
    }

    #[test]
    fn test_add_modify_delete() {
        let (table, programmer) = setup();

        assert_eq!(
            programmer.translate_flow_request(&add_request("dns", json!(10))).unwrap(),
            FlowOutcome::Installed
        );
        let mut modify = add_request("dns", json!(20));
        modify["command"] = json!("modify");
        assert_eq!(
            programmer.translate_flow_request(&modify).unwrap(),
            FlowOutcome::Replaced
        );

        let rule = programmer.registry().get("dns").unwrap();
        assert_eq!(rule.priority, 20);
        assert_eq!(rule.node, NodeRef::openflow("1").unwrap());
        assert_eq!(rule.match_spec.tp_dst, Some(53));
        assert!(matches!(rule.actions.as_slice(), [ActionSpec::Output(p)] if p.id() == "2"));

        let delete = json!({"command": "delete", "flowName": "dns"});
        assert_eq!(
            programmer.translate_flow_request(&delete).unwrap(),
            FlowOutcome::Removed
        );
        assert!(programmer.registry().is_empty());
        assert_eq!(*table.calls.lock(), vec!["install", "replace", "remove"]);
    }

    #[test]
    fn test_modify_absent_flow_installs() {
        let (table, programmer) = setup();
        let mut modify = add_request("f", json!(1));
        modify["command"] = json!("modify");
        assert_eq!(
            programmer.translate_flow_request(&modify).unwrap(),
            FlowOutcome::Installed
        );
        assert_eq!(*table.calls.lock(), vec!["install"]);
    }

    #[test]
    fn test_priority_default_and_truncation() {
        let (_, programmer) = setup();
        let mut request = add_request("a", json!(0));
        request["flow"].as_object_mut().unwrap().remove("priority");
        programmer.translate_flow_request(&request).unwrap();
        assert_eq!(programmer.registry().get("a").unwrap().priority, 0);

        programmer.translate_flow_request(&add_request("b", json!(65535))).unwrap();
        assert_eq!(programmer.registry().get("b").unwrap().priority, -1);
    }

    #[test]
    fn test_missing_fields() {
        let (table, programmer) = setup();
        let cases = [
            (json!({"flowName": "f"}), "command"),
            (json!({"command": "add"}), "flowName"),
            (json!({"command": "add", "flowName": "f", "node": {"id": "1"}}), "flow"),
            (
                json!({"command": "add", "flowName": "f", "flow": {"match": {}, "actions": []}}),
                "node",
            ),
            (
                json!({
                    "command": "add", "flowName": "f", "node": {"id": "1"}, "flow": {"actions": []}
                }),
                "match",
            ),
            (
                json!({
                    "command": "add", "flowName": "f", "node": {"id": "1"}, "flow": {"match": {}}
                }),
                "actions",
            ),
        ];
        for (request, field) in cases {
            assert_eq!(
                programmer.translate_flow_request(&request),
                Err(BridgeError::missing(field))
            );
        }
        assert!(table.calls.lock().is_empty());
    }

    #[test]
    fn test_rejected_requests_have_no_side_effects() {
        let (table, programmer) = setup();

        let mut bad_action = add_request("f", json!(1));
        bad_action["flow"]["actions"] = json!([
            {"action": "output", "port": "1"},
            {"action": "flood"},
            {"action": "drop"}
        ]);
        assert_eq!(
            programmer.translate_flow_request(&bad_action),
            Err(BridgeError::unsupported("action", "flood"))
        );

        let mut bad_match = add_request("f", json!(1));
        bad_match["flow"]["match"] = json!({"tpDst": 80});
        assert_eq!(
            programmer.translate_flow_request(&bad_match),
            Err(BridgeError::dependency("tpDst", "protocol"))
        );

        assert_eq!(
            programmer.translate_flow_request(&json!({"command": "delete", "flowName": "f"})),
            Err(BridgeError::not_found("flow", "f"))
        );
        assert_eq!(
            programmer.translate_flow_request(&json!({"command": "purge", "flowName": "f"})),
            Err(BridgeError::unsupported("command", "purge"))
        );

        assert!(table.calls.lock().is_empty());
        assert!(programmer.registry().is_empty());
    }

    #[test]
    fn test_on_message_drops_bad_messages() {
        let (table, programmer) = setup();
        programmer.on_message(&BrokerMessage::bytes(vec![0x7b]));
        programmer.on_message(&BrokerMessage::text("{"));
        assert!(table.calls.lock().is_empty());

        programmer.on_message(&BrokerMessage::text(add_request("f", json!(5)).to_string()));
        assert!(programmer.registry().contains("f"));
    }
}
