//! JSON codec for flow actions.
//!
//! Each action is an object tagged by `action`:
//!
//! ```json
//! [
//!   {"action": "setNwDst", "nwAddress": "10.0.0.2"},
//!   {"action": "pushVLAN", "pcp": 0, "dei": 0, "vlanId": 100},
//!   {"action": "output", "port": "2"}
//! ]
//! ```

use crate::attributes::action_fields as keys;
use crate::error::{BridgeError, BridgeResult};
use crate::flow::types::{ActionSpec, ActionType};
use crate::json::{as_object, require_id, require_int, require_str, Object};
use sdnmq_types::{parse_net_address, DlAddress, NodeRef, PortRef};
use serde_json::{Map, Value};
use std::net::IpAddr;

/// Decodes one action for a flow programmed on `node`.
///
/// Integer fields are not range checked. `tpAddress` is narrowed to 16 bits,
/// and the `pushVLAN` fields are masked to their 802.1Q widths: `pcp` to
/// 3 bits, `dei` to 1 bit and `vlanId` to 12 bits. A `vlanId` of 4097
/// therefore pushes VLAN 1.
pub fn decode_action(node: &NodeRef, json: &Value) -> BridgeResult<ActionSpec> {
    let obj = as_object(json, "action")?;
    let action_type: ActionType = require_str(obj, keys::ACTION)?.parse()?;

    let action = match action_type {
        ActionType::Loopback => ActionSpec::Loopback,
        ActionType::Drop => ActionSpec::Drop,
        ActionType::Controller => ActionSpec::Controller,
        ActionType::PopVlan => ActionSpec::PopVlan,
        ActionType::Flood => {
            return Err(BridgeError::unsupported("action", action_type.as_str()));
        }
        ActionType::Output => {
            let port = require_id(obj, keys::PORT)?;
            ActionSpec::Output(
                PortRef::resolve(node, &port).map_err(|e| BridgeError::parse(keys::PORT, e))?,
            )
        }
        ActionType::SetDlSrc => ActionSpec::SetDlSrc(require_dl_address(obj)?),
        ActionType::SetDlDst => ActionSpec::SetDlDst(require_dl_address(obj)?),
        ActionType::SetNwSrc => ActionSpec::SetNwSrc(require_net_address(obj)?),
        ActionType::SetNwDst => ActionSpec::SetNwDst(require_net_address(obj)?),
        ActionType::SetTpSrc => ActionSpec::SetTpSrc(require_int(obj, keys::TP_ADDRESS)? as u16),
        ActionType::SetTpDst => ActionSpec::SetTpDst(require_int(obj, keys::TP_ADDRESS)? as u16),
        ActionType::PushVlan => ActionSpec::PushVlan {
            pcp: (require_int(obj, keys::PCP)? & 0x7) as u8,
            dei: (require_int(obj, keys::DEI)? & 0x1) as u8,
            vid: (require_int(obj, keys::VLAN_ID)? & 0xFFF) as u16,
        },
    };

    Ok(action)
}

/// Decodes an action list in order. The first bad element rejects the whole
/// list.
pub fn decode_action_list(node: &NodeRef, json: &Value) -> BridgeResult<Vec<ActionSpec>> {
    let items = json
        .as_array()
        .ok_or_else(|| BridgeError::invalid("actions", "expected a JSON array"))?;

    items.iter().map(|item| decode_action(node, item)).collect()
}

fn require_dl_address(obj: &Object) -> BridgeResult<DlAddress> {
    require_str(obj, keys::DL_ADDRESS)?
        .parse()
        .map_err(|e| BridgeError::parse(keys::DL_ADDRESS, e))
}

fn require_net_address(obj: &Object) -> BridgeResult<IpAddr> {
    parse_net_address(require_str(obj, keys::NW_ADDRESS)?)
        .map_err(|e| BridgeError::parse(keys::NW_ADDRESS, e))
}

/// Encodes one action.
pub fn encode_action(action: &ActionSpec) -> Value {
    let mut obj = Map::new();
    obj.insert(keys::ACTION.into(), Value::from(action.action_type().as_str()));

    match action {
        ActionSpec::Loopback | ActionSpec::Drop | ActionSpec::Controller | ActionSpec::PopVlan => {}
        ActionSpec::Output(port) => {
            obj.insert(keys::PORT.into(), Value::from(port.id()));
        }
        ActionSpec::SetDlSrc(addr) | ActionSpec::SetDlDst(addr) => {
            obj.insert(keys::DL_ADDRESS.into(), Value::from(addr.to_string()));
        }
        ActionSpec::SetNwSrc(addr) | ActionSpec::SetNwDst(addr) => {
            obj.insert(keys::NW_ADDRESS.into(), Value::from(addr.to_string()));
        }
        ActionSpec::SetTpSrc(port) | ActionSpec::SetTpDst(port) => {
            obj.insert(keys::TP_ADDRESS.into(), Value::from(*port));
        }
        ActionSpec::PushVlan { pcp, dei, vid } => {
            obj.insert(keys::PCP.into(), Value::from(*pcp));
            obj.insert(keys::DEI.into(), Value::from(*dei));
            obj.insert(keys::VLAN_ID.into(), Value::from(*vid));
        }
    }

    Value::Object(obj)
}

pub fn encode_action_list(actions: &[ActionSpec]) -> Value {
    Value::Array(actions.iter().map(encode_action).collect())
}
