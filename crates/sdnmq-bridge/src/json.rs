//! Field accessors over `serde_json` documents.
//!
//! Integer fields accept JSON numbers as well as decimal strings; requesters
//! send either.

use crate::attributes::node as node_keys;
use crate::error::{BridgeError, BridgeResult};
use sdnmq_broker::BrokerMessage;
use sdnmq_types::{NodeRef, NODE_TYPE_OF};
use serde_json::{Map, Value};

pub(crate) type Object = Map<String, Value>;

/// Parses the body of a text message as JSON.
pub(crate) fn parse_message(message: &BrokerMessage) -> BridgeResult<Value> {
    let text = message
        .body_text()
        .ok_or_else(|| BridgeError::malformed("not a text message"))?;
    serde_json::from_str(text).map_err(|e| BridgeError::malformed(e.to_string()))
}

/// Interprets `value` as the JSON object named `field`.
pub(crate) fn as_object<'a>(value: &'a Value, field: &str) -> BridgeResult<&'a Object> {
    value
        .as_object()
        .ok_or_else(|| BridgeError::invalid(field, "expected a JSON object"))
}

pub(crate) fn require<'a>(obj: &'a Object, key: &str) -> BridgeResult<&'a Value> {
    obj.get(key).ok_or_else(|| BridgeError::missing(key))
}

/// Reads an optional string field.
pub(crate) fn get_str<'a>(obj: &'a Object, key: &str) -> BridgeResult<Option<&'a str>> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(BridgeError::invalid(key, "expected a string")),
    }
}

pub(crate) fn require_str<'a>(obj: &'a Object, key: &str) -> BridgeResult<&'a str> {
    get_str(obj, key)?.ok_or_else(|| BridgeError::missing(key))
}

/// Reads an optional textual id. Numbers are accepted and rendered in
/// decimal, so `"port": 1` and `"port": "1"` are equivalent.
pub(crate) fn get_id(obj: &Object, key: &str) -> BridgeResult<Option<String>> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => Ok(Some(n.to_string())),
        Some(_) => Err(BridgeError::invalid(key, "expected a string or integer")),
    }
}

pub(crate) fn require_id(obj: &Object, key: &str) -> BridgeResult<String> {
    get_id(obj, key)?.ok_or_else(|| BridgeError::missing(key))
}

/// Reads an optional integer field given as JSON integer or decimal string.
pub(crate) fn get_int(obj: &Object, key: &str) -> BridgeResult<Option<i64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| BridgeError::invalid(key, format!("{} is not a 64-bit integer", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| BridgeError::invalid(key, format!("'{}' is not a decimal integer", s))),
        Some(_) => Err(BridgeError::invalid(key, "expected an integer")),
    }
}

pub(crate) fn require_int(obj: &Object, key: &str) -> BridgeResult<i64> {
    get_int(obj, key)?.ok_or_else(|| BridgeError::missing(key))
}

/// Parses a node object `{id, type}` found under `field`.
///
/// When `type` is absent it defaults to `"OF"` unless `type_required` is set.
pub(crate) fn parse_node(value: &Value, field: &str, type_required: bool) -> BridgeResult<NodeRef> {
    let obj = as_object(value, field)?;
    let id = require_id(obj, node_keys::ID)?;
    let node_type = match get_str(obj, node_keys::TYPE)? {
        Some(t) => t,
        None if type_required => return Err(BridgeError::missing(node_keys::TYPE)),
        None => NODE_TYPE_OF,
    };
    NodeRef::new(node_type, id).map_err(|e| BridgeError::parse(field, e))
}

/// Serializes a node as `{id, type}`.
pub(crate) fn node_to_json(node: &NodeRef) -> Value {
    let mut obj = Object::new();
    obj.insert(node_keys::ID.to_string(), Value::from(node.id()));
    obj.insert(node_keys::TYPE.to_string(), Value::from(node.node_type()));
    Value::Object(obj)
}
