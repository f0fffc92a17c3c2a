//! JSON codec for flow matches.
//!
//! ```json
//! {
//!   "ingressPort": "1",
//!   "etherType": 2048,
//!   "nwSrc": "10.0.0.0",
//!   "nwSrcMask": "255.0.0.0",
//!   "protocol": 6,
//!   "tpDst": 80
//! }
//! ```
//!
//! Only present keys are read; everything else stays a wildcard. Integer
//! fields are narrowed to their bit width by masking.

use crate::attributes::match_fields as keys;
use crate::error::{BridgeError, BridgeResult};
use crate::flow::types::{MatchSpec, NetMatch};
use crate::json::{as_object, get_id, get_int, get_str, Object};
use sdnmq_types::{parse_net_address, DlAddress, NodeRef, PortRef};
use serde_json::{Map, Value};
use std::net::IpAddr;
use tracing::debug;

/// Decodes a match object for a flow programmed on `node`.
///
/// The first malformed field aborts decoding.
pub fn decode_match(node: &NodeRef, json: &Value) -> BridgeResult<MatchSpec> {
    let obj = as_object(json, "match")?;
    let mut spec = MatchSpec::default();

    if let Some(port) = get_id(obj, keys::INGRESS_PORT)? {
        spec.in_port = Some(
            PortRef::resolve(node, &port).map_err(|e| BridgeError::parse(keys::INGRESS_PORT, e))?,
        );
    }

    spec.dl_src = get_dl_address(obj, keys::DL_SRC)?;
    spec.dl_dst = get_dl_address(obj, keys::DL_DST)?;

    spec.dl_vlan = get_int(obj, keys::DL_VLAN)?.map(|v| (v & 0xFFF) as u16);
    spec.dl_vlan_pr = get_int(obj, keys::DL_VLAN_PR)?.map(|v| (v & 0x7) as u8);
    spec.dl_type = get_int(obj, keys::DL_TYPE)?.map(|v| v as u16);

    spec.nw_src = get_net_match(obj, keys::NW_SRC, keys::NW_SRC_MASK)?;
    spec.nw_dst = get_net_match(obj, keys::NW_DST, keys::NW_DST_MASK)?;

    spec.nw_tos = get_int(obj, keys::NW_TOS)?.map(|v| v as u8);
    spec.nw_proto = get_int(obj, keys::NW_PROTO)?.map(|v| v as u8);

    spec.tp_src = get_transport_port(obj, keys::TP_SRC, &spec)?;
    spec.tp_dst = get_transport_port(obj, keys::TP_DST, &spec)?;

    Ok(spec)
}

fn get_dl_address(obj: &Object, key: &str) -> BridgeResult<Option<DlAddress>> {
    get_str(obj, key)?
        .map(|text| text.parse::<DlAddress>().map_err(|e| BridgeError::parse(key, e)))
        .transpose()
}

fn get_net_address(obj: &Object, key: &str) -> BridgeResult<Option<IpAddr>> {
    get_str(obj, key)?
        .map(|text| parse_net_address(text).map_err(|e| BridgeError::parse(key, e)))
        .transpose()
}

fn get_net_match(obj: &Object, addr_key: &str, mask_key: &str) -> BridgeResult<Option<NetMatch>> {
    let mask = get_net_address(obj, mask_key)?;
    let addr = get_net_address(obj, addr_key)?;

    match (addr, mask) {
        (Some(addr), mask) => Ok(Some(NetMatch { addr, mask })),
        (None, Some(_)) => {
            debug!("Ignoring {} without {}", mask_key, addr_key);
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

fn get_transport_port(obj: &Object, key: &str, spec: &MatchSpec) -> BridgeResult<Option<u16>> {
    let Some(port) = get_int(obj, key)? else {
        return Ok(None);
    };
    if spec.nw_proto.is_none() {
        return Err(BridgeError::dependency(key, keys::NW_PROTO));
    }
    Ok(Some(port as u16))
}

/// Encodes a match, emitting exactly the fields that are set.
pub fn encode_match(spec: &MatchSpec) -> Value {
    let mut obj = Map::new();

    if let Some(port) = &spec.in_port {
        obj.insert(keys::INGRESS_PORT.into(), Value::from(port.id()));
    }
    if let Some(addr) = &spec.dl_src {
        obj.insert(keys::DL_SRC.into(), Value::from(addr.to_string()));
    }
    if let Some(addr) = &spec.dl_dst {
        obj.insert(keys::DL_DST.into(), Value::from(addr.to_string()));
    }
    if let Some(vlan) = spec.dl_vlan {
        obj.insert(keys::DL_VLAN.into(), Value::from(vlan));
    }
    if let Some(pr) = spec.dl_vlan_pr {
        obj.insert(keys::DL_VLAN_PR.into(), Value::from(pr));
    }
    if let Some(dl_type) = spec.dl_type {
        obj.insert(keys::DL_TYPE.into(), Value::from(dl_type));
    }
    insert_net_match(&mut obj, keys::NW_SRC, keys::NW_SRC_MASK, spec.nw_src.as_ref());
    insert_net_match(&mut obj, keys::NW_DST, keys::NW_DST_MASK, spec.nw_dst.as_ref());
    if let Some(tos) = spec.nw_tos {
        obj.insert(keys::NW_TOS.into(), Value::from(tos));
    }
    if let Some(proto) = spec.nw_proto {
        obj.insert(keys::NW_PROTO.into(), Value::from(proto));
    }
    if let Some(port) = spec.tp_src {
        obj.insert(keys::TP_SRC.into(), Value::from(port));
    }
    if let Some(port) = spec.tp_dst {
        obj.insert(keys::TP_DST.into(), Value::from(port));
    }

    Value::Object(obj)
}

fn insert_net_match(
    obj: &mut Map<String, Value>,
    addr_key: &str,
    mask_key: &str,
    nw: Option<&NetMatch>,
) {
    if let Some(nw) = nw {
        obj.insert(addr_key.into(), Value::from(nw.addr.to_string()));
        if let Some(mask) = &nw.mask {
            obj.insert(mask_key.into(), Value::from(mask.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node() -> NodeRef {
        NodeRef::openflow("1").unwrap()
    }

    #[test]
    fn test_only_present_fields_are_set() {
        let spec = decode_match(&node(), &json!({"ingressPort": "1"})).unwrap();
        assert_eq!(
            spec,
            MatchSpec {
                in_port: Some(PortRef::resolve(&node(), "1").unwrap()),
                ..MatchSpec::default()
            }
        );
        assert_eq!(encode_match(&spec), json!({"ingressPort": "1"}));
    }

    #[test]
    fn test_empty_match_is_wildcard() {
        let spec = decode_match(&node(), &json!({})).unwrap();
        assert!(spec.is_wildcard());
        assert_eq!(encode_match(&spec), json!({}));
    }

    #[test]
    fn test_decode_full_match() {
        let json = json!({
            "ingressPort": 3,
            "dlSrc": "00:00:00:00:00:01",
            "dlDst": "00:00:00:00:00:02",
            "dlVlan": 100,
            "dlVlanPriority": "5",
            "etherType": 2048,
            "nwSrc": "10.0.0.0",
            "nwSrcMask": "255.0.0.0",
            "nwDst": "10.0.0.2",
            "nwTos": 16,
            "protocol": 6,
            "tpSrc": "1024",
            "tpDst": 80
        });
        let spec = decode_match(&node(), &json).unwrap();

        assert_eq!(spec.in_port.as_ref().map(|p| p.id()), Some("3"));
        assert_eq!(spec.dl_src.as_ref().unwrap().as_bytes(), &[0, 0, 0, 0, 0, 1]);
        assert_eq!(spec.dl_vlan, Some(100));
        assert_eq!(spec.dl_vlan_pr, Some(5));
        assert_eq!(spec.dl_type, Some(0x0800));
        assert_eq!(
            spec.nw_src,
            Some(NetMatch::masked("10.0.0.0".parse().unwrap(), "255.0.0.0".parse().unwrap()))
        );
        assert_eq!(spec.nw_dst, Some(NetMatch::exact("10.0.0.2".parse().unwrap())));
        assert_eq!(spec.nw_tos, Some(16));
        assert_eq!(spec.nw_proto, Some(6));
        assert_eq!(spec.tp_src, Some(1024));
        assert_eq!(spec.tp_dst, Some(80));

        let reencoded = decode_match(&node(), &encode_match(&spec)).unwrap();
        assert_eq!(reencoded, spec);
    }

    #[test]
    fn test_transport_port_requires_protocol() {
        let err = decode_match(&node(), &json!({"tpSrc": 80})).unwrap_err();
        assert_eq!(err, BridgeError::dependency("tpSrc", "protocol"));

        let err = decode_match(&node(), &json!({"tpDst": 80})).unwrap_err();
        assert_eq!(err, BridgeError::dependency("tpDst", "protocol"));

        let spec = decode_match(&node(), &json!({"tpSrc": 80, "protocol": 17})).unwrap();
        assert_eq!(spec.tp_src, Some(80));
        assert_eq!(spec.nw_proto, Some(17));
    }

    #[test]
    fn test_out_of_range_values_are_truncated() {
        let spec = decode_match(
            &node(),
            &json!({"dlVlan": 4097, "dlVlanPriority": 9, "etherType": 65537, "nwTos": 257}),
        )
        .unwrap();
        assert_eq!(spec.dl_vlan, Some(1));
        assert_eq!(spec.dl_vlan_pr, Some(1));
        assert_eq!(spec.dl_type, Some(1));
        assert_eq!(spec.nw_tos, Some(1));
    }

    #[test]
    fn test_malformed_fields_name_the_field() {
        let cases = [
            (json!({"dlSrc": "00:zz"}), "dlSrc"),
            (json!({"dlDst": 5}), "dlDst"),
            (json!({"nwSrc": "host.example"}), "nwSrc"),
            (json!({"nwDst": "10.0.0.1", "nwDstMask": "bogus"}), "nwDstMask"),
            (json!({"dlVlan": "ten"}), "dlVlan"),
            (json!({"ingressPort": "eth0"}), "ingressPort"),
        ];
        for (json, field) in cases {
            match decode_match(&node(), &json) {
                Err(BridgeError::InvalidFieldValue { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected invalid {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_mask_without_address_is_ignored() {
        let spec = decode_match(&node(), &json!({"nwSrcMask": "255.0.0.0"})).unwrap();
        assert!(spec.is_wildcard());
    }

    #[test]
    fn test_ipv6_addresses() {
        let spec =
            decode_match(&node(), &json!({"nwDst": "fe80::1", "etherType": 0x86dd})).unwrap();
        assert!(spec.nw_dst.unwrap().addr.is_ipv6());
    }

    #[test]
    fn test_match_must_be_object() {
        assert!(matches!(
            decode_match(&node(), &json!([1, 2])),
            Err(BridgeError::InvalidFieldValue { .. })
        ));
    }
}
