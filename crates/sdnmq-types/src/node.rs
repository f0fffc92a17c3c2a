//! Node and port references.

use crate::ParseError;
use std::fmt;

/// Node type of OpenFlow switches, the default when a request omits it.
pub const NODE_TYPE_OF: &str = "OF";

/// Reserved OpenFlow port names accepted in place of a port number.
pub const OF_RESERVED_PORTS: [&str; 4] = ["CONTROLLER", "ALL", "SWSTACK", "HWPATH"];

/// A forwarding device, identified by its id and node type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    id: String,
    node_type: String,
}

impl NodeRef {
    /// Creates a node reference, validating the id against the node type.
    ///
    /// OpenFlow node ids are datapath ids: a decimal `u64`, a `0x` prefixed
    /// hex number, or colon separated hex bytes (at most 8). Other node types
    /// accept any non-empty id.
    pub fn new(node_type: impl Into<String>, id: impl Into<String>) -> Result<Self, ParseError> {
        let node_type = node_type.into();
        let id = id.into();

        let valid = if node_type == NODE_TYPE_OF {
            parse_datapath_id(&id).is_some()
        } else {
            !id.is_empty() && !node_type.is_empty()
        };

        if !valid {
            return Err(ParseError::InvalidNodeId { node_type, id });
        }
        Ok(NodeRef { id, node_type })
    }

    /// Creates an OpenFlow node reference.
    pub fn openflow(id: impl Into<String>) -> Result<Self, ParseError> {
        Self::new(NODE_TYPE_OF, id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn is_openflow(&self) -> bool {
        self.node_type == NODE_TYPE_OF
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.node_type, self.id)
    }
}

fn parse_datapath_id(id: &str) -> Option<u64> {
    if id.is_empty() {
        return None;
    }
    if let Some(hex) = id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        if hex.is_empty() || hex.starts_with('+') {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok();
    }
    if id.contains(':') {
        let tokens: Vec<&str> = id.split(':').collect();
        if tokens.len() > 8 {
            return None;
        }
        let mut dpid: u64 = 0;
        for token in tokens {
            if token.is_empty() || token.len() > 2 || token.starts_with('+') {
                return None;
            }
            dpid = (dpid << 8) | u64::from(u8::from_str_radix(token, 16).ok()?);
        }
        return Some(dpid);
    }
    if id.starts_with('+') {
        return None;
    }
    id.parse::<u64>().ok()
}

/// A port resolved against the node it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    node: NodeRef,
    id: String,
}

impl PortRef {
    /// Resolves a textual port id against `node`.
    ///
    /// OpenFlow ports are decimal 16-bit numbers or one of
    /// [`OF_RESERVED_PORTS`]. Other node types accept any non-empty id.
    pub fn resolve(node: &NodeRef, port: &str) -> Result<Self, ParseError> {
        let valid = if node.is_openflow() {
            OF_RESERVED_PORTS.contains(&port)
                || (!port.starts_with('+') && port.parse::<u16>().is_ok())
        } else {
            !port.is_empty()
        };

        if !valid {
            return Err(ParseError::InvalidPort {
                node: node.to_string(),
                port: port.to_string(),
            });
        }
        Ok(PortRef {
            node: node.clone(),
            id: port.to_string(),
        })
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.node)
    }
}
