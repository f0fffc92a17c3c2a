//! Common SDN-MQ types shared by the bridge and its clients.
//!
//! This crate provides the primitive network types used on both sides of the
//! broker:
//!
//! - [`DlAddress`], [`mac_to_text`], [`parse_mac`]: data-link addresses
//! - [`ipv4_to_text`], [`ipv4_to_binary_text`]: IPv4 formatting, including the
//!   fixed-width binary form used for prefix filtering
//! - [`NodeRef`], [`PortRef`]: forwarding devices and their ports

mod ip;
mod mac;
mod node;

pub use ip::{ipv4_prefix_to_binary_text, ipv4_to_binary_text, ipv4_to_text, parse_net_address};
pub use mac::{mac_to_text, parse_mac, DlAddress};
pub use node::{NodeRef, PortRef, NODE_TYPE_OF, OF_RESERVED_PORTS};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid data-link address: {0}")]
    InvalidDlAddress(String),

    #[error("invalid network address: {0}")]
    InvalidNetAddress(String),

    #[error("invalid prefix length {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("invalid node id '{id}' for node type '{node_type}'")]
    InvalidNodeId { node_type: String, id: String },

    #[error("invalid port '{port}' on node {node}")]
    InvalidPort { node: String, port: String },
}
