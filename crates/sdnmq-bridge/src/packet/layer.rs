//! Decoded packet layers, outermost first.

use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetLayer {
    pub src: [u8; 6],
    pub dst: [u8; 6],
    pub ether_type: u16,
}

/// An 802.1Q tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dot1QLayer {
    /// 3-bit priority code point
    pub priority: u8,
    /// Drop eligible indicator
    pub dei: u8,
    /// 12-bit VLAN id
    pub vlan_id: u16,
    /// Ethertype of the encapsulated payload
    pub ether_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Layer {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub tos: u8,
    pub protocol: u8,
}

/// TCP or UDP ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportLayer {
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetLayer),
    Dot1Q(Dot1QLayer),
    Ipv4(Ipv4Layer),
    Tcp(TransportLayer),
    Udp(TransportLayer),
    /// Payload that was not decoded, starting at `offset` in the frame.
    Unknown { offset: usize, reason: String },
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Ethernet(_) => "ethernet",
            Layer::Dot1Q(_) => "802.1q",
            Layer::Ipv4(_) => "ipv4",
            Layer::Tcp(_) => "tcp",
            Layer::Udp(_) => "udp",
            Layer::Unknown { .. } => "unknown",
        }
    }
}
