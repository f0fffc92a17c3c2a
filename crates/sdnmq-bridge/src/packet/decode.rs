//! Frame decoding into a layer chain.
//!
//! Walks Ethernet, any number of 802.1Q tags, IPv4 and TCP/UDP. Decoding
//! stops at the first payload that is not one of these (or is truncated),
//! which is recorded as [`Layer::Unknown`].

use crate::packet::layer::{Dot1QLayer, EthernetLayer, Ipv4Layer, Layer, TransportLayer};
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;
use pnet::util::MacAddr;
use tracing::debug;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;

/// Decodes `frame` into its layers, outermost first.
pub fn decode_frame(frame: &[u8]) -> Vec<Layer> {
    let mut layers = Vec::new();

    let Some(eth) = EthernetPacket::new(frame) else {
        layers.push(unknown(0, "frame shorter than an ethernet header"));
        return layers;
    };
    layers.push(Layer::Ethernet(EthernetLayer {
        src: octets(eth.get_source()),
        dst: octets(eth.get_destination()),
        ether_type: eth.get_ethertype().0,
    }));

    let mut ether_type = eth.get_ethertype();
    let mut offset = ETHERNET_HEADER_LEN;

    while ether_type == EtherTypes::Vlan {
        let Some(tag) = VlanPacket::new(&frame[offset..]) else {
            layers.push(unknown(offset, "truncated 802.1q tag"));
            return layers;
        };
        layers.push(Layer::Dot1Q(Dot1QLayer {
            priority: tag.get_priority_code_point().0,
            dei: tag.get_drop_eligible_indicator(),
            vlan_id: tag.get_vlan_identifier(),
            ether_type: tag.get_ethertype().0,
        }));
        ether_type = tag.get_ethertype();
        offset += VLAN_TAG_LEN;
    }

    if ether_type != EtherTypes::Ipv4 {
        if offset < frame.len() {
            layers.push(unknown(offset, format!("ethertype {}", describe(ether_type))));
        }
        return layers;
    }

    decode_ipv4(frame, offset, &mut layers);
    layers
}

fn decode_ipv4(frame: &[u8], offset: usize, layers: &mut Vec<Layer>) {
    let Some(ip) = Ipv4Packet::new(&frame[offset..]) else {
        layers.push(unknown(offset, "truncated ipv4 header"));
        return;
    };
    let header_len = usize::from(ip.get_header_length()) * 4;
    if ip.get_version() != 4 || header_len < 20 || offset + header_len > frame.len() {
        layers.push(unknown(offset, "malformed ipv4 header"));
        return;
    }

    layers.push(Layer::Ipv4(Ipv4Layer {
        src: ip.get_source(),
        dst: ip.get_destination(),
        tos: (ip.get_dscp() << 2) | ip.get_ecn(),
        protocol: ip.get_next_level_protocol().0,
    }));

    // Only the first fragment carries the transport header.
    if ip.get_fragment_offset() != 0 {
        return;
    }

    let offset = offset + header_len;
    let payload = ip.payload();
    match ip.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => match TcpPacket::new(payload) {
            Some(tcp) => layers.push(Layer::Tcp(TransportLayer {
                src_port: tcp.get_source(),
                dst_port: tcp.get_destination(),
            })),
            None => layers.push(unknown(offset, "truncated tcp header")),
        },
        IpNextHeaderProtocols::Udp => match UdpPacket::new(payload) {
            Some(udp) => layers.push(Layer::Udp(TransportLayer {
                src_port: udp.get_source(),
                dst_port: udp.get_destination(),
            })),
            None => layers.push(unknown(offset, "truncated udp header")),
        },
        other => {
            if !payload.is_empty() {
                layers.push(unknown(offset, format!("ip protocol {}", other.0)));
            }
        }
    }
}

fn octets(mac: MacAddr) -> [u8; 6] {
    [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
}

fn describe(ether_type: EtherType) -> String {
    format!("0x{:04x}", ether_type.0)
}

fn unknown(offset: usize, reason: impl Into<String>) -> Layer {
    let reason = reason.into();
    debug!(offset, reason = %reason, "Undecoded payload");
    Layer::Unknown { offset, reason }
}
