//! Construction of test and probe frames.
//!
//! Used by the client tool to craft packet-out payloads and by tests to
//! produce packet-in traffic.

use crate::error::{BridgeError, BridgeResult};
use pnet::packet::ethernet::{EtherType, EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::{self, MutableIpv4Packet};
use pnet::packet::tcp::MutableTcpPacket;
use pnet::packet::udp::MutableUdpPacket;
use pnet::packet::vlan::{ClassOfService, MutableVlanPacket};
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const IPV4_HEADER_LEN: usize = 20;
const TCP_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    fn header_len(&self) -> usize {
        match self {
            Transport::Tcp => TCP_HEADER_LEN,
            Transport::Udp => UDP_HEADER_LEN,
        }
    }

    fn protocol(&self) -> IpNextHeaderProtocol {
        match self {
            Transport::Tcp => IpNextHeaderProtocols::Tcp,
            Transport::Udp => IpNextHeaderProtocols::Udp,
        }
    }
}

/// Builder for Ethernet frames with optional 802.1Q tag, IPv4 and TCP/UDP
/// headers.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    src: [u8; 6],
    dst: [u8; 6],
    ether_type: u16,
    vlan: Option<(u8, u16)>,
    ipv4: Option<(Ipv4Addr, Ipv4Addr)>,
    tos: u8,
    transport: Option<(Transport, u16, u16)>,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(src: [u8; 6], dst: [u8; 6]) -> Self {
        Self {
            src,
            dst,
            ether_type: EtherTypes::Ipv4.0,
            vlan: None,
            ipv4: None,
            tos: 0,
            transport: None,
            payload: Vec::new(),
        }
    }

    /// Ethertype of the frame payload when no IPv4 header is added.
    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.ether_type = ether_type;
        self
    }

    /// Adds an 802.1Q tag.
    pub fn vlan(mut self, priority: u8, vlan_id: u16) -> Self {
        self.vlan = Some((priority & 0x7, vlan_id & 0xFFF));
        self
    }

    pub fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.ipv4 = Some((src, dst));
        self
    }

    pub fn tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    /// Adds a transport header. Ignored unless an IPv4 header is present.
    pub fn transport(mut self, transport: Transport, src_port: u16, dst_port: u16) -> Self {
        self.transport = Some((transport, src_port, dst_port));
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Builds the frame.
    ///
    /// Fails when an IPv4 header is requested and the packet would not fit
    /// its 16-bit total length field.
    pub fn build(&self) -> BridgeResult<Vec<u8>> {
        let transport = self.ipv4.and(self.transport);
        let l4_len = transport.map_or(0, |(t, _, _)| t.header_len()) + self.payload.len();
        let l3_len = if self.ipv4.is_some() {
            IPV4_HEADER_LEN + l4_len
        } else {
            self.payload.len()
        };
        let total_length = match self.ipv4 {
            Some(_) => u16::try_from(l3_len).map_err(|_| {
                BridgeError::invalid(
                    "payload",
                    format!("{} bytes do not fit in an IPv4 packet", self.payload.len()),
                )
            })?,
            None => 0,
        };
        let tag_len = if self.vlan.is_some() { VLAN_TAG_LEN } else { 0 };

        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + tag_len + l3_len];
        let inner_type = if self.ipv4.is_some() {
            EtherTypes::Ipv4
        } else {
            EtherType(self.ether_type)
        };

        if let Some(mut eth) = MutableEthernetPacket::new(&mut frame) {
            eth.set_source(mac_addr(self.src));
            eth.set_destination(mac_addr(self.dst));
            eth.set_ethertype(if self.vlan.is_some() {
                EtherTypes::Vlan
            } else {
                inner_type
            });
        }

        let mut offset = ETHERNET_HEADER_LEN;
        if let Some((priority, vlan_id)) = self.vlan {
            if let Some(mut tag) = MutableVlanPacket::new(&mut frame[offset..]) {
                tag.set_priority_code_point(ClassOfService::new(priority));
                tag.set_drop_eligible_indicator(0);
                tag.set_vlan_identifier(vlan_id);
                tag.set_ethertype(inner_type);
            }
            offset += VLAN_TAG_LEN;
        }

        if let Some((src, dst)) = self.ipv4 {
            let protocol = transport.map_or(IpNextHeaderProtocol(0xFF), |(t, _, _)| t.protocol());
            if let Some(mut ip) = MutableIpv4Packet::new(&mut frame[offset..]) {
                ip.set_version(4);
                ip.set_header_length(5);
                ip.set_dscp(self.tos >> 2);
                ip.set_ecn(self.tos & 0x3);
                ip.set_total_length(total_length);
                ip.set_ttl(64);
                ip.set_next_level_protocol(protocol);
                ip.set_source(src);
                ip.set_destination(dst);
                let checksum = ipv4::checksum(&ip.to_immutable());
                ip.set_checksum(checksum);
            }
            offset += IPV4_HEADER_LEN;

            match transport {
                Some((Transport::Tcp, src_port, dst_port)) => {
                    if let Some(mut tcp) = MutableTcpPacket::new(&mut frame[offset..]) {
                        tcp.set_source(src_port);
                        tcp.set_destination(dst_port);
                        tcp.set_data_offset(5);
                        tcp.set_window(1024);
                    }
                    offset += TCP_HEADER_LEN;
                }
                Some((Transport::Udp, src_port, dst_port)) => {
                    if let Some(mut udp) = MutableUdpPacket::new(&mut frame[offset..]) {
                        udp.set_source(src_port);
                        udp.set_destination(dst_port);
                        udp.set_length(total_length - IPV4_HEADER_LEN as u16);
                    }
                    offset += UDP_HEADER_LEN;
                }
                None => {}
            }
        }

        frame[offset..].copy_from_slice(&self.payload);
        Ok(frame)
    }
}

fn mac_addr(b: [u8; 6]) -> MacAddr {
    MacAddr::new(b[0], b[1], b[2], b[3], b[4], b[5])
}
