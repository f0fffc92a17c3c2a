//! IPv4 formatting and network address parsing.

use crate::ParseError;
use std::net::{IpAddr, Ipv4Addr};

/// Formats a big-endian IPv4 address as dotted decimal.
pub fn ipv4_to_text(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

/// Formats a big-endian IPv4 address as a 32 character string of `0`/`1`.
///
/// Octets are emitted most significant first, each octet most significant
/// bit first. A subnet then becomes a plain string prefix, which lets
/// consumers express prefix matching with a "starts with" filter.
pub fn ipv4_to_binary_text(addr: u32) -> String {
    format!("{:032b}", addr)
}

/// Returns the first `prefix_len` characters of [`ipv4_to_binary_text`].
pub fn ipv4_prefix_to_binary_text(addr: Ipv4Addr, prefix_len: u8) -> Result<String, ParseError> {
    if prefix_len > 32 {
        return Err(ParseError::InvalidPrefixLength(prefix_len));
    }
    let mut text = ipv4_to_binary_text(u32::from(addr));
    text.truncate(prefix_len as usize);
    Ok(text)
}

/// Parses an IPv4 or IPv6 literal. Host names are not resolved.
pub fn parse_net_address(text: &str) -> Result<IpAddr, ParseError> {
    text.trim()
        .parse::<IpAddr>()
        .map_err(|_| ParseError::InvalidNetAddress(text.to_string()))
}
