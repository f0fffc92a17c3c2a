//! Data-link address parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Formats link-layer address bytes as colon separated uppercase hex
/// (e.g. `00:01:02:03:04:05`).
pub fn mac_to_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            text.push(':');
        }
        text.push_str(&format!("{:02X}", byte));
    }
    text
}

/// Parses a data-link address in colon hexadecimal notation.
///
/// Every `:` separated token must be a hexadecimal byte. The number of tokens
/// is not checked, so `"0a:0b"` yields two bytes.
pub fn parse_mac(text: &str) -> Result<Vec<u8>, ParseError> {
    if text.is_empty() {
        return Err(ParseError::InvalidDlAddress(text.to_string()));
    }

    text.split(':')
        .map(|token| {
            if token.is_empty() || token.starts_with('+') {
                return Err(ParseError::InvalidDlAddress(text.to_string()));
            }
            u8::from_str_radix(token, 16)
                .map_err(|_| ParseError::InvalidDlAddress(text.to_string()))
        })
        .collect()
}

/// A data-link address as carried in flow requests.
///
/// Nominally 6 bytes, but parsing is as lenient as [`parse_mac`].
///
/// # Examples
///
/// ```
/// use sdnmq_types::DlAddress;
///
/// let addr: DlAddress = "00:01:02:03:04:0a".parse().unwrap();
/// assert_eq!(addr.as_bytes(), &[0, 1, 2, 3, 4, 10]);
/// assert_eq!(addr.to_string(), "00:01:02:03:04:0A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DlAddress(Vec<u8>);

impl DlAddress {
    /// Creates an address from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        DlAddress(bytes.into())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if this is a regular 48-bit Ethernet address.
    pub fn is_ethernet(&self) -> bool {
        self.0.len() == 6
    }
}

impl fmt::Display for DlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mac_to_text(&self.0))
    }
}

impl FromStr for DlAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_mac(s).map(DlAddress)
    }
}

impl TryFrom<String> for DlAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DlAddress> for String {
    fn from(addr: DlAddress) -> String {
        addr.to_string()
    }
}

impl From<[u8; 6]> for DlAddress {
    fn from(bytes: [u8; 6]) -> Self {
        DlAddress(bytes.to_vec())
    }
}
