//! Attribute filters for topic subscriptions.
//!
//! Packet-in events carry their decoded header fields as flat message
//! attributes, so a subscriber can select events without parsing the body.
//! Subnet matching on IPv4 addresses is expressed as a prefix match against
//! the `nwSrcBin`/`nwDstBin` attributes, which hold the address as a 32
//! character binary string.

use crate::message::BrokerMessage;
use sdnmq_types::{ipv4_prefix_to_binary_text, ParseError};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Predicate over message attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeFilter {
    /// Attribute is present and its textual value equals `value`.
    Equals { key: String, value: String },
    /// Attribute is present and its textual value starts with `prefix`.
    StartsWith { key: String, prefix: String },
    /// Every inner filter matches. An empty list matches every message.
    All(Vec<AttributeFilter>),
}

impl AttributeFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        AttributeFilter::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn starts_with(key: impl Into<String>, prefix: impl Into<String>) -> Self {
        AttributeFilter::StartsWith {
            key: key.into(),
            prefix: prefix.into(),
        }
    }

    /// Filter that accepts every message.
    pub fn any() -> Self {
        AttributeFilter::All(Vec::new())
    }

    /// Matches IPv4 addresses inside `addr/prefix_len`, given the key of a
    /// binary string attribute such as `nwSrcBin`.
    pub fn subnet(
        key: impl Into<String>,
        addr: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<Self, ParseError> {
        Ok(Self::starts_with(key, ipv4_prefix_to_binary_text(addr, prefix_len)?))
    }

    /// Combines this filter with another one.
    pub fn and(self, other: AttributeFilter) -> Self {
        match self {
            AttributeFilter::All(mut filters) => {
                filters.push(other);
                AttributeFilter::All(filters)
            }
            filter => AttributeFilter::All(vec![filter, other]),
        }
    }

    /// Evaluates the filter against the attributes of `message`.
    pub fn matches(&self, message: &BrokerMessage) -> bool {
        match self {
            AttributeFilter::Equals { key, value } => message
                .attribute(key)
                .is_some_and(|v| v.to_string() == *value),
            AttributeFilter::StartsWith { key, prefix } => message
                .attribute(key)
                .is_some_and(|v| v.to_string().starts_with(prefix.as_str())),
            AttributeFilter::All(filters) => filters.iter().all(|f| f.matches(message)),
        }
    }
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for AttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeFilter::Equals { key, value } => write!(f, "{} = '{}'", key, value),
            AttributeFilter::StartsWith { key, prefix } => write!(f, "{} LIKE '{}%'", key, prefix),
            AttributeFilter::All(filters) if filters.is_empty() => f.write_str("TRUE"),
            AttributeFilter::All(filters) => {
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{}", filter)?;
                }
                Ok(())
            }
        }
    }
}

/// Parses `key=value` into an [`AttributeFilter::Equals`].
impl FromStr for AttributeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok(Self::equals(key.trim(), value.trim()))
            }
            _ => Err(format!("expected key=value, got '{}'", s)),
        }
    }
}
