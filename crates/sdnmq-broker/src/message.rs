//! Broker message model.

use crate::error::{BrokerError, BrokerResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a message attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Text(String),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

macro_rules! int_attribute {
    ($($t:ty),*) => {
        $(impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                AttributeValue::Int(i64::from(v))
            }
        })*
    };
}

int_attribute!(u8, u16, i16, u32, i32, i64);

/// Payload of a broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Bytes(Vec<u8>),
}

/// A message as exchanged with the broker: a body plus flat attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub body: MessageBody,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// JSON envelope used by backends that only carry strings.
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bytes: Option<String>,
}

impl BrokerMessage {
    /// Creates a text message without attributes.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: MessageBody::Text(body.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Creates a binary message without attributes.
    pub fn bytes(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: MessageBody::Bytes(body.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute, builder style.
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns the body if this is a text message.
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(s) => Some(s),
            MessageBody::Bytes(_) => None,
        }
    }

    /// Encodes the message as a JSON envelope `{attributes, text|bytes}`.
    pub fn to_envelope(&self) -> BrokerResult<String> {
        let (text, bytes) = match &self.body {
            MessageBody::Text(s) => (Some(s.clone()), None),
            MessageBody::Bytes(b) => (None, Some(BASE64.encode(b))),
        };
        let envelope = Envelope {
            attributes: self.attributes.clone(),
            text,
            bytes,
        };
        serde_json::to_string(&envelope).map_err(|e| BrokerError::InvalidEnvelope(e.to_string()))
    }

    /// Decodes a JSON envelope produced by [`BrokerMessage::to_envelope`].
    pub fn from_envelope(raw: &str) -> BrokerResult<Self> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| BrokerError::InvalidEnvelope(e.to_string()))?;

        let body = match (envelope.text, envelope.bytes) {
            (Some(text), None) => MessageBody::Text(text),
            (None, Some(bytes)) => MessageBody::Bytes(
                BASE64
                    .decode(bytes)
                    .map_err(|e| BrokerError::InvalidEnvelope(e.to_string()))?,
            ),
            _ => {
                return Err(BrokerError::InvalidEnvelope(
                    "exactly one of text or bytes required".to_string(),
                ))
            }
        };

        Ok(Self {
            body,
            attributes: envelope.attributes,
        })
    }
}
