//! Error types for request translation.
//!
//! Every error names the offending field or operation so that the log line
//! emitted when a message is dropped identifies what was wrong with it.

use sdnmq_types::ParseError;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while translating a broker message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Message is not a text message or not valid JSON.
    #[error("Malformed message: {message}")]
    MalformedMessage { message: String },

    /// A required field is absent.
    #[error("Missing field '{field}'")]
    MissingField { field: String },

    /// A field is present but cannot be interpreted.
    #[error("Invalid value for '{field}': {message}")]
    InvalidFieldValue { field: String, message: String },

    /// A field requires another field that is absent.
    #[error("Field '{field}' requires '{requires}'")]
    DependencyViolation { field: String, requires: String },

    /// A tag outside the supported vocabulary, or a known tag without an
    /// implementation.
    #[error("Unsupported {kind} '{value}'")]
    UnsupportedVariant { kind: String, value: String },

    /// The controller rejected an operation.
    #[error("{operation} failed: {message}")]
    ExternalServiceFailure { operation: String, message: String },

    /// A referenced flow, node or port does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },
}

impl BridgeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps a parse failure of `field`.
    pub fn parse(field: impl Into<String>, err: ParseError) -> Self {
        Self::invalid(field, err.to_string())
    }

    pub fn dependency(field: impl Into<String>, requires: impl Into<String>) -> Self {
        Self::DependencyViolation {
            field: field.into(),
            requires: requires.into(),
        }
    }

    pub fn unsupported(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedVariant {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn external(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalServiceFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }
}
