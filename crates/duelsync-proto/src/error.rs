//! Protocol errors.

use thiserror::Error;

/// Errors produced while encoding, decoding, or validating protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Inbound text could not be decoded into a known event.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Outbound message could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    /// A required field is missing or blank.
    #[error("{message}: missing field `{field}`")]
    MissingField {
        /// Message type being validated
        message: &'static str,
        /// Name of the missing field
        field: &'static str,
    },
}

impl ProtoError {
    pub(crate) fn missing(message: &'static str, field: &'static str) -> Self {
        Self::MissingField { message, field }
    }
}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
