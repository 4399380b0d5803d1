//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when framing, encoding or decoding messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffered bytes did not start with the frame magic.
    ///
    /// The decode buffer has already been cleared when this is returned.
    #[error("bad frame magic: expected 94 C3, got {:02X} {:02X}", found[0], found[1])]
    BadMagic {
        /// The two bytes found where the magic should be.
        found: [u8; 2],
    },

    /// A frame header declared a payload longer than the buffer can hold.
    #[error("oversize frame: declared {declared} bytes, maximum {max}")]
    OversizeFrame {
        /// Payload length from the header.
        declared: usize,
        /// Largest payload the assembler accepts.
        max: usize,
    },

    /// An outbound payload does not fit in a frame.
    #[error("payload too long: maximum {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// The serializer rejected a payload.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// The serializer could not encode a message.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

impl From<prost::DecodeError> for ProtocolError {
    fn from(err: prost::DecodeError) -> Self {
        ProtocolError::Decode(err.to_string())
    }
}

impl From<prost::EncodeError> for ProtocolError {
    fn from(err: prost::EncodeError) -> Self {
        ProtocolError::Encode(err.to_string())
    }
}
