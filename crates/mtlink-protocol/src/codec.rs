//! Serializer seam between frames and typed messages.

use prost::Message;

use crate::constants::MAX_PAYLOAD;
use crate::error::ProtocolError;
use crate::messages::{FromRadio, ToRadio};

/// Turns typed messages into payload bytes and back.
///
/// The framing layer never looks inside payloads; everything it knows about
/// the message schema goes through this trait.
pub trait MessageCodec {
    /// Serialize an outbound message.
    fn encode(&self, message: &ToRadio) -> Result<Vec<u8>, ProtocolError>;

    /// Parse an inbound payload.
    fn decode(&self, payload: &[u8]) -> Result<FromRadio, ProtocolError>;
}

/// Protobuf codec backed by `prost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProstCodec;

impl MessageCodec for ProstCodec {
    fn encode(&self, message: &ToRadio) -> Result<Vec<u8>, ProtocolError> {
        let len = message.encoded_len();
        if len > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD,
                actual: len,
            });
        }
        let mut buf = Vec::with_capacity(len);
        message.encode(&mut buf)?;
        Ok(buf)
    }

    fn decode(&self, payload: &[u8]) -> Result<FromRadio, ProtocolError> {
        Ok(FromRadio::decode(payload)?)
    }
}

impl<C: MessageCodec + ?Sized> MessageCodec for &C {
    fn encode(&self, message: &ToRadio) -> Result<Vec<u8>, ProtocolError> {
        (**self).encode(message)
    }

    fn decode(&self, payload: &[u8]) -> Result<FromRadio, ProtocolError> {
        (**self).decode(payload)
    }
}
