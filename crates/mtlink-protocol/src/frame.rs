//! Frame encoding/decoding utilities.
//!
//! Every frame starts with the two magic bytes, followed by the payload
//! length as a big-endian `u16` and then the payload itself.
//!
//! ```text
//! +------+------+--------+--------+-------------------+
//! | 0x94 | 0xC3 | len_hi | len_lo | payload[0..len]   |
//! +------+------+--------+--------+-------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{MessageCodec, ProstCodec};
use crate::constants::*;
use crate::error::ProtocolError;
use crate::messages::{FromRadio, ToRadio};

/// What to do with the buffer when a header declares an oversize payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Keep the buffered bytes. The frame can never complete, so the stream
    /// stalls until the owner clears the buffer (reconnect or idle reset).
    #[default]
    Wait,
    /// Discard the buffered bytes and resynchronize on the next frame.
    Resync,
}

/// Accumulates transport bytes and cuts them into frames.
///
/// The buffer has a fixed logical capacity; bytes that do not fit are dropped.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    capacity: usize,
    policy: OversizePolicy,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler sized for one maximum-size frame.
    pub fn new() -> Self {
        Self::with_capacity(DECODE_BUFFER_CAPACITY)
    }

    /// Create an assembler with a custom buffer capacity.
    ///
    /// Capacities smaller than a header are raised to [`HEADER_SIZE`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(HEADER_SIZE);
        FrameAssembler {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            policy: OversizePolicy::default(),
        }
    }

    /// Set the oversize policy.
    pub fn with_policy(mut self, policy: OversizePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The oversize policy in effect.
    pub fn policy(&self) -> OversizePolicy {
        self.policy
    }

    /// Largest payload a frame may carry and still fit in the buffer.
    pub fn max_payload(&self) -> usize {
        (self.capacity - HEADER_SIZE).min(MAX_PAYLOAD)
    }

    /// Free space left in the buffer.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// Append received bytes, returning how many were accepted.
    ///
    /// Bytes past the remaining capacity are dropped.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let accepted = data.len().min(self.remaining_capacity());
        self.buffer.extend_from_slice(&data[..accepted]);
        if accepted < data.len() {
            log::warn!(
                "frame buffer full: dropped {} of {} bytes",
                data.len() - accepted,
                data.len()
            );
        }
        accepted
    }

    /// Try to cut one frame off the front of the buffer.
    ///
    /// Returns `Ok(Some(payload))` for a complete frame, `Ok(None)` if more data
    /// is needed. A bad magic clears the buffer before the error is returned.
    pub fn try_extract_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        if self.buffer[0] != MAGIC_0 || self.buffer[1] != MAGIC_1 {
            let found = [self.buffer[0], self.buffer[1]];
            log::debug!(
                "bad magic {:02X} {:02X}, discarding {} buffered bytes",
                found[0],
                found[1],
                self.buffer.len()
            );
            self.buffer.clear();
            return Err(ProtocolError::BadMagic { found });
        }

        let declared = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
        let max = self.max_payload();
        if declared > max {
            if self.policy == OversizePolicy::Resync {
                self.buffer.clear();
            }
            return Err(ProtocolError::OversizeFrame { declared, max });
        }

        if self.buffer.len() < HEADER_SIZE + declared {
            return Ok(None);
        }

        self.buffer.advance(HEADER_SIZE);
        Ok(Some(self.buffer.split_to(declared).freeze()))
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Wrap an encoded message in a frame header.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLong {
            max: MAX_PAYLOAD,
            actual: payload.len(),
        });
    }
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.put_slice(&MAGIC);
    buf.put_u16(payload.len() as u16);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// A simple synchronous interface for framing outbound messages and decoding
/// inbound ones.
///
/// This can be used with any byte stream (serial port, TCP socket, etc.).
pub struct ProtocolSession<C: MessageCodec = ProstCodec> {
    assembler: FrameAssembler,
    codec: C,
    last_frame_len: usize,
}

impl Default for ProtocolSession<ProstCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolSession<ProstCodec> {
    /// Create a new protocol session using the protobuf codec.
    pub fn new() -> Self {
        Self::with_codec(ProstCodec, FrameAssembler::new())
    }
}

impl<C: MessageCodec> ProtocolSession<C> {
    /// Create a session from a codec and an assembler.
    pub fn with_codec(codec: C, assembler: FrameAssembler) -> Self {
        ProtocolSession {
            assembler,
            codec,
            last_frame_len: 0,
        }
    }

    /// Encode a message for transmission, frame header included.
    pub fn encode(&self, message: &ToRadio) -> Result<Vec<u8>, ProtocolError> {
        let payload = self.codec.encode(message)?;
        encode_frame(&payload)
    }

    /// Feed received data into the decoder. Returns the number of bytes kept.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        self.assembler.feed(data)
    }

    /// Free space in the decode buffer.
    pub fn remaining_capacity(&self) -> usize {
        self.assembler.remaining_capacity()
    }

    /// Try to decode the next message.
    ///
    /// Returns `Ok(Some(message))` if a complete message was decoded,
    /// `Ok(None)` if more data is needed, or `Err` if framing or decoding
    /// failed. A frame that fails to decode is consumed.
    pub fn try_decode(&mut self) -> Result<Option<FromRadio>, ProtocolError> {
        match self.assembler.try_extract_frame()? {
            Some(frame) => {
                self.last_frame_len = frame.len();
                Ok(Some(self.codec.decode(&frame)?))
            }
            None => Ok(None),
        }
    }

    /// Payload length of the most recently extracted frame.
    pub fn last_frame_len(&self) -> usize {
        self.last_frame_len
    }

    /// Access the underlying assembler.
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Reset the session state.
    pub fn reset(&mut self) {
        self.assembler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        encode_frame(payload).expect("payload fits")
    }

    fn drain(assembler: &mut FrameAssembler) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(Some(payload)) = assembler.try_extract_frame() {
            frames.push(payload.to_vec());
        }
        frames
    }

    #[test]
    fn test_encode_frame_header() {
        let encoded = frame(b"Hello, World!");
        assert_eq!(encoded.len(), HEADER_SIZE + 13);
        assert_eq!(&encoded[..4], &[0x94, 0xC3, 0x00, 13]);
        assert_eq!(&encoded[4..], b"Hello, World!");
    }

    #[test]
    fn test_encode_frame_big_endian_length() {
        let encoded = frame(&[0u8; 300]);
        assert_eq!(encoded[2], 0x01);
        assert_eq!(encoded[3], 0x2C);
    }

    #[test]
    fn test_encode_frame_rejects_oversize() {
        let err = encode_frame(&[0u8; MAX_PAYLOAD + 1]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD,
                actual: MAX_PAYLOAD + 1
            }
        );
    }

    #[test]
    fn test_partial_frame() {
        let mut assembler = FrameAssembler::new();
        let encoded = frame(b"Test data");

        assembler.feed(&encoded[..3]);
        assert_eq!(assembler.try_extract_frame(), Ok(None));
        assembler.feed(&encoded[3..6]);
        assert_eq!(assembler.try_extract_frame(), Ok(None));

        assembler.feed(&encoded[6..]);
        let payload = assembler.try_extract_frame().unwrap().unwrap();
        assert_eq!(&payload[..], b"Test data");
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_chunking_independence() {
        let mut stream = Vec::new();
        for payload in [&b"first"[..], b"", b"the third one", &[0xAAu8; 200]] {
            stream.extend(frame(payload));
        }

        let mut whole = FrameAssembler::with_capacity(1024);
        whole.feed(&stream);
        let expected = drain(&mut whole);
        assert_eq!(expected.len(), 4);

        let mut trickle = FrameAssembler::with_capacity(1024);
        let mut got = Vec::new();
        for byte in &stream {
            trickle.feed(std::slice::from_ref(byte));
            got.extend(drain(&mut trickle));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_one_frame_per_call() {
        let mut assembler = FrameAssembler::new();
        assembler.feed(&frame(b"First"));
        assembler.feed(&frame(b"Second"));

        assert_eq!(&assembler.try_extract_frame().unwrap().unwrap()[..], b"First");
        assert_eq!(assembler.buffered_len(), HEADER_SIZE + 6);
        assert_eq!(&assembler.try_extract_frame().unwrap().unwrap()[..], b"Second");
        assert_eq!(assembler.try_extract_frame(), Ok(None));
    }

    #[test]
    fn test_bad_magic_resyncs() {
        let mut assembler = FrameAssembler::new();
        assembler.feed(&[0x12, 0x34, 0x00, 0x02, 0xFF]);

        let err = assembler.try_extract_frame().unwrap_err();
        assert_eq!(err, ProtocolError::BadMagic { found: [0x12, 0x34] });
        assert_eq!(assembler.buffered_len(), 0);

        assembler.feed(&frame(b"clean"));
        assert_eq!(&assembler.try_extract_frame().unwrap().unwrap()[..], b"clean");
    }

    #[test]
    fn test_zero_length_payload() {
        let mut assembler = FrameAssembler::new();
        assembler.feed(&[0x94, 0xC3, 0x00, 0x00]);
        let payload = assembler.try_extract_frame().unwrap().unwrap();
        assert!(payload.is_empty());
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_frame_exactly_fills_buffer() {
        let mut assembler = FrameAssembler::new();
        let encoded = frame(&[0x55; MAX_PAYLOAD]);
        assert_eq!(encoded.len(), DECODE_BUFFER_CAPACITY);

        assert_eq!(assembler.feed(&encoded), encoded.len());
        assert_eq!(assembler.remaining_capacity(), 0);
        let payload = assembler.try_extract_frame().unwrap().unwrap();
        assert_eq!(payload.len(), MAX_PAYLOAD);
        assert_eq!(assembler.remaining_capacity(), DECODE_BUFFER_CAPACITY);
    }

    #[test]
    fn test_overflow_drops_only_excess() {
        let mut assembler = FrameAssembler::with_capacity(16);
        let first = frame(b"abcdefgh");
        let second = frame(b"0123456789");

        let mut chunk = first.clone();
        chunk.extend(&second);
        let accepted = assembler.feed(&chunk);
        assert_eq!(accepted, 16);
        assert_eq!(assembler.remaining_capacity(), 0);

        // The complete frame that fit still decodes.
        assert_eq!(&assembler.try_extract_frame().unwrap().unwrap()[..], b"abcdefgh");
        assert_eq!(assembler.try_extract_frame(), Ok(None));
    }

    #[test]
    fn test_oversize_wait_keeps_buffer() {
        let mut assembler = FrameAssembler::new();
        assembler.feed(&[0x94, 0xC3, 0x02, 0x01, 0x00]);

        let err = assembler.try_extract_frame().unwrap_err();
        assert_eq!(err, ProtocolError::OversizeFrame { declared: 513, max: MAX_PAYLOAD });
        assert_eq!(assembler.buffered_len(), 5);
        // Still stuck on the same header.
        assert!(assembler.try_extract_frame().is_err());
    }

    #[test]
    fn test_oversize_resync_clears_buffer() {
        let mut assembler = FrameAssembler::new().with_policy(OversizePolicy::Resync);
        assembler.feed(&[0x94, 0xC3, 0xFF, 0xFF]);

        assert!(matches!(
            assembler.try_extract_frame(),
            Err(ProtocolError::OversizeFrame { declared: 0xFFFF, .. })
        ));
        assert_eq!(assembler.buffered_len(), 0);

        assembler.feed(&frame(b"ok"));
        assert_eq!(&assembler.try_extract_frame().unwrap().unwrap()[..], b"ok");
    }

    #[test]
    fn test_small_capacity_limits_payload() {
        let assembler = FrameAssembler::with_capacity(10);
        assert_eq!(assembler.max_payload(), 6);
        assert_eq!(FrameAssembler::with_capacity(1).remaining_capacity(), HEADER_SIZE);
    }

    #[test]
    fn test_session_round_trip() {
        let mut session = ProtocolSession::new();
        let bytes = session.encode(&ToRadio::want_config(12345)).unwrap();
        assert_eq!(&bytes[..2], &MAGIC);

        let inbound = crate::FromRadio::new(crate::from_radio::PayloadVariant::ConfigCompleteId(12345));
        let payload = prost::Message::encode_to_vec(&inbound);
        session.feed(&encode_frame(&payload).unwrap());

        let decoded = session.try_decode().unwrap().unwrap();
        assert_eq!(decoded, inbound);
        assert_eq!(session.try_decode(), Ok(None));
    }

    #[test]
    fn test_session_decode_failure_consumes_frame() {
        let mut session = ProtocolSession::new();
        // field 2 (packet) declared length-delimited with a length past the end
        session.feed(&frame(&[0x12, 0x7F]));
        session.feed(&frame(&[]));

        assert!(matches!(session.try_decode(), Err(ProtocolError::Decode(_))));
        let empty = session.try_decode().unwrap().unwrap();
        assert_eq!(empty.payload_variant, None);
    }

    #[test]
    fn test_session_reset() {
        let mut session = ProtocolSession::new();
        session.feed(&[0x94, 0xC3, 0x00]);
        assert_eq!(session.remaining_capacity(), DECODE_BUFFER_CAPACITY - 3);
        session.reset();
        assert_eq!(session.assembler().buffered_len(), 0);
    }
}
