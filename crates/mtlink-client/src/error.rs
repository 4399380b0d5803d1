//! Client error types.

use mtlink_protocol::ProtocolError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors returned by the [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    /// A message could not be framed or encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The transport accepted only part of a frame.
    #[error("send failed: transport accepted {written} of {expected} bytes")]
    SendFailure {
        /// Bytes accepted.
        written: usize,
        /// Frame length.
        expected: usize,
    },

    /// A text message exceeds the mesh payload limit.
    #[error("text too long: {len} bytes, maximum {max}")]
    TextTooLong {
        /// Text length in bytes.
        len: usize,
        /// Maximum payload length.
        max: usize,
    },

    /// No transport is configured.
    #[error("no transport configured")]
    NoTransport,

    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether the client can never make progress after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(TransportError::Unavailable(_))
                | ClientError::NoTransport
                | ClientError::Config(_)
        )
    }
}
