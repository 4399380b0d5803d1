//! Byte transports between the host and the radio.
//!
//! A transport only moves bytes. Framing, decoding and timers live in the
//! [`Client`](crate::Client), which drives the transport once per pump.

mod serial;
mod tcp;

pub use serial::{SerialStream, SerialTransport};
pub use tcp::{HostNetwork, NetworkLink, TcpTransport};

use std::io;

use thiserror::Error;

use crate::config::{ClientConfig, TransportConfig};
use crate::time::Timestamp;

/// Errors raised by transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The transport has no open connection.
    #[error("not connected")]
    NotConnected,

    /// The transport can never become usable (e.g. missing hardware).
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => TransportError::Unavailable(err.to_string()),
            serialport::ErrorKind::Io(kind) => TransportError::Io(io::Error::new(kind, err.description)),
            _ => TransportError::Io(io::Error::new(io::ErrorKind::Other, err.description)),
        }
    }
}

/// A connection to the radio that can move bytes.
pub trait Transport {
    /// Drive connection management. Returns whether data can flow.
    ///
    /// `Err(TransportError::Unavailable)` means the transport will never come
    /// up; other errors are transient.
    fn connect(&mut self, now: Timestamp) -> Result<bool, TransportError>;

    /// Whether data can flow right now.
    fn is_connected(&self) -> bool;

    /// Read whatever is available without blocking, up to `buf.len()` bytes.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Note that the link is alive (a report completed).
    fn reset_idle_timeout(&mut self, _now: Timestamp) {}

    /// Whether the radio needs periodic heartbeats on this transport.
    fn wants_heartbeat(&self) -> bool {
        false
    }

    /// Short name of the transport kind, for logs and metrics.
    fn kind(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, now: Timestamp) -> Result<bool, TransportError> {
        (**self).connect(now)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read_available(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(data)
    }

    fn reset_idle_timeout(&mut self, now: Timestamp) {
        (**self).reset_idle_timeout(now)
    }

    fn wants_heartbeat(&self) -> bool {
        (**self).wants_heartbeat()
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

/// Open the transport described by `transport`.
///
/// Serial ports are opened immediately; TCP connects lazily on the first
/// [`Transport::connect`].
pub fn open_transport(
    transport: &TransportConfig,
    config: &ClientConfig,
) -> Result<Box<dyn Transport>, TransportError> {
    match transport {
        TransportConfig::Serial { port, baud_rate } => {
            Ok(Box::new(SerialTransport::open(port, *baud_rate)?))
        }
        TransportConfig::Tcp { host, port } => Ok(Box::new(TcpTransport::new(
            host.clone(),
            *port,
            config.connect_timeout_ms,
            config.idle_timeout_ms,
        ))),
    }
}
