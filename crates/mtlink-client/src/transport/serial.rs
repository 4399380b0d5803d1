//! Serial port transport.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, trace};

use super::{Transport, TransportError};
use crate::time::Timestamp;

/// Read timeout on the port. Reads only ask for bytes already buffered, so
/// this bounds a stall on misbehaving drivers.
const PORT_TIMEOUT: Duration = Duration::from_millis(10);

/// A byte stream that can report how much is waiting to be read.
pub trait SerialStream: Read + Write {
    /// Bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;
}

impl SerialStream for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }
}

/// Transport over a serial port.
///
/// A serial link is always considered up. The radio drops serial clients
/// that stay silent for too long, so this transport asks for heartbeats.
pub struct SerialTransport<P: SerialStream = Box<dyn SerialPort>> {
    port: P,
    name: String,
}

impl SerialTransport<Box<dyn SerialPort>> {
    /// Open a serial device at 8N1.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(PORT_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()?;
        debug!("SerialTransport[{}]: opened at {} baud", path, baud_rate);
        Ok(Self::from_stream(port, path))
    }
}

impl<P: SerialStream> SerialTransport<P> {
    /// Wrap an already open stream.
    pub fn from_stream(port: P, name: impl Into<String>) -> Self {
        SerialTransport {
            port,
            name: name.into(),
        }
    }

    /// Access the underlying stream.
    pub fn stream_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl<P: SerialStream> Transport for SerialTransport<P> {
    fn connect(&mut self, _now: Timestamp) -> Result<bool, TransportError> {
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let available = self.port.bytes_available()?;
        let wanted = available.min(buf.len());
        if wanted == 0 {
            return Ok(0);
        }
        match self.port.read(&mut buf[..wanted]) {
            Ok(n) => {
                trace!("SerialTransport[{}]: read {} bytes", self.name, n);
                Ok(n)
            }
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut written = 0;
        while written < data.len() {
            match self.port.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_transient(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        if let Err(e) = self.port.flush() {
            if !is_transient(&e) {
                return Err(e.into());
            }
        }
        if written < data.len() {
            debug!(
                "SerialTransport[{}]: tried to send {} bytes but sent {}",
                self.name,
                data.len(),
                written
            );
        }
        Ok(written)
    }

    fn wants_heartbeat(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "serial"
    }
}
