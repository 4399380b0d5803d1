//! TCP transport, for radios reachable over WiFi or Ethernet.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::{Transport, TransportError};
use crate::lifecycle::{ConnectionState, LinkAction, LinkLifecycle, LinkStatus};
use crate::time::Timestamp;

/// The network interface underneath a TCP transport.
///
/// On a host the operating system manages the interface; on embedded
/// targets this would be the WiFi radio that must join a network first.
pub trait NetworkLink {
    /// Start joining the network. May block up to `timeout_ms`.
    fn begin(&mut self, timeout_ms: u64);

    /// Current status of the interface.
    fn status(&self) -> LinkStatus;
}

/// Network managed by the host OS, always up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostNetwork;

impl NetworkLink for HostNetwork {
    fn begin(&mut self, _timeout_ms: u64) {}

    fn status(&self) -> LinkStatus {
        LinkStatus::Connected
    }
}

/// Transport over a TCP stream, with reconnect and idle reset.
pub struct TcpTransport<L: NetworkLink = HostNetwork> {
    host: String,
    port: u16,
    network: L,
    lifecycle: LinkLifecycle,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    last_now: Timestamp,
}

impl TcpTransport<HostNetwork> {
    /// Create a transport for `host:port` on the host network.
    pub fn new(host: impl Into<String>, port: u16, connect_timeout_ms: u64, idle_timeout_ms: u64) -> Self {
        Self::with_network(host, port, HostNetwork, connect_timeout_ms, idle_timeout_ms)
    }
}

impl<L: NetworkLink> TcpTransport<L> {
    /// Create a transport over a custom network interface.
    pub fn with_network(
        host: impl Into<String>,
        port: u16,
        network: L,
        connect_timeout_ms: u64,
        idle_timeout_ms: u64,
    ) -> Self {
        TcpTransport {
            host: host.into(),
            port,
            network,
            lifecycle: LinkLifecycle::new(connect_timeout_ms, idle_timeout_ms),
            stream: None,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            last_now: Timestamp::ZERO,
        }
    }

    /// The connection state machine.
    pub fn lifecycle(&self) -> &LinkLifecycle {
        &self.lifecycle
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn open_stream(&mut self) -> bool {
        self.stream = None;
        match self.try_open_stream() {
            Ok(stream) => {
                debug!("TcpTransport[{}]: TCP connection established", self.endpoint());
                self.stream = Some(stream);
                true
            }
            Err(e) => {
                debug!("TcpTransport[{}]: failed to establish TCP connection: {}", self.endpoint(), e);
                false
            }
        }
    }

    fn try_open_stream(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nonblocking(true)?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        }))
    }

    fn drop_stream(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            debug!("TcpTransport[{}]: {}", self.endpoint(), reason);
        }
        self.lifecycle.link_lost();
    }
}

impl<L: NetworkLink> Transport for TcpTransport<L> {
    fn connect(&mut self, now: Timestamp) -> Result<bool, TransportError> {
        self.last_now = now;
        let status = self.network.status();
        match self.lifecycle.poll(now, status) {
            LinkAction::None => {}
            LinkAction::BeginJoin => {
                self.stream = None;
                debug!("TcpTransport[{}]: attempting to join network", self.endpoint());
                self.network.begin(self.connect_timeout.as_millis() as u64);
            }
            LinkAction::OpenStream if self.is_connected() => {
                // Reopened by a send since the last poll.
            }
            LinkAction::OpenStream => {
                let ok = self.open_stream();
                self.lifecycle.stream_opened(now, ok);
            }
            LinkAction::Halt => {
                self.stream = None;
                return Err(TransportError::Unavailable(format!(
                    "no network hardware for {}",
                    self.endpoint()
                )));
            }
        }
        if self.stream.is_some() && self.lifecycle.state() != ConnectionState::Connected {
            self.stream = None;
            debug!("TcpTransport[{}]: network link dropped, closing TCP connection", self.endpoint());
        }
        Ok(self.is_connected())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && self.lifecycle.state() == ConnectionState::Connected
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };
        match stream.read(buf) {
            Ok(0) => {
                self.drop_stream("lost TCP connection");
                Ok(0)
            }
            Ok(n) => {
                trace!("TcpTransport[{}]: read {} bytes", self.endpoint(), n);
                Ok(n)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(0),
            Err(e) => {
                self.drop_stream("TCP read failed");
                Err(e.into())
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.is_connected() {
            if self.lifecycle.state() == ConnectionState::Failed {
                return Err(TransportError::NotConnected);
            }
            debug!("TcpTransport[{}]: lost TCP connection, reopening before send", self.endpoint());
            let ok = self.open_stream();
            self.lifecycle.stream_opened(self.last_now, ok);
            if !ok {
                return Err(TransportError::NotConnected);
            }
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let mut written = 0;
        let mut failure = None;
        while written < data.len() {
            match stream.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if written < data.len() {
            warn!(
                "TcpTransport[{}]: tried to send {} bytes but sent {}",
                self.endpoint(),
                data.len(),
                written
            );
            self.drop_stream("closing TCP connection after short write");
            if let Some(e) = failure {
                return Err(e.into());
            }
        }
        Ok(written)
    }

    fn reset_idle_timeout(&mut self, now: Timestamp) {
        self.lifecycle.refresh_idle(now);
    }

    fn kind(&self) -> &'static str {
        "tcp"
    }
}
