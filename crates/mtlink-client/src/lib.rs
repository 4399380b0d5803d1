//! Poll-driven client for a mesh radio module.
//!
//! The client talks to a radio over a serial port or a TCP socket, asks it
//! for its node and channel report, forwards mesh packets to a handler and
//! keeps the link alive with heartbeats. It never blocks: the caller supplies
//! the clock and calls [`Client::pump`] in its own loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use mtlink_client::{Client, ClientConfig, MonotonicClock, TransportConfig};
//!
//! let config = ClientConfig::default().with_transport(TransportConfig::tcp("192.168.42.1", 4403));
//! let mut client = Client::connect(config)?;
//! let clock = MonotonicClock::new();
//!
//! client.request_report(|node: Option<&NodeReport>, _progress: ReportProgress| {
//!     if let Some(node) = node {
//!         println!("{:08x}", node.node_num);
//!     }
//! })?;
//!
//! loop {
//!     let tick = client.pump(clock.now())?;
//!     if !tick.progressed {
//!         std::thread::sleep(client.idle_pause());
//!     }
//! }
//! ```

mod client;
mod config;
mod dispatch;
mod error;
mod lifecycle;
mod session;
mod time;
pub mod transport;

pub use client::{Client, Tick};
pub use config::{ClientConfig, ConfigError, TransportConfig};
pub use dispatch::{
    DispatchOutcome, Dispatcher, DropReason, EncryptedPayload, PacketHandler, PacketHeader, PortPayload, RateLimiter,
    TextMessage,
};
pub use error::ClientError;
pub use lifecycle::{ConnectionState, HeartbeatTimer, LinkAction, LinkLifecycle, LinkStatus};
pub use session::{ReportHandler, ReportSession, Resolution};
pub use time::{MonotonicClock, Timestamp};
pub use transport::{Transport, TransportError};

pub use mtlink_protocol;
