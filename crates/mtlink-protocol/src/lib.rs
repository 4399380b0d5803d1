//! Mesh Radio Client Protocol
//!
//! This crate provides the wire-level pieces needed to talk to a mesh radio
//! module over a serial port or a TCP socket. The radio speaks protobuf
//! messages wrapped in a small binary frame.
//!
//! # Protocol Overview
//!
//! Every message in either direction is carried in a frame:
//!
//! ```text
//! +------+------+--------+--------+-------------------+
//! | 0x94 | 0xC3 | len_hi | len_lo | payload[0..len]   |
//! +------+------+--------+--------+-------------------+
//! ```
//!
//! - **Host → radio**: the payload is a [`ToRadio`] message
//! - **Radio → host**: the payload is a [`FromRadio`] message
//!
//! The stream is not self-synchronizing beyond the magic bytes: when the
//! header is corrupt the [`FrameAssembler`] throws away what it has buffered
//! and waits for the next clean frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use mtlink_protocol::{ProtocolSession, ToRadio};
//!
//! let mut session = ProtocolSession::new();
//!
//! // Build a request
//! let bytes = session.encode(&ToRadio::want_config(12345))?;
//!
//! // Feed received bytes and pull messages out
//! session.feed(&received);
//! while let Some(message) = session.try_decode()? {
//!     println!("{:?}", message.variant_name());
//! }
//! ```

mod codec;
mod constants;
mod error;
mod frame;
mod messages;
mod types;

pub use codec::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use messages::*;
pub use types::*;
