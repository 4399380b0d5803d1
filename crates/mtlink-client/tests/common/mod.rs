//! Shared helpers for client integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use mtlink_client::mtlink_protocol::{
    encode_frame, from_radio, Channel, ChannelSettings, FromRadio, MyNodeInfo, NodeInfo, ToRadio, User,
    HEADER_SIZE,
};
use mtlink_client::{Client, ClientConfig, Timestamp, Transport, TransportError};
use prost::Message;

/// Both directions of an in-memory radio link.
#[derive(Debug, Default)]
pub struct Wire {
    /// Bytes the radio has sent, waiting to be read.
    pub rx: VecDeque<u8>,
    /// Frames written by the client, one entry per write.
    pub sent: Vec<Vec<u8>>,
}

/// Transport backed by a shared [`Wire`].
pub struct LoopbackTransport {
    wire: Rc<RefCell<Wire>>,
    chunk: usize,
    heartbeat: bool,
    short_writes: bool,
}

impl LoopbackTransport {
    pub fn new() -> (Self, Rc<RefCell<Wire>>) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let transport = LoopbackTransport {
            wire: wire.clone(),
            chunk: usize::MAX,
            heartbeat: false,
            short_writes: false,
        };
        (transport, wire)
    }

    /// Hand out at most `chunk` bytes per read.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Accept only the first half of every write, recording nothing.
    pub fn with_short_writes(mut self) -> Self {
        self.short_writes = true;
        self
    }

    /// Ask the client for heartbeats, as a serial link does.
    pub fn with_heartbeat(mut self) -> Self {
        self.heartbeat = true;
        self
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self, _now: Timestamp) -> Result<bool, TransportError> {
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut wire = self.wire.borrow_mut();
        let n = buf.len().min(self.chunk).min(wire.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = wire.rx.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if self.short_writes {
            return Ok(data.len() / 2);
        }
        self.wire.borrow_mut().sent.push(data.to_vec());
        Ok(data.len())
    }

    fn wants_heartbeat(&self) -> bool {
        self.heartbeat
    }

    fn kind(&self) -> &'static str {
        "loopback"
    }
}

/// A client over a fresh loopback link with a fixed seed.
pub fn loopback_client() -> (Client<LoopbackTransport>, Rc<RefCell<Wire>>) {
    let (transport, wire) = LoopbackTransport::new();
    (Client::new(test_config(), transport), wire)
}

pub fn test_config() -> ClientConfig {
    ClientConfig::default().with_name("test").with_seed(7)
}

pub fn t(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// Frame raw payload bytes, valid or not.
pub fn raw_frame(payload: &[u8]) -> Vec<u8> {
    encode_frame(payload).unwrap()
}

/// Frame a message the way the radio would.
pub fn frame(message: &FromRadio) -> Vec<u8> {
    encode_frame(&message.encode_to_vec()).unwrap()
}

/// Queue a message for the client to read.
pub fn push(wire: &Rc<RefCell<Wire>>, message: &FromRadio) {
    wire.borrow_mut().rx.extend(frame(message));
}

/// Decode the `index`th frame the client wrote.
pub fn sent_message(wire: &Rc<RefCell<Wire>>, index: usize) -> ToRadio {
    let wire = wire.borrow();
    ToRadio::decode(&wire.sent[index][HEADER_SIZE..]).unwrap()
}

pub fn sent_count(wire: &Rc<RefCell<Wire>>) -> usize {
    wire.borrow().sent.len()
}

/// Pump at `now` until a tick makes no progress.
pub fn pump_until_idle<T: Transport>(client: &mut Client<T>, now: Timestamp) {
    for _ in 0..1000 {
        if !client.pump(now).unwrap().progressed {
            return;
        }
    }
    panic!("client never went idle");
}

// ============================================================================
// Message builders
// ============================================================================

pub fn my_info(node_num: u32) -> FromRadio {
    FromRadio::new(from_radio::PayloadVariant::MyInfo(MyNodeInfo {
        my_node_num: node_num,
        ..Default::default()
    }))
}

pub fn node_info(num: u32, long_name: &str, last_heard: u32) -> FromRadio {
    FromRadio::new(from_radio::PayloadVariant::NodeInfo(NodeInfo {
        num,
        last_heard,
        user: Some(User {
            id: format!("!{:08x}", num),
            long_name: long_name.to_string(),
            short_name: long_name.chars().take(4).collect(),
            ..Default::default()
        }),
        ..Default::default()
    }))
}

pub fn channel(index: i32, name: &str) -> FromRadio {
    FromRadio::new(from_radio::PayloadVariant::Channel(Channel {
        index,
        role: 1,
        settings: Some(ChannelSettings {
            name: name.to_string(),
            ..Default::default()
        }),
    }))
}

pub fn config_complete(id: u32) -> FromRadio {
    FromRadio::new(from_radio::PayloadVariant::ConfigCompleteId(id))
}

pub fn rebooted() -> FromRadio {
    FromRadio::new(from_radio::PayloadVariant::Rebooted(true))
}
