//! Routing of decoded radio messages.

use mtlink_protocol::{
    from_radio::PayloadVariant, mesh_packet, ChannelReport, FromRadio, MeshPacket, NodeReport, PortNum,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::session::{ReportHandler, ReportSession, Resolution};
use crate::time::Timestamp;

// ============================================================================
// Packet events
// ============================================================================

/// Addressing and radio metadata common to all mesh packets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacketHeader {
    pub from: u32,
    pub to: u32,
    pub channel: u32,
    pub id: u32,
    /// Receive time stamped by the radio (seconds since epoch, 0 if unknown).
    pub rx_time: u32,
    pub rx_snr: f32,
    pub rx_rssi: i32,
    pub hop_limit: u32,
}

impl PacketHeader {
    fn from_packet(packet: &MeshPacket) -> Self {
        PacketHeader {
            from: packet.from,
            to: packet.to,
            channel: packet.channel,
            id: packet.id,
            rx_time: packet.rx_time,
            rx_snr: packet.rx_snr,
            rx_rssi: packet.rx_rssi,
            hop_limit: packet.hop_limit,
        }
    }
}

/// A text message received over the mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMessage {
    pub header: PacketHeader,
    /// Message text; invalid UTF-8 is replaced.
    pub text: String,
}

/// A decoded packet for any application port other than text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortPayload {
    pub header: PacketHeader,
    /// Raw port number.
    pub port: i32,
    pub payload: Vec<u8>,
    pub want_response: bool,
}

impl PortPayload {
    /// The port number, if it is one this crate knows.
    pub fn port_num(&self) -> Option<PortNum> {
        PortNum::try_from(self.port).ok()
    }
}

/// A packet the radio could not decrypt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncryptedPayload {
    pub header: PacketHeader,
    pub bytes: Vec<u8>,
}

/// Receives mesh packets. All methods default to ignoring the packet.
pub trait PacketHandler {
    fn on_text_message(&mut self, _message: &TextMessage) {}

    fn on_port_payload(&mut self, _payload: &PortPayload) {}

    fn on_encrypted(&mut self, _payload: &EncryptedPayload) {}
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A report entry or completion arrived with no request outstanding.
    NoSession,
    /// A mesh packet arrived with no packet handler registered.
    NoHandler,
    /// A mesh packet carried no payload.
    EmptyPacket,
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Routed to a handler or absorbed into client state.
    Handled,
    /// Valid but nobody wanted it.
    Dropped(DropReason),
    /// The outstanding report completed.
    ReportDone,
    /// A report completed with the wrong id.
    ReportMismatch {
        expected: u32,
        received: u32,
    },
    /// The radio rebooted; the caller must ask for state again.
    ResyncRequested,
    /// A message kind with no route. Carries its field number, if any.
    Unrecognized(Option<u32>),
}

impl DispatchOutcome {
    /// Short lowercase name, for metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Handled => "handled",
            DispatchOutcome::Dropped(_) => "dropped",
            DispatchOutcome::ReportDone => "report_done",
            DispatchOutcome::ReportMismatch { .. } => "report_mismatch",
            DispatchOutcome::ResyncRequested => "resync",
            DispatchOutcome::Unrecognized(_) => "unrecognized",
        }
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Lets one event through per interval.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval_ms: u64,
    last: Option<Timestamp>,
}

impl RateLimiter {
    pub fn new(interval_ms: u64) -> Self {
        RateLimiter {
            interval_ms,
            last: None,
        }
    }

    /// Whether an event at `now` may pass. The first event always passes;
    /// later ones need strictly more than the interval since the last pass.
    pub fn allow(&mut self, now: Timestamp) -> bool {
        let allowed = match self.last {
            None => true,
            Some(last) => now.millis_since(last) > self.interval_ms,
        };
        if allowed {
            self.last = Some(now);
        }
        allowed
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes each decoded message to exactly one handler.
pub struct Dispatcher {
    my_node_num: Option<u32>,
    node: NodeReport,
    channel: ChannelReport,
    session: ReportSession,
    packet_handler: Option<Box<dyn PacketHandler>>,
    unknown_log: RateLimiter,
    debug: bool,
}

impl Dispatcher {
    /// Create a dispatcher that logs unrecognized messages at most once per
    /// `unknown_log_interval_ms`.
    pub fn new(unknown_log_interval_ms: u64) -> Self {
        Dispatcher {
            my_node_num: None,
            node: NodeReport::default(),
            channel: ChannelReport::default(),
            session: ReportSession::new(),
            packet_handler: None,
            unknown_log: RateLimiter::new(unknown_log_interval_ms),
            debug: false,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// The radio's own node number, once it has reported it.
    pub fn my_node_num(&self) -> Option<u32> {
        self.my_node_num
    }

    /// Install or remove the mesh packet handler.
    pub fn set_packet_handler(&mut self, handler: Option<Box<dyn PacketHandler>>) {
        self.packet_handler = handler;
    }

    /// Arm the report session.
    pub fn arm_report(&mut self, correlation_id: u32, handler: Box<dyn ReportHandler>) {
        self.session.arm(correlation_id, handler);
    }

    pub fn session(&self) -> &ReportSession {
        &self.session
    }

    /// The most recent node snapshot.
    pub fn last_node_report(&self) -> &NodeReport {
        &self.node
    }

    /// The most recent channel snapshot.
    pub fn last_channel_report(&self) -> &ChannelReport {
        &self.channel
    }

    /// Route one message.
    pub fn dispatch(&mut self, now: Timestamp, message: FromRadio) -> DispatchOutcome {
        let tag = message.variant_tag();
        if self.debug {
            trace!("Dispatcher: {} (tag {:?})", message.variant_name(), tag);
        }

        match message.payload_variant {
            Some(PayloadVariant::MyInfo(info)) => {
                debug!("Dispatcher: radio node number is {}", info.my_node_num);
                self.my_node_num = Some(info.my_node_num);
                DispatchOutcome::Handled
            }
            Some(PayloadVariant::NodeInfo(info)) => {
                if !self.session.is_armed() {
                    debug!("Dispatcher: got node {}, but no report is outstanding", info.num);
                    return DispatchOutcome::Dropped(DropReason::NoSession);
                }
                self.node.update_from(&info, self.my_node_num);
                self.session.notify_node(&self.node);
                DispatchOutcome::Handled
            }
            Some(PayloadVariant::Channel(channel)) => {
                if !self.session.is_armed() {
                    debug!("Dispatcher: got channel {}, but no report is outstanding", channel.index);
                    return DispatchOutcome::Dropped(DropReason::NoSession);
                }
                self.channel.update_from(&channel);
                self.session.notify_channel(&self.channel);
                DispatchOutcome::Handled
            }
            Some(PayloadVariant::ConfigCompleteId(id)) => match self.session.resolve(id) {
                Resolution::Done => {
                    debug!("Dispatcher: report {} complete", id);
                    DispatchOutcome::ReportDone
                }
                Resolution::Mismatch { expected } => {
                    debug!("Dispatcher: report completed with id {}, expected {}", id, expected);
                    DispatchOutcome::ReportMismatch {
                        expected,
                        received: id,
                    }
                }
                Resolution::NoSession => {
                    debug!("Dispatcher: report {} completed, but none is outstanding", id);
                    DispatchOutcome::Dropped(DropReason::NoSession)
                }
            },
            Some(PayloadVariant::Packet(packet)) => self.dispatch_packet(packet),
            Some(PayloadVariant::Rebooted(_)) => {
                debug!("Dispatcher: radio rebooted");
                DispatchOutcome::ResyncRequested
            }
            _ => {
                if self.debug && self.unknown_log.allow(now) {
                    debug!("Dispatcher: got a message kind we don't handle: {:?}", tag);
                }
                DispatchOutcome::Unrecognized(tag)
            }
        }
    }

    fn dispatch_packet(&mut self, packet: MeshPacket) -> DispatchOutcome {
        let Some(handler) = self.packet_handler.as_mut() else {
            trace!("Dispatcher: packet {} from {} with no handler", packet.id, packet.from);
            return DispatchOutcome::Dropped(DropReason::NoHandler);
        };
        let header = PacketHeader::from_packet(&packet);

        match packet.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(data)) => {
                if data.portnum == PortNum::TextMessageApp as i32 {
                    let text = String::from_utf8_lossy(&data.payload).into_owned();
                    handler.on_text_message(&TextMessage { header, text });
                } else {
                    handler.on_port_payload(&PortPayload {
                        header,
                        port: data.portnum,
                        payload: data.payload,
                        want_response: data.want_response,
                    });
                }
                DispatchOutcome::Handled
            }
            Some(mesh_packet::PayloadVariant::Encrypted(bytes)) => {
                handler.on_encrypted(&EncryptedPayload { header, bytes });
                DispatchOutcome::Handled
            }
            None => DispatchOutcome::Dropped(DropReason::EmptyPacket),
        }
    }
}
