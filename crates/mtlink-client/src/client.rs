//! The client engine.
//!
//! A [`Client`] owns one transport, one decode buffer, one report session and
//! the timers. The caller drives it by calling [`Client::pump`] with the
//! current time; each pump does at most one read, one decode and one
//! heartbeat, and never sleeps.

use std::time::Duration;

use mtlink_metrics::{metric_defs, metrics, MetricLabels};
use mtlink_protocol::{
    FrameAssembler, FromRadio, MeshPacket, MessageCodec, PortNum, ProstCodec, ProtocolError, ProtocolSession, ToRadio,
    CONFIG_ID_LIMIT, DECODE_BUFFER_CAPACITY, MAX_DATA_PAYLOAD_LEN, REBOOT_RESYNC_CONFIG_ID,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher, PacketHandler};
use crate::error::ClientError;
use crate::lifecycle::HeartbeatTimer;
use crate::session::ReportHandler;
use crate::time::Timestamp;
use crate::transport::{open_transport, Transport, TransportError};

/// Result of one [`Client::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tick {
    /// Whether the transport can move data.
    pub link_up: bool,
    /// Whether bytes arrived or a frame was processed. When false, the caller
    /// should pause for [`Client::idle_pause`] before pumping again.
    pub progressed: bool,
}

/// Poll-driven client for one radio.
pub struct Client<T: Transport, C: MessageCodec = ProstCodec> {
    config: ClientConfig,
    transport: T,
    protocol: ProtocolSession<C>,
    dispatcher: Dispatcher,
    heartbeat: HeartbeatTimer,
    rng: ChaCha8Rng,
    labels: Vec<(&'static str, String)>,
    metric_labels: MetricLabels,
    read_buf: Vec<u8>,
    was_up: bool,
    stalled_on: Option<usize>,
    debug: bool,
}

impl Client<Box<dyn Transport>, ProstCodec> {
    /// Open the transport named in the configuration and build a client.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport_config = config.transport.clone().ok_or(ClientError::NoTransport)?;
        let transport = open_transport(&transport_config, &config)?;
        Ok(Client::new(config, transport))
    }
}

impl<T: Transport> Client<T, ProstCodec> {
    /// Build a client over an already constructed transport.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_codec(config, transport, ProstCodec)
    }
}

impl<T: Transport, C: MessageCodec> Client<T, C> {
    /// Build a client with a custom message codec.
    pub fn with_codec(config: ClientConfig, transport: T, codec: C) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let assembler = FrameAssembler::new().with_policy(config.oversize_policy);
        let metric_labels = MetricLabels::new(config.name.clone(), transport.kind());
        let mut dispatcher = Dispatcher::new(config.unknown_variant_log_interval_ms);
        dispatcher.set_debug(config.debug);

        Client {
            protocol: ProtocolSession::with_codec(codec, assembler),
            dispatcher,
            heartbeat: HeartbeatTimer::new(config.heartbeat_interval_ms),
            rng: ChaCha8Rng::seed_from_u64(seed),
            labels: metric_labels.to_labels(),
            metric_labels,
            read_buf: vec![0u8; DECODE_BUFFER_CAPACITY],
            was_up: false,
            stalled_on: None,
            debug: config.debug,
            transport,
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The radio's node number, once it has reported it.
    pub fn my_node_num(&self) -> Option<u32> {
        self.dispatcher.my_node_num()
    }

    /// Whether a report request is outstanding.
    pub fn is_report_pending(&self) -> bool {
        self.dispatcher.session().is_armed()
    }

    /// The correlation id of the outstanding report request.
    pub fn pending_report_id(&self) -> Option<u32> {
        self.dispatcher.session().correlation_id()
    }

    /// Declared length of an oversize frame header holding up the decode
    /// buffer, if the stream is stalled on one.
    pub fn stalled_frame(&self) -> Option<usize> {
        self.stalled_on
    }

    /// Turn verbose per-frame diagnostics on or off.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
        self.dispatcher.set_debug(debug);
    }

    /// How long to wait before pumping again after a tick without progress.
    pub fn idle_pause(&self) -> Duration {
        Duration::from_millis(self.config.no_news_pause_ms)
    }

    // ========================================================================
    // Pump
    // ========================================================================

    /// Run one scheduler tick at `now`.
    ///
    /// Per-frame problems are logged and counted here; only an unusable
    /// transport is returned as an error.
    pub fn pump(&mut self, now: Timestamp) -> Result<Tick, ClientError> {
        let link_up = match self.transport.connect(now) {
            Ok(up) => up,
            Err(TransportError::Unavailable(reason)) => {
                warn!("Client[{}]: transport unavailable: {}", self.config.name, reason);
                self.set_link_state(false);
                return Err(TransportError::Unavailable(reason).into());
            }
            Err(e) => {
                debug!("Client[{}]: connect failed: {}", self.config.name, e);
                false
            }
        };
        self.set_link_state(link_up);

        let mut progressed = false;
        if link_up {
            progressed |= self.read_into_buffer();
        }

        match self.protocol.try_decode() {
            Ok(Some(message)) => {
                progressed = true;
                self.stalled_on = None;
                metrics::counter!(metric_defs::FRAMES_RECEIVED.name, &self.labels).increment(1);
                metrics::histogram!(metric_defs::FRAME_PAYLOAD_SIZE.name, &self.labels)
                    .record(self.protocol.last_frame_len() as f64);
                if self.config.refresh_idle_on_traffic {
                    self.transport.reset_idle_timeout(now);
                }
                self.handle_message(now, message);
            }
            Ok(None) => {}
            Err(ProtocolError::OversizeFrame { declared, max }) => {
                // A held oversize header is a stall, not progress. Report it
                // once until the buffer is cleared.
                let held = self.protocol.assembler().buffered_len() > 0;
                if !held || self.stalled_on != Some(declared) {
                    self.record_frame_error(&ProtocolError::OversizeFrame { declared, max });
                }
                self.stalled_on = held.then_some(declared);
            }
            Err(e) => {
                progressed = true;
                self.stalled_on = None;
                self.record_frame_error(&e);
            }
        }

        if self.transport.wants_heartbeat() && self.heartbeat.due(now) {
            self.heartbeat.mark_sent(now);
            if let Err(e) = self.send_heartbeat() {
                warn!("Client[{}]: heartbeat failed: {}", self.config.name, e);
            }
        }

        Ok(Tick { link_up, progressed })
    }

    fn set_link_state(&mut self, up: bool) {
        if up == self.was_up {
            return;
        }
        self.was_up = up;
        metrics::gauge!(metric_defs::LINK_UP.name, &self.labels).set(if up { 1.0 } else { 0.0 });
        if up {
            debug!("Client[{}]: link up, clearing decode buffer", self.config.name);
            metrics::counter!(metric_defs::LINK_ESTABLISHED.name, &self.labels).increment(1);
            self.protocol.reset();
            self.stalled_on = None;
        } else {
            debug!("Client[{}]: link down", self.config.name);
        }
    }

    fn read_into_buffer(&mut self) -> bool {
        let room = self.protocol.remaining_capacity().min(self.read_buf.len());
        if room == 0 {
            return false;
        }
        match self.transport.read_available(&mut self.read_buf[..room]) {
            Ok(0) => false,
            Ok(n) => {
                let kept = self.protocol.feed(&self.read_buf[..n]);
                if kept < n {
                    metrics::counter!(metric_defs::BYTES_DROPPED.name, &self.labels).increment((n - kept) as u64);
                }
                if self.debug {
                    trace!("Client[{}]: read {} bytes", self.config.name, n);
                }
                true
            }
            Err(e) => {
                debug!("Client[{}]: read failed: {}", self.config.name, e);
                false
            }
        }
    }

    fn record_frame_error(&mut self, err: &ProtocolError) {
        match err {
            ProtocolError::BadMagic { .. } => {
                debug!("Client[{}]: {}", self.config.name, err);
                metrics::counter!(metric_defs::FRAME_RESYNCS.name, &self.labels).increment(1);
            }
            ProtocolError::OversizeFrame { .. } => {
                debug!("Client[{}]: {}", self.config.name, err);
                metrics::counter!(metric_defs::OVERSIZE_FRAMES.name, &self.labels).increment(1);
            }
            _ => {
                debug!("Client[{}]: decoding failed: {}", self.config.name, err);
                metrics::counter!(metric_defs::DECODE_FAILURES.name, &self.labels).increment(1);
            }
        }
    }

    fn handle_message(&mut self, now: Timestamp, message: FromRadio) {
        let kind = message.variant_name();
        let outcome = self.dispatcher.dispatch(now, message);
        let labels = self.metric_labels.with(&[("kind", kind.to_string())]);
        metrics::counter!(metric_defs::MESSAGES_DISPATCHED.name, &labels).increment(1);

        match outcome {
            DispatchOutcome::ReportDone => {
                let labels = self.metric_labels.with(&[("outcome", "done".to_string())]);
                metrics::counter!(metric_defs::REPORT_OUTCOMES.name, &labels).increment(1);
                self.transport.reset_idle_timeout(now);
            }
            DispatchOutcome::ReportMismatch { .. } => {
                let labels = self.metric_labels.with(&[("outcome", "invalid".to_string())]);
                metrics::counter!(metric_defs::REPORT_OUTCOMES.name, &labels).increment(1);
            }
            DispatchOutcome::ResyncRequested => {
                debug!(
                    "Client[{}]: radio rebooted, requesting state with id {}",
                    self.config.name, REBOOT_RESYNC_CONFIG_ID
                );
                if let Err(e) = self.send(&ToRadio::want_config(REBOOT_RESYNC_CONFIG_ID)) {
                    warn!("Client[{}]: resync request failed: {}", self.config.name, e);
                }
            }
            DispatchOutcome::Unrecognized(_) => {
                metrics::counter!(metric_defs::UNKNOWN_VARIANTS.name, &self.labels).increment(1);
            }
            DispatchOutcome::Handled | DispatchOutcome::Dropped(_) => {}
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Ask the radio for its node and channel report under a random id.
    ///
    /// Returns the id. The session is armed only if the request was sent.
    pub fn request_report<H>(&mut self, handler: H) -> Result<u32, ClientError>
    where
        H: ReportHandler + 'static,
    {
        let id = self.next_correlation_id();
        self.request_report_with_id(id, handler)?;
        Ok(id)
    }

    /// Ask for a report under a caller-chosen id.
    pub fn request_report_with_id<H>(&mut self, id: u32, handler: H) -> Result<(), ClientError>
    where
        H: ReportHandler + 'static,
    {
        debug!("Client[{}]: requesting report with id {}", self.config.name, id);
        self.send(&ToRadio::want_config(id))?;
        self.dispatcher.arm_report(id, Box::new(handler));
        Ok(())
    }

    fn next_correlation_id(&mut self) -> u32 {
        loop {
            let id = self.rng.gen_range(1..CONFIG_ID_LIMIT);
            if id != REBOOT_RESYNC_CONFIG_ID {
                return id;
            }
        }
    }

    /// Install a handler for mesh packets, replacing any previous one.
    pub fn set_packet_handler<H>(&mut self, handler: H)
    where
        H: PacketHandler + 'static,
    {
        self.dispatcher.set_packet_handler(Some(Box::new(handler)));
    }

    /// Remove the mesh packet handler.
    pub fn clear_packet_handler(&mut self) {
        self.dispatcher.set_packet_handler(None);
    }

    /// Send a text message to `dest` on channel `channel`. Returns the packet id.
    pub fn send_text(&mut self, text: &str, dest: u32, channel: u32) -> Result<u32, ClientError> {
        if text.len() > MAX_DATA_PAYLOAD_LEN {
            return Err(ClientError::TextTooLong {
                len: text.len(),
                max: MAX_DATA_PAYLOAD_LEN,
            });
        }
        self.send_app_data(PortNum::TextMessageApp, text.as_bytes().to_vec(), dest, channel)
    }

    /// Send an application payload on `port`. Returns the packet id.
    pub fn send_app_data(
        &mut self,
        port: PortNum,
        payload: Vec<u8>,
        dest: u32,
        channel: u32,
    ) -> Result<u32, ClientError> {
        if payload.len() > MAX_DATA_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_DATA_PAYLOAD_LEN,
                actual: payload.len(),
            }
            .into());
        }
        let id = self.rng.gen_range(1..CONFIG_ID_LIMIT);
        let packet = MeshPacket::with_data(id, dest, channel, port, payload);
        debug!(
            "Client[{}]: sending packet {} on port {:?} to {:#010x}",
            self.config.name, id, port, dest
        );
        self.send(&ToRadio::packet(packet))?;
        Ok(id)
    }

    /// Send a keep-alive.
    pub fn send_heartbeat(&mut self) -> Result<(), ClientError> {
        if self.debug {
            trace!("Client[{}]: sending heartbeat", self.config.name);
        }
        self.send(&ToRadio::heartbeat())?;
        metrics::counter!(metric_defs::HEARTBEATS_SENT.name, &self.labels).increment(1);
        Ok(())
    }

    /// Frame and write one message.
    pub fn send(&mut self, message: &ToRadio) -> Result<(), ClientError> {
        let frame = self.protocol.encode(message)?;
        let result = self.transport.write(&frame);
        match result {
            Ok(written) if written == frame.len() => Ok(()),
            Ok(written) => {
                metrics::counter!(metric_defs::SEND_FAILURES.name, &self.labels).increment(1);
                Err(ClientError::SendFailure {
                    written,
                    expected: frame.len(),
                })
            }
            Err(e) => {
                metrics::counter!(metric_defs::SEND_FAILURES.name, &self.labels).increment(1);
                Err(e.into())
            }
        }
    }
}
