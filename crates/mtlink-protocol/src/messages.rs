//! Messages exchanged with the radio.
//!
//! These are hand-declared `prost` types covering the part of the radio's
//! protobuf schema this crate reads or writes. Field numbers match the radio's
//! schema so they interoperate on the wire. Variants the client never looks
//! inside (configuration dumps, log records, queue status, ...) are kept as
//! opaque bytes; they still decode, so the dispatcher can report their tag.

// ============================================================================
// Radio → host
// ============================================================================

/// Envelope for every message the radio sends to the host.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromRadio {
    /// Monotonic message id assigned by the radio.
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// The payload.
    #[prost(
        oneof = "from_radio::PayloadVariant",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16"
    )]
    pub payload_variant: ::core::option::Option<from_radio::PayloadVariant>,
}

/// Nested types for [`FromRadio`].
pub mod from_radio {
    /// The payload variants of a [`FromRadio`](super::FromRadio) message.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// A packet received over the mesh.
        #[prost(message, tag = "2")]
        Packet(super::MeshPacket),
        /// Information about the radio's own node.
        #[prost(message, tag = "3")]
        MyInfo(super::MyNodeInfo),
        /// One entry of the node database.
        #[prost(message, tag = "4")]
        NodeInfo(super::NodeInfo),
        /// Device configuration (opaque).
        #[prost(bytes, tag = "5")]
        Config(::prost::alloc::vec::Vec<u8>),
        /// Device log line (opaque).
        #[prost(bytes, tag = "6")]
        LogRecord(::prost::alloc::vec::Vec<u8>),
        /// End of a config/node report, echoing the requested id.
        #[prost(uint32, tag = "7")]
        ConfigCompleteId(u32),
        /// The radio restarted.
        #[prost(bool, tag = "8")]
        Rebooted(bool),
        /// Module configuration (opaque).
        #[prost(bytes, tag = "9")]
        ModuleConfig(::prost::alloc::vec::Vec<u8>),
        /// One entry of the channel table.
        #[prost(message, tag = "10")]
        Channel(super::Channel),
        /// Outbound queue status (opaque).
        #[prost(bytes, tag = "11")]
        QueueStatus(::prost::alloc::vec::Vec<u8>),
        /// File transfer chunk (opaque).
        #[prost(bytes, tag = "12")]
        XmodemPacket(::prost::alloc::vec::Vec<u8>),
        /// Device metadata (opaque).
        #[prost(bytes, tag = "13")]
        Metadata(::prost::alloc::vec::Vec<u8>),
        /// MQTT proxy message (opaque).
        #[prost(bytes, tag = "14")]
        MqttClientProxyMessage(::prost::alloc::vec::Vec<u8>),
        /// File listing entry (opaque).
        #[prost(bytes, tag = "15")]
        FileInfo(::prost::alloc::vec::Vec<u8>),
        /// Notification for the user (opaque).
        #[prost(bytes, tag = "16")]
        ClientNotification(::prost::alloc::vec::Vec<u8>),
    }
}

impl FromRadio {
    /// Wrap a payload variant.
    pub fn new(variant: from_radio::PayloadVariant) -> Self {
        FromRadio {
            id: 0,
            payload_variant: Some(variant),
        }
    }

    /// Protobuf field number of the payload variant, if any.
    pub fn variant_tag(&self) -> Option<u32> {
        use from_radio::PayloadVariant::*;
        let tag = match self.payload_variant.as_ref()? {
            Packet(_) => 2,
            MyInfo(_) => 3,
            NodeInfo(_) => 4,
            Config(_) => 5,
            LogRecord(_) => 6,
            ConfigCompleteId(_) => 7,
            Rebooted(_) => 8,
            ModuleConfig(_) => 9,
            Channel(_) => 10,
            QueueStatus(_) => 11,
            XmodemPacket(_) => 12,
            Metadata(_) => 13,
            MqttClientProxyMessage(_) => 14,
            FileInfo(_) => 15,
            ClientNotification(_) => 16,
        };
        Some(tag)
    }

    /// Short snake_case name of the payload variant, for logs and metric labels.
    pub fn variant_name(&self) -> &'static str {
        use from_radio::PayloadVariant::*;
        match &self.payload_variant {
            None => "none",
            Some(Packet(_)) => "packet",
            Some(MyInfo(_)) => "my_info",
            Some(NodeInfo(_)) => "node_info",
            Some(Config(_)) => "config",
            Some(LogRecord(_)) => "log_record",
            Some(ConfigCompleteId(_)) => "config_complete",
            Some(Rebooted(_)) => "rebooted",
            Some(ModuleConfig(_)) => "module_config",
            Some(Channel(_)) => "channel",
            Some(QueueStatus(_)) => "queue_status",
            Some(XmodemPacket(_)) => "xmodem_packet",
            Some(Metadata(_)) => "metadata",
            Some(MqttClientProxyMessage(_)) => "mqtt_proxy",
            Some(FileInfo(_)) => "file_info",
            Some(ClientNotification(_)) => "client_notification",
        }
    }
}

// ============================================================================
// Host → radio
// ============================================================================

/// Envelope for every message the host sends to the radio.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToRadio {
    /// The payload.
    #[prost(oneof = "to_radio::PayloadVariant", tags = "1, 3, 4, 7")]
    pub payload_variant: ::core::option::Option<to_radio::PayloadVariant>,
}

/// Nested types for [`ToRadio`].
pub mod to_radio {
    /// The payload variants of a [`ToRadio`](super::ToRadio) message.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// A packet to transmit over the mesh.
        #[prost(message, tag = "1")]
        Packet(super::MeshPacket),
        /// Ask for the config/node/channel report, tagged with this id.
        #[prost(uint32, tag = "3")]
        WantConfigId(u32),
        /// Tell the radio the client is going away.
        #[prost(bool, tag = "4")]
        Disconnect(bool),
        /// Keep-alive.
        #[prost(message, tag = "7")]
        Heartbeat(super::Heartbeat),
    }
}

impl ToRadio {
    /// Request a full report tagged with `config_id`.
    pub fn want_config(config_id: u32) -> Self {
        ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::WantConfigId(config_id)),
        }
    }

    /// A keep-alive message.
    pub fn heartbeat() -> Self {
        ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Heartbeat(Heartbeat {})),
        }
    }

    /// A packet for the mesh.
    pub fn packet(packet: MeshPacket) -> Self {
        ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Packet(packet)),
        }
    }
}

/// Empty keep-alive message.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Heartbeat {}

// ============================================================================
// Mesh packets
// ============================================================================

/// A packet travelling over the mesh.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MeshPacket {
    /// Sending node number.
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    /// Destination node number ([`BROADCAST_ADDR`](crate::BROADCAST_ADDR) for everyone).
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    /// Channel index the packet was (or will be) sent on.
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    /// Decoded or still-encrypted contents.
    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: ::core::option::Option<mesh_packet::PayloadVariant>,
    /// Packet id, unique per sender.
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    /// Receive time (seconds since epoch) as stamped by the radio.
    #[prost(fixed32, tag = "7")]
    pub rx_time: u32,
    /// Receive SNR.
    #[prost(float, tag = "8")]
    pub rx_snr: f32,
    /// Remaining hops.
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    /// Whether the sender wants an acknowledgement.
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    /// Receive RSSI.
    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
}

/// Nested types for [`MeshPacket`].
pub mod mesh_packet {
    /// Contents of a [`MeshPacket`](super::MeshPacket).
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// Payload the radio could decrypt.
        #[prost(message, tag = "4")]
        Decoded(super::Data),
        /// Payload the radio could not decrypt.
        #[prost(bytes, tag = "5")]
        Encrypted(::prost::alloc::vec::Vec<u8>),
    }
}

impl MeshPacket {
    /// Build an application-data packet.
    pub fn with_data(id: u32, to: u32, channel: u32, port: PortNum, payload: Vec<u8>) -> Self {
        MeshPacket {
            to,
            channel,
            id,
            want_ack: true,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                portnum: port as i32,
                payload,
                ..Default::default()
            })),
            ..Default::default()
        }
    }
}

/// Application payload of a mesh packet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    /// Application port number (see [`PortNum`]).
    #[prost(enumeration = "PortNum", tag = "1")]
    pub portnum: i32,
    /// Raw application bytes.
    #[prost(bytes = "vec", tag = "2")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
    /// Whether the sender wants an application-level response.
    #[prost(bool, tag = "3")]
    pub want_response: bool,
    /// Final destination for relayed payloads.
    #[prost(fixed32, tag = "4")]
    pub dest: u32,
    /// Original sender for relayed payloads.
    #[prost(fixed32, tag = "5")]
    pub source: u32,
    /// Id of the request this answers.
    #[prost(fixed32, tag = "6")]
    pub request_id: u32,
    /// Id of the message this replies to.
    #[prost(fixed32, tag = "7")]
    pub reply_id: u32,
    /// Non-zero when the payload is an emoji reaction.
    #[prost(fixed32, tag = "8")]
    pub emoji: u32,
}

/// Application port numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PortNum {
    /// Unknown / unset.
    UnknownApp = 0,
    /// UTF-8 text message.
    TextMessageApp = 1,
    /// Remote GPIO control.
    RemoteHardwareApp = 2,
    /// Position report.
    PositionApp = 3,
    /// User information.
    NodeinfoApp = 4,
    /// Routing control.
    RoutingApp = 5,
    /// Remote administration.
    AdminApp = 6,
    /// Compressed text.
    TextMessageCompressedApp = 7,
    /// Waypoint.
    WaypointApp = 8,
    /// Audio codec frames.
    AudioApp = 9,
    /// Detection sensor.
    DetectionSensorApp = 10,
    /// Ping/reply test.
    ReplyApp = 32,
    /// IP tunnel.
    IpTunnelApp = 33,
    /// People counter.
    PaxcounterApp = 34,
    /// Serial bridge.
    SerialApp = 64,
    /// Store and forward.
    StoreForwardApp = 65,
    /// Range test.
    RangeTestApp = 66,
    /// Telemetry.
    TelemetryApp = 67,
    /// Traceroute.
    TracerouteApp = 70,
    /// Neighbor info.
    NeighborinfoApp = 71,
    /// Map report.
    MapReportApp = 73,
    /// Private application range start.
    PrivateApp = 256,
}

// ============================================================================
// Node database
// ============================================================================

/// Information about the radio's own node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MyNodeInfo {
    /// The radio's node number.
    #[prost(uint32, tag = "1")]
    pub my_node_num: u32,
    /// Number of reboots since flashing.
    #[prost(uint32, tag = "8")]
    pub reboot_count: u32,
    /// Oldest client app version the radio talks to.
    #[prost(uint32, tag = "11")]
    pub min_app_version: u32,
}

/// One node of the radio's node database.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    /// Node number.
    #[prost(uint32, tag = "1")]
    pub num: u32,
    /// User identity, if known.
    #[prost(message, optional, tag = "2")]
    pub user: ::core::option::Option<User>,
    /// Last known position, if any.
    #[prost(message, optional, tag = "3")]
    pub position: ::core::option::Option<Position>,
    /// SNR of the last packet heard from the node.
    #[prost(float, tag = "4")]
    pub snr: f32,
    /// Time the node was last heard (seconds since epoch).
    #[prost(fixed32, tag = "5")]
    pub last_heard: u32,
    /// Last reported device metrics, if any.
    #[prost(message, optional, tag = "6")]
    pub device_metrics: ::core::option::Option<DeviceMetrics>,
    /// Channel the node was heard on.
    #[prost(uint32, tag = "7")]
    pub channel: u32,
    /// Whether the node was heard via MQTT.
    #[prost(bool, tag = "8")]
    pub via_mqtt: bool,
    /// Hops between the radio and the node.
    #[prost(uint32, tag = "9")]
    pub hops_away: u32,
    /// Whether the node is marked as a favorite.
    #[prost(bool, tag = "10")]
    pub is_favorite: bool,
}

/// User identity broadcast by a node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct User {
    /// Globally unique id, e.g. `!a1b2c3d4`.
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    /// Full display name.
    #[prost(string, tag = "2")]
    pub long_name: ::prost::alloc::string::String,
    /// Short (up to 4 characters) display name.
    #[prost(string, tag = "3")]
    pub short_name: ::prost::alloc::string::String,
    /// Hardware MAC address.
    #[prost(bytes = "vec", tag = "4")]
    pub macaddr: ::prost::alloc::vec::Vec<u8>,
    /// Hardware model code.
    #[prost(int32, tag = "5")]
    pub hw_model: i32,
    /// Whether the user is a licensed amateur operator.
    #[prost(bool, tag = "6")]
    pub is_licensed: bool,
    /// Device role code.
    #[prost(int32, tag = "7")]
    pub role: i32,
}

/// A position fix.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Position {
    /// Latitude in 1e-7 degrees.
    #[prost(sfixed32, tag = "1")]
    pub latitude_i: i32,
    /// Longitude in 1e-7 degrees.
    #[prost(sfixed32, tag = "2")]
    pub longitude_i: i32,
    /// Altitude in meters above sea level.
    #[prost(int32, tag = "3")]
    pub altitude: i32,
    /// Time the position was recorded by the radio (seconds since epoch).
    #[prost(fixed32, tag = "4")]
    pub time: u32,
    /// Time of the fix itself (seconds since epoch).
    #[prost(fixed32, tag = "7")]
    pub timestamp: u32,
    /// Ground speed in m/s.
    #[prost(uint32, tag = "15")]
    pub ground_speed: u32,
    /// Ground track in 1e-5 degrees.
    #[prost(uint32, tag = "16")]
    pub ground_track: u32,
    /// Satellites in view.
    #[prost(uint32, tag = "19")]
    pub sats_in_view: u32,
}

/// Device health metrics.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceMetrics {
    /// Battery level in percent (101 = powered).
    #[prost(uint32, tag = "1")]
    pub battery_level: u32,
    /// Battery voltage.
    #[prost(float, tag = "2")]
    pub voltage: f32,
    /// Channel utilization in percent.
    #[prost(float, tag = "3")]
    pub channel_utilization: f32,
    /// Transmit air-time utilization in percent.
    #[prost(float, tag = "4")]
    pub air_util_tx: f32,
    /// Uptime in seconds.
    #[prost(uint32, tag = "5")]
    pub uptime_seconds: u32,
}

// ============================================================================
// Channels
// ============================================================================

/// One slot of the radio's channel table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Channel {
    /// Index in the channel table.
    #[prost(int32, tag = "1")]
    pub index: i32,
    /// Channel settings, absent for unused slots.
    #[prost(message, optional, tag = "2")]
    pub settings: ::core::option::Option<ChannelSettings>,
    /// Role of the slot.
    #[prost(enumeration = "channel::Role", tag = "3")]
    pub role: i32,
}

/// Nested types for [`Channel`].
pub mod channel {
    /// Role of a channel slot.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Role {
        /// Slot unused.
        Disabled = 0,
        /// The primary channel.
        Primary = 1,
        /// A secondary channel.
        Secondary = 2,
    }
}

/// Shareable settings of a channel.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelSettings {
    /// Deprecated channel number.
    #[prost(uint32, tag = "1")]
    pub channel_num: u32,
    /// Pre-shared key.
    #[prost(bytes = "vec", tag = "2")]
    pub psk: ::prost::alloc::vec::Vec<u8>,
    /// Short channel name (under 12 bytes).
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    /// Channel id component of the globally unique name.
    #[prost(fixed32, tag = "4")]
    pub id: u32,
    /// Forward mesh traffic to MQTT.
    #[prost(bool, tag = "5")]
    pub uplink_enabled: bool,
    /// Forward MQTT traffic to the mesh.
    #[prost(bool, tag = "6")]
    pub downlink_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BROADCAST_ADDR;
    use prost::Message;

    #[test]
    fn test_want_config_wire_bytes() {
        // field 3, varint: 0x18, then 12345 as varint
        let bytes = ToRadio::want_config(12345).encode_to_vec();
        assert_eq!(bytes, vec![0x18, 0xB9, 0x60]);
    }

    #[test]
    fn test_heartbeat_is_not_empty_on_wire() {
        // field 7, length-delimited, zero length
        let bytes = ToRadio::heartbeat().encode_to_vec();
        assert_eq!(bytes, vec![0x3A, 0x00]);
    }

    #[test]
    fn test_opaque_variant_keeps_tag() {
        let msg = FromRadio::new(from_radio::PayloadVariant::QueueStatus(vec![0x08, 0x01]));
        let decoded = FromRadio::decode(msg.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.variant_tag(), Some(11));
        assert_eq!(decoded.variant_name(), "queue_status");
    }

    #[test]
    fn test_empty_from_radio_has_no_variant() {
        let decoded = FromRadio::decode(&[][..]).unwrap();
        assert_eq!(decoded.variant_tag(), None);
        assert_eq!(decoded.variant_name(), "none");
    }

    #[test]
    fn test_text_packet_builder() {
        let packet = MeshPacket::with_data(7, BROADCAST_ADDR, 2, PortNum::TextMessageApp, b"hi".to_vec());
        assert!(packet.want_ack);
        assert_eq!(packet.channel, 2);
        match packet.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(data)) => {
                assert_eq!(data.portnum, PortNum::TextMessageApp as i32);
                assert_eq!(data.payload, b"hi");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
