//! Protocol constants
//!
//! These constants define the framing, timing and size limits used when
//! talking to the radio.

// ============================================================================
// Framing
// ============================================================================

/// First magic byte at the start of every frame.
pub const MAGIC_0: u8 = 0x94;
/// Second magic byte at the start of every frame.
pub const MAGIC_1: u8 = 0xC3;
/// Both magic bytes, in wire order.
pub const MAGIC: [u8; 2] = [MAGIC_0, MAGIC_1];
/// Frame header size: magic (2 bytes) + big-endian payload length (2 bytes).
pub const HEADER_SIZE: usize = 4;
/// Largest payload accepted in either direction.
pub const MAX_PAYLOAD: usize = 512;
/// Default capacity of the decode buffer (one maximum-size frame).
pub const DECODE_BUFFER_CAPACITY: usize = MAX_PAYLOAD + HEADER_SIZE;

// ============================================================================
// Correlation
// ============================================================================

/// Reserved config id used to re-request state after the radio reboots.
///
/// The radio only reports its own node for this id, skipping the rest of its
/// node database.
pub const REBOOT_RESYNC_CONFIG_ID: u32 = 69420;
/// Upper bound (exclusive) for randomly drawn config ids (31-bit).
pub const CONFIG_ID_LIMIT: u32 = 0x7FFF_FFFF;

// ============================================================================
// Addresses
// ============================================================================

/// Destination address that reaches every node on the channel.
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// How long a single connect attempt may take before another is started.
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;
/// How long a TCP link may go without a completed report before it is reset.
pub const IDLE_TIMEOUT_MS: u64 = 65_000;
/// Keep-alive interval for serial sessions. The radio closes serial sessions
/// that stay silent for 15 minutes.
pub const HEARTBEAT_INTERVAL_MS: u64 = 60_000;
/// Suggested pause between polls when nothing new arrived.
pub const NO_NEWS_PAUSE_MS: u64 = 25;
/// Minimum spacing between "unrecognized variant" log lines.
pub const UNKNOWN_VARIANT_LOG_INTERVAL_MS: u64 = 100;

// ============================================================================
// Network defaults
// ============================================================================

/// Address of the radio when it runs its own access point.
pub const DEFAULT_RADIO_HOST: &str = "192.168.42.1";
/// TCP port the radio listens on.
pub const DEFAULT_RADIO_PORT: u16 = 4403;
/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

// ============================================================================
// Sizes
// ============================================================================

/// Maximum user id length, including the terminator slot.
pub const MAX_USER_ID_LEN: usize = 32;
/// Maximum long name length, including the terminator slot.
pub const MAX_LONG_NAME_LEN: usize = 32;
/// Maximum short name length, including the terminator slot.
pub const MAX_SHORT_NAME_LEN: usize = 8;
/// Maximum formatted MAC address length, including the terminator slot.
pub const MAX_MACADDR_LEN: usize = 32;
/// Maximum channel name length, including the terminator slot.
pub const MAX_CHANNEL_NAME_LEN: usize = 12;
/// Maximum application payload carried by one mesh packet.
pub const MAX_DATA_PAYLOAD_LEN: usize = 233;
