//! Report snapshots handed to report handlers.
//!
//! A snapshot is overwritten in place for every `node_info` / `channel`
//! message. Handlers only see it for the duration of one call; anything they
//! want to keep has to be cloned.

use serde::Serialize;

use crate::constants::*;
use crate::messages::{channel, Channel, NodeInfo};

/// Progress of a report, passed alongside every report callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportProgress {
    /// A node or channel entry; more will follow.
    InProgress,
    /// The report finished with the requested id.
    Done,
    /// A report finished, but with an id other than the requested one.
    Invalid,
}

impl ReportProgress {
    /// Whether this is a terminal notification (no snapshot attached).
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReportProgress::InProgress)
    }
}

/// User identity part of a [`NodeReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    /// Unique user id, e.g. `!a1b2c3d4`.
    pub id: String,
    /// Full display name.
    pub long_name: String,
    /// Short display name.
    pub short_name: String,
    /// MAC address as colon-separated hex, empty if unknown.
    pub macaddr: String,
}

/// Snapshot of one entry of the radio's node database.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node_num: u32,
    /// Whether this entry describes the radio itself.
    pub is_mine: bool,
    /// Seconds since epoch the node was last heard.
    pub last_heard: u32,
    pub is_favorite: bool,
    pub user: Option<UserIdentity>,
    /// Decimal degrees, NaN when no position is known.
    pub latitude: f64,
    /// Decimal degrees, NaN when no position is known.
    pub longitude: f64,
    pub altitude: i32,
    pub ground_speed: u32,
    /// When the radio recorded the position.
    pub position_time: u32,
    /// When the position fix was taken.
    pub position_timestamp: u32,
    /// Battery percentage, 0 when no metrics are known.
    pub battery_level: u32,
    /// NaN when no metrics are known.
    pub voltage: f32,
    /// NaN when no metrics are known.
    pub channel_utilization: f32,
    /// NaN when no metrics are known.
    pub air_util_tx: f32,
}

impl Default for NodeReport {
    fn default() -> Self {
        NodeReport {
            node_num: 0,
            is_mine: false,
            last_heard: 0,
            is_favorite: false,
            user: None,
            latitude: f64::NAN,
            longitude: f64::NAN,
            altitude: 0,
            ground_speed: 0,
            position_time: 0,
            position_timestamp: 0,
            battery_level: 0,
            voltage: f32::NAN,
            channel_utilization: f32::NAN,
            air_util_tx: f32::NAN,
        }
    }
}

impl NodeReport {
    /// Overwrite this snapshot from a `node_info` message.
    ///
    /// String buffers of a previous user identity are reused.
    pub fn update_from(&mut self, info: &NodeInfo, my_node_num: Option<u32>) {
        self.node_num = info.num;
        self.is_mine = my_node_num == Some(info.num);
        self.last_heard = info.last_heard;
        self.is_favorite = info.is_favorite;

        match &info.user {
            Some(user) => {
                let identity = self.user.get_or_insert_with(UserIdentity::default);
                copy_truncated(&mut identity.id, &user.id, MAX_USER_ID_LEN);
                copy_truncated(&mut identity.long_name, &user.long_name, MAX_LONG_NAME_LEN);
                copy_truncated(&mut identity.short_name, &user.short_name, MAX_SHORT_NAME_LEN);
                identity.macaddr.clear();
                format_macaddr(&mut identity.macaddr, &user.macaddr);
            }
            None => self.user = None,
        }

        match &info.position {
            Some(position) => {
                self.latitude = position.latitude_i as f64 / 1e7;
                self.longitude = position.longitude_i as f64 / 1e7;
                self.altitude = position.altitude;
                self.ground_speed = position.ground_speed;
                self.position_time = position.time;
                self.position_timestamp = position.timestamp;
            }
            None => {
                self.latitude = f64::NAN;
                self.longitude = f64::NAN;
                self.altitude = 0;
                self.ground_speed = 0;
                self.position_time = 0;
                self.position_timestamp = 0;
            }
        }

        match &info.device_metrics {
            Some(metrics) => {
                self.battery_level = metrics.battery_level;
                self.voltage = metrics.voltage;
                self.channel_utilization = metrics.channel_utilization;
                self.air_util_tx = metrics.air_util_tx;
            }
            None => {
                self.battery_level = 0;
                self.voltage = f32::NAN;
                self.channel_utilization = f32::NAN;
                self.air_util_tx = f32::NAN;
            }
        }
    }

    /// Whether the node reported a position.
    pub fn has_position(&self) -> bool {
        !self.latitude.is_nan() && !self.longitude.is_nan()
    }

    /// Whether the node reported device metrics.
    pub fn has_device_metrics(&self) -> bool {
        !self.voltage.is_nan()
    }
}

/// Role of a channel slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    #[default]
    Disabled,
    Primary,
    Secondary,
    /// A role code this crate does not know.
    Unknown(i32),
}

impl From<i32> for ChannelRole {
    fn from(code: i32) -> Self {
        match channel::Role::try_from(code) {
            Ok(channel::Role::Disabled) => ChannelRole::Disabled,
            Ok(channel::Role::Primary) => ChannelRole::Primary,
            Ok(channel::Role::Secondary) => ChannelRole::Secondary,
            Err(_) => ChannelRole::Unknown(code),
        }
    }
}

/// Snapshot of one slot of the radio's channel table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub index: i32,
    pub role: ChannelRole,
    /// Channel name, empty when the slot carries no settings.
    pub name: String,
}

impl ChannelReport {
    /// Overwrite this snapshot from a `channel` message.
    pub fn update_from(&mut self, channel: &Channel) {
        self.index = channel.index;
        self.role = ChannelRole::from(channel.role);
        match &channel.settings {
            Some(settings) => copy_truncated(&mut self.name, &settings.name, MAX_CHANNEL_NAME_LEN),
            None => self.name.clear(),
        }
    }
}

/// Copy `src` into `dst`, keeping at most `max_len - 1` bytes.
///
/// Limits count a terminator slot, as the radio's fixed-size fields do. The
/// cut never splits a UTF-8 character.
fn copy_truncated(dst: &mut String, src: &str, max_len: usize) {
    dst.clear();
    dst.push_str(truncate_field(src, max_len));
}

/// Longest prefix of `s` that fits a field of `max_len` bytes (terminator
/// slot included) without splitting a character.
pub fn truncate_field(s: &str, max_len: usize) -> &str {
    let limit = max_len.saturating_sub(1);
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn format_macaddr(out: &mut String, mac: &[u8]) {
    use std::fmt::Write;
    for (i, byte) in mac.iter().enumerate() {
        // Each octet takes three bytes ("xx:"); stop before the field overflows.
        if out.len() + if i == 0 { 2 } else { 3 } > MAX_MACADDR_LEN - 1 {
            break;
        }
        if i > 0 {
            out.push(':');
        }
        let _ = write!(out, "{:02x}", byte);
    }
}
