//! Rendering of reports and packets for the terminal.

use mtlink_client::{EncryptedPayload, PortPayload, TextMessage};
use mtlink_protocol::{ChannelReport, ChannelRole, NodeReport, BROADCAST_ADDR};
use serde::Serialize;

/// Everything collected from one report request.
#[derive(Debug, Default, Serialize)]
pub struct ReportSummary {
    pub nodes: Vec<NodeReport>,
    pub channels: Vec<ChannelReport>,
}

/// Format a node number the way the radio names users.
pub fn node_id(num: u32) -> String {
    if num == BROADCAST_ADDR {
        "^all".to_string()
    } else {
        format!("!{:08x}", num)
    }
}

pub fn node_line(node: &NodeReport) -> String {
    let (long_name, short_name) = match &node.user {
        Some(user) => (user.long_name.as_str(), user.short_name.as_str()),
        None => ("", ""),
    };
    let mut line = format!(
        "{}{} {:<31} {:<7}",
        node_id(node.node_num),
        if node.is_mine { "*" } else { " " },
        long_name,
        short_name
    );
    if node.has_position() {
        line.push_str(&format!(" {:>10.5},{:>11.5}", node.latitude, node.longitude));
    }
    if node.has_device_metrics() {
        line.push_str(&format!(" bat {:>3}% {:.2}V", node.battery_level, node.voltage));
    }
    if node.last_heard != 0 {
        line.push_str(&format!(" heard {}", node.last_heard));
    }
    line
}

pub fn channel_line(channel: &ChannelReport) -> String {
    let role = match channel.role {
        ChannelRole::Disabled => "disabled".to_string(),
        ChannelRole::Primary => "primary".to_string(),
        ChannelRole::Secondary => "secondary".to_string(),
        ChannelRole::Unknown(code) => format!("role {}", code),
    };
    format!("#{} {:<11} {}", channel.index, channel.name, role)
}

pub fn text_line(message: &TextMessage) -> String {
    format!(
        "{} -> {} [ch {}]: {}",
        node_id(message.header.from),
        node_id(message.header.to),
        message.header.channel,
        message.text
    )
}

pub fn payload_line(payload: &PortPayload) -> String {
    let port = match payload.port_num() {
        Some(port) => format!("{:?}", port),
        None => format!("port {}", payload.port),
    };
    format!(
        "{} -> {} [ch {}]: {} ({} bytes)",
        node_id(payload.header.from),
        node_id(payload.header.to),
        payload.header.channel,
        port,
        payload.payload.len()
    )
}

pub fn encrypted_line(payload: &EncryptedPayload) -> String {
    format!(
        "{} -> {} [ch {}]: encrypted ({} bytes)",
        node_id(payload.header.from),
        node_id(payload.header.to),
        payload.header.channel,
        payload.bytes.len()
    )
}
