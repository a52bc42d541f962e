//! Backend-ready records built from decoded packets.
//!
//! Both variants serialize as a flat JSON object; the backend tells them
//! apart by the fields present.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::{StatusPacket, StatusPacketV1, StatusPacketV2};
use crate::labels::{packet_type_label, response_label, status_label, UNKNOWN};
use crate::latency::{send_instant, Latency};
use crate::types::{unscale_coord, HandheldId, MessageId, ProtocolVersion, TowerId};

pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessageV1 {
    /// Station local time at receive.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub packet_type: u8,
    pub handheld_id: HandheldId,
    pub tower_id: TowerId,
    pub lat: f64,
    pub lon: f64,
    pub status: u8,
    pub status_str: String,
    pub msg_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessageV2 {
    #[serde(rename = "type")]
    pub packet_type: u8,
    pub type_str: String,
    pub handheld_id: HandheldId,
    pub tower_id: TowerId,
    pub lat: f64,
    pub lon: f64,
    pub status: u8,
    pub status_str: String,
    pub msg_id: MessageId,
    pub response_code: u8,
    pub response_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    pub received_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub latency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayMessage {
    V2(RelayMessageV2),
    V1(RelayMessageV1),
}

impl RelayMessage {
    /// Builds the relay record for a packet received at `received`.
    pub fn from_packet(packet: &StatusPacket, received: DateTime<Utc>) -> Self {
        match packet {
            StatusPacket::V1(p) => RelayMessage::V1(Self::build_v1(p, received)),
            StatusPacket::V2(p) => RelayMessage::V2(Self::build_v2(p, received)),
        }
    }

    fn build_v1(p: &StatusPacketV1, received: DateTime<Utc>) -> RelayMessageV1 {
        RelayMessageV1 {
            timestamp: received
                .with_timezone(&Local)
                .format(LOCAL_TIMESTAMP_FORMAT)
                .to_string(),
            packet_type: p.packet_type,
            handheld_id: p.handheld_id,
            tower_id: p.tower_id,
            lat: unscale_coord(p.latitude),
            lon: unscale_coord(p.longitude),
            status: p.status,
            status_str: status_label(ProtocolVersion::V1, p.status).to_string(),
            msg_id: p.msg_id,
        }
    }

    fn build_v2(p: &StatusPacketV2, received: DateTime<Utc>) -> RelayMessageV2 {
        let sent = send_instant(p.year, p.month, p.day, p.seconds_of_day).ok();
        let latency = sent.map(|sent| Latency::between(sent, received));
        RelayMessageV2 {
            packet_type: p.packet_type,
            type_str: packet_type_label(p.packet_type).to_string(),
            handheld_id: p.handheld_id,
            tower_id: p.tower_id,
            lat: unscale_coord(p.latitude),
            lon: unscale_coord(p.longitude),
            status: p.status,
            status_str: status_label(ProtocolVersion::V2, p.status).to_string(),
            msg_id: p.msg_id,
            response_code: p.response_code,
            response_str: response_label(p.response_code).to_string(),
            sent_at: sent.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            received_at: received.to_rfc3339_opts(SecondsFormat::Millis, true),
            latency_ms: latency.map(|l| l.as_millis()),
            latency: latency
                .map(|l| l.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    pub fn msg_id(&self) -> MessageId {
        match self {
            RelayMessage::V1(m) => m.msg_id,
            RelayMessage::V2(m) => m.msg_id,
        }
    }

    pub fn handheld_id(&self) -> HandheldId {
        match self {
            RelayMessage::V1(m) => m.handheld_id,
            RelayMessage::V2(m) => m.handheld_id,
        }
    }

    pub fn status_str(&self) -> &str {
        match self {
            RelayMessage::V1(m) => &m.status_str,
            RelayMessage::V2(m) => &m.status_str,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        match self {
            RelayMessage::V1(_) => ProtocolVersion::V1,
            RelayMessage::V2(_) => ProtocolVersion::V2,
        }
    }
}
