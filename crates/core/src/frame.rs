//! Fixed-width little-endian frames exchanged with the handhelds.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    unscale_coord, HandheldId, MessageId, ProtocolVersion, TowerId, ACK_FRAME_SIZE, ACK_OK,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Status report, protocol v1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPacketV1 {
    pub packet_type: u8,
    pub handheld_id: HandheldId,
    pub tower_id: TowerId,
    pub latitude: i32,
    pub longitude: i32,
    pub status: u8,
    pub msg_id: MessageId,
}

/// Status report, protocol v2. The leading date and second-of-day are the
/// handheld's UTC clock at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPacketV2 {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub seconds_of_day: u32,
    pub packet_type: u8,
    pub handheld_id: HandheldId,
    pub tower_id: TowerId,
    pub latitude: i32,
    pub longitude: i32,
    pub status: u8,
    pub msg_id: MessageId,
    pub response_code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPacket {
    V1(StatusPacketV1),
    V2(StatusPacketV2),
}

impl StatusPacket {
    pub fn version(&self) -> ProtocolVersion {
        match self {
            StatusPacket::V1(_) => ProtocolVersion::V1,
            StatusPacket::V2(_) => ProtocolVersion::V2,
        }
    }

    pub fn msg_id(&self) -> MessageId {
        match self {
            StatusPacket::V1(p) => p.msg_id,
            StatusPacket::V2(p) => p.msg_id,
        }
    }

    pub fn lat(&self) -> f64 {
        match self {
            StatusPacket::V1(p) => unscale_coord(p.latitude),
            StatusPacket::V2(p) => unscale_coord(p.latitude),
        }
    }

    pub fn lon(&self) -> f64 {
        match self {
            StatusPacket::V1(p) => unscale_coord(p.longitude),
            StatusPacket::V2(p) => unscale_coord(p.longitude),
        }
    }
}

/// Link-layer acknowledgment piggybacked on the radio ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    pub ok: u8,
    pub msg_id: MessageId,
}

/// Decodes a raw frame. The length must match `version` exactly; nothing is
/// decoded from a frame of any other size.
pub fn decode_status(raw: &[u8], version: ProtocolVersion) -> Result<StatusPacket, FormatError> {
    let expected = version.frame_size();
    if raw.len() != expected {
        return Err(FormatError::SizeMismatch {
            expected,
            actual: raw.len(),
        });
    }

    let mut buf = raw;
    let packet = match version {
        ProtocolVersion::V1 => StatusPacket::V1(StatusPacketV1 {
            packet_type: buf.get_u8(),
            handheld_id: buf.get_u8(),
            tower_id: buf.get_u8(),
            latitude: buf.get_i32_le(),
            longitude: buf.get_i32_le(),
            status: buf.get_u8(),
            msg_id: buf.get_u16_le(),
        }),
        ProtocolVersion::V2 => StatusPacket::V2(StatusPacketV2 {
            year: buf.get_u16_le(),
            month: buf.get_u8(),
            day: buf.get_u8(),
            seconds_of_day: buf.get_u32_le(),
            packet_type: buf.get_u8(),
            handheld_id: buf.get_u8(),
            tower_id: buf.get_u8(),
            latitude: buf.get_i32_le(),
            longitude: buf.get_i32_le(),
            status: buf.get_u8(),
            msg_id: buf.get_u16_le(),
            response_code: buf.get_u8(),
        }),
    };
    debug_assert!(!buf.has_remaining());
    Ok(packet)
}

/// Encodes a packet the way a handheld puts it on the air.
pub fn encode_status(packet: &StatusPacket) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet.version().frame_size());
    match packet {
        StatusPacket::V1(p) => {
            out.put_u8(p.packet_type);
            out.put_u8(p.handheld_id);
            out.put_u8(p.tower_id);
            out.put_i32_le(p.latitude);
            out.put_i32_le(p.longitude);
            out.put_u8(p.status);
            out.put_u16_le(p.msg_id);
        }
        StatusPacket::V2(p) => {
            out.put_u16_le(p.year);
            out.put_u8(p.month);
            out.put_u8(p.day);
            out.put_u32_le(p.seconds_of_day);
            out.put_u8(p.packet_type);
            out.put_u8(p.handheld_id);
            out.put_u8(p.tower_id);
            out.put_i32_le(p.latitude);
            out.put_i32_le(p.longitude);
            out.put_u8(p.status);
            out.put_u16_le(p.msg_id);
            out.put_u8(p.response_code);
        }
    }
    out
}

pub fn encode_ack(msg_id: MessageId) -> [u8; ACK_FRAME_SIZE] {
    let id = msg_id.to_le_bytes();
    [ACK_OK, id[0], id[1]]
}

pub fn decode_ack(raw: &[u8]) -> Result<AckFrame, FormatError> {
    if raw.len() != ACK_FRAME_SIZE {
        return Err(FormatError::SizeMismatch {
            expected: ACK_FRAME_SIZE,
            actual: raw.len(),
        });
    }
    let mut buf = raw;
    Ok(AckFrame {
        ok: buf.get_u8(),
        msg_id: buf.get_u16_le(),
    })
}
