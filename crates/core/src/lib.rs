//! protocol types for the SOS relay base station

pub mod frame;
pub mod labels;
pub mod latency;
pub mod message;
pub mod types;

pub use frame::{
    decode_ack, decode_status, encode_ack, encode_status, AckFrame, FormatError, StatusPacket,
    StatusPacketV1, StatusPacketV2,
};
pub use latency::{send_instant, Latency, LatencyError};
pub use message::{RelayMessage, RelayMessageV1, RelayMessageV2};
pub use types::{HandheldId, MessageId, ProtocolVersion, TowerId};
