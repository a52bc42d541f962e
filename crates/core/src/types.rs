use serde::{Deserialize, Serialize};

pub type HandheldId = u8;
pub type TowerId = u8;
pub type MessageId = u16;

/// Fixed-point scale used for latitude/longitude on the air.
pub const COORD_SCALE: f64 = 1e7;

pub const V1_FRAME_SIZE: usize = 14;
pub const V2_FRAME_SIZE: usize = 23;
pub const ACK_FRAME_SIZE: usize = 3;

pub const ACK_OK: u8 = 1;

/// Packet protocol spoken by the handhelds a station is paired with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    #[default]
    V1,
    /// Frames carry the transmitter's send date and second-of-day.
    V2,
}

impl ProtocolVersion {
    pub const fn frame_size(self) -> usize {
        match self {
            ProtocolVersion::V1 => V1_FRAME_SIZE,
            ProtocolVersion::V2 => V2_FRAME_SIZE,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::V1 => f.write_str("v1"),
            ProtocolVersion::V2 => f.write_str("v2"),
        }
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ProtocolVersion::V1),
            "v2" | "2" => Ok(ProtocolVersion::V2),
            other => Err(format!("unknown protocol version: {other}")),
        }
    }
}

pub fn scale_coord(degrees: f64) -> i32 {
    (degrees * COORD_SCALE).round() as i32
}

pub fn unscale_coord(raw: i32) -> f64 {
    raw as f64 / COORD_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes_match_field_widths() {
        assert_eq!(ProtocolVersion::V1.frame_size(), 1 + 1 + 1 + 4 + 4 + 1 + 2);
        assert_eq!(
            ProtocolVersion::V2.frame_size(),
            2 + 1 + 1 + 4 + 1 + 1 + 1 + 4 + 4 + 1 + 2 + 1
        );
    }

    #[test]
    fn parses_protocol_names() {
        assert_eq!("v2".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V2));
        assert_eq!("V1".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1));
        assert!("v3".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn coord_scaling_keeps_seven_decimals() {
        assert_eq!(scale_coord(37.7749), 377_749_000);
        assert!((unscale_coord(-1_224_194_000) + 122.4194).abs() < 1e-7);
    }
}
