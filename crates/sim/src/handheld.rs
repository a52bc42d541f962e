//! Simulated handheld transmitters

use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use sos_relay_core::types::scale_coord;
use sos_relay_core::{
    decode_ack, encode_status, HandheldId, MessageId, ProtocolVersion, StatusPacket,
    StatusPacketV1, StatusPacketV2, TowerId,
};

/// Standard deviation of reported positions around home, in degrees (~1 km).
const POSITION_SCATTER_DEG: f64 = 0.01;

pub struct Handheld {
    id: HandheldId,
    tower_id: TowerId,
    home: (f64, f64),
    version: ProtocolVersion,
    next_msg_id: MessageId,
    scatter: Normal<f64>,
}

impl Handheld {
    pub fn new(
        id: HandheldId,
        tower_id: TowerId,
        home_lat: f64,
        home_lon: f64,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            id,
            tower_id,
            home: (home_lat, home_lon),
            version,
            next_msg_id: 1,
            scatter: Normal::new(0.0, POSITION_SCATTER_DEG)
                .expect("scatter is finite and positive"),
        }
    }

    pub fn id(&self) -> HandheldId {
        self.id
    }

    /// Builds the next status report stamped with the handheld's clock `now`.
    pub fn next_packet<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> StatusPacket {
        let msg_id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);

        let latitude = scale_coord((self.home.0 + self.scatter.sample(rng)).clamp(-90.0, 90.0));
        let longitude = scale_coord((self.home.1 + self.scatter.sample(rng)).clamp(-180.0, 180.0));
        // Mostly "safe" check-ins, some emergencies and supply requests.
        let status = match rng.random_range(0..10) {
            0 => 1,
            1 | 2 => 3,
            _ => 2,
        };

        match self.version {
            ProtocolVersion::V1 => StatusPacket::V1(StatusPacketV1 {
                packet_type: 1,
                handheld_id: self.id,
                tower_id: self.tower_id,
                latitude,
                longitude,
                status,
                msg_id,
            }),
            ProtocolVersion::V2 => StatusPacket::V2(StatusPacketV2 {
                year: now.year() as u16,
                month: now.month() as u8,
                day: now.day() as u8,
                seconds_of_day: now.num_seconds_from_midnight(),
                packet_type: 1,
                handheld_id: self.id,
                tower_id: self.tower_id,
                latitude,
                longitude,
                status,
                msg_id,
                response_code: 0,
            }),
        }
    }

    pub fn next_frame<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> Vec<u8> {
        encode_status(&self.next_packet(rng, now))
    }
}

/// Damages a frame the way a marginal link does: cut short or padded.
pub fn corrupt_length<R: Rng + ?Sized>(rng: &mut R, mut frame: Vec<u8>) -> Vec<u8> {
    if rng.random_bool(0.5) && frame.len() > 1 {
        let keep = rng.random_range(1..frame.len());
        frame.truncate(keep);
    } else {
        let extra = rng.random_range(1..=4);
        frame.resize(frame.len() + extra, 0);
    }
    frame
}

/// Message id carried by a valid ACK payload.
pub fn acked_msg_id(raw: &[u8]) -> Option<MessageId> {
    decode_ack(raw).ok().filter(|ack| ack.ok == 1).map(|ack| ack.msg_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sos_relay_core::{decode_status, encode_ack};

    #[test]
    fn test_frames_decode_and_ids_increment() {
        let mut rng = rand::rng();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let mut handheld = Handheld::new(4, 2, 37.7749, -122.4194, ProtocolVersion::V2);

        let first = handheld.next_frame(&mut rng, now);
        let second = handheld.next_frame(&mut rng, now);
        let first = decode_status(&first, ProtocolVersion::V2).unwrap();
        let second = decode_status(&second, ProtocolVersion::V2).unwrap();
        assert_eq!(first.msg_id(), 1);
        assert_eq!(second.msg_id(), 2);
        assert!((first.lat() - 37.7749).abs() < 0.2);

        let StatusPacket::V2(p) = first else {
            panic!("expected v2 packet");
        };
        assert_eq!((p.year, p.month, p.day), (2025, 6, 1));
        assert_eq!(p.seconds_of_day, 8 * 3_600 + 30 * 60);
    }

    #[test]
    fn test_corrupted_frames_change_length() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let frame = corrupt_length(&mut rng, vec![7u8; 14]);
            assert_ne!(frame.len(), 14);
            assert!(!frame.is_empty());
        }
    }

    #[test]
    fn test_acked_msg_id() {
        assert_eq!(acked_msg_id(&encode_ack(513)), Some(513));
        assert_eq!(acked_msg_id(&[0, 1, 2]), None);
        assert_eq!(acked_msg_id(&[1, 2]), None);
    }
}
