//! Turns received radio frames into relay messages

use chrono::Utc;
use log::{info, warn};

use sos_relay_core::{decode_status, encode_ack, MessageId, ProtocolVersion, RelayMessage};

use crate::queue::DeliveryQueue;
use crate::Radio;

/// Result of one interpreter cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// No frame waiting.
    Idle,
    /// Frame had the wrong size and was read off the radio unused.
    Discarded { size: usize, expected: usize },
    /// Frame decoded and queued. `acked` is false if the ACK write failed.
    Relayed { msg_id: MessageId, acked: bool },
}

pub struct PacketInterpreter {
    version: ProtocolVersion,
    ack_pipe: u8,
}

impl PacketInterpreter {
    pub fn new(version: ProtocolVersion, ack_pipe: u8) -> Self {
        Self { version, ack_pipe }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Handles at most one waiting frame.
    pub fn poll<R: Radio + ?Sized>(
        &self,
        radio: &mut R,
        queue: &mut DeliveryQueue,
    ) -> Interpretation {
        if !radio.available() {
            return Interpretation::Idle;
        }

        let expected = self.version.frame_size();
        let size = radio.dynamic_payload_size();
        if size != expected {
            // Read it anyway so the receive FIFO does not stay blocked.
            let dropped = radio.read(size);
            warn!(
                "Ignored invalid payload size: {}, expected {} ({})",
                size,
                expected,
                hex::encode(&dropped)
            );
            return Interpretation::Discarded { size, expected };
        }

        let raw = radio.read(size);
        let packet = match decode_status(&raw, self.version) {
            Ok(packet) => packet,
            Err(e) => {
                // The driver handed back fewer bytes than it announced.
                warn!("Dropped frame: {} ({})", e, hex::encode(&raw));
                return Interpretation::Discarded {
                    size: raw.len(),
                    expected,
                };
            }
        };

        let message = RelayMessage::from_packet(&packet, Utc::now());
        let msg_id = message.msg_id();
        match &message {
            RelayMessage::V1(m) => info!(
                "Message received: msg_id {} from handheld {} via tower {} at ({:.7}, {:.7}): {}",
                m.msg_id, m.handheld_id, m.tower_id, m.lat, m.lon, m.status_str
            ),
            RelayMessage::V2(m) => {
                info!(
                    "Message received: msg_id {} ({}) from handheld {} via tower {} \
                     at ({:.7}, {:.7}): {}, latency {}",
                    m.msg_id,
                    m.type_str,
                    m.handheld_id,
                    m.tower_id,
                    m.lat,
                    m.lon,
                    m.status_str,
                    m.latency
                );
                if m.latency_ms.is_none() {
                    warn!("msg_id {} carries an invalid send date, latency unknown", m.msg_id);
                }
            }
        }

        queue.push(message);

        let acked = match radio.write_ack_payload(self.ack_pipe, &encode_ack(msg_id)) {
            Ok(()) => {
                info!("ACK sent for msg_id {}", msg_id);
                true
            }
            Err(e) => {
                warn!("ACK for msg_id {} not written: {}", msg_id, e);
                false
            }
        };

        Interpretation::Relayed { msg_id, acked }
    }
}
