//! radio intake and backend relay for the SOS base station

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sos_relay_core::FormatError;

pub mod backend;
pub mod interpreter;
pub mod queue;
pub mod scheduler;
pub mod simulated;

pub use backend::{Backend, HttpBackend, TransportFault};
pub use interpreter::{Interpretation, PacketInterpreter};
pub use queue::{DeliveryQueue, DrainOutcome, RetryPolicy};
pub use scheduler::{RelayScheduler, SchedulerConfig, SchedulerStats};
pub use simulated::{LinkStats, SimulatedRadio, SimulatedRadioHandle};

/// Address shared by the base station's read pipe and write pipe.
pub const BASE_ADDRESS: &[u8; 5] = b"BSE01";

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio hardware failed to initialize: {0}")]
    HardwareInit(String),

    #[error("invalid radio configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write ACK payload on pipe {pipe}")]
    AckWriteFailed { pipe: u8 },
}

/// Everything that can go wrong between the antenna and the backend.
/// Returned by [`RelayScheduler::start`] and carried up to the binaries.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Radio(#[from] RadioError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Transport(#[from] TransportFault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRate {
    #[serde(rename = "250kbps")]
    Kbps250,
    #[serde(rename = "1mbps")]
    Mbps1,
    #[serde(rename = "2mbps")]
    Mbps2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaLevel {
    Min,
    Low,
    High,
    Max,
}

/// Transceiver setup applied once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub address: String,
    pub channel: u8,
    pub data_rate: DataRate,
    pub pa_level: PaLevel,
    pub read_pipe: u8,
    /// Pipe the ACK payload is queued on.
    pub ack_pipe: u8,
    pub dynamic_payloads: bool,
    pub ack_payloads: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            address: String::from_utf8_lossy(BASE_ADDRESS).into_owned(),
            channel: 100,
            data_rate: DataRate::Kbps250,
            pa_level: PaLevel::Max,
            read_pipe: 0,
            ack_pipe: 1,
            dynamic_payloads: true,
            ack_payloads: true,
        }
    }
}

impl RadioConfig {
    pub const MAX_CHANNEL: u8 = 125;
    pub const MAX_PIPE: u8 = 5;

    pub fn validate(&self) -> Result<(), RadioError> {
        if self.address.len() != 5 {
            return Err(RadioError::InvalidConfig(format!(
                "address must be 5 bytes, got {:?}",
                self.address
            )));
        }
        if self.channel > Self::MAX_CHANNEL {
            return Err(RadioError::InvalidConfig(format!(
                "channel {} out of range 0..={}",
                self.channel,
                Self::MAX_CHANNEL
            )));
        }
        if self.read_pipe > Self::MAX_PIPE || self.ack_pipe > Self::MAX_PIPE {
            return Err(RadioError::InvalidConfig(format!(
                "pipes must be in 0..={}",
                Self::MAX_PIPE
            )));
        }
        if !self.dynamic_payloads || !self.ack_payloads {
            return Err(RadioError::InvalidConfig(
                "dynamic payloads and ACK payloads are both required".into(),
            ));
        }
        Ok(())
    }
}

/// Transceiver driver consumed by the packet interpreter.
///
/// Calls are expected to return quickly; a call that blocks longer than a
/// scheduler tick stalls the whole station.
pub trait Radio: Send {
    /// Applies `config` and starts listening.
    fn begin(&mut self, config: &RadioConfig) -> Result<(), RadioError>;

    fn available(&mut self) -> bool;

    /// Length of the frame at the head of the receive FIFO.
    fn dynamic_payload_size(&mut self) -> usize;

    /// Pops the head frame, returning at most `len` bytes of it.
    fn read(&mut self, len: usize) -> Vec<u8>;

    fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<(), RadioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_radio_config() {
        let config = RadioConfig::default();
        assert_eq!(config.address.as_bytes(), BASE_ADDRESS);
        assert_eq!(config.channel, 100);
        assert_eq!(config.data_rate, DataRate::Kbps250);
        assert_eq!(config.pa_level, PaLevel::Max);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_radio_config() {
        let bad_address = RadioConfig {
            address: "BASE-01".into(),
            ..Default::default()
        };
        assert!(matches!(bad_address.validate(), Err(RadioError::InvalidConfig(_))));

        let bad_channel = RadioConfig {
            channel: 126,
            ..Default::default()
        };
        assert!(bad_channel.validate().is_err());

        let no_acks = RadioConfig {
            ack_payloads: false,
            ..Default::default()
        };
        assert!(no_acks.validate().is_err());
    }

    #[test]
    fn test_relay_error_keeps_source_message() {
        let err: RelayError = FormatError::SizeMismatch { expected: 14, actual: 3 }.into();
        assert_eq!(err.to_string(), "frame size mismatch: expected 14 bytes, got 3");

        let err: RelayError = TransportFault::Timeout.into();
        assert!(matches!(err, RelayError::Transport(TransportFault::Timeout)));

        let err: RelayError = RadioError::HardwareInit("NRF24 not found".into()).into();
        assert_eq!(err.to_string(), "radio hardware failed to initialize: NRF24 not found");
    }
}
