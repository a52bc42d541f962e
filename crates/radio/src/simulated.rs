//! Simulated transceiver for testing and for running the station without hardware

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use rand::Rng;

use crate::{Radio, RadioConfig, RadioError};

/// In-memory stand-in for the transceiver. Frames pushed through a
/// [`SimulatedRadioHandle`] land in the receive FIFO; ACK payloads written
/// by the station are recorded for inspection.
pub struct SimulatedRadio {
    shared: Arc<Mutex<Shared>>,
    init_failure: Option<String>,
}

/// Handheld side of a [`SimulatedRadio`].
#[derive(Clone)]
pub struct SimulatedRadioHandle {
    shared: Arc<Mutex<Shared>>,
}

#[derive(Debug, Default)]
struct Shared {
    config: Option<RadioConfig>,
    rx_fifo: VecDeque<Vec<u8>>,
    acks: Vec<(u8, Vec<u8>)>,
    packet_loss: f32,
    fail_ack_writes: bool,
    stats: LinkStats,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub bytes_received: u64,
    pub acks_written: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedRadio {
    pub fn new() -> (Self, SimulatedRadioHandle) {
        Self::with_packet_loss(0.0)
    }

    /// A link that silently loses each transmitted frame with probability
    /// `packet_loss`.
    pub fn with_packet_loss(packet_loss: f32) -> (Self, SimulatedRadioHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            packet_loss: packet_loss.clamp(0.0, 1.0),
            ..Default::default()
        }));
        let radio = Self {
            shared: shared.clone(),
            init_failure: None,
        };
        (radio, SimulatedRadioHandle { shared })
    }

    /// A radio whose `begin` fails, as when the module is not wired up.
    pub fn unresponsive(reason: impl Into<String>) -> (Self, SimulatedRadioHandle) {
        let (mut radio, handle) = Self::new();
        radio.init_failure = Some(reason.into());
        (radio, handle)
    }

    pub fn fail_ack_writes(&self, fail: bool) {
        lock(&self.shared).fail_ack_writes = fail;
    }
}

impl Radio for SimulatedRadio {
    fn begin(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        if let Some(reason) = &self.init_failure {
            return Err(RadioError::HardwareInit(reason.clone()));
        }
        config.validate()?;
        debug!(
            "Simulated radio listening on {:?}, channel {}, {:?}",
            config.address, config.channel, config.data_rate
        );
        lock(&self.shared).config = Some(config.clone());
        Ok(())
    }

    fn available(&mut self) -> bool {
        let shared = lock(&self.shared);
        shared.config.is_some() && !shared.rx_fifo.is_empty()
    }

    fn dynamic_payload_size(&mut self) -> usize {
        lock(&self.shared).rx_fifo.front().map_or(0, Vec::len)
    }

    fn read(&mut self, len: usize) -> Vec<u8> {
        let mut shared = lock(&self.shared);
        match shared.rx_fifo.pop_front() {
            Some(mut frame) => {
                frame.truncate(len);
                shared.stats.bytes_received += frame.len() as u64;
                frame
            }
            None => Vec::new(),
        }
    }

    fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<(), RadioError> {
        let mut shared = lock(&self.shared);
        if shared.fail_ack_writes {
            return Err(RadioError::AckWriteFailed { pipe });
        }
        trace!("Simulated ACK on pipe {}: {:02x?}", pipe, payload);
        shared.acks.push((pipe, payload.to_vec()));
        shared.stats.acks_written += 1;
        Ok(())
    }
}

impl SimulatedRadioHandle {
    /// Puts a frame on the air. Returns `false` if the simulated link lost it.
    pub fn transmit(&self, frame: Vec<u8>) -> bool {
        let mut shared = lock(&self.shared);
        let drop_frame = shared.packet_loss > 0.0 && {
            let mut rng = rand::rng();
            rng.random::<f32>() < shared.packet_loss
        };
        if drop_frame {
            shared.stats.frames_dropped += 1;
            debug!("Simulated frame loss ({} bytes)", frame.len());
            return false;
        }
        shared.stats.frames_sent += 1;
        shared.rx_fifo.push_back(frame);
        true
    }

    /// Drains the ACK payloads written since the last call.
    pub fn take_acks(&self) -> Vec<(u8, Vec<u8>)> {
        std::mem::take(&mut lock(&self.shared).acks)
    }

    pub fn pending_frames(&self) -> usize {
        lock(&self.shared).rx_fifo.len()
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.shared).config.is_some()
    }

    pub fn stats(&self) -> LinkStats {
        lock(&self.shared).stats
    }
}
