//! simulation tools for the SOS relay base station

pub mod config;
pub mod handheld;
pub mod scenarios;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use sos_relay_core::RelayMessage;
use sos_relay_radio::{Backend, TransportFault};

/// Radio link quality between the handhelds and the station.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConditions {
    /// Share of frames that never reach the station.
    pub packet_loss: f32,
    /// Share of frames that arrive with the wrong length.
    pub malformed_rate: f32,
    /// Time between reports from each handheld.
    pub report_interval: Duration,
}

pub struct SimulationPresets;

impl SimulationPresets {
    pub fn good_conditions() -> LinkConditions {
        LinkConditions {
            packet_loss: 0.02,
            malformed_rate: 0.0,
            report_interval: Duration::from_millis(500),
        }
    }

    pub fn average_conditions() -> LinkConditions {
        LinkConditions {
            packet_loss: 0.10,
            malformed_rate: 0.05,
            report_interval: Duration::from_millis(500),
        }
    }

    pub fn poor_conditions() -> LinkConditions {
        LinkConditions {
            packet_loss: 0.30,
            malformed_rate: 0.15,
            report_interval: Duration::from_millis(250),
        }
    }
}

/// Backend wrapper that fails the first `failures` posts, simulating an
/// outage of the events service.
pub struct FlakyBackend<B> {
    inner: B,
    remaining_failures: AtomicU32,
}

impl<B> FlakyBackend<B> {
    pub fn new(inner: B, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
        }
    }

    pub fn remaining_failures(&self) -> u32 {
        self.remaining_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<B: Backend> Backend for FlakyBackend<B> {
    async fn post(&self, message: &RelayMessage) -> Result<u16, TransportFault> {
        let outage = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            debug!("Simulated backend outage for msg_id {}", message.msg_id());
            return Err(TransportFault::Connect("simulated outage".into()));
        }
        self.inner.post(message).await
    }
}
