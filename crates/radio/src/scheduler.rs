//! Fixed-period relay loop driving the interpreter and the delivery queue

use std::future::Future;
use std::time::Duration;

use log::{debug, info};
use tokio::time::{interval, MissedTickBehavior};

use sos_relay_core::ProtocolVersion;

use crate::backend::Backend;
use crate::interpreter::{Interpretation, PacketInterpreter};
use crate::queue::{DeliveryQueue, DrainOutcome, RetryPolicy};
use crate::{Radio, RadioConfig, RelayError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_period: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(50),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub frames_relayed: u64,
    pub frames_discarded: u64,
    pub acks_failed: u64,
    pub delivered: u64,
    pub requeued: u64,
    pub queue_depth: usize,
}

/// Owns the whole receive-and-relay pipeline. Each tick runs one
/// interpreter cycle, then one delivery cycle, strictly in that order.
pub struct RelayScheduler<R, B> {
    config: SchedulerConfig,
    radio: R,
    backend: B,
    interpreter: PacketInterpreter,
    queue: DeliveryQueue,
    stats: SchedulerStats,
}

impl<R: Radio, B: Backend> RelayScheduler<R, B> {
    pub fn new(
        radio: R,
        backend: B,
        interpreter: PacketInterpreter,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            config,
            radio,
            backend,
            interpreter,
            queue: DeliveryQueue::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Brings the radio up and builds a scheduler around it. A radio that
    /// cannot be initialized is fatal to the station.
    pub fn start(
        mut radio: R,
        radio_config: &RadioConfig,
        backend: B,
        version: ProtocolVersion,
        config: SchedulerConfig,
    ) -> Result<Self, RelayError> {
        radio.begin(radio_config)?;
        info!(
            "Base station ready: protocol {}, {}-byte frames, channel {}",
            version,
            version.frame_size(),
            radio_config.channel
        );
        let interpreter = PacketInterpreter::new(version, radio_config.ack_pipe);
        Ok(Self::new(radio, backend, interpreter, config))
    }

    pub async fn tick(&mut self) -> (Interpretation, DrainOutcome) {
        self.stats.ticks += 1;

        let interpretation = self.interpreter.poll(&mut self.radio, &mut self.queue);
        match interpretation {
            Interpretation::Idle => {}
            Interpretation::Discarded { .. } => self.stats.frames_discarded += 1,
            Interpretation::Relayed { acked, .. } => {
                self.stats.frames_relayed += 1;
                if !acked {
                    self.stats.acks_failed += 1;
                }
            }
        }

        let outcome = self.queue.drain_one(&self.backend, &self.config.retry).await;
        match outcome {
            DrainOutcome::Idle => {}
            DrainOutcome::Delivered { .. } => self.stats.delivered += 1,
            DrainOutcome::Requeued { .. } => self.stats.requeued += 1,
        }

        self.stats.queue_depth = self.queue.len();
        (interpretation, outcome)
    }

    /// Ticks every `tick_period` until `shutdown` resolves. Shutdown is only
    /// observed between ticks; undelivered messages are abandoned.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Relay loop started, period {:?}", self.config.tick_period);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let (interpretation, outcome) = self.tick().await;
                    if interpretation != Interpretation::Idle || outcome != DrainOutcome::Idle {
                        debug!("tick {}: {:?} / {:?}", self.stats.ticks, interpretation, outcome);
                    }
                }
            }
        }

        info!(
            "Relay loop stopped after {} ticks: {} relayed, {} delivered, {} still queued",
            self.stats.ticks,
            self.stats.frames_relayed,
            self.stats.delivered,
            self.queue.len()
        );
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sos_relay_core::{encode_status, RelayMessage, StatusPacket, StatusPacketV1};

    use crate::backend::TransportFault;
    use crate::{RadioError, SimulatedRadio};

    #[derive(Default)]
    struct RecordingBackend {
        down: Mutex<bool>,
        delivered: Mutex<Vec<u16>>,
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        async fn post(&self, message: &RelayMessage) -> Result<u16, TransportFault> {
            if *self.down.lock().unwrap() {
                return Err(TransportFault::Timeout);
            }
            self.delivered.lock().unwrap().push(message.msg_id());
            Ok(201)
        }
    }

    fn frame(msg_id: u16) -> Vec<u8> {
        encode_status(&StatusPacket::V1(StatusPacketV1 {
            packet_type: 1,
            handheld_id: 3,
            tower_id: 1,
            latitude: 1,
            longitude: 2,
            status: 2,
            msg_id,
        }))
    }

    fn scheduler() -> (
        RelayScheduler<SimulatedRadio, RecordingBackend>,
        crate::SimulatedRadioHandle,
    ) {
        let (radio, handle) = SimulatedRadio::new();
        let scheduler = RelayScheduler::start(
            radio,
            &RadioConfig::default(),
            RecordingBackend::default(),
            ProtocolVersion::V1,
            SchedulerConfig::default(),
        )
        .unwrap();
        (scheduler, handle)
    }

    #[test]
    fn test_start_fails_without_hardware() {
        let (radio, _handle) = SimulatedRadio::unresponsive("radio not found");
        let result = RelayScheduler::start(
            radio,
            &RadioConfig::default(),
            RecordingBackend::default(),
            ProtocolVersion::V1,
            SchedulerConfig::default(),
        );
        assert!(matches!(result, Err(RelayError::Radio(RadioError::HardwareInit(_)))));
    }

    #[test]
    fn test_start_rejects_invalid_radio_config() {
        let (radio, _handle) = SimulatedRadio::new();
        let config = RadioConfig {
            channel: 200,
            ..Default::default()
        };
        let result = RelayScheduler::start(
            radio,
            &config,
            RecordingBackend::default(),
            ProtocolVersion::V1,
            SchedulerConfig::default(),
        );
        assert!(matches!(result, Err(RelayError::Radio(RadioError::InvalidConfig(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_interprets_then_drains() {
        let (mut scheduler, handle) = scheduler();
        handle.transmit(frame(10));
        handle.transmit(frame(11));

        let (first, delivered) = scheduler.tick().await;
        assert_eq!(first, Interpretation::Relayed { msg_id: 10, acked: true });
        assert!(matches!(delivered, DrainOutcome::Delivered { msg_id: 10, .. }));
        assert_eq!(handle.pending_frames(), 1);

        scheduler.tick().await;
        let (idle, drained) = scheduler.tick().await;
        assert_eq!(idle, Interpretation::Idle);
        assert_eq!(drained, DrainOutcome::Idle);

        assert_eq!(*scheduler.backend().delivered.lock().unwrap(), vec![10, 11]);
        let stats = scheduler.stats();
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.frames_relayed, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.queue_depth, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_keeps_messages_queued() {
        let (mut scheduler, handle) = scheduler();
        *scheduler.backend().down.lock().unwrap() = true;
        handle.transmit(frame(1));
        handle.transmit(frame(2));
        handle.transmit(vec![0u8; 5]);

        for _ in 0..3 {
            scheduler.tick().await;
        }
        let stats = scheduler.stats();
        assert_eq!(stats.frames_relayed, 2);
        assert_eq!(stats.frames_discarded, 1);
        assert_eq!(stats.requeued, 3);
        assert_eq!(stats.queue_depth, 2);
        assert_eq!(handle.take_acks().len(), 2);

        *scheduler.backend().down.lock().unwrap() = false;
        scheduler.tick().await;
        scheduler.tick().await;
        assert!(scheduler.queue().is_empty());
        assert_eq!(*scheduler.backend().delivered.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_once_per_period_until_shutdown() {
        let (mut scheduler, handle) = scheduler();
        handle.transmit(frame(21));

        scheduler.run(tokio::time::sleep(Duration::from_millis(1_000))).await;

        let stats = scheduler.stats();
        assert!((19..=21).contains(&stats.ticks), "ticks = {}", stats.ticks);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_cycle_and_keeps_queue() {
        let (mut scheduler, handle) = scheduler();
        *scheduler.backend().down.lock().unwrap() = true;
        handle.transmit(frame(1));
        handle.transmit(frame(2));

        let started = tokio::time::Instant::now();
        scheduler.run(tokio::time::sleep(Duration::from_millis(100))).await;

        // The first tick fires at once and its three failed attempts with
        // their retry delays run to completion before shutdown is seen.
        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
        let stats = scheduler.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.frames_relayed, 1);
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.delivered, 0);
        assert!(!scheduler.queue().is_empty());
        assert_eq!(handle.pending_frames(), 1);
        assert!(scheduler.backend().delivered.lock().unwrap().is_empty());
    }
}
