//! Simulation scenarios for the relay pipeline over a simulated radio link

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, Instant, MissedTickBehavior};

use sos_relay_core::ProtocolVersion;
use sos_relay_radio::{
    Backend, RadioConfig, RelayScheduler, SchedulerConfig, SchedulerStats, SimulatedRadio,
    SimulatedRadioHandle,
};

use crate::handheld::{acked_msg_id, corrupt_length, Handheld};
use crate::LinkConditions;

/// Where the simulated handhelds are spread around.
pub const HOME_LAT: f64 = 37.7749;
pub const HOME_LON: f64 = -122.4194;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub conditions: LinkConditions,
    pub version: ProtocolVersion,
    pub handhelds: u8,
    /// How long the handhelds keep reporting.
    pub duration: Duration,
    /// Extra time the station gets to empty its queue afterwards.
    pub drain_grace: Duration,
    pub seed: u64,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        conditions: LinkConditions,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            name: name.into(),
            conditions,
            version,
            handhelds: 3,
            duration: Duration::from_secs(5),
            drain_grace: Duration::from_secs(30),
            seed: 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub frames_sent: u64,
    pub frames_lost: u64,
    pub malformed_sent: u64,
    pub acks_received: u64,
    pub stats: SchedulerStats,
}

impl ScenarioReport {
    /// Frames that reached the station with a valid length.
    pub fn expected_deliveries(&self) -> u64 {
        self.frames_sent - self.frames_lost - self.malformed_sent
    }
}

struct Traffic {
    handhelds: Vec<Handheld>,
    rng: StdRng,
    malformed_rate: f32,
    frames_sent: u64,
    frames_lost: u64,
    malformed_sent: u64,
    acks_received: u64,
}

impl Traffic {
    fn report(&mut self, link: &SimulatedRadioHandle) {
        for handheld in &mut self.handhelds {
            let mut frame = handheld.next_frame(&mut self.rng, Utc::now());
            // Only count malformed frames that actually reach the station.
            let malformed = self.rng.random::<f32>() < self.malformed_rate;
            if malformed {
                frame = corrupt_length(&mut self.rng, frame);
            }
            self.frames_sent += 1;
            if !link.transmit(frame) {
                self.frames_lost += 1;
            } else if malformed {
                self.malformed_sent += 1;
            }
        }
    }

    fn collect_acks(&mut self, link: &SimulatedRadioHandle) {
        self.acks_received += link
            .take_acks()
            .iter()
            .filter(|(_, payload)| acked_msg_id(payload).is_some())
            .count() as u64;
    }
}

/// Runs handheld traffic through a station relaying to `backend`.
pub async fn run_relay_scenario<B: Backend>(
    scenario: &Scenario,
    backend: B,
) -> Result<ScenarioReport> {
    info!("Scenario {:?} starting: {:?}", scenario.name, scenario.conditions);

    let (radio, link) = SimulatedRadio::with_packet_loss(scenario.conditions.packet_loss);
    let config = SchedulerConfig::default();
    let period = config.tick_period;
    let mut scheduler = RelayScheduler::start(
        radio,
        &RadioConfig::default(),
        backend,
        scenario.version,
        config,
    )?;

    let mut traffic = Traffic {
        handhelds: (1..=scenario.handhelds)
            .map(|id| Handheld::new(id, 1 + id % 3, HOME_LAT, HOME_LON, scenario.version))
            .collect(),
        rng: StdRng::seed_from_u64(scenario.seed),
        malformed_rate: scenario.conditions.malformed_rate,
        frames_sent: 0,
        frames_lost: 0,
        malformed_sent: 0,
        acks_received: 0,
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut next_report = started;
    loop {
        ticker.tick().await;
        if started.elapsed() >= scenario.duration {
            break;
        }
        if Instant::now() >= next_report {
            traffic.report(&link);
            next_report += scenario.conditions.report_interval;
        }
        scheduler.tick().await;
        traffic.collect_acks(&link);
    }

    let grace_deadline = Instant::now() + scenario.drain_grace;
    while (link.pending_frames() > 0 || !scheduler.queue().is_empty())
        && Instant::now() < grace_deadline
    {
        ticker.tick().await;
        scheduler.tick().await;
        traffic.collect_acks(&link);
    }

    let report = ScenarioReport {
        name: scenario.name.clone(),
        frames_sent: traffic.frames_sent,
        frames_lost: traffic.frames_lost,
        malformed_sent: traffic.malformed_sent,
        acks_received: traffic.acks_received,
        stats: scheduler.stats(),
    };
    info!("Scenario {:?} finished: {:?}", scenario.name, report);
    Ok(report)
}
