//! Configuration for the base station daemon.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sos_relay_core::ProtocolVersion;
use sos_relay_radio::{RadioConfig, RetryPolicy, SchedulerConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub radio: RadioConfig,
    pub relay: RelaySettings,
    pub simulation: SimulationSettings,
    pub logging: LoggingConfig,
}

/// Packet protocol and backend delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub protocol: ProtocolVersion,
    /// Events endpoint of the backend.
    pub backend_url: String,
    pub tick_period_ms: u64,
    /// Delivery attempts per message per tick.
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
    pub retry_delay_ms: u64,
}

/// Handheld traffic fed into the simulated radio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub handhelds: u8,
    pub report_interval_ms: u64,
    pub packet_loss: f32,
    pub home_lat: f64,
    pub home_lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            protocol: ProtocolVersion::V1,
            backend_url: "http://127.0.0.1:5000/api/events".into(),
            tick_period_ms: SchedulerConfig::default().tick_period.as_millis() as u64,
            max_attempts: retry.max_attempts,
            attempt_timeout_ms: retry.attempt_timeout.as_millis() as u64,
            retry_delay_ms: retry.retry_delay.as_millis() as u64,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            handhelds: 3,
            report_interval_ms: 2_000,
            packet_loss: 0.05,
            home_lat: crate::scenarios::HOME_LAT,
            home_lon: crate::scenarios::HOME_LON,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl RelaySettings {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_period: Duration::from_millis(self.tick_period_ms.max(1)),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
                retry_delay: Duration::from_millis(self.retry_delay_ms),
            },
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl StationConfig {
    /// Loads `path`, or the defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("invalid config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
