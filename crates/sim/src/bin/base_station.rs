//! SOS base station daemon.
//!
//! ```text
//! base_station                        Run with base_station.toml (or defaults)
//! base_station --config <path>        Load a custom config TOML
//! base_station --gen-config           Write default config to stdout
//! base_station --protocol v2          Override the packet protocol
//! base_station --backend-url <url>    Override the events endpoint
//! ```
//!
//! The transceiver is the simulated radio, fed by simulated handhelds.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info};

use sos_relay_core::ProtocolVersion;
use sos_relay_radio::{HttpBackend, RelayScheduler, SimulatedRadio};
use sos_relay_sim::config::StationConfig;
use sos_relay_sim::handheld::{acked_msg_id, Handheld};

#[derive(Parser, Debug)]
#[command(name = "base_station", about = "SOS relay base station")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "base_station.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Packet protocol spoken by the handhelds (v1 or v2).
    #[arg(long)]
    protocol: Option<ProtocolVersion>,

    /// Backend events endpoint.
    #[arg(long)]
    backend_url: Option<String>,
}

/// Resolves once `signal` does. Returns false if the handler could not be
/// installed, in which case the station stops right away.
async fn wait_for_ctrl_c<F>(signal: F) -> bool
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Ctrl-C received, shutting down");
            true
        }
        Err(e) => {
            error!("Cannot listen for Ctrl-C: {e}; shutting down without a signal");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", StationConfig::default().to_toml()?);
        return Ok(());
    }

    let mut config = StationConfig::load(&cli.config)?;
    if let Some(protocol) = cli.protocol {
        config.relay.protocol = protocol;
    }
    if let Some(url) = cli.backend_url {
        config.relay.backend_url = url;
    }

    let env = env_logger::Env::default().default_filter_or(&config.logging.level);
    env_logger::Builder::from_env(env).init();

    info!("base_station v{}", env!("CARGO_PKG_VERSION"));
    info!("backend: {}", config.relay.backend_url);
    info!("protocol: {}", config.relay.protocol);

    let (radio, link) = SimulatedRadio::with_packet_loss(config.simulation.packet_loss);
    let backend =
        HttpBackend::with_timeout(&config.relay.backend_url, config.relay.attempt_timeout())
            .context("building backend client")?;

    let mut scheduler = match RelayScheduler::start(
        radio,
        &config.radio,
        backend,
        config.relay.protocol,
        config.relay.scheduler_config(),
    ) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("{e}");
            return Err(e).context("radio setup failed");
        }
    };

    let sim = config.simulation.clone();
    let version = config.relay.protocol;
    let traffic = tokio::spawn(async move {
        let mut handhelds: Vec<Handheld> = (1..=sim.handhelds)
            .map(|id| Handheld::new(id, 1, sim.home_lat, sim.home_lon, version))
            .collect();
        let period = Duration::from_millis(sim.report_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            for (pipe, payload) in link.take_acks() {
                if let Some(msg_id) = acked_msg_id(&payload) {
                    info!("Handheld side: ACK for msg_id {} on pipe {}", msg_id, pipe);
                }
            }
            for handheld in &mut handhelds {
                let frame = handheld.next_frame(&mut rand::rng(), Utc::now());
                if !link.transmit(frame) {
                    info!("Handheld {}: frame lost on the air", handheld.id());
                }
            }
        }
    });

    scheduler
        .run(async {
            wait_for_ctrl_c(tokio::signal::ctrl_c()).await;
        })
        .await;
    traffic.abort();

    Ok(())
}
