//! relay pipeline simulation for the SOS base station

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::net::TcpListener;

use sos_relay_core::ProtocolVersion;
use sos_relay_gateway::EventStore;
use sos_relay_radio::HttpBackend;
use sos_relay_sim::scenarios::{run_relay_scenario, Scenario, ScenarioReport};
use sos_relay_sim::{FlakyBackend, SimulationPresets};

fn print_report(report: &ScenarioReport) {
    println!("Frames sent: {}", report.frames_sent);
    println!("  Lost on the air: {}", report.frames_lost);
    println!("  Malformed: {}", report.malformed_sent);
    println!("  Discarded by station: {}", report.stats.frames_discarded);
    println!("Relayed: {}  ACKs received: {}", report.stats.frames_relayed, report.acks_received);
    println!(
        "Delivered: {} / {}  (requeues: {}, ticks: {})",
        report.stats.delivered,
        report.expected_deliveries(),
        report.stats.requeued,
        report.stats.ticks
    );
    if report.stats.delivered == report.expected_deliveries() {
        println!("{}", "No reports lost".bright_green());
    } else {
        println!(
            "{}",
            format!("{} reports still queued", report.stats.queue_depth).bright_red()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("{}", "SOS Relay Simulation".bright_blue().bold());
    println!("{}", "====================".bright_blue());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("binding mock gateway")?;
    let url = format!("http://{}/api/events", listener.local_addr()?);
    let gateway = EventStore::new();
    let server = tokio::spawn(sos_relay_gateway::serve(listener, gateway.clone()));
    println!("Mock gateway at {}", url);

    let test_scenarios = vec![
        ("Good Conditions", SimulationPresets::good_conditions(), ProtocolVersion::V1),
        ("Average Conditions", SimulationPresets::average_conditions(), ProtocolVersion::V2),
        ("Poor Conditions", SimulationPresets::poor_conditions(), ProtocolVersion::V2),
    ];

    for (name, conditions, version) in test_scenarios {
        println!("{}", format!("\n>>> Testing: {} ({})", name, version).bright_green().bold());
        println!("Packet Loss: {}%", (conditions.packet_loss * 100.0) as u32);
        println!("Malformed: {}%", (conditions.malformed_rate * 100.0) as u32);
        println!("Report interval: {:?}", conditions.report_interval);

        let scenario = Scenario::new(name, conditions, version);
        let report = run_relay_scenario(&scenario, HttpBackend::new(url.clone())?).await?;
        print_report(&report);
        println!("{}", "-".repeat(50));
    }

    println!("{}", "\n>>> Testing: Backend Outage".bright_red().bold());
    println!("The first 20 delivery attempts fail");
    let backend = FlakyBackend::new(HttpBackend::new(url.clone())?, 20);
    let mut scenario = Scenario::new(
        "Backend Outage",
        SimulationPresets::good_conditions(),
        ProtocolVersion::V1,
    );
    scenario.drain_grace = Duration::from_secs(60);
    let report = run_relay_scenario(&scenario, backend).await?;
    print_report(&report);

    println!(
        "\n{} {}",
        "Events stored by gateway:".bright_yellow(),
        gateway.len().await
    );
    server.abort();

    Ok(())
}
