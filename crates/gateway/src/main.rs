use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use sos_relay_gateway::{serve, EventStore};

const DEFAULT_PORT: u16 = 5000;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let port = match std::env::var("GATEWAY_PORT") {
        Ok(p) => p.parse().context("GATEWAY_PORT must be a port number")?,
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    serve(listener, EventStore::new()).await?;

    Ok(())
}
