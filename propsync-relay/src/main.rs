//! propsync notification relay
//!
//! Fans listing notifications out to every connected client over
//! server-sent events.
//!
//! Usage:
//!   propsync-relay --port 3002 --db db.json

use anyhow::{Context, Result};
use clap::Parser;
use propsync_relay::{RelayState, SimulatorConfig, build_router, run_simulator};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "propsync-relay")]
#[command(about = "Server-sent event relay for propsync listing notifications")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "3002")]
    port: u16,

    /// JSON database the update simulator reads listings from
    #[arg(long, default_value = "db.json")]
    db: PathBuf,

    /// Seconds between simulated updates (0 disables the simulator)
    #[arg(long, default_value = "30")]
    simulate_interval_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let state = RelayState::default();

    tokio::spawn(run_simulator(
        state.clone(),
        SimulatorConfig {
            db_path: args.db.clone(),
            interval: Duration::from_secs(args.simulate_interval_secs),
        },
    ));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.port))?;
    info!("Relay listening on http://localhost:{}", args.port);
    info!("Event stream:   GET  /api/events");
    info!("Manual trigger: POST /api/events/trigger");

    axum::serve(listener, build_router(state))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
