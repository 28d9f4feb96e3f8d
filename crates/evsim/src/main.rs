use anyhow::Context;
use clap::Parser;
use evsim::config::FleetConfig;
use evsim::{fleet, ui};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// OCPP 1.6-J EV charging station fleet simulator.
#[derive(Debug, Parser)]
#[command(name = "evsim", version, about)]
struct Args {
    /// Fleet descriptor file
    #[arg(short, long, default_value = "fleet.json")]
    config: PathBuf,

    /// Log filter, e.g. "info" or "evsim_station=debug"
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log)),
        )
        .init();

    let config = if args.config.exists() {
        FleetConfig::load(&args.config)?
    } else {
        warn!(
            config = %args.config.display(),
            "fleet descriptor not found, using the built-in default fleet"
        );
        FleetConfig::default()
    };

    info!(stations = config.stations.len(), url = %config.central_system_url, "starting fleet");
    let fleet = fleet::bootstrap(&config)
        .await
        .context("fleet bootstrap failed")?;

    if config.ui_server.enabled {
        let ui_fleet = fleet.clone();
        let host = config.ui_server.host.clone();
        let port = config.ui_server.port;
        tokio::spawn(async move {
            if let Err(err) = ui::serve(ui_fleet, &host, port).await {
                warn!(error = %err, "operator UI server exited");
            }
        });
    }

    tokio::signal::ctrl_c().await.context("signal handler")?;
    info!("shutdown requested");
    fleet.stop_all().await;
    Ok(())
}
