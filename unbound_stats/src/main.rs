//! Entry point: parse config, print the host table, then poll forever.

use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use unbound_stats::collector::HostCollector;
use unbound_stats::config::{Cli, Config};
use unbound_stats::control::RemoteControl;
use unbound_stats::health::HealthFile;
use unbound_stats::publish::{InfluxWriter, Publisher, StdoutPrinter};
use unbound_stats::scheduler::FleetScheduler;

fn init_tracing(verbose: bool) {
    // RUST_LOG wins over --verbose
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::from_cli(cli) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    info!("Starting...");
    info!(
        "UNBOUND_HOSTS definition:\n{}",
        serde_json::to_string_pretty(&config.hosts)?
    );
    debug!(path = %config.healthcheck_file.display(), "healthcheck file");
    if config.test_mode {
        info!("test mode: printing stats instead of uploading to influxdb2");
    }

    let publisher: Arc<dyn Publisher> = match config.influx.clone() {
        Some(settings) => Arc::new(InfluxWriter::new(settings)?),
        None => Arc::new(StdoutPrinter),
    };
    let collector = HostCollector::new(Arc::new(RemoteControl::new()), config.collect_timeout);
    let mut scheduler = FleetScheduler::new(
        config.hosts.clone(),
        collector,
        publisher,
        HealthFile::new(&config.healthcheck_file),
        config.cadence,
    );

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }
    Ok(())
}
