//! `diskwatch` - Remote server disk usage monitor
//!
//! Checks disk usage on the configured servers over SSH and sends alerts
//! through the enabled channels when the utilization threshold is exceeded
//! or a server cannot be reached.

mod cli;
mod error;

use clap::Parser;
use diskwatch_core::{Monitor, MonitorConfig};

use cli::Cli;
use error::CliError;

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let config = MonitorConfig::load(&cli.config)?;
    let monitor = Monitor::new(config);

    // Ctrl-C stops the run between I/O boundaries; dropping the run future
    // releases any open session through its Drop impl.
    tokio::select! {
        summary = monitor.run() => {
            println!(
                "Monitoring complete: {} successful, {} failed",
                summary.succeeded, summary.failed
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Monitoring interrupted by user");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(&cli).await {
        tracing::error!("{err}");
        if err.is_missing_config() {
            tracing::info!("Copy config.yaml.example to config.yaml and edit it");
        }
        std::process::exit(err.exit_code());
    }
}
