//! sdnmqd entry point.

use clap::Parser;
use sdnmqd::SdnmqConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SDN-MQ bridge between a controller and a message broker
#[derive(Parser, Debug)]
#[command(name = "sdnmqd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = sdnmqd::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG is used when unset
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sdnmqd");

    let mut config = match SdnmqConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    config.apply_env_overrides();

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    shutdown.cancel();
                }
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    });

    match sdnmqd::run(config, shutdown).await {
        Ok(()) => {
            info!("sdnmqd stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "sdnmqd failed");
            ExitCode::FAILURE
        }
    }
}
