//! Fleet Arrival Monitor - Main Entry Point
//!
//! Headless daemon: polls the tracker and alerts on arrivals until Ctrl-C.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fleet_arrival_lib::{build_dispatcher, build_monitor, config, config::Config, logging};

/// Command line options; everything else comes from the environment
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Send one manual WhatsApp test message and exit
    #[arg(long)]
    test_send: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(config::debug_flag(std::env::var("DEBUG").ok()));
    info!("Fleet Arrival Monitor starting...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    for line in config.summary() {
        info!("{}", line);
    }

    let result = if cli.test_send {
        test_send(&config).await
    } else {
        run(&config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut monitor = build_monitor(config).context("Failed to set up monitor")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Cannot listen for interrupt signal: {}", e),
        }
    });

    monitor.run(cancel).await;
    Ok(())
}

async fn test_send(config: &Config) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(config).context("Failed to set up messenger")?;
    let sid = dispatcher
        .send_test_message()
        .await
        .context("Test message failed")?;
    info!("Test message accepted, sid {}", sid);
    Ok(())
}
