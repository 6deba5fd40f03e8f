//! Logging Module
//!
//! Structured logging to the console and a daily rolling file.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "fleet-arrival-monitor.log";

/// Initialize logging; `debug` lowers the default level when `RUST_LOG` is unset
pub fn init(debug: bool) {
    let log_dir = get_log_directory();

    let file_layer = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE)),
        ),
        Err(e) => {
            eprintln!("Cannot create log directory {:?}: {}", log_dir, e);
            None
        }
    };

    let console_layer = fmt::layer().with_target(debug);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn default_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug,hyper=warn,reqwest=warn")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    }
}

fn get_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("FleetArrivalMonitor")
        .join("logs")
}
