//! Fleet Arrival Monitor Library
//!
//! Polls a vehicle-tracking provider and sends a one-time WhatsApp alert when
//! a truck comes within range of the destination.

pub mod adapter;
pub mod auth;
pub mod client;
pub mod config;
pub mod feed;
pub mod gate;
pub mod geo;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod schedule;

use std::sync::Arc;

use auth::AuthSession;
use client::{ApiError, TrackerClient};
use config::Config;
use feed::VehicleFeed;
use monitor::{MonitorLoop, MonitorSettings};
use notify::{AlertDispatcher, NotifyError, TwilioMessenger};

/// Monitor wired to the real provider clients
pub type AppMonitor = MonitorLoop<TrackerClient, TwilioMessenger>;

/// Build the alert dispatcher described by `config`
pub fn build_dispatcher(config: &Config) -> Result<AlertDispatcher<TwilioMessenger>, NotifyError> {
    let messenger = TwilioMessenger::new(
        &config.messaging.account_sid,
        &config.messaging.auth_token,
        config.timeout,
    )?;

    Ok(AlertDispatcher::new(
        messenger,
        &config.messaging.sender,
        &config.messaging.recipient,
        config.destination,
    )
    .with_label(config.destination_label.clone()))
}

/// Build the full monitor described by `config`
pub fn build_monitor(config: &Config) -> Result<AppMonitor, BuildError> {
    let api = Arc::new(TrackerClient::new(
        config.login_format.adapter(),
        config.credentials.clone(),
        config.timeout,
    )?);

    Ok(MonitorLoop::new(
        AuthSession::new(api.clone(), config.endpoints.clone()),
        VehicleFeed::new(api),
        build_dispatcher(config)?,
        MonitorSettings {
            destination: config.destination,
            detection_radius_km: config.detection_radius_km,
            poll_interval: config.poll_interval,
            business_hours: config.business_hours.clone(),
        },
    ))
}

/// Errors while wiring the monitor
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Tracker client: {0}")]
    Tracker(#[from] ApiError),

    #[error("Messenger: {0}")]
    Messenger(#[from] NotifyError),
}
