//! Monitor Loop Module
//!
//! Runs the poll cycle on a fixed-rate timer: token, vehicles, distance,
//! gate, alert. Every failure inside a cycle ends that unit of work only.

use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::client::TrackerApi;
use crate::feed::VehicleFeed;
use crate::gate::NotificationGate;
use crate::geo::{self, Coordinate};
use crate::notify::{AlertDispatcher, Messenger};
use crate::schedule::BusinessHours;

/// Fixed parameters of a monitor
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub destination: Coordinate,
    pub detection_radius_km: f64,
    pub poll_interval: Duration,
    pub business_hours: Option<BusinessHours>,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleOutcome {
    #[default]
    Completed,
    AuthFailed,
    FetchFailed,
    NoVehicles,
}

/// What a single cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub vehicles_seen: usize,
    pub in_radius: usize,
    pub notified: usize,
    pub failed: usize,
    /// In range but outside business hours
    pub deferred: usize,
}

/// Owns the token cache and the notified set for one destination
pub struct MonitorLoop<A, M> {
    auth: AuthSession<A>,
    feed: VehicleFeed<A>,
    gate: NotificationGate,
    dispatcher: AlertDispatcher<M>,
    settings: MonitorSettings,
}

impl<A: TrackerApi, M: Messenger> MonitorLoop<A, M> {
    pub fn new(
        auth: AuthSession<A>,
        feed: VehicleFeed<A>,
        dispatcher: AlertDispatcher<M>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            auth,
            feed,
            gate: NotificationGate::new(),
            dispatcher,
            settings,
        }
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// Run cycles until `cancel` fires; an in-flight cycle is finished first
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            radius_km = self.settings.detection_radius_km,
            "Monitoring started"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        // Ticks that fire while a cycle is still running are dropped
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let report = self.run_cycle().await;
            debug!(?report, notified_total = self.gate.len(), "Cycle finished");
        }

        info!(notified_total = self.gate.len(), "Monitoring stopped");
    }

    /// One fetch-and-evaluate pass
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_at(chrono::Local::now().naive_local()).await
    }

    pub(crate) async fn run_cycle_at(&mut self, now: NaiveDateTime) -> CycleReport {
        let mut report = CycleReport::default();

        let session = match self.auth.get_valid_token().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Skipping cycle: authentication failed");
                report.outcome = CycleOutcome::AuthFailed;
                return report;
            }
        };

        let vehicles = match self.feed.fetch_active_vehicles(&session).await {
            Ok(vehicles) => vehicles,
            Err(e) => {
                warn!(endpoint = %session.issued_endpoint, error = %e, "Skipping cycle: vehicle fetch failed");
                if e.is_rejection() {
                    self.auth.invalidate_rejected(&session).await;
                }
                report.outcome = CycleOutcome::FetchFailed;
                return report;
            }
        };

        if vehicles.is_empty() {
            info!("No vehicles reported this cycle");
            report.outcome = CycleOutcome::NoVehicles;
            return report;
        }
        report.vehicles_seen = vehicles.len();

        for vehicle in vehicles {
            if !self.gate.should_notify(&vehicle.id) {
                continue;
            }

            let distance = match geo::distance_km(vehicle.position, self.settings.destination) {
                Ok(d) => d,
                Err(e) => {
                    warn!(vehicle = %vehicle.id, error = %e, "Cannot measure distance");
                    continue;
                }
            };
            debug!(vehicle = %vehicle.id, distance_km = %format!("{:.3}", distance), "Vehicle position");

            if distance > self.settings.detection_radius_km {
                continue;
            }
            report.in_radius += 1;

            if let Some(hours) = &self.settings.business_hours {
                if !hours.contains(now) {
                    info!(vehicle = %vehicle.id, "Arrival outside business hours, alert deferred");
                    report.deferred += 1;
                    continue;
                }
            }

            info!(vehicle = %vehicle.id, distance_km = %format!("{:.2}", distance), "Vehicle arrived");
            match self.dispatcher.notify_arrival(&vehicle.id, distance).await {
                Ok(_) => {
                    self.gate.mark_notified(&vehicle.id);
                    report.notified += 1;
                }
                // Left unmarked so the next cycle tries again
                Err(_) => report.failed += 1,
            }
        }

        report
    }
}
