//! Vehicle Feed Module
//!
//! Fetches the active vehicles and their positions for a session.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::auth::Session;
use crate::client::{ApiError, DeviceGroup, DeviceItem, TrackerApi};
use crate::geo::Coordinate;

/// A tracked vehicle at its latest reported position
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub position: Coordinate,
}

/// Reads vehicle positions from the provider
pub struct VehicleFeed<A> {
    api: Arc<A>,
}

impl<A: TrackerApi> VehicleFeed<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Fetch every vehicle with a usable position
    pub async fn fetch_active_vehicles(&self, session: &Session) -> Result<Vec<Vehicle>, FeedError> {
        let groups = self
            .api
            .devices(&session.issued_endpoint, &session.token)
            .await
            .map_err(FeedError::from)?;

        let vehicles = flatten_groups(groups);
        debug!(
            endpoint = %session.issued_endpoint,
            vehicles = vehicles.len(),
            "Vehicles fetched"
        );
        Ok(vehicles)
    }
}

/// Flatten provider groups into vehicles, dropping unusable items
pub fn flatten_groups(groups: Vec<DeviceGroup>) -> Vec<Vehicle> {
    groups
        .into_iter()
        .flat_map(|g| g.items.unwrap_or_default())
        .filter_map(into_vehicle)
        .collect()
}

const NAME_KEYS: &[&str] = &["name", "plate", "placa"];
const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LNG_KEYS: &[&str] = &["lng", "lon", "longitude"];

fn into_vehicle(item: DeviceItem) -> Option<Vehicle> {
    let id = match item.field(NAME_KEYS) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            trace!("Skipping device without a name");
            return None;
        }
    };

    let (Some(lat), Some(lng)) = (
        as_degrees(item.field(LAT_KEYS)),
        as_degrees(item.field(LNG_KEYS)),
    ) else {
        trace!(vehicle = %id, "Skipping device without a position");
        return None;
    };

    match Coordinate::new(lat, lng) {
        Ok(position) => Some(Vehicle { id, position }),
        Err(e) => {
            debug!(vehicle = %id, error = %e, "Skipping device with invalid position");
            None
        }
    }
}

fn as_degrees(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Feed errors; the cycle that hits one is skipped
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Fetch failed: network error: {0}")]
    Network(String),

    #[error("Fetch failed: token rejected (HTTP {0})")]
    Rejected(u16),

    #[error("Fetch failed: server error: {0}")]
    Server(String),

    #[error("Fetch failed: parse error: {0}")]
    Parse(String),
}

impl FeedError {
    /// Whether the session must be dropped before the next attempt
    pub fn is_rejection(&self) -> bool {
        matches!(self, FeedError::Rejected(_))
    }
}

impl From<ApiError> for FeedError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(msg) => FeedError::Network(msg),
            ApiError::Unauthorized(status) => FeedError::Rejected(status),
            ApiError::Server(msg) => FeedError::Server(msg),
            ApiError::Parse(msg) => FeedError::Parse(msg),
            ApiError::MissingToken => FeedError::Parse("response carried no token".into()),
        }
    }
}
