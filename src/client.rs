//! Tracker API Client Module
//!
//! Handles HTTP communication with the vehicle-tracking provider.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::adapter::{Credentials, LoginAdapter};

/// Operations the monitor needs from a tracking provider
pub trait TrackerApi: Send + Sync {
    /// Log in against `endpoint` and return the issued token
    fn login(&self, endpoint: &str) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// List the device groups visible to `token`
    fn devices(
        &self,
        endpoint: &str,
        token: &str,
    ) -> impl Future<Output = Result<Vec<DeviceGroup>, ApiError>> + Send;
}

/// HTTP client for the tracking provider
pub struct TrackerClient {
    client: reqwest::Client,
    adapter: Box<dyn LoginAdapter>,
    credentials: Credentials,
}

impl TrackerClient {
    /// Create a new tracker client
    pub fn new(
        adapter: Box<dyn LoginAdapter>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            adapter,
            credentials,
        })
    }

    async fn read_error(response: reqwest::Response) -> ApiError {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return ApiError::Unauthorized(status.as_u16());
        }

        let error: ErrorResponse = response
            .json()
            .await
            .unwrap_or_else(|_| ErrorResponse { error: format!("Status: {}", status) });
        ApiError::Server(error.error)
    }
}

impl TrackerApi for TrackerClient {
    async fn login(&self, endpoint: &str) -> Result<String, ApiError> {
        debug!(endpoint, adapter = self.adapter.name(), "Logging in");

        let response = self
            .adapter
            .login_request(&self.client, endpoint, &self.credentials)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        self.adapter
            .extract_token(&body)
            .ok_or(ApiError::MissingToken)
    }

    async fn devices(&self, endpoint: &str, token: &str) -> Result<Vec<DeviceGroup>, ApiError> {
        let response = self
            .adapter
            .devices_request(&self.client, endpoint, token)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let groups = response
            .json::<Option<Vec<DeviceGroup>>>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?
            .unwrap_or_default();

        debug!(endpoint, groups = groups.len(), "Device list fetched");
        Ok(groups)
    }
}

fn network_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Network(format!("timed out: {}", e))
    } else {
        ApiError::Network(e.to_string())
    }
}

// Response types

/// A group of devices as returned by the provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceGroup {
    #[serde(default)]
    pub items: Option<Vec<DeviceItem>>,
}

/// One tracked device; fields are loosely typed on the wire and
/// non-object entries are kept so the feed can skip them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DeviceItem(pub Value);

impl DeviceItem {
    /// First non-null value among `keys`, `None` when the item is not an object
    pub fn field(&self, keys: &[&str]) -> Option<&Value> {
        let object = self.0.as_object()?;
        keys.iter()
            .filter_map(|k| object.get(*k))
            .find(|v| !v.is_null())
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(alias = "message")]
    error: String,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected by provider (HTTP {0})")]
    Unauthorized(u16),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Login response carried no token")]
    MissingToken,
}
