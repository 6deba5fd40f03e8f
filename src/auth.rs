//! Authentication Module
//!
//! Token cache with endpoint failover and expiry-based renewal.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::TrackerApi;

/// Assumed token lifetime; the provider's tokens last about an hour
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 55;

/// An authenticated session bound to the endpoint that issued it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub issued_endpoint: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session is expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Obtains and caches the provider token
pub struct AuthSession<A> {
    api: Arc<A>,
    endpoints: Vec<String>,
    ttl: Duration,
    // Held across the login round-trips so only one authentication runs at a time
    session: Mutex<Option<Session>>,
}

impl<A: TrackerApi> AuthSession<A> {
    /// Create a new auth session over the endpoints, in priority order
    pub fn new(api: Arc<A>, endpoints: Vec<String>) -> Self {
        Self {
            api,
            endpoints,
            ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            session: Mutex::new(None),
        }
    }

    /// Override the assumed token lifetime
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return a valid session, authenticating if needed
    pub async fn get_valid_token(&self) -> Result<Session, AuthError> {
        let mut cached = self.session.lock().await;

        match cached.as_ref() {
            Some(session) if !session.is_expired() => return Ok(session.clone()),
            Some(session) => {
                info!(endpoint = %session.issued_endpoint, "Token expired, renewing");
            }
            None => debug!("No cached token"),
        }

        let session = self.authenticate().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached token after the provider rejected it
    pub async fn invalidate(&self) {
        if let Some(session) = self.session.lock().await.take() {
            warn!(endpoint = %session.issued_endpoint, "Session invalidated");
        }
    }

    /// Drop the cached token only if it is still the one the provider rejected
    pub async fn invalidate_rejected(&self, rejected: &Session) {
        let mut cached = self.session.lock().await;
        match cached.as_ref() {
            Some(session) if session.token == rejected.token => {
                warn!(endpoint = %session.issued_endpoint, "Session invalidated");
                *cached = None;
            }
            Some(_) => debug!("Rejected token already replaced"),
            None => {}
        }
    }

    #[cfg(test)]
    pub(crate) async fn current(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    async fn authenticate(&self) -> Result<Session, AuthError> {
        for endpoint in &self.endpoints {
            match self.api.login(endpoint).await {
                Ok(token) => {
                    info!(endpoint = %endpoint, "Endpoint active");
                    return Ok(Session {
                        token,
                        issued_endpoint: endpoint.clone(),
                        expires_at: Utc::now() + self.ttl,
                    });
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Endpoint login failed");
                }
            }
        }

        Err(AuthError::AllEndpointsExhausted {
            attempted: self.endpoints.len(),
        })
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("All {attempted} endpoints failed to authenticate")]
    AllEndpointsExhausted { attempted: usize },
}
