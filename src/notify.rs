//! Notification Module
//!
//! Formats arrival alerts and delivers them over WhatsApp.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{error, info};

use crate::geo::Coordinate;

/// Default Twilio REST API base URL
pub const TWILIO_API_URL: &str = "https://api.twilio.com";

const WHATSAPP_SCHEME: &str = "whatsapp:";

/// Outbound messaging provider
pub trait Messenger: Send + Sync {
    /// Send `body` and return the provider's message id
    fn send(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> impl Future<Output = Result<String, NotifyError>> + Send;
}

/// Twilio Messages API client
pub struct TwilioMessenger {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioMessenger {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: TWILIO_API_URL.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        })
    }

    /// Point at another API host
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl Messenger for TwilioMessenger {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, NotifyError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error: TwilioError = response.json().await.unwrap_or_else(|_| TwilioError {
                code: None,
                message: format!("Status: {}", status),
            });
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                code: error.code,
                message: error.message,
            });
        }

        let message = response
            .json::<TwilioMessage>()
            .await
            .map_err(|e| NotifyError::Parse(e.to_string()))?;
        Ok(message.sid)
    }
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    code: Option<u32>,
    message: String,
}

/// Sends arrival alerts from a fixed sender to a fixed recipient
pub struct AlertDispatcher<M> {
    messenger: M,
    from: String,
    to: String,
    destination: Coordinate,
    label: Option<String>,
}

impl<M: Messenger> AlertDispatcher<M> {
    pub fn new(messenger: M, from: &str, to: &str, destination: Coordinate) -> Self {
        Self {
            messenger,
            from: whatsapp_address(from),
            to: whatsapp_address(to),
            destination,
            label: None,
        }
    }

    /// Name the destination in alert text
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Alert that `vehicle_id` arrived `distance_km` from the destination
    pub async fn notify_arrival(
        &self,
        vehicle_id: &str,
        distance_km: f64,
    ) -> Result<String, NotifyError> {
        let body = format_alert(
            vehicle_id,
            distance_km,
            chrono::Local::now().naive_local(),
            self.destination,
            self.label.as_deref(),
        );

        match self.messenger.send(&self.from, &self.to, &body).await {
            Ok(sid) => {
                info!(vehicle = %vehicle_id, sid = %sid, to = %self.to, "Arrival alert sent");
                Ok(sid)
            }
            Err(e) => {
                error!(vehicle = %vehicle_id, error = %e, "Failed to send arrival alert");
                Err(e)
            }
        }
    }

    /// Send a manual test message
    pub async fn send_test_message(&self) -> Result<String, NotifyError> {
        let sid = self.messenger.send(&self.from, &self.to, TEST_MESSAGE).await?;
        info!(sid = %sid, to = %self.to, "Test message sent");
        Ok(sid)
    }
}

pub const TEST_MESSAGE: &str = "🚚 Manual WhatsApp delivery test from the fleet arrival monitor.";

/// Alert text for an arrival
pub fn format_alert(
    vehicle_id: &str,
    distance_km: f64,
    at: NaiveDateTime,
    destination: Coordinate,
    label: Option<&str>,
) -> String {
    let mut msg = format!(
        "🚨 *ARRIVAL ALERT* 🚨\n\n*Truck:* {}\n*Distance:* {:.2} km from destination\n*Time:* {}",
        vehicle_id,
        distance_km,
        at.format("%H:%M:%S")
    );
    if let Some(label) = label {
        msg.push_str(&format!("\n*Location:* {}", label));
    }
    msg.push_str(&format!("\n*Coordinates:* {}", destination));
    msg
}

/// Prefix `whatsapp:` unless already present
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_SCHEME) {
        number.to_string()
    } else {
        format!("{}{}", WHATSAPP_SCHEME, number)
    }
}

/// Notification errors; only the affected vehicle is skipped
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notify failed: network error: {0}")]
    Network(String),

    #[error("Notify failed: rejected (HTTP {status}, code {code:?}): {message}")]
    Rejected {
        status: u16,
        code: Option<u32>,
        message: String,
    },

    #[error("Notify failed: parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records sent messages; fails while `fail` is set, or for bodies
    /// mentioning one of the `fail_for` vehicles
    #[derive(Default)]
    pub(crate) struct MockMessenger {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub fail: Mutex<bool>,
        pub fail_for: Mutex<Vec<String>>,
    }

    impl MockMessenger {
        pub fn bodies(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.2.clone()).collect()
        }
    }

    impl Messenger for MockMessenger {
        async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, NotifyError> {
            let targeted = self
                .fail_for
                .lock()
                .unwrap()
                .iter()
                .any(|id| body.contains(id.as_str()));
            if targeted || *self.fail.lock().unwrap() {
                return Err(NotifyError::Network("connection reset".into()));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((from.to_string(), to.to_string(), body.to_string()));
            Ok(format!("SM{:04}", sent.len()))
        }
    }

    impl<T: Messenger> Messenger for std::sync::Arc<T> {
        async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, NotifyError> {
            (**self).send(from, to, body).await
        }
    }

    fn yard() -> Coordinate {
        Coordinate::new(-10.94026, -37.08845).unwrap()
    }

    #[test]
    fn test_format_alert() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();

        let msg = format_alert("ABC1D23", 0.12345, at, yard(), Some("North Yard"));
        assert!(msg.contains("*Truck:* ABC1D23"));
        assert!(msg.contains("0.12 km"));
        assert!(msg.contains("14:05:09"));
        assert!(msg.contains("*Location:* North Yard"));
        assert!(msg.contains("-10.94026, -37.08845"));

        let msg = format_alert("ABC1D23", 0.199, at, yard(), None);
        assert!(msg.contains("0.20 km"));
        assert!(!msg.contains("Location"));
    }

    #[test]
    fn test_whatsapp_address() {
        assert_eq!(whatsapp_address("+14155550100"), "whatsapp:+14155550100");
        assert_eq!(
            whatsapp_address(" whatsapp:+14155550100 "),
            "whatsapp:+14155550100"
        );
    }

    #[tokio::test]
    async fn test_dispatcher_sends_to_normalised_addresses() {
        let messenger = std::sync::Arc::new(MockMessenger::default());
        let dispatcher =
            AlertDispatcher::new(messenger.clone(), "+14155550100", "whatsapp:+5579999000000", yard());

        let sid = dispatcher.notify_arrival("ABC1D23", 0.05).await.unwrap();
        assert_eq!(sid, "SM0001");

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent[0].0, "whatsapp:+14155550100");
        assert_eq!(sent[0].1, "whatsapp:+5579999000000");
        assert!(sent[0].2.contains("ABC1D23"));
    }

    #[tokio::test]
    async fn test_dispatcher_reports_failure() {
        let messenger = std::sync::Arc::new(MockMessenger::default());
        *messenger.fail.lock().unwrap() = true;
        let dispatcher = AlertDispatcher::new(messenger.clone(), "+1", "+2", yard());

        assert!(dispatcher.notify_arrival("ABC1D23", 0.05).await.is_err());
        assert!(messenger.bodies().is_empty());
    }

    #[tokio::test]
    async fn test_twilio_send() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2010-04-01/Accounts/AC123/Messages.json")
                    .header_exists("authorization")
                    .body_contains("From=whatsapp%3A%2B14155550100")
                    .body_contains("Body=hello");
                then.status(201)
                    .json_body(json!({"sid": "SMabc", "status": "queued"}));
            })
            .await;

        let twilio = TwilioMessenger::new("AC123", "secret", Duration::from_secs(5))
            .unwrap()
            .with_base_url(&server.base_url());

        let sid = twilio
            .send("whatsapp:+14155550100", "whatsapp:+5579999000000", "hello")
            .await
            .unwrap();
        assert_eq!(sid, "SMabc");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_twilio_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400).json_body(json!({
                    "code": 63007,
                    "message": "Twilio could not find a Channel with the specified From address",
                    "status": 400
                }));
            })
            .await;

        let twilio = TwilioMessenger::new("AC123", "secret", Duration::from_secs(5))
            .unwrap()
            .with_base_url(&server.base_url());

        match twilio.send("whatsapp:+1", "whatsapp:+2", "hello").await {
            Err(NotifyError::Rejected { status, code, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(63007));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
