//! Configuration Module
//!
//! Settings are read once from the environment at startup and never change
//! afterwards. Missing or malformed values abort the start.

use std::fmt;
use std::time::Duration;

use chrono::Weekday;

use crate::adapter::{Credentials, LoginFormat};
use crate::geo::Coordinate;
use crate::schedule::BusinessHours;

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_DETECTION_RADIUS_KM: f64 = 0.2;
pub const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 1;

/// Messaging account and addresses
#[derive(Clone)]
pub struct MessagingConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub sender: String,
    pub recipient: String,
}

impl fmt::Debug for MessagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"HIDDEN")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Full runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: Vec<String>,
    pub credentials: Credentials,
    pub login_format: LoginFormat,
    pub timeout: Duration,
    pub messaging: MessagingConfig,
    pub destination: Coordinate,
    pub destination_label: Option<String>,
    pub detection_radius_km: f64,
    pub poll_interval: Duration,
    pub business_hours: Option<BusinessHours>,
}

impl Config {
    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let endpoints: Vec<String> = get("TRACKER_ENDPOINTS")
            .or_else(|| get("TRACKER_API_URL"))
            .ok_or(ConfigError::Missing("TRACKER_ENDPOINTS"))?
            .split(',')
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(ConfigError::Missing("TRACKER_ENDPOINTS"));
        }

        let credentials = Credentials::new(require("TRACKER_EMAIL")?, require("TRACKER_PASSWORD")?);

        let login_format = match get("TRACKER_LOGIN_FORMAT") {
            Some(v) => v.parse::<LoginFormat>().map_err(|reason| ConfigError::Invalid {
                key: "TRACKER_LOGIN_FORMAT",
                reason,
            })?,
            None => LoginFormat::default(),
        };

        let messaging = MessagingConfig {
            account_sid: require("TWILIO_SID")?,
            auth_token: require("TWILIO_AUTH_TOKEN")?,
            sender: require("TWILIO_WHATSAPP_NUMBER")?,
            recipient: require("WHATSAPP_NUMBER")?,
        };

        let lat: f64 = parse("DESTINATION_LAT", &require("DESTINATION_LAT")?)?;
        let lon: f64 = parse("DESTINATION_LON", &require("DESTINATION_LON")?)?;
        let destination = Coordinate::new(lat, lon).map_err(|e| ConfigError::Invalid {
            key: "DESTINATION_LAT/DESTINATION_LON",
            reason: e.to_string(),
        })?;

        let timeout_ms: u64 = parse_or(get("TRACKER_TIMEOUT_MS"), "TRACKER_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "TRACKER_TIMEOUT_MS",
                reason: "must be greater than zero".into(),
            });
        }

        let detection_radius_km: f64 = parse_or(
            get("DETECTION_RADIUS_KM"),
            "DETECTION_RADIUS_KM",
            DEFAULT_DETECTION_RADIUS_KM,
        )?;
        if !detection_radius_km.is_finite() || detection_radius_km <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "DETECTION_RADIUS_KM",
                reason: "must be a positive number".into(),
            });
        }

        let poll_minutes: u64 = parse_or(
            get("POLL_INTERVAL_MINUTES"),
            "POLL_INTERVAL_MINUTES",
            DEFAULT_POLL_INTERVAL_MINUTES,
        )?;
        if poll_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MINUTES",
                reason: "must be at least 1".into(),
            });
        }
        let poll_secs = poll_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::Invalid {
                key: "POLL_INTERVAL_MINUTES",
                reason: "is too large".into(),
            })?;

        let business_hours = match get("BUSINESS_HOURS") {
            Some(hours) => {
                let mut hours: BusinessHours = hours.parse().map_err(|reason| ConfigError::Invalid {
                    key: "BUSINESS_HOURS",
                    reason,
                })?;
                if let Some(days) = get("BUSINESS_DAYS") {
                    hours.days = business_days(&days)?;
                }
                Some(hours)
            }
            None => None,
        };

        Ok(Self {
            endpoints,
            credentials,
            login_format,
            timeout: Duration::from_millis(timeout_ms),
            messaging,
            destination,
            destination_label: get("DESTINATION_LABEL"),
            detection_radius_km,
            poll_interval: Duration::from_secs(poll_secs),
            business_hours,
        })
    }

    /// One-line-per-setting summary with secrets masked
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Destination: {}", self.destination),
            format!("Radius: {} km", self.detection_radius_km),
            format!("Interval: {} minute(s)", self.poll_interval.as_secs() / 60),
            format!("Endpoints: {}", self.endpoints.join(", ")),
            format!("Login: {} ({})", self.credentials, self.login_format),
            format!(
                "WhatsApp: {} -> {}",
                self.messaging.sender, self.messaging.recipient
            ),
        ];
        if let Some(label) = &self.destination_label {
            lines.push(format!("Location: {}", label));
        }
        if let Some(hours) = &self.business_hours {
            lines.push(format!("Business hours: {}", hours));
        }
        lines
    }
}

/// Whether `DEBUG` asks for verbose output; read before `Config` so logging
/// is up while the rest of the configuration is validated
pub fn debug_flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("true") | Some("1") | Some("TRUE") | Some("yes")
    )
}

fn business_days(days: &str) -> Result<Vec<Weekday>, ConfigError> {
    let days = BusinessHours::parse_days(days).map_err(|reason| ConfigError::Invalid {
        key: "BUSINESS_DAYS",
        reason,
    })?;
    if days.is_empty() {
        return Err(ConfigError::Invalid {
            key: "BUSINESS_DAYS",
            reason: "no days listed".into(),
        });
    }
    Ok(days)
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("cannot parse '{}'", raw),
    })
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

/// Configuration errors; fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TRACKER_ENDPOINTS", "https://a.example/api/, https://b.example/api"),
            ("TRACKER_EMAIL", "monitor@example.com"),
            ("TRACKER_PASSWORD", "secret"),
            ("TWILIO_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "twilio-secret"),
            ("TWILIO_WHATSAPP_NUMBER", "+14155550100"),
            ("WHATSAPP_NUMBER", "+5579999000000"),
            ("DESTINATION_LAT", "-10.94026"),
            ("DESTINATION_LON", "-37.08845"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(
            config.endpoints,
            vec!["https://a.example/api", "https://b.example/api"]
        );
        assert_eq!(config.login_format, LoginFormat::Form);
        assert_eq!(config.timeout, Duration::from_millis(15_000));
        assert_eq!(config.detection_radius_km, 0.2);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.destination.latitude, -10.94026);
        assert!(config.business_hours.is_none());
        assert!(config.destination_label.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("TRACKER_LOGIN_FORMAT", "json");
        env.insert("TRACKER_TIMEOUT_MS", "5000");
        env.insert("DETECTION_RADIUS_KM", "0.5");
        env.insert("POLL_INTERVAL_MINUTES", "3");
        env.insert("BUSINESS_HOURS", "7-19");
        env.insert("BUSINESS_DAYS", "mon,tue,wed,thu,fri,sat");
        env.insert("DESTINATION_LABEL", "North Yard");

        let config = load(&env).unwrap();
        assert_eq!(config.login_format, LoginFormat::Json);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.detection_radius_km, 0.5);
        assert_eq!(config.poll_interval, Duration::from_secs(180));
        let hours = config.business_hours.unwrap();
        assert_eq!((hours.open_hour, hours.close_hour), (7, 19));
        assert_eq!(hours.days.len(), 6);
        assert_eq!(config.destination_label.as_deref(), Some("North Yard"));
    }

    #[test]
    fn test_single_api_url_fallback() {
        let mut env = base_env();
        env.remove("TRACKER_ENDPOINTS");
        env.insert("TRACKER_API_URL", "https://only.example/api");

        let config = load(&env).unwrap();
        assert_eq!(config.endpoints, vec!["https://only.example/api"]);
    }

    #[test]
    fn test_missing_required_values() {
        for key in [
            "TRACKER_ENDPOINTS",
            "TRACKER_EMAIL",
            "TRACKER_PASSWORD",
            "TWILIO_SID",
            "TWILIO_AUTH_TOKEN",
            "TWILIO_WHATSAPP_NUMBER",
            "WHATSAPP_NUMBER",
            "DESTINATION_LAT",
            "DESTINATION_LON",
        ] {
            let mut env = base_env();
            env.remove(key);
            match load(&env) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, key),
                other => panic!("{}: unexpected {:?}", key, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("TRACKER_PASSWORD", "   ");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("TRACKER_PASSWORD"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("DESTINATION_LAT", "north"),
            ("DESTINATION_LAT", "91"),
            ("DETECTION_RADIUS_KM", "-1"),
            ("POLL_INTERVAL_MINUTES", "0"),
            ("POLL_INTERVAL_MINUTES", "307445734561825861"),
            ("TRACKER_TIMEOUT_MS", "0"),
            ("TRACKER_LOGIN_FORMAT", "soap"),
            ("BUSINESS_HOURS", "18-8"),
        ] {
            let mut env = base_env();
            env.insert(key, value);
            assert!(
                matches!(load(&env), Err(ConfigError::Invalid { .. })),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_debug_flag() {
        assert!(debug_flag(Some("true".into())));
        assert!(debug_flag(Some(" 1 ".into())));
        assert!(!debug_flag(Some("false".into())));
        assert!(!debug_flag(None));
    }

    #[test]
    fn test_summary_masks_secrets() {
        let config = load(&base_env()).unwrap();
        let summary = config.summary().join("\n");
        assert!(summary.contains("monitor@example.com"));
        assert!(!summary.contains("secret"));
        assert!(!format!("{:?}", config).contains("twilio-secret"));
    }
}
