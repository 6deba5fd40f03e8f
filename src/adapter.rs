//! Provider Adapter Module
//!
//! Tracking providers differ only in how login credentials are submitted and
//! how the resulting token travels with later requests. Each variant lives
//! behind [`LoginAdapter`] so the rest of the client stays provider-agnostic.

use std::fmt;
use std::str::FromStr;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

/// Login credentials for the tracking provider
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

/// Never print the password
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"HIDDEN")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (password: {} chars)", self.login, self.password.len())
    }
}

/// How credentials are encoded and the token is carried
pub trait LoginAdapter: Send + Sync + fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Build the login request for `endpoint`
    fn login_request(&self, client: &Client, endpoint: &str, creds: &Credentials)
        -> RequestBuilder;

    /// Pull the token out of a successful login response
    fn extract_token(&self, body: &Value) -> Option<String>;

    /// Build the device listing request for `endpoint`
    fn devices_request(&self, client: &Client, endpoint: &str, token: &str) -> RequestBuilder;
}

/// Form-encoded `email`/`password`, token in `user_api_hash`
#[derive(Debug, Clone)]
pub struct FormLoginAdapter {
    pub lang: String,
}

impl Default for FormLoginAdapter {
    fn default() -> Self {
        Self { lang: "pt".into() }
    }
}

impl LoginAdapter for FormLoginAdapter {
    fn name(&self) -> &'static str {
        "form"
    }

    fn login_request(
        &self,
        client: &Client,
        endpoint: &str,
        creds: &Credentials,
    ) -> RequestBuilder {
        client
            .post(format!("{}/login", endpoint))
            .header("Accept", "application/json")
            .form(&[
                ("email", creds.login.as_str()),
                ("password", creds.password.as_str()),
            ])
    }

    fn extract_token(&self, body: &Value) -> Option<String> {
        non_empty_str(body.get("user_api_hash"))
    }

    fn devices_request(&self, client: &Client, endpoint: &str, token: &str) -> RequestBuilder {
        client
            .get(format!("{}/get_devices", endpoint))
            .query(&[("user_api_hash", token), ("lang", self.lang.as_str())])
    }
}

/// JSON `username`/`password`, token in `token`, sent back as a bearer token
#[derive(Debug, Clone, Default)]
pub struct JsonLoginAdapter;

#[derive(Serialize)]
struct JsonLogin<'a> {
    username: &'a str,
    password: &'a str,
}

impl LoginAdapter for JsonLoginAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn login_request(
        &self,
        client: &Client,
        endpoint: &str,
        creds: &Credentials,
    ) -> RequestBuilder {
        client
            .post(format!("{}/auth/login", endpoint))
            .json(&JsonLogin {
                username: &creds.login,
                password: &creds.password,
            })
    }

    fn extract_token(&self, body: &Value) -> Option<String> {
        non_empty_str(body.get("token"))
    }

    fn devices_request(&self, client: &Client, endpoint: &str, token: &str) -> RequestBuilder {
        client
            .get(format!("{}/get_devices", endpoint))
            .header("Authorization", format!("Bearer {}", token))
    }
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Selectable login format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginFormat {
    #[default]
    Form,
    Json,
}

impl LoginFormat {
    pub fn adapter(&self) -> Box<dyn LoginAdapter> {
        match self {
            LoginFormat::Form => Box::new(FormLoginAdapter::default()),
            LoginFormat::Json => Box::new(JsonLoginAdapter),
        }
    }
}

impl FromStr for LoginFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "form" => Ok(LoginFormat::Form),
            "json" => Ok(LoginFormat::Json),
            other => Err(format!("unknown login format '{}', expected form or json", other)),
        }
    }
}

impl fmt::Display for LoginFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginFormat::Form => write!(f, "form"),
            LoginFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_adapter_token_field() {
        let adapter = FormLoginAdapter::default();
        let body = json!({"status": 1, "user_api_hash": "abc123"});
        assert_eq!(adapter.extract_token(&body).as_deref(), Some("abc123"));
        assert_eq!(adapter.extract_token(&json!({"token": "abc123"})), None);
        assert_eq!(adapter.extract_token(&json!({"user_api_hash": ""})), None);
    }

    #[test]
    fn test_json_adapter_token_field() {
        let adapter = JsonLoginAdapter;
        assert_eq!(
            adapter.extract_token(&json!({"token": "jwt"})).as_deref(),
            Some("jwt")
        );
        assert_eq!(adapter.extract_token(&json!({"token": 42})), None);
    }

    #[test]
    fn test_form_adapter_builds_requests() {
        let client = Client::new();
        let creds = Credentials::new("ops@example.com", "secret");
        let adapter = FormLoginAdapter::default();

        let login = adapter
            .login_request(&client, "http://tracker.test/api", &creds)
            .build()
            .unwrap();
        assert_eq!(*login.method(), reqwest::Method::POST);
        assert_eq!(login.url().as_str(), "http://tracker.test/api/login");
        assert_eq!(
            login.headers()["content-type"],
            "application/x-www-form-urlencoded"
        );

        let devices = adapter
            .devices_request(&client, "http://tracker.test/api", "tok")
            .build()
            .unwrap();
        assert_eq!(
            devices.url().as_str(),
            "http://tracker.test/api/get_devices?user_api_hash=tok&lang=pt"
        );
    }

    #[test]
    fn test_json_adapter_builds_requests() {
        let client = Client::new();
        let creds = Credentials::new("monitor", "secret");

        let login = JsonLoginAdapter
            .login_request(&client, "http://tracker.test/v1", &creds)
            .build()
            .unwrap();
        assert_eq!(login.url().as_str(), "http://tracker.test/v1/auth/login");
        assert_eq!(login.headers()["content-type"], "application/json");

        let devices = JsonLoginAdapter
            .devices_request(&client, "http://tracker.test/v1", "tok")
            .build()
            .unwrap();
        assert_eq!(devices.headers()["authorization"], "Bearer tok");
    }

    #[test]
    fn test_login_format_parse() {
        assert_eq!("form".parse::<LoginFormat>().unwrap(), LoginFormat::Form);
        assert_eq!(" JSON ".parse::<LoginFormat>().unwrap(), LoginFormat::Json);
        assert!("xml".parse::<LoginFormat>().is_err());
        assert_eq!(LoginFormat::Json.adapter().name(), "json");
    }

    #[test]
    fn test_credentials_hide_password() {
        let creds = Credentials::new("monitor", "toplevel");
        assert!(!format!("{:?}", creds).contains("toplevel"));
        assert!(!creds.to_string().contains("toplevel"));
    }
}
