use crate::config::Config;
use crate::models::db_operations::query::TableQuery;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaasError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Error payload returned by PostgREST, GoTrue or Storage, already normalised.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Unexpected response from the backend: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("The backend returned no rows.")]
    NoRows,
    #[error("Refusing to {0} without a row filter.")]
    Unfiltered(&'static str),
    #[error("You need to be signed in to do that.")]
    MissingSession,
}

impl BaasError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BaasError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for token problems that signing in again would fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, BaasError::MissingSession) || matches!(self.status(), Some(401) | Some(403))
    }
}

/// Turns any of the backend's error bodies into one message.
pub fn api_error(status: u16, body: &str) -> BaasError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed.as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let message = field("error_description")
        .or_else(|| field("msg"))
        .or_else(|| field("message"))
        .or_else(|| field("error"))
        .or_else(|| Some(body.trim().to_string()).filter(|s| !s.is_empty() && parsed.is_none()))
        .unwrap_or_else(|| format!("Request failed with status {}", status));

    let code = field("code")
        .or_else(|| field("error_code"))
        .or_else(|| parsed.as_ref().and_then(|v| v.get("code")).and_then(Value::as_i64).map(|c| c.to_string()));

    BaasError::Api { status, code, message }
}

/// Reads a JSON body, mapping non-2xx responses through [`api_error`].
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BaasError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

pub(crate) async fn expect_success(response: Response) -> Result<(), BaasError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await?;
    Err(api_error(status.as_u16(), &body))
}

/// Thin HTTP client for the hosted backend: tables, auth and storage share one
/// connection pool and always carry the project's `apikey`.
#[derive(Clone, Debug)]
pub struct BaasClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl BaasClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self, BaasError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BaasError> {
        Self::new(config.baas_url.clone(), config.baas_anon_key.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Starts a request; the user's token when signed in, the anon key otherwise.
    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
    }

    pub fn table<'a>(&'a self, name: &str, token: Option<&str>) -> TableQuery<'a> {
        TableQuery::new(self, name, token)
    }

    /// Websocket endpoint of the realtime service.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", ws_base, self.anon_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"code":"23505","message":"duplicate key value violates unique constraint","details":null}"#, "duplicate key value violates unique constraint", Some("23505"))]
    #[case(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#, "Invalid login credentials", None)]
    #[case(r#"{"code":422,"msg":"Password should be at least 6 characters"}"#, "Password should be at least 6 characters", Some("422"))]
    #[case(r#"{"statusCode":"413","error":"Payload too large","message":"The object exceeded the maximum allowed size"}"#, "The object exceeded the maximum allowed size", None)]
    #[case(r#"{"error":"Bucket not found"}"#, "Bucket not found", None)]
    fn normalises_backend_error_payloads(#[case] body: &str, #[case] expected: &str, #[case] code: Option<&str>) {
        match api_error(400, body) {
            BaasError::Api { message, code: got_code, status } => {
                assert_eq!(status, 400);
                assert_eq!(message, expected);
                assert_eq!(got_code.as_deref(), code);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn plain_text_and_empty_bodies_still_produce_a_message() {
        assert_eq!(api_error(502, "Bad Gateway").to_string(), "Bad Gateway");
        assert_eq!(api_error(500, "").to_string(), "Request failed with status 500");
        assert_eq!(api_error(500, "{}").to_string(), "Request failed with status 500");
    }

    #[test]
    fn auth_failures_are_recognised() {
        assert!(api_error(401, r#"{"message":"JWT expired"}"#).is_auth_failure());
        assert!(BaasError::MissingSession.is_auth_failure());
        assert!(!api_error(409, r#"{"message":"conflict"}"#).is_auth_failure());
    }

    #[test]
    fn realtime_url_switches_scheme() {
        let client = BaasClient::new("https://project.example.co/", "anon").unwrap();
        assert_eq!(client.base_url(), "https://project.example.co");
        assert_eq!(
            client.realtime_url(),
            "wss://project.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        let local = BaasClient::new("http://localhost:54321", "k").unwrap();
        assert!(local.realtime_url().starts_with("ws://localhost:54321/realtime/v1/websocket"));
    }

    #[test]
    fn endpoint_joins_paths() {
        let client = BaasClient::new("http://localhost:54321", "anon").unwrap();
        assert_eq!(client.endpoint("/rest/v1/posts"), "http://localhost:54321/rest/v1/posts");
        assert_eq!(client.endpoint("auth/v1/user"), "http://localhost:54321/auth/v1/user");
    }
}
