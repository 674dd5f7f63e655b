//! Hosted backend bindings: identity (GoTrue), tables (PostgREST) and the
//! realtime change feed.

mod auth;
pub mod jwt;
pub mod realtime;
mod tickets;

pub use auth::SupabaseAuthGateway;
pub use tickets::SupabaseTicketGateway;

use std::time::Duration;

use hulul_core::config::{BackendConfig, TimeoutConfig};
use hulul_core::error::{HululError, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

/// Shared HTTP client for one backend project.
///
/// Every request carries the project's `apikey` header and the configured
/// request timeout.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    request_timeout: Duration,
    heartbeat_interval: Duration,
}

impl SupabaseClient {
    pub fn new(backend: &BackendConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        if !backend.is_configured() {
            return Err(HululError::config(
                "backend url and anon key must be set before connecting",
            ));
        }
        Url::parse(&backend.url)
            .map_err(|e| HululError::config(format!("invalid backend url '{}': {}", backend.url, e)))?;

        let request_timeout = timeouts.request_timeout();
        let http = Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| HululError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            request_timeout,
            heartbeat_interval: timeouts.heartbeat_interval(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Starts a request with the `apikey` header set.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
    }

    /// Realtime websocket URL: `wss://<host>/realtime/v1/websocket?apikey=..&vsn=1.0.0`.
    pub fn realtime_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| HululError::config(format!("invalid backend url: {}", e)))?;
        let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
        url.set_scheme(scheme)
            .map_err(|_| HululError::config(format!("cannot derive websocket url from {}", self.base_url)))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }
}

/// Error body shapes returned by GoTrue and PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// Extracts a human readable message from an error response body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        })
}

/// Maps a failed HTTP status to the client error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> HululError {
    let message = error_message(status, body);
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => HululError::auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => HululError::timeout(message),
        _ => HululError::gateway(format!("{}: {}", status.as_u16(), message)),
    }
}

/// Maps a transport failure. Timeouts are kept distinct from other failures.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> HululError {
    if err.is_timeout() {
        HululError::timeout(format!("{}: {}", context, err))
    } else if err.is_decode() {
        HululError::Serialization {
            format: "JSON".to_string(),
            message: format!("{}: {}", context, err),
        }
    } else {
        HululError::gateway(format!("{}: {}", context, err))
    }
}

/// Sends a request and returns the response when its status is a success.
pub(crate) async fn send(context: &str, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(context, e))?;
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("[Supabase] {} failed with {}: {}", context, status, body);
    Err(status_error(status, &body))
}

/// Sends a request and decodes a JSON success body.
pub(crate) async fn send_json<T>(context: &str, request: RequestBuilder) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let response = send(context, request).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| transport_error(context, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> SupabaseClient {
        SupabaseClient::new(
            &BackendConfig {
                url: url.to_string(),
                anon_key: "anon".to_string(),
            },
            &TimeoutConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_configuration() {
        let err = SupabaseClient::new(&BackendConfig::default(), &TimeoutConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, HululError::Config(_)));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = client("https://demo.supabase.co/");
        assert_eq!(
            client.endpoint("/auth/v1/token"),
            "https://demo.supabase.co/auth/v1/token"
        );
    }

    #[test]
    fn test_realtime_url() {
        let url = client("https://demo.supabase.co").realtime_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = client("http://localhost:54321").realtime_url().unwrap();
        assert_eq!(local.scheme(), "ws");
        assert_eq!(local.port(), Some(54321));
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err, HululError::auth("Invalid login credentials"));

        let err = status_error(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#);
        assert!(err.is_auth());

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.is_transient());
        assert!(matches!(err, HululError::Gateway(_)));
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
    }
}
