//! Client configuration model.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Default realtime heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
/// Storage key of the persisted auth record.
pub const DEFAULT_STORAGE_KEY: &str = "auth-storage";

/// Connection settings for the hosted backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: String,
    /// Public anonymous API key sent as the `apikey` header.
    #[serde(default)]
    pub anon_key: String,
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_secs: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

/// Route paths the presentation layer navigates to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Absolute URL the password reset email links back to.
    #[serde(default)]
    pub reset_password_url: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            reset_password_url: String::new(),
        }
    }
}

/// Root of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub routes: RouteConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            backend: BackendConfig::default(),
            timeouts: TimeoutConfig::default(),
            routes: RouteConfig::default(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [backend]
            url = "https://example.supabase.co"
            anon_key = "anon"
            "#,
        )
        .unwrap();
        assert!(config.backend.is_configured());
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.routes.login_path, "/login");
        assert_eq!(config.storage_key, "auth-storage");
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let timeouts = TimeoutConfig {
            request_secs: 0,
            heartbeat_secs: 0,
        };
        assert_eq!(timeouts.request_timeout(), Duration::from_secs(1));
        assert_eq!(timeouts.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_backend_is_unconfigured() {
        assert!(!ClientConfig::default().backend.is_configured());
    }
}
