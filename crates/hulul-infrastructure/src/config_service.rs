//! Configuration service implementation.
//!
//! Loads `ClientConfig` from `config.toml` in the hulul config directory,
//! writing a default file on first run, and applies environment overrides.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use hulul_core::config::ClientConfig;
use hulul_core::error::{HululError, Result};

use crate::paths::HululPaths;
use crate::storage::AtomicTomlFile;

pub const ENV_SUPABASE_URL: &str = "HULUL_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "HULUL_SUPABASE_ANON_KEY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "HULUL_REQUEST_TIMEOUT_SECS";

/// Configuration service that loads and caches the client configuration.
#[derive(Clone)]
pub struct ConfigService {
    file: Arc<AtomicTomlFile<ClientConfig>>,
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: Arc::new(AtomicTomlFile::new(path)),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_paths(paths: &HululPaths) -> Result<Self> {
        let path = paths
            .config_file()
            .map_err(|e| HululError::config(e.to_string()))?;
        Ok(Self::new(path))
    }

    /// Returns the configuration, loading it on first access.
    ///
    /// A missing file is created with defaults. Environment overrides are
    /// applied on top of the file and never written back.
    pub fn get_config(&self) -> Result<ClientConfig> {
        if let Some(cached) = self.config.read().unwrap().as_ref() {
            return Ok(cached.clone());
        }

        let from_file = match self.file.load()? {
            Some(config) => config,
            None => {
                let default_config = ClientConfig::default();
                self.file.save(&default_config)?;
                tracing::info!(
                    "[ConfigService] Wrote default configuration to {}",
                    self.file.path().display()
                );
                default_config
            }
        };

        let config = apply_env_overrides(from_file, |key| std::env::var(key).ok())?;
        *self.config.write().unwrap() = Some(config.clone());
        Ok(config)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap() = None;
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}

/// Applies environment overrides read through `lookup`.
fn apply_env_overrides<F>(mut config: ClientConfig, lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = non_empty(ENV_SUPABASE_URL) {
        config.backend.url = url;
    }
    if let Some(key) = non_empty(ENV_SUPABASE_ANON_KEY) {
        config.backend.anon_key = key;
    }
    if let Some(raw) = non_empty(ENV_REQUEST_TIMEOUT_SECS) {
        config.timeouts.request_secs = raw.parse().map_err(|_| {
            HululError::config(format!(
                "{} must be a whole number of seconds, got '{}'",
                ENV_REQUEST_TIMEOUT_SECS, raw
            ))
        })?;
    }
    config.backend.url = config.backend.url.trim().trim_end_matches('/').to_string();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));

        let config = service.get_config().unwrap();
        assert_eq!(config.storage_key, "auth-storage");
        assert!(service.path().exists());
    }

    #[test]
    fn test_reads_existing_file_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nurl = \"https://example.supabase.co/\"\nanon_key = \"anon\"\n\n[timeouts]\nrequest_secs = 5\n",
        )
        .unwrap();
        let service = ConfigService::new(path.clone());

        let config = service.get_config().unwrap();
        assert_eq!(config.backend.url, "https://example.supabase.co");
        assert_eq!(config.timeouts.request_secs, 5);

        std::fs::write(&path, "[timeouts]\nrequest_secs = 9\n").unwrap();
        assert_eq!(service.get_config().unwrap().timeouts.request_secs, 5);

        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().timeouts.request_secs, 9);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SUPABASE_URL, "https://override.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "  "),
            (ENV_REQUEST_TIMEOUT_SECS, "3"),
        ]);
        let mut base = ClientConfig::default();
        base.backend.anon_key = "from-file".to_string();

        let config = apply_env_overrides(base, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.backend.url, "https://override.supabase.co");
        assert_eq!(config.backend.anon_key, "from-file");
        assert_eq!(config.timeouts.request_secs, 3);
    }

    #[test]
    fn test_invalid_timeout_override() {
        let err = apply_env_overrides(ClientConfig::default(), |k| {
            (k == ENV_REQUEST_TIMEOUT_SECS).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, HululError::Config(_)));
    }
}
