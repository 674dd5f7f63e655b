//! File-backed session storage.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use hulul_core::auth::{PersistedAuthState, SessionStorage};
use hulul_core::error::{HululError, Result};

use super::atomic_toml::AtomicTomlFile;
use crate::paths::HululPaths;

/// Persists the auth record as `<storage_key>.toml` and keeps the ephemeral
/// scope in the session directory.
///
/// File operations run on the blocking pool.
#[derive(Clone)]
pub struct FileSessionStorage {
    record: Arc<AtomicTomlFile<PersistedAuthState>>,
    session_dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(record_path: PathBuf, session_dir: PathBuf) -> Self {
        Self {
            record: Arc::new(AtomicTomlFile::new(record_path)),
            session_dir,
        }
    }

    /// Resolves both locations via [`HululPaths`].
    pub fn from_paths(paths: &HululPaths, storage_key: &str) -> Result<Self> {
        let record_path = paths
            .auth_storage_file(storage_key)
            .map_err(|e| HululError::config(e.to_string()))?;
        let session_dir = paths
            .session_dir()
            .map_err(|e| HululError::config(e.to_string()))?;
        Ok(Self::new(record_path, session_dir))
    }

    pub fn record_path(&self) -> PathBuf {
        self.record.path().to_path_buf()
    }

    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone()
    }

    async fn blocking<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&AtomicTomlFile<PersistedAuthState>) -> Result<R> + Send + 'static,
    {
        let record = self.record.clone();
        tokio::task::spawn_blocking(move || f(record.as_ref()))
            .await
            .map_err(|e| HululError::internal(format!("Failed to join task: {}", e)))?
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self) -> Result<Option<PersistedAuthState>> {
        self.blocking(|record| Ok(record.load()?)).await
    }

    async fn save(&self, state: &PersistedAuthState) -> Result<()> {
        let state = state.clone();
        self.blocking(move |record| Ok(record.save(&state)?)).await
    }

    async fn remove(&self) -> Result<()> {
        self.blocking(|record| Ok(record.remove()?)).await
    }

    async fn clear_ephemeral(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.session_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
