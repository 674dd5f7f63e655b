//! Persisted session storage trait.

use async_trait::async_trait;

use super::model::PersistedAuthState;
use crate::error::Result;

/// Storage for the session store's persisted subset and for per-session scratch data.
///
/// Two scopes exist, mirroring what a browser would keep in local and session
/// storage: the auth record survives restarts until sign-out; the ephemeral
/// scope holds throwaway data (unsent drafts) and is wiped on sign-out.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Loads the auth record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))`: a record exists
    /// - `Ok(None)`: nothing stored
    /// - `Err(_)`: the record exists but could not be read
    async fn load(&self) -> Result<Option<PersistedAuthState>>;

    /// Writes the auth record, replacing any previous one.
    async fn save(&self, state: &PersistedAuthState) -> Result<()>;

    /// Removes the auth record. Succeeds if nothing was stored.
    async fn remove(&self) -> Result<()>;

    /// Wipes the ephemeral scope.
    async fn clear_ephemeral(&self) -> Result<()>;
}
