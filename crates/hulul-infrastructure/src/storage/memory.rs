//! In-memory session storage.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hulul_core::auth::{PersistedAuthState, SessionStorage};
use hulul_core::error::{HululError, Result};

/// Session storage held in process memory, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySessionStorage {
    record: Mutex<Option<PersistedAuthState>>,
    ephemeral: Mutex<HashMap<String, String>>,
    fail_writes: Mutex<bool>,
    save_calls: AtomicUsize,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with an existing record, as if written by a previous run.
    pub fn with_record(record: PersistedAuthState) -> Self {
        let storage = Self::default();
        *storage.record.lock().unwrap() = Some(record);
        storage
    }

    pub fn record(&self) -> Option<PersistedAuthState> {
        self.record.lock().unwrap().clone()
    }

    pub fn put_ephemeral(&self, key: impl Into<String>, value: impl Into<String>) {
        self.ephemeral
            .lock()
            .unwrap()
            .insert(key.into(), value.into());
    }

    pub fn ephemeral_len(&self) -> usize {
        self.ephemeral.lock().unwrap().len()
    }

    /// Makes `save` fail, to exercise persistence error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self) -> Result<Option<PersistedAuthState>> {
        Ok(self.record.lock().unwrap().clone())
    }

    async fn save(&self, state: &PersistedAuthState) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(HululError::storage("write rejected"));
        }
        *self.record.lock().unwrap() = Some(state.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }

    async fn clear_ephemeral(&self) -> Result<()> {
        self.ephemeral.lock().unwrap().clear();
        Ok(())
    }
}
