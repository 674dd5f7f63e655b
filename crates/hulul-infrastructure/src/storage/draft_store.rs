//! Unsent message drafts, kept in the ephemeral session directory.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hulul_core::error::{HululError, Result};
use serde::{Deserialize, Serialize};

use crate::paths::HululPaths;

/// A draft that failed to send and is waiting for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDraft {
    pub ticket_id: String,
    pub text: String,
    pub saved_at: DateTime<Utc>,
}

/// One draft per ticket, stored as `<drafts_dir>/<ticket_id>.toml`.
///
/// The directory lives under the session directory, so sign-out wipes it.
#[derive(Debug, Clone)]
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn from_paths(paths: &HululPaths) -> Result<Self> {
        let dir = paths
            .drafts_dir()
            .map_err(|e| HululError::config(e.to_string()))?;
        Ok(Self::new(dir))
    }

    pub async fn save(&self, ticket_id: &str, text: &str) -> Result<()> {
        let draft = StoredDraft {
            ticket_id: ticket_id.to_string(),
            text: text.to_string(),
            saved_at: Utc::now(),
        };
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = toml::to_string_pretty(&draft)?;
        tokio::fs::write(self.path_for(ticket_id), content).await?;
        Ok(())
    }

    pub async fn load(&self, ticket_id: &str) -> Result<Option<StoredDraft>> {
        match tokio::fs::read_to_string(self.path_for(ticket_id)).await {
            Ok(content) => Ok(Some(toml::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn discard(&self, ticket_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(ticket_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, ticket_id: &str) -> PathBuf {
        let file_stem: String = ticket_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.toml", file_stem))
    }
}
