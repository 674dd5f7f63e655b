//! Thread message types and the local message log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message in a ticket thread, as stored in `support_messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub ticket_id: String,
    pub sender_id: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "is_admin", default)]
    pub is_from_support_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// A message to submit. The backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub ticket_id: String,
    pub sender_id: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "is_admin")]
    pub is_from_support_staff: bool,
}

/// The locally held, ordered view of a thread.
///
/// Records are keyed by message id: merging the same record twice, or a
/// refetched snapshot that overlaps an optimistic append, never produces a
/// duplicate. Order is `created_at` ascending with the id as tie breaker, so
/// the result does not depend on the order in which merges arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    by_id: HashMap<String, Message>,
    ordered: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from an arbitrary sequence of records.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut log = Self::new();
        log.merge(messages);
        log
    }

    /// Set-union by id. Incoming records replace local records with the same id.
    ///
    /// Returns the number of ids that were not present before.
    pub fn merge(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for message in messages {
            if self.by_id.insert(message.id.clone(), message).is_none() {
                added += 1;
            }
        }
        self.reorder();
        added
    }

    /// Replaces the log with a stored snapshot.
    ///
    /// Ids missing from `snapshot` are dropped, except records in `confirmed`
    /// that the snapshot was taken too early to include. A record present in
    /// both keeps the snapshot version.
    pub fn reconcile(
        &mut self,
        snapshot: impl IntoIterator<Item = Message>,
        confirmed: impl IntoIterator<Item = Message>,
    ) {
        let mut by_id: HashMap<String, Message> = snapshot
            .into_iter()
            .map(|message| (message.id.clone(), message))
            .collect();
        for message in confirmed {
            by_id.entry(message.id.clone()).or_insert(message);
        }
        self.by_id = by_id;
        self.reorder();
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.by_id.contains_key(message_id)
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.ordered.iter().map(|m| m.id.as_str()).collect()
    }

    fn reorder(&mut self) {
        let mut ordered: Vec<Message> = self.by_id.values().cloned().collect();
        ordered.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        self.ordered = ordered;
    }
}
