//! Ticket data gateway trait and the live change subscription handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::message::{Message, NewMessage};
use super::model::Ticket;
use crate::error::Result;

/// Kind of row change reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Other,
}

impl ChangeKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Other,
        }
    }
}

/// A change notification for one ticket's messages.
///
/// Consumers use it only as a trigger to refetch; the row payload is not carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub ticket_id: String,
    pub kind: ChangeKind,
}

/// Producer half of a change subscription, held by the gateway.
#[derive(Debug, Clone)]
pub struct ChangeFeedSender {
    ticket_id: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
    cancel: CancellationToken,
}

impl ChangeFeedSender {
    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    /// Forwards an event. Returns false once the subscriber is gone or unsubscribed.
    pub fn send(&self, kind: ChangeKind) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx
            .send(ChangeEvent {
                ticket_id: self.ticket_id.clone(),
                kind,
            })
            .is_ok()
    }

    /// Resolves when the subscriber unsubscribes or drops its handle.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// Consumer half of a live change subscription scoped to one ticket.
///
/// Dropping the handle unsubscribes; producers observe this through
/// [`ChangeFeedSender::closed`].
#[derive(Debug)]
pub struct ChangeSubscription {
    ticket_id: String,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl ChangeSubscription {
    /// Creates a connected sender/subscription pair for `ticket_id`.
    pub fn channel(ticket_id: impl Into<String>) -> (ChangeFeedSender, ChangeSubscription) {
        let ticket_id = ticket_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let sender = ChangeFeedSender {
            ticket_id: ticket_id.clone(),
            tx,
            cancel: cancel.clone(),
        };
        let subscription = ChangeSubscription {
            ticket_id,
            rx,
            cancel,
        };
        (sender, subscription)
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    /// Waits for the next change event.
    ///
    /// Returns `None` after unsubscribing or when the producer has shut down.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// A token that cancels this subscription when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// An abstract store of tickets and their messages.
///
/// Access scoping (which tickets the caller may see) is enforced remotely.
#[async_trait]
pub trait TicketGateway: Send + Sync {
    /// Lists every ticket visible to the current user. Order is not significant.
    async fn list_tickets(&self) -> Result<Vec<Ticket>>;

    /// Finds a ticket by id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Ticket))`: ticket found
    /// - `Ok(None)`: no such ticket, or not visible to the caller
    /// - `Err(_)`: the store could not be reached
    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>>;

    /// Lists a ticket's messages ordered by `created_at` ascending.
    async fn list_messages(&self, ticket_id: &str) -> Result<Vec<Message>>;

    /// Inserts a message and returns the canonical stored record.
    async fn insert_message(&self, message: NewMessage) -> Result<Message>;

    /// Opens a change feed for a ticket's messages.
    async fn subscribe_messages(&self, ticket_id: &str) -> Result<ChangeSubscription>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_receives_events() {
        let (sender, mut subscription) = ChangeSubscription::channel("T1");
        assert!(sender.send(ChangeKind::Insert));
        let event = subscription.next().await.unwrap();
        assert_eq!(event.ticket_id, "T1");
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (sender, mut subscription) = ChangeSubscription::channel("T1");
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert!(!sender.send(ChangeKind::Insert));
        assert!(sender.is_closed());
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_closes_producer() {
        let (sender, subscription) = ChangeSubscription::channel("T1");
        drop(subscription);
        sender.closed().await;
        assert!(sender.is_closed());
    }

    #[test]
    fn test_change_kind_from_wire() {
        assert_eq!(ChangeKind::from_wire("INSERT"), ChangeKind::Insert);
        assert_eq!(ChangeKind::from_wire("DELETE"), ChangeKind::Delete);
        assert_eq!(ChangeKind::from_wire("*"), ChangeKind::Other);
    }
}
