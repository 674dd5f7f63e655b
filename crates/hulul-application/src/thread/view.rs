//! Observable state of a ticket thread.

use hulul_core::ticket::{Message, MessageLog, Ticket};

/// User-facing text shown when a send fails.
pub const SEND_FAILED_MESSAGE: &str = "Failed to send message. Please try again.";

/// Shown in `sync_error` when the live feed stops without the thread being left.
pub const LIVE_UPDATES_ENDED_MESSAGE: &str = "Live updates ended. Reopen the ticket to resume.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThreadPhase {
    #[default]
    Inactive,
    Loading,
    Ready,
    NotFound,
    Error(String),
}

/// Send sub-state, meaningful while the thread is `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    Sending,
    /// Idle again, with the last send's error.
    Failed(String),
}

/// Why a send request was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRefusal {
    NotReady,
    NoTicket,
    NoUser,
    EmptyDraft,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(Message),
    Refused(SendRefusal),
    Failed(String),
    /// The thread was left or re-activated before the submit resolved.
    Discarded,
}

/// Snapshot of one activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadView {
    pub ticket_id: Option<String>,
    pub user_id: Option<String>,
    pub phase: ThreadPhase,
    pub ticket: Option<Ticket>,
    pub log: MessageLog,
    pub draft: String,
    pub send_state: SendState,
    /// Live-feed trouble: a failed refetch (cleared by the next successful
    /// one), an unavailable subscription, or a feed that ended.
    pub sync_error: Option<String>,
    /// Whether the live feed of this activation is running.
    pub live: bool,
    pub(crate) generation: u64,
    /// Records returned by `send`, numbered in confirmation order, that no
    /// applied refetch has been issued after yet.
    pub(crate) confirmed: Vec<(u64, Message)>,
    pub(crate) confirmed_seq: u64,
}

impl ThreadView {
    pub fn messages(&self) -> &[Message] {
        self.log.as_slice()
    }

    pub fn is_sending(&self) -> bool {
        self.send_state == SendState::Sending
    }

    pub fn send_error(&self) -> Option<&str> {
        match &self.send_state {
            SendState::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Records a sent message for the live feed's next refetch. Without a
    /// running feed no refetch will follow, so nothing is kept.
    pub(crate) fn confirm(&mut self, message: Message) {
        if !self.live {
            return;
        }
        self.confirmed_seq += 1;
        self.confirmed.push((self.confirmed_seq, message));
    }

    /// Replaces the log with a refetched snapshot taken when `issued_at` was
    /// the latest confirmation number.
    pub(crate) fn apply_snapshot(&mut self, snapshot: Vec<Message>, issued_at: u64) {
        self.confirmed.retain(|(seq, _)| *seq > issued_at);
        let pending = self.confirmed.iter().map(|(_, message)| message.clone());
        self.log.reconcile(snapshot, pending);
    }

    pub(crate) fn check_send(&self) -> Result<(String, String, String), SendRefusal> {
        if self.phase != ThreadPhase::Ready {
            return Err(SendRefusal::NotReady);
        }
        let ticket_id = self.ticket_id.clone().ok_or(SendRefusal::NoTicket)?;
        let user_id = self.user_id.clone().ok_or(SendRefusal::NoUser)?;
        if self.is_sending() {
            return Err(SendRefusal::InFlight);
        }
        let body = self.draft.trim();
        if body.is_empty() {
            return Err(SendRefusal::EmptyDraft);
        }
        Ok((ticket_id, user_id, body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ready_view(draft: &str) -> ThreadView {
        ThreadView {
            ticket_id: Some("T1".to_string()),
            user_id: Some("user-1".to_string()),
            phase: ThreadPhase::Ready,
            draft: draft.to_string(),
            ..ThreadView::default()
        }
    }

    #[test]
    fn test_check_send_trims_body() {
        let (ticket_id, user_id, body) = ready_view("  hello \n").check_send().unwrap();
        assert_eq!(ticket_id, "T1");
        assert_eq!(user_id, "user-1");
        assert_eq!(body, "hello");
    }

    #[test]
    fn test_check_send_refusals() {
        assert_eq!(ready_view(" \t").check_send(), Err(SendRefusal::EmptyDraft));

        let mut view = ready_view("hi");
        view.user_id = None;
        assert_eq!(view.check_send(), Err(SendRefusal::NoUser));

        let mut view = ready_view("hi");
        view.send_state = SendState::Sending;
        assert_eq!(view.check_send(), Err(SendRefusal::InFlight));

        let mut view = ready_view("hi");
        view.phase = ThreadPhase::Loading;
        assert_eq!(view.check_send(), Err(SendRefusal::NotReady));
    }

    #[test]
    fn test_failed_send_is_idle_with_error() {
        let mut view = ready_view("hi");
        view.send_state = SendState::Failed(SEND_FAILED_MESSAGE.to_string());
        assert!(!view.is_sending());
        assert_eq!(view.send_error(), Some(SEND_FAILED_MESSAGE));
        assert!(view.check_send().is_ok());
    }

    fn stored(id: &str, minute: u32) -> Message {
        Message {
            id: id.to_string(),
            ticket_id: "T1".to_string(),
            sender_id: "user-1".to_string(),
            body: id.to_string(),
            is_from_support_staff: false,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_keeps_only_sends_confirmed_after_it_was_issued() {
        let mut view = ready_view("");
        view.live = true;
        view.log = MessageLog::from_messages(vec![stored("m1", 0), stored("m2", 5)]);
        view.confirm(stored("m3", 10));
        let issued_at = view.confirmed_seq;
        view.confirm(stored("m4", 15));

        // m3 was committed before the refetch, so the snapshot is authoritative for it
        view.apply_snapshot(vec![stored("m1", 0)], issued_at);

        assert_eq!(view.log.ids(), vec!["m1", "m4"]);
        assert_eq!(view.confirmed.len(), 1);
    }
}
