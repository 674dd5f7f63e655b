//! In-process gateways for tests and offline runs.
//!
//! Both gateways keep their data in memory, count calls, and can be told to
//! fail or stall so callers can exercise error and concurrency paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hulul_core::auth::{AuthGateway, AuthSession, SignUpMetadata};
use hulul_core::error::{HululError, Result};
use hulul_core::ticket::{
    ChangeFeedSender, ChangeKind, ChangeSubscription, Message, NewMessage, Ticket, TicketGateway,
};
use tokio::sync::Semaphore;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password: String,
    role_claim: Option<String>,
}

#[derive(Debug, Default)]
struct AuthFailures {
    unreachable: bool,
    sign_out: bool,
}

/// Identity provider held in memory.
///
/// Issued access tokens stay live until signed out or revoked.
#[derive(Default)]
pub struct InMemoryAuthGateway {
    accounts: Mutex<HashMap<String, Account>>,
    live_tokens: Mutex<HashSet<String>>,
    failures: Mutex<AuthFailures>,
    require_confirmation: Mutex<bool>,
    reset_requests: Mutex<Vec<(String, String)>>,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl InMemoryAuthGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account. `role_claim` is stored as the user's role metadata.
    pub fn with_account(self, email: &str, password: &str, role_claim: Option<&str>) -> Self {
        self.add_account(email, password, role_claim);
        self
    }

    pub fn add_account(&self, email: &str, password: &str, role_claim: Option<&str>) -> String {
        let user_id = format!("user-{}", Uuid::new_v4());
        self.accounts.lock().unwrap().insert(
            email.to_lowercase(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
                role_claim: role_claim.map(str::to_string),
            },
        );
        user_id
    }

    /// Makes every call fail as if the provider were offline.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.failures.lock().unwrap().unreachable = unreachable;
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.failures.lock().unwrap().sign_out = fail;
    }

    /// When set, sign-ups return no session until the email is confirmed.
    pub fn set_require_confirmation(&self, required: bool) {
        *self.require_confirmation.lock().unwrap() = required;
    }

    /// Invalidates a token, as if it had expired or been revoked elsewhere.
    pub fn revoke(&self, access_token: &str) {
        self.live_tokens.lock().unwrap().remove(access_token);
    }

    pub fn is_live(&self, access_token: &str) -> bool {
        self.live_tokens.lock().unwrap().contains(access_token)
    }

    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.reset_requests.lock().unwrap().clone()
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.failures.lock().unwrap().unreachable {
            return Err(HululError::gateway("identity provider unreachable"));
        }
        Ok(())
    }

    fn issue(&self, email: &str, account: &Account) -> AuthSession {
        let access_token = format!("access-{}", Uuid::new_v4());
        self.live_tokens
            .lock()
            .unwrap()
            .insert(access_token.clone());
        let now = Utc::now();
        AuthSession {
            user_id: account.user_id.clone(),
            email: Some(email.to_string()),
            role_claim: account.role_claim.clone(),
            access_token,
            refresh_token: Some(format!("refresh-{}", Uuid::new_v4())),
            issued_at: now,
            expires_at: Some(now + chrono::Duration::hours(1)),
        }
    }
}

#[async_trait]
impl AuthGateway for InMemoryAuthGateway {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        let key = email.to_lowercase();
        let account = self.accounts.lock().unwrap().get(&key).cloned();
        match account {
            Some(account) if account.password == password => Ok(self.issue(&key, &account)),
            _ => Err(HululError::auth("Invalid login credentials")),
        }
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.failures.lock().unwrap().sign_out {
            return Err(HululError::gateway("sign out rejected"));
        }
        self.revoke(&session.access_token);
        Ok(())
    }

    async fn current_session(&self, persisted: Option<&AuthSession>) -> Result<Option<AuthSession>> {
        self.check_reachable()?;
        Ok(persisted
            .filter(|session| self.is_live(&session.access_token))
            .cloned())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: &SignUpMetadata,
    ) -> Result<Option<AuthSession>> {
        self.check_reachable()?;
        let key = email.to_lowercase();
        if self.accounts.lock().unwrap().contains_key(&key) {
            return Err(HululError::auth("User already registered"));
        }
        self.add_account(&key, password, None);
        if *self.require_confirmation.lock().unwrap() {
            return Ok(None);
        }
        let account = self.accounts.lock().unwrap().get(&key).cloned();
        Ok(account.map(|account| self.issue(&key, &account)))
    }

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.check_reachable()?;
        self.reset_requests
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

/// Operations of [`InMemoryTicketGateway`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketOp {
    ListTickets,
    GetTicket,
    ListMessages,
    InsertMessage,
    Subscribe,
}

#[derive(Default)]
struct TicketData {
    tickets: Vec<Ticket>,
    messages: Vec<Message>,
    next_message: usize,
}

/// Ticket store held in memory, with a change feed per subscription.
///
/// Inserting a message notifies every live subscription of that ticket, the
/// same echo a realtime backend would deliver.
#[derive(Default)]
pub struct InMemoryTicketGateway {
    data: Mutex<TicketData>,
    feeds: Mutex<Vec<ChangeFeedSender>>,
    failing: Mutex<HashSet<TicketOp>>,
    delays: Mutex<HashMap<TicketOp, Duration>>,
    insert_gate: Mutex<Option<Arc<Semaphore>>>,
    read_gate: Mutex<Option<Arc<Semaphore>>>,
    clock: Mutex<Option<DateTime<Utc>>>,
    list_messages_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

impl InMemoryTicketGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket(self, ticket: Ticket) -> Self {
        self.data.lock().unwrap().tickets.push(ticket);
        self
    }

    pub fn with_messages(self, messages: impl IntoIterator<Item = Message>) -> Self {
        {
            let mut data = self.data.lock().unwrap();
            data.messages.extend(messages);
            data.next_message = data.messages.len();
        }
        self
    }

    /// Makes `op` fail with a gateway error until cleared.
    pub fn set_failing(&self, op: TicketOp, failing: bool) {
        let mut ops = self.failing.lock().unwrap();
        if failing {
            ops.insert(op);
        } else {
            ops.remove(&op);
        }
    }

    /// Delays `op` before it answers, to exercise timeouts.
    pub fn set_delay(&self, op: TicketOp, delay: Option<Duration>) {
        let mut delays = self.delays.lock().unwrap();
        match delay {
            Some(delay) => delays.insert(op, delay),
            None => delays.remove(&op),
        };
    }

    /// Holds inserts until [`release_inserts`](Self::release_inserts) is called.
    pub fn hold_inserts(&self) {
        *self.insert_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `count` held inserts proceed.
    pub fn release_inserts(&self, count: usize) {
        if let Some(gate) = self.insert_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Holds message reads after they take their snapshot, until
    /// [`release_message_reads`](Self::release_message_reads) is called.
    pub fn hold_message_reads(&self) {
        *self.read_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `count` held message reads answer.
    pub fn release_message_reads(&self, count: usize) {
        if let Some(gate) = self.read_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Fixes the timestamp given to inserted messages.
    pub fn set_clock(&self, now: DateTime<Utc>) {
        *self.clock.lock().unwrap() = Some(now);
    }

    /// Stores a message written by someone else and notifies subscribers.
    pub fn push_remote_message(&self, message: Message) {
        let ticket_id = message.ticket_id.clone();
        {
            let mut data = self.data.lock().unwrap();
            data.next_message += 1;
            data.messages.push(message);
        }
        self.emit_change(&ticket_id, ChangeKind::Insert);
    }

    /// Deletes a stored message and notifies subscribers. Returns whether it existed.
    pub fn remove_message(&self, ticket_id: &str, message_id: &str) -> bool {
        let removed = {
            let mut data = self.data.lock().unwrap();
            let before = data.messages.len();
            data.messages
                .retain(|m| !(m.ticket_id == ticket_id && m.id == message_id));
            data.messages.len() != before
        };
        if removed {
            self.emit_change(ticket_id, ChangeKind::Delete);
        }
        removed
    }

    /// Drops the producer side of every feed of `ticket_id`, as a lost
    /// connection would. Returns how many were closed.
    pub fn close_feeds(&self, ticket_id: &str) -> usize {
        let mut feeds = self.feeds.lock().unwrap();
        let before = feeds.len();
        feeds.retain(|feed| feed.ticket_id() != ticket_id);
        before - feeds.len()
    }

    /// Notifies live subscriptions of `ticket_id`. Returns how many were reached.
    pub fn emit_change(&self, ticket_id: &str, kind: ChangeKind) -> usize {
        let mut feeds = self.feeds.lock().unwrap();
        feeds.retain(|feed| !feed.is_closed());
        feeds
            .iter()
            .filter(|feed| feed.ticket_id() == ticket_id)
            .filter(|feed| feed.send(kind))
            .count()
    }

    pub fn active_subscriptions(&self, ticket_id: &str) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|feed| feed.ticket_id() == ticket_id && !feed.is_closed())
            .count()
    }

    pub fn messages(&self, ticket_id: &str) -> Vec<Message> {
        self.data
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect()
    }

    pub fn list_messages_calls(&self) -> usize {
        self.list_messages_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: TicketOp) -> Result<()> {
        let delay = self.delays.lock().unwrap().get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&op) {
            return Err(HululError::gateway(format!("{:?} failed", op)));
        }
        Ok(())
    }
}

async fn pass_gate(gate: &Mutex<Option<Arc<Semaphore>>>) -> Result<()> {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        let permit = gate
            .acquire()
            .await
            .map_err(|_| HululError::internal("gate closed"))?;
        permit.forget();
    }
    Ok(())
}

#[async_trait]
impl TicketGateway for InMemoryTicketGateway {
    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.enter(TicketOp::ListTickets).await?;
        Ok(self.data.lock().unwrap().tickets.clone())
    }

    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        self.enter(TicketOp::GetTicket).await?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .cloned())
    }

    async fn list_messages(&self, ticket_id: &str) -> Result<Vec<Message>> {
        self.list_messages_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(TicketOp::ListMessages).await?;
        let mut messages = self.messages(ticket_id);
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pass_gate(&self.read_gate).await?;
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.insert_gate).await?;
        self.enter(TicketOp::InsertMessage).await?;

        let now = self.clock.lock().unwrap().unwrap_or_else(Utc::now);
        let stored = {
            let mut data = self.data.lock().unwrap();
            data.next_message += 1;
            let stored = Message {
                id: format!("m{}", data.next_message),
                ticket_id: message.ticket_id,
                sender_id: message.sender_id,
                body: message.body,
                is_from_support_staff: message.is_from_support_staff,
                created_at: now,
            };
            data.messages.push(stored.clone());
            stored
        };
        self.emit_change(&stored.ticket_id, ChangeKind::Insert);
        Ok(stored)
    }

    async fn subscribe_messages(&self, ticket_id: &str) -> Result<ChangeSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(TicketOp::Subscribe).await?;
        let (sender, subscription) = ChangeSubscription::channel(ticket_id);
        self.feeds.lock().unwrap().push(sender);
        Ok(subscription)
    }
}
