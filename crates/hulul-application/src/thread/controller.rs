use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use hulul_core::ticket::{ChangeSubscription, MessageLog, NewMessage, TicketGateway};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::view::{
    LIVE_UPDATES_ENDED_MESSAGE, SEND_FAILED_MESSAGE, SendOutcome, SendRefusal, SendState,
    ThreadPhase, ThreadView,
};
use crate::timeout::bounded;

/// The running live-feed task of one activation.
struct FeedTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl FeedTask {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Applies `update` only while `generation` is still the current activation.
fn apply_current<R>(
    view: &watch::Sender<ThreadView>,
    generation: u64,
    update: impl FnOnce(&mut ThreadView) -> R,
) -> Option<R> {
    let mut output = None;
    view.send_if_modified(|v| {
        if v.generation != generation {
            return false;
        }
        output = Some(update(v));
        true
    });
    output
}

/// Drives the message thread of one ticket.
///
/// Every activation gets a new generation number. Fetches, submits and
/// live-feed refetches carry the generation they started under, and their
/// results are dropped if the thread was left or re-activated meanwhile.
///
/// The view is published on a watch channel; locks are never held across an
/// await.
pub struct TicketThreadController {
    gateway: Arc<dyn TicketGateway>,
    view: Arc<watch::Sender<ThreadView>>,
    feed: Mutex<Option<FeedTask>>,
    request_timeout: Duration,
}

impl TicketThreadController {
    pub fn new(gateway: Arc<dyn TicketGateway>, request_timeout: Duration) -> Self {
        let (view, _) = watch::channel(ThreadView::default());
        Self {
            gateway,
            view: Arc::new(view),
            feed: Mutex::new(None),
            request_timeout,
        }
    }

    pub fn view(&self) -> ThreadView {
        self.view.borrow().clone()
    }

    pub fn phase(&self) -> ThreadPhase {
        self.view.borrow().phase.clone()
    }

    /// Observes every view change, including live-feed refetches.
    pub fn subscribe(&self) -> watch::Receiver<ThreadView> {
        self.view.subscribe()
    }

    /// Opens the thread of `ticket_id` for `user_id`.
    ///
    /// Loads the ticket, then its history, then opens the live feed. A missing
    /// ticket ends in `NotFound`, a failed fetch in `Error`; both are final for
    /// this activation.
    pub async fn activate(&self, ticket_id: &str, user_id: Option<String>) -> ThreadPhase {
        let ticket_id = ticket_id.trim().to_string();
        let user_id = user_id.filter(|id| !id.trim().is_empty());

        let mut generation = 0;
        self.view.send_modify(|v| {
            generation = v.generation + 1;
            *v = ThreadView {
                ticket_id: (!ticket_id.is_empty()).then(|| ticket_id.clone()),
                user_id,
                phase: ThreadPhase::Loading,
                generation,
                ..ThreadView::default()
            };
        });
        self.stop_feed();

        if ticket_id.is_empty() {
            return self.finish(generation, ThreadPhase::NotFound);
        }
        tracing::info!("[ThreadController] Opening ticket {}", ticket_id);

        let ticket = match bounded(
            self.request_timeout,
            "fetch ticket",
            self.gateway.get_ticket(&ticket_id),
        )
        .await
        {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                tracing::info!("[ThreadController] Ticket {} not found", ticket_id);
                return self.finish(generation, ThreadPhase::NotFound);
            }
            Err(e) => {
                tracing::warn!("[ThreadController] Failed to fetch ticket {}: {}", ticket_id, e);
                return self.finish(generation, ThreadPhase::Error(e.to_string()));
            }
        };
        if !self.is_current(generation) {
            return self.phase();
        }

        let history = match bounded(
            self.request_timeout,
            "fetch messages",
            self.gateway.list_messages(&ticket_id),
        )
        .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("[ThreadController] Failed to fetch messages of {}: {}", ticket_id, e);
                return self.finish(generation, ThreadPhase::Error(e.to_string()));
            }
        };

        let ready = apply_current(&self.view, generation, |v| {
            v.ticket = Some(ticket);
            v.log = MessageLog::from_messages(history);
            v.phase = ThreadPhase::Ready;
            v.log.len()
        });
        let Some(loaded) = ready else {
            return self.phase();
        };
        tracing::debug!("[ThreadController] Loaded {} messages for {}", loaded, ticket_id);

        match bounded(
            self.request_timeout,
            "subscribe",
            self.gateway.subscribe_messages(&ticket_id),
        )
        .await
        {
            Ok(subscription) => self.start_feed(generation, subscription),
            Err(e) => {
                tracing::warn!("[ThreadController] Live updates unavailable for {}: {}", ticket_id, e);
                apply_current(&self.view, generation, |v| {
                    v.sync_error = Some(format!("Live updates unavailable: {}", e));
                });
            }
        }
        self.phase()
    }

    /// Leaves the thread and tears down the live feed.
    pub fn deactivate(&self) {
        self.view.send_modify(|v| {
            let generation = v.generation + 1;
            *v = ThreadView {
                generation,
                ..ThreadView::default()
            };
        });
        self.stop_feed();
        tracing::debug!("[ThreadController] Deactivated");
    }

    /// Replaces the draft. Refused while a send is in flight.
    pub fn set_draft(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.view.send_if_modified(|v| {
            if v.is_sending() {
                return false;
            }
            v.draft = text;
            true
        })
    }

    /// Submits the current draft.
    ///
    /// Ignored when the draft is blank, no user or ticket is set, or another
    /// send is in flight. On success the stored record joins the thread and
    /// the draft is cleared; on failure the draft is kept for a retry.
    pub async fn send(&self) -> SendOutcome {
        let mut prepared = Err(SendRefusal::NotReady);
        self.view.send_if_modified(|v| {
            prepared = v
                .check_send()
                .map(|(ticket_id, user_id, body)| (ticket_id, user_id, body, v.generation));
            if prepared.is_err() {
                return false;
            }
            v.send_state = SendState::Sending;
            true
        });
        let (ticket_id, sender_id, body, generation) = match prepared {
            Ok(prepared) => prepared,
            Err(refusal) => {
                tracing::debug!("[ThreadController] Send ignored: {:?}", refusal);
                return SendOutcome::Refused(refusal);
            }
        };

        let result = bounded(
            self.request_timeout,
            "send message",
            self.gateway.insert_message(NewMessage {
                ticket_id,
                sender_id,
                body,
                is_from_support_staff: false,
            }),
        )
        .await;

        apply_current(&self.view, generation, |v| match result {
            Ok(message) => {
                v.log.merge([message.clone()]);
                v.confirm(message.clone());
                v.draft.clear();
                v.send_state = SendState::Idle;
                SendOutcome::Sent(message)
            }
            Err(e) => {
                tracing::warn!("[ThreadController] Send failed: {}", e);
                v.send_state = SendState::Failed(SEND_FAILED_MESSAGE.to_string());
                SendOutcome::Failed(SEND_FAILED_MESSAGE.to_string())
            }
        })
        .unwrap_or(SendOutcome::Discarded)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.view.borrow().generation == generation
    }

    fn finish(&self, generation: u64, phase: ThreadPhase) -> ThreadPhase {
        apply_current(&self.view, generation, |v| v.phase = phase);
        self.phase()
    }

    fn start_feed(&self, generation: u64, mut subscription: ChangeSubscription) {
        let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the feed lock so a concurrent deactivate cannot miss this task.
        if !self.is_current(generation) {
            return;
        }

        let cancel = subscription.cancellation_token();
        let gateway = self.gateway.clone();
        let view = self.view.clone();
        let request_timeout = self.request_timeout;
        apply_current(&self.view, generation, |v| v.live = true);

        let handle = tokio::spawn(async move {
            let ticket_id = subscription.ticket_id().to_string();
            while let Some(event) = subscription.next().await {
                tracing::debug!("[ThreadController] {:?} on {}, refetching", event.kind, ticket_id);
                let issued_at = view.borrow().confirmed_seq;
                let result = bounded(
                    request_timeout,
                    "refetch messages",
                    gateway.list_messages(&ticket_id),
                )
                .await;

                let applied = apply_current(&view, generation, |v| match result {
                    Ok(messages) => {
                        v.apply_snapshot(messages, issued_at);
                        v.sync_error = None;
                    }
                    Err(e) => {
                        tracing::warn!("[ThreadController] Refetch of {} failed: {}", ticket_id, e);
                        v.sync_error = Some(e.to_string());
                    }
                });
                if applied.is_none() {
                    break;
                }
            }
            let ended = apply_current(&view, generation, |v| {
                v.live = false;
                v.sync_error = Some(LIVE_UPDATES_ENDED_MESSAGE.to_string());
            });
            if ended.is_some() {
                tracing::warn!("[ThreadController] Live feed for {} ended unexpectedly", ticket_id);
            } else {
                tracing::debug!("[ThreadController] Live feed for {} ended", ticket_id);
            }
        });

        if let Some(previous) = feed.replace(FeedTask { cancel, handle }) {
            previous.stop();
        }
    }

    fn stop_feed(&self) {
        let task = self
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.stop();
        }
    }
}

impl Drop for TicketThreadController {
    fn drop(&mut self) {
        let feed = self.feed.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = feed.take() {
            task.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hulul_core::ticket::{Ticket, TicketStatus};
    use hulul_infrastructure::InMemoryTicketGateway;

    fn gateway() -> Arc<InMemoryTicketGateway> {
        Arc::new(InMemoryTicketGateway::new().with_ticket(Ticket {
            id: "T1".to_string(),
            title: "Visa".to_string(),
            description: String::new(),
            status: TicketStatus::Pending,
            priority: "low".to_string(),
            category: "general".to_string(),
            created_at: chrono::Utc::now(),
            messages_count: None,
        }))
    }

    #[tokio::test]
    async fn test_poisoned_feed_lock_still_tears_down() {
        let gateway = gateway();
        let controller = Arc::new(TicketThreadController::new(
            gateway.clone(),
            Duration::from_secs(5),
        ));
        controller.activate("T1", Some("user-1".to_string())).await;

        let poisoner = controller.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.feed.lock().unwrap();
            panic!("poison the feed lock");
        })
        .join();
        assert!(controller.feed.is_poisoned());

        controller.deactivate();
        assert_eq!(gateway.active_subscriptions("T1"), 0);

        controller.activate("T1", Some("user-1".to_string())).await;
        assert_eq!(gateway.active_subscriptions("T1"), 1);
    }
}
