//! Ticket list view model.

use std::sync::Arc;
use std::time::Duration;

use hulul_core::ticket::{StatusFilter, Ticket, TicketFilter, TicketGateway};

use crate::timeout::bounded;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListPhase {
    #[default]
    Idle,
    Loading,
    Ready(Vec<Ticket>),
    Error(String),
}

/// Fetches the caller's tickets once and filters them locally.
///
/// Filtering never triggers a fetch; the visible set is always
/// `filter.apply(fetched)`.
pub struct TicketListView {
    gateway: Arc<dyn TicketGateway>,
    request_timeout: Duration,
    phase: ListPhase,
    filter: TicketFilter,
}

impl TicketListView {
    pub fn new(gateway: Arc<dyn TicketGateway>, request_timeout: Duration) -> Self {
        Self {
            gateway,
            request_timeout,
            phase: ListPhase::Idle,
            filter: TicketFilter::default(),
        }
    }

    /// Fetches the full visible ticket set.
    pub async fn load(&mut self) -> &ListPhase {
        self.phase = ListPhase::Loading;
        let result = bounded(
            self.request_timeout,
            "list tickets",
            self.gateway.list_tickets(),
        )
        .await;

        self.phase = match result {
            Ok(tickets) => {
                tracing::debug!("[TicketList] Loaded {} tickets", tickets.len());
                ListPhase::Ready(tickets)
            }
            Err(e) => {
                tracing::warn!("[TicketList] Failed to load tickets: {}", e);
                ListPhase::Error(e.to_string())
            }
        };
        &self.phase
    }

    pub fn phase(&self) -> &ListPhase {
        &self.phase
    }

    pub fn filter(&self) -> &TicketFilter {
        &self.filter
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.filter.search_term = term.into();
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filter.status = status;
    }

    /// Every fetched ticket, unfiltered. Empty unless loaded.
    pub fn tickets(&self) -> &[Ticket] {
        match &self.phase {
            ListPhase::Ready(tickets) => tickets.as_slice(),
            _ => &[],
        }
    }

    pub fn visible(&self) -> Vec<&Ticket> {
        self.filter.apply(self.tickets())
    }

    /// True when the load succeeded but nothing matches the filter.
    pub fn is_empty_result(&self) -> bool {
        matches!(self.phase, ListPhase::Ready(_)) && self.visible().is_empty()
    }
}
