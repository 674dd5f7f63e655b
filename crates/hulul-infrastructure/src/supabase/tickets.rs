//! Ticket gateway backed by PostgREST and the realtime feed.

use std::sync::Arc;

use async_trait::async_trait;
use hulul_core::auth::AccessTokenSource;
use hulul_core::error::{HululError, Result};
use hulul_core::ticket::{ChangeSubscription, Message, NewMessage, Ticket, TicketGateway};
use reqwest::{Method, RequestBuilder};

use super::realtime::{self, RealtimeChannelConfig};
use super::{SupabaseClient, send_json};

pub const TICKETS_TABLE: &str = "support_tickets";

/// `TicketGateway` implementation for the hosted tables.
///
/// Requests are authorized with the current session's access token when one
/// exists, and with the anonymous key otherwise; row visibility is decided by
/// the backend's access policies.
#[derive(Clone)]
pub struct SupabaseTicketGateway {
    client: SupabaseClient,
    tokens: Arc<dyn AccessTokenSource>,
}

impl SupabaseTicketGateway {
    pub fn new(client: SupabaseClient, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self { client, tokens }
    }

    fn bearer(&self) -> String {
        self.tokens
            .access_token()
            .unwrap_or_else(|| self.client.anon_key().to_string())
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, &format!("/rest/v1/{}", table))
            .bearer_auth(self.bearer())
    }
}

#[async_trait]
impl TicketGateway for SupabaseTicketGateway {
    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let request = self
            .table(Method::GET, TICKETS_TABLE)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let tickets: Vec<Ticket> = send_json("list tickets", request).await?;
        tracing::debug!("[SupabaseTickets] Listed {} tickets", tickets.len());
        Ok(tickets)
    }

    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        let id_filter = format!("eq.{}", ticket_id);
        let request = self.table(Method::GET, TICKETS_TABLE).query(&[
            ("select", "*"),
            ("id", id_filter.as_str()),
            ("limit", "1"),
        ]);
        let rows: Vec<Ticket> = send_json("get ticket", request).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_messages(&self, ticket_id: &str) -> Result<Vec<Message>> {
        let ticket_filter = format!("eq.{}", ticket_id);
        let request = self.table(Method::GET, realtime::MESSAGES_TABLE).query(&[
            ("select", "*"),
            ("ticket_id", ticket_filter.as_str()),
            ("order", "created_at.asc"),
        ]);
        send_json("list messages", request).await
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let request = self
            .table(Method::POST, realtime::MESSAGES_TABLE)
            .header("Prefer", "return=representation")
            .json(&[&message]);
        let rows: Vec<Message> = send_json("insert message", request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| HululError::gateway("insert returned no row"))
    }

    async fn subscribe_messages(&self, ticket_id: &str) -> Result<ChangeSubscription> {
        let config = RealtimeChannelConfig {
            socket_url: self.client.realtime_url()?,
            access_token: self.bearer(),
            heartbeat: self.client.heartbeat_interval(),
            connect_timeout: self.client.request_timeout(),
        };
        realtime::subscribe(config, ticket_id).await
    }
}
