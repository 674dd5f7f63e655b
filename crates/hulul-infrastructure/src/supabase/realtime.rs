//! Realtime change feed over the Phoenix channel protocol.
//!
//! One websocket per subscription. The channel joins
//! `realtime:ticket_messages_<ticket>` with a `postgres_changes` listener on
//! `support_messages` filtered to the ticket, keeps the socket alive with
//! heartbeats, and forwards each row change as a [`ChangeKind`] trigger.

use std::fmt::Display;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use hulul_core::error::{HululError, Result};
use hulul_core::ticket::{ChangeFeedSender, ChangeKind, ChangeSubscription};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use url::Url;

pub const MESSAGES_TABLE: &str = "support_messages";
const PHOENIX_TOPIC: &str = "phoenix";

/// Connection parameters for one channel.
#[derive(Debug, Clone)]
pub struct RealtimeChannelConfig {
    pub socket_url: Url,
    pub access_token: String,
    pub heartbeat: Duration,
    pub connect_timeout: Duration,
}

pub fn topic_for(ticket_id: &str) -> String {
    format!("realtime:ticket_messages_{}", ticket_id)
}

pub fn join_frame(topic: &str, ticket_id: &str, access_token: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": MESSAGES_TABLE,
                    "filter": format!("ticket_id=eq.{}", ticket_id),
                }],
            },
            "access_token": access_token,
        },
        "ref": msg_ref.to_string(),
    })
}

pub fn heartbeat_frame(msg_ref: u64) -> Value {
    json!({
        "topic": PHOENIX_TOPIC,
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

pub fn leave_frame(topic: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

/// A decoded server frame, reduced to what the channel loop acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Change(ChangeKind),
    JoinRejected(String),
    Closed,
    Ignored,
}

/// Decodes a text frame addressed to `topic`. Frames for other topics are ignored.
pub fn parse_frame(text: &str, topic: &str) -> Result<InboundFrame> {
    let frame: Value = serde_json::from_str(text)?;
    if frame.get("topic").and_then(Value::as_str) != Some(topic) {
        return Ok(InboundFrame::Ignored);
    }
    let event = frame.get("event").and_then(Value::as_str).unwrap_or_default();
    let payload = frame.get("payload").unwrap_or(&Value::Null);

    let parsed = match event {
        "postgres_changes" => {
            let kind = payload
                .pointer("/data/type")
                .and_then(Value::as_str)
                .map(ChangeKind::from_wire)
                .unwrap_or(ChangeKind::Other);
            InboundFrame::Change(kind)
        }
        "phx_reply" if payload.get("status").and_then(Value::as_str) == Some("error") => {
            let reason = payload
                .pointer("/response/reason")
                .and_then(Value::as_str)
                .unwrap_or("join rejected")
                .to_string();
            InboundFrame::JoinRejected(reason)
        }
        "system" if payload.get("status").and_then(Value::as_str) == Some("error") => {
            let reason = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("channel error")
                .to_string();
            InboundFrame::JoinRejected(reason)
        }
        "phx_close" | "phx_error" => InboundFrame::Closed,
        _ => InboundFrame::Ignored,
    };
    Ok(parsed)
}

/// Connects, joins the ticket's channel and spawns the channel task.
///
/// The returned subscription ends when the socket closes. Dropping or
/// unsubscribing it sends `phx_leave` and closes the socket.
pub async fn subscribe(config: RealtimeChannelConfig, ticket_id: &str) -> Result<ChangeSubscription> {
    let connect = connect_async(config.socket_url.as_str());
    let (stream, _) = tokio::time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| HululError::timeout("realtime connect"))?
        .map_err(|e| HululError::gateway(format!("realtime connect failed: {}", e)))?;
    tracing::debug!("[Realtime] Connected for ticket {}", ticket_id);

    let (mut writer, reader) = stream.split();
    let topic = topic_for(ticket_id);
    let join = join_frame(&topic, ticket_id, &config.access_token, 1);
    writer
        .send(WsMessage::Text(join.to_string().into()))
        .await
        .map_err(|e| HululError::gateway(format!("realtime join failed: {}", e)))?;

    let (sender, subscription) = ChangeSubscription::channel(ticket_id);
    tokio::spawn(run_channel(writer, reader, sender, topic, config.heartbeat));
    Ok(subscription)
}

/// Pumps one joined channel until either side goes away.
pub async fn run_channel<W, R>(
    mut writer: W,
    mut reader: R,
    sender: ChangeFeedSender,
    topic: String,
    heartbeat: Duration,
) where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
    R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = sender.closed() => {
                let leave = leave_frame(&topic, next_ref);
                if let Err(e) = writer.send(WsMessage::Text(leave.to_string().into())).await {
                    tracing::debug!("[Realtime] Leave for {} not delivered: {}", topic, e);
                }
                let _ = writer.close().await;
                break;
            }
            _ = ticker.tick() => {
                let frame = heartbeat_frame(next_ref);
                next_ref += 1;
                if let Err(e) = writer.send(WsMessage::Text(frame.to_string().into())).await {
                    tracing::warn!("[Realtime] Heartbeat failed on {}: {}", topic, e);
                    break;
                }
            }
            incoming = reader.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match parse_frame(text.as_str(), &topic) {
                    Ok(InboundFrame::Change(kind)) => {
                        if !sender.send(kind) {
                            break;
                        }
                    }
                    Ok(InboundFrame::JoinRejected(reason)) => {
                        tracing::warn!("[Realtime] Channel {} rejected: {}", topic, reason);
                        break;
                    }
                    Ok(InboundFrame::Closed) => break,
                    Ok(InboundFrame::Ignored) => {}
                    Err(e) => tracing::debug!("[Realtime] Unreadable frame on {}: {}", topic, e),
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("[Realtime] Socket error on {}: {}", topic, e);
                    break;
                }
            },
        }
    }
    tracing::debug!("[Realtime] Channel {} closed", topic);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    fn change_frame(topic: &str, kind: &str) -> String {
        json!({
            "topic": topic,
            "event": "postgres_changes",
            "payload": { "data": { "type": kind, "table": MESSAGES_TABLE }, "ids": [1] },
            "ref": null,
        })
        .to_string()
    }

    #[test]
    fn test_join_frame_scopes_filter_to_ticket() {
        let frame = join_frame(&topic_for("T1"), "T1", "token", 1);
        assert_eq!(frame["topic"], "realtime:ticket_messages_T1");
        assert_eq!(frame["event"], "phx_join");
        let listener = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(listener["event"], "*");
        assert_eq!(listener["table"], "support_messages");
        assert_eq!(listener["filter"], "ticket_id=eq.T1");
        assert_eq!(frame["payload"]["access_token"], "token");
    }

    #[test]
    fn test_parse_frames() {
        let topic = topic_for("T1");
        assert_eq!(
            parse_frame(&change_frame(&topic, "INSERT"), &topic).unwrap(),
            InboundFrame::Change(ChangeKind::Insert)
        );
        assert_eq!(
            parse_frame(&change_frame("realtime:other", "INSERT"), &topic).unwrap(),
            InboundFrame::Ignored
        );
        let rejected = json!({
            "topic": topic,
            "event": "phx_reply",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } },
            "ref": "1",
        })
        .to_string();
        assert_eq!(
            parse_frame(&rejected, &topic).unwrap(),
            InboundFrame::JoinRejected("unauthorized".to_string())
        );
        assert!(parse_frame("not json", &topic).is_err());
    }

    #[tokio::test]
    async fn test_channel_forwards_changes_and_leaves_on_unsubscribe() {
        let topic = topic_for("T1");
        let (out_tx, mut out_rx) = mpsc::unbounded::<WsMessage>();
        let (in_tx, in_rx) = mpsc::unbounded::<std::result::Result<WsMessage, WsError>>();
        let (sender, mut subscription) = ChangeSubscription::channel("T1");

        let task = tokio::spawn(run_channel(
            out_tx,
            in_rx,
            sender,
            topic.clone(),
            Duration::from_secs(3600),
        ));

        in_tx
            .unbounded_send(Ok(WsMessage::Text(change_frame(&topic, "INSERT").into())))
            .unwrap();
        let event = subscription.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);

        subscription.unsubscribe();
        task.await.unwrap();

        let leave = out_rx.next().await.unwrap();
        let WsMessage::Text(text) = leave else {
            panic!("expected a text frame");
        };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(frame["event"], "phx_leave");
        assert_eq!(frame["topic"], topic);
    }

    #[tokio::test]
    async fn test_subscription_ends_when_socket_closes() {
        let (out_tx, _out_rx) = mpsc::unbounded::<WsMessage>();
        let (in_tx, in_rx) = mpsc::unbounded::<std::result::Result<WsMessage, WsError>>();
        let (sender, mut subscription) = ChangeSubscription::channel("T1");

        let task = tokio::spawn(run_channel(
            out_tx,
            in_rx,
            sender,
            topic_for("T1"),
            Duration::from_secs(3600),
        ));
        drop(in_tx);
        task.await.unwrap();

        assert!(subscription.next().await.is_none());
    }
}
