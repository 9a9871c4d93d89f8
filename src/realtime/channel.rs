use crate::realtime::{ChangeEvent, ChangeType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// A Phoenix channel frame (`vsn=1.0.0` JSON object encoding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Which row changes a channel asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    /// `*`, `INSERT`, `UPDATE` or `DELETE`.
    pub event: &'static str,
    pub table: String,
    /// PostgREST-style filter such as `receiver_id=eq.<uuid>`.
    pub filter: Option<String>,
}

impl ChangeFilter {
    pub fn all(table: &str) -> Self {
        Self { event: "*", table: table.to_string(), filter: None }
    }

    pub fn inserts(table: &str, filter: impl Into<String>) -> Self {
        Self { event: "INSERT", table: table.to_string(), filter: Some(filter.into()) }
    }

    fn config(&self) -> Value {
        let mut change = json!({ "event": self.event, "schema": "public", "table": self.table });
        if let Some(filter) = &self.filter {
            change["filter"] = Value::String(filter.clone());
        }
        change
    }
}

/// What a received frame means for a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Change(ChangeEvent),
    JoinAccepted,
    JoinRejected(String),
    Closed,
    Other,
}

/// Per-connection channel bookkeeping: topic name and message refs.
#[derive(Debug)]
pub struct ChannelState {
    topic: String,
    next_ref: u64,
    join_ref: Option<String>,
}

impl ChannelState {
    pub fn new(name: &str) -> Self {
        Self { topic: format!("realtime:{}", name), next_ref: 1, join_ref: None }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn take_ref(&mut self) -> String {
        let reference = self.next_ref.to_string();
        self.next_ref += 1;
        reference
    }

    pub fn join_message(&mut self, filter: &ChangeFilter, access_token: Option<&str>) -> PhoenixMessage {
        let reference = self.take_ref();
        self.join_ref = Some(reference.clone());

        let mut payload = json!({
            "config": {
                "broadcast": { "self": false, "ack": false },
                "presence": { "key": "" },
                "postgres_changes": [filter.config()],
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        PhoenixMessage {
            topic: self.topic.clone(),
            event: "phx_join".to_string(),
            payload,
            reference: Some(reference),
        }
    }

    pub fn heartbeat_message(&mut self) -> PhoenixMessage {
        PhoenixMessage {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(self.take_ref()),
        }
    }

    /// Classifies a text frame. Frames for other topics are ignored.
    pub fn interpret(&self, text: &str) -> Result<Incoming, serde_json::Error> {
        let message: PhoenixMessage = serde_json::from_str(text)?;
        if message.topic != self.topic {
            return Ok(Incoming::Other);
        }

        Ok(match message.event.as_str() {
            "postgres_changes" => match parse_change(&message.payload) {
                Some(change) => Incoming::Change(change),
                None => {
                    log::warn!("Ignoring malformed change payload on {}", self.topic);
                    Incoming::Other
                }
            },
            "phx_reply" if message.reference.is_some() && message.reference == self.join_ref => {
                let status = message.payload.get("status").and_then(Value::as_str).unwrap_or("");
                if status == "ok" {
                    Incoming::JoinAccepted
                } else {
                    let reason = message.payload
                        .pointer("/response/reason")
                        .and_then(Value::as_str)
                        .unwrap_or("subscription refused")
                        .to_string();
                    Incoming::JoinRejected(reason)
                }
            }
            "phx_close" | "phx_error" => Incoming::Closed,
            _ => Incoming::Other,
        })
    }
}

fn parse_change(payload: &Value) -> Option<ChangeEvent> {
    let data = payload.get("data")?;
    let event_type = serde_json::from_value::<ChangeType>(
        data.get("type").or_else(|| data.get("eventType"))?.clone(),
    )
    .ok()?;
    Some(ChangeEvent {
        event_type,
        table: data.get("table")?.as_str()?.to_string(),
        record: data.get("record").or_else(|| data.get("new")).cloned().unwrap_or(Value::Null),
        old_record: data.get("old_record").or_else(|| data.get("old")).cloned().unwrap_or(Value::Null),
    })
}
