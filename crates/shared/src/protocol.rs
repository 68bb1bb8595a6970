//! Realtime channel frames (Phoenix-style `topic`/`event`/`payload`/`ref`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::CommentRow;

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_INSERT: &str = "INSERT";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const HEARTBEAT_TOPIC: &str = "phoenix";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

pub fn table_topic(schema: &str, table: &str) -> String {
    format!("realtime:{schema}:{table}")
}

impl RealtimeFrame {
    /// Join request asking for INSERT notifications on one table.
    pub fn join(schema: &str, table: &str, reference: impl Into<String>) -> Self {
        Self {
            topic: table_topic(schema, table),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "postgres_changes": [
                        { "event": EVENT_INSERT, "schema": schema, "table": table }
                    ]
                }
            }),
            reference: Some(reference.into()),
        }
    }

    pub fn leave(topic: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.into()),
        }
    }

    pub fn heartbeat(reference: impl Into<String>) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.into()),
        }
    }

    /// Extracts the inserted row, if this frame announces one.
    ///
    /// Both the legacy `INSERT` frame (`payload.record`) and the
    /// `postgres_changes` frame (`payload.data.record` with `type == INSERT`)
    /// are understood. Any other frame yields `None`.
    pub fn insert_record(&self) -> Option<Result<CommentRow, serde_json::Error>> {
        let record = match self.event.as_str() {
            EVENT_INSERT => self.payload.get("record")?,
            EVENT_POSTGRES_CHANGES => {
                let data = self.payload.get("data")?;
                if data.get("type").and_then(Value::as_str) != Some(EVENT_INSERT) {
                    return None;
                }
                data.get("record")?
            }
            _ => return None,
        };
        Some(serde_json::from_value(record.clone()))
    }
}
