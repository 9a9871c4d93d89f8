//! Row-change notifications from the backend's realtime service, bridged to
//! the browser as Server-Sent Events.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod bridge;
pub mod channel;
pub mod connection;
pub mod feed_state;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// One row change delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub event_type: ChangeType,
    pub table: String,
    pub record: Value,
    pub old_record: Value,
}

impl ChangeEvent {
    /// The new row as a typed record, if it has the expected shape.
    pub fn record_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.record.clone()).ok()
    }
}
