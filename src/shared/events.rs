use serde::{Serialize, Deserialize};
use ts_rs::TS;
use super::types::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "payload")] // Tagged enum for easier frontend parsing
#[ts(export, export_to = "events.ts")]
pub enum SessionEvent {
    #[serde(rename = "session://state-changed")]
    StateChanged(SessionSnapshot),

    /// Blocking notice offering Retry or Dismiss after a failed probe
    #[serde(rename = "connection://alert")]
    ConnectionAlert { message: String },
}

/// User's answer to a connection alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "events.ts")]
pub enum AlertChoice {
    Retry,
    Dismiss,
}
