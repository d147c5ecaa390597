//! ActionDescriptor — a fire-and-forget background task tracked by the
//! Action Coordinator (C7) inside a session's ConversationContext (C6).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-domain policy applied when a new action starts while one is already
/// active (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPolicy {
    /// Fail the new `start` call immediately; the prior action keeps running.
    Reject,
    /// Cancel the prior action, then start the new one.
    Replace,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        ActionPolicy::Reject
    }
}

#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub action_name: String,
    pub domain: String,
    pub handler_name: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub status: ActionStatus,
    pub metadata: HashMap<String, Value>,
}

impl ActionDescriptor {
    pub fn new(domain: impl Into<String>, action_name: impl Into<String>, handler_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            domain: domain.into(),
            handler_name: handler_name.into(),
            start_time: chrono::Utc::now(),
            status: ActionStatus::Running,
            metadata: HashMap::new(),
        }
    }
}
