//! Conversation Context Store (C6) — per-session shared memory (§4.6).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use va_core::{ActionDescriptor, ActionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured size estimate used by the trace recorder and for eviction
/// (§4.6 `memory_estimate`).
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEstimate {
    pub history_entries: usize,
    pub active_actions: usize,
    pub recent_actions: usize,
    pub failed_actions: usize,
    pub approx_bytes: usize,
}

/// Snapshot of a ConversationContext for the Trace Recorder's before/after
/// pair (§4.9); never contains raw credentials.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    pub session_id: String,
    pub history_len: usize,
    pub last_history: Vec<HistoryEntry>,
    pub active_action_domains: Vec<String>,
    pub language: Option<String>,
    pub device_count: usize,
}

pub struct ConversationContext {
    pub session_id: String,
    pub user_id: Option<String>,
    pub client_id: Option<String>,
    inner: Mutex<ContextInner>,
}

struct ContextInner {
    language: Option<String>,
    conversation_history: VecDeque<HistoryEntry>,
    handler_contexts: HashMap<String, Box<dyn std::any::Any + Send>>,
    active_actions: HashMap<String, ActionDescriptor>,
    recent_actions: VecDeque<ActionDescriptor>,
    failed_actions: VecDeque<ActionDescriptor>,
    action_error_count: HashMap<String, u64>,
    available_devices: Vec<String>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    max_history: usize,
    max_recent: usize,
    max_failed: usize,
}

impl ConversationContext {
    fn new(session_id: String, max_history: usize, max_recent: usize, max_failed: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id: None,
            client_id: None,
            inner: Mutex::new(ContextInner {
                language: None,
                conversation_history: VecDeque::with_capacity(max_history),
                handler_contexts: HashMap::new(),
                active_actions: HashMap::new(),
                recent_actions: VecDeque::with_capacity(max_recent),
                failed_actions: VecDeque::with_capacity(max_failed),
                action_error_count: HashMap::new(),
                available_devices: Vec::new(),
                created_at: now,
                last_activity: now,
                max_history,
                max_recent,
                max_failed,
            }),
        }
    }

    pub fn touch(&self) {
        self.inner.lock().last_activity = Utc::now();
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.inner.lock().last_activity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.lock().created_at
    }

    /// FIFO-bounded append (§4.6, §8 "history length equals exactly the
    /// configured bound after sustained appends").
    pub fn append_history(&self, entry: HistoryEntry) {
        let mut inner = self.inner.lock();
        if inner.conversation_history.len() >= inner.max_history {
            inner.conversation_history.pop_front();
        }
        inner.conversation_history.push_back(entry);
        inner.last_activity = Utc::now();
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().conversation_history.len()
    }

    pub fn last_history(&self, n: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock();
        let len = inner.conversation_history.len();
        inner
            .conversation_history
            .iter()
            .skip(len.saturating_sub(n))
            .cloned()
            .collect()
    }

    pub fn set_language(&self, language: impl Into<String>) {
        self.inner.lock().language = Some(language.into());
    }

    pub fn language(&self) -> Option<String> {
        self.inner.lock().language.clone()
    }

    pub fn set_handler_state(&self, handler: impl Into<String>, state: Box<dyn std::any::Any + Send>) {
        self.inner.lock().handler_contexts.insert(handler.into(), state);
    }

    pub fn with_handler_state<T: 'static, R>(&self, handler: &str, f: impl FnOnce(Option<&T>) -> R) -> R {
        let inner = self.inner.lock();
        let state = inner
            .handler_contexts
            .get(handler)
            .and_then(|b| b.downcast_ref::<T>());
        f(state)
    }

    pub fn add_device(&self, device: impl Into<String>) {
        self.inner.lock().available_devices.push(device.into());
    }

    pub fn devices(&self) -> Vec<String> {
        self.inner.lock().available_devices.clone()
    }

    /// At most one active action per domain — enforced by the Action
    /// Coordinator before calling this (§4.7, §8 invariant).
    pub fn insert_active_action(&self, domain: impl Into<String>, descriptor: ActionDescriptor) {
        self.inner.lock().active_actions.insert(domain.into(), descriptor);
    }

    pub fn active_action(&self, domain: &str) -> Option<ActionDescriptor> {
        self.inner.lock().active_actions.get(domain).cloned()
    }

    pub fn active_action_domains(&self) -> Vec<String> {
        self.inner.lock().active_actions.keys().cloned().collect()
    }

    pub fn list_active_actions(&self) -> Vec<ActionDescriptor> {
        self.inner.lock().active_actions.values().cloned().collect()
    }

    /// Moves a finished descriptor out of `active_actions` into
    /// `recent_actions` or `failed_actions` depending on its final status
    /// (§4.7 "on completion, the Coordinator moves the descriptor").
    pub fn finish_action(&self, domain: &str, mut descriptor: ActionDescriptor) {
        let mut inner = self.inner.lock();
        inner.active_actions.remove(domain);
        match descriptor.status {
            ActionStatus::Failed => {
                if inner.failed_actions.len() >= inner.max_failed {
                    inner.failed_actions.pop_front();
                }
                *inner.action_error_count.entry(domain.to_string()).or_insert(0) += 1;
                inner.failed_actions.push_back(descriptor);
            }
            _ => {
                if descriptor.status == ActionStatus::Running {
                    descriptor.status = ActionStatus::Completed;
                }
                if inner.recent_actions.len() >= inner.max_recent {
                    inner.recent_actions.pop_front();
                }
                inner.recent_actions.push_back(descriptor);
            }
        }
    }

    pub fn action_error_count(&self, domain: &str) -> u64 {
        self.inner.lock().action_error_count.get(domain).copied().unwrap_or(0)
    }

    pub fn recent_actions(&self) -> Vec<ActionDescriptor> {
        self.inner.lock().recent_actions.iter().cloned().collect()
    }

    pub fn failed_actions(&self) -> Vec<ActionDescriptor> {
        self.inner.lock().failed_actions.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let inner = self.inner.lock();
        let len = inner.conversation_history.len();
        ContextSnapshot {
            session_id: self.session_id.clone(),
            history_len: len,
            last_history: inner
                .conversation_history
                .iter()
                .skip(len.saturating_sub(3))
                .cloned()
                .collect(),
            active_action_domains: inner.active_actions.keys().cloned().collect(),
            language: inner.language.clone(),
            device_count: inner.available_devices.len(),
        }
    }

    pub fn memory_estimate(&self) -> MemoryEstimate {
        let inner = self.inner.lock();
        let approx_bytes = inner
            .conversation_history
            .iter()
            .map(|e| e.text.len() + e.role.len())
            .sum::<usize>()
            + inner.active_actions.len() * 128
            + inner.recent_actions.len() * 128
            + inner.failed_actions.len() * 128;
        MemoryEstimate {
            history_entries: inner.conversation_history.len(),
            active_actions: inner.active_actions.len(),
            recent_actions: inner.recent_actions.len(),
            failed_actions: inner.failed_actions.len(),
            approx_bytes,
        }
    }
}

/// Owns every live ConversationContext, keyed by session id (C6).
pub struct ContextStore {
    contexts: parking_lot::RwLock<HashMap<String, Arc<ConversationContext>>>,
    max_history: usize,
    max_recent: usize,
    max_failed: usize,
    idle_timeout: chrono::Duration,
}

impl ContextStore {
    pub fn new(max_history: usize, max_recent: usize, max_failed: usize, idle_timeout_mins: i64) -> Self {
        Self {
            contexts: parking_lot::RwLock::new(HashMap::new()),
            max_history,
            max_recent,
            max_failed,
            idle_timeout: chrono::Duration::minutes(idle_timeout_mins),
        }
    }

    /// Creation stamps `created_at`; subsequent access updates
    /// `last_activity` (§4.6).
    pub fn get_or_create(&self, session_id: &str) -> Arc<ConversationContext> {
        if let Some(ctx) = self.contexts.read().get(session_id) {
            ctx.touch();
            return ctx.clone();
        }
        let mut contexts = self.contexts.write();
        let ctx = contexts
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(ConversationContext::new(
                    session_id.to_string(),
                    self.max_history,
                    self.max_recent,
                    self.max_failed,
                ))
            })
            .clone();
        ctx.touch();
        ctx
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<ConversationContext>> {
        self.contexts.read().get(session_id).cloned()
    }

    /// Drops contexts whose `last_activity` exceeds the configured idle
    /// timeout (default 30 min). Returns the number evicted.
    pub fn expire(&self) -> usize {
        let cutoff = Utc::now() - self.idle_timeout;
        let mut contexts = self.contexts.write();
        let before = contexts.len();
        contexts.retain(|_, ctx| ctx.last_activity() > cutoff);
        before - contexts.len()
    }

    pub fn session_count(&self) -> usize {
        self.contexts.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContextStore {
        ContextStore::new(3, 5, 5, 30)
    }

    #[test]
    fn get_or_create_is_idempotent_per_session() {
        let store = store();
        let a = store.get_or_create("s1");
        let b = store.get_or_create("s1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn history_is_fifo_bounded() {
        let ctx = ConversationContext::new("s1".to_string(), 3, 5, 5);
        for i in 0..5 {
            ctx.append_history(HistoryEntry {
                role: "user".to_string(),
                text: format!("msg {i}"),
                timestamp: Utc::now(),
            });
        }
        assert_eq!(ctx.history_len(), 3);
        let last = ctx.last_history(10);
        assert_eq!(last[0].text, "msg 2");
    }

    #[test]
    fn finish_action_routes_by_status() {
        let ctx = ConversationContext::new("s1".to_string(), 3, 5, 5);
        let descriptor = va_core::ActionDescriptor::new("timer", "set_timer", "timer_handler");
        ctx.insert_active_action("timer", descriptor.clone());
        assert!(ctx.active_action("timer").is_some());

        let mut failed = descriptor.clone();
        failed.status = ActionStatus::Failed;
        ctx.finish_action("timer", failed);
        assert!(ctx.active_action("timer").is_none());
        assert_eq!(ctx.failed_actions().len(), 1);
        assert_eq!(ctx.action_error_count("timer"), 1);
    }

    #[test]
    fn expire_drops_stale_sessions() {
        let store = ContextStore::new(3, 5, 5, -1);
        store.get_or_create("stale");
        assert_eq!(store.expire(), 1);
        assert_eq!(store.session_count(), 0);
    }
}
