//! Action Coordinator (C7) — fire-and-forget background actions (§4.7).
//!
//! Grounded in the teacher's `ConfigurableToolRegistry`/`ToolRegistry`
//! atomic state pattern (`crates/tools/src/registry.rs`) for the
//! lock-drop-before-await discipline, generalised from tool execution to
//! detached background tasks. Per-domain policy and the active/recent/
//! failed bookkeeping are supplemented from `original_source/irene/core`'s
//! action lifecycle, which this design note's §4.7/§9 "fire-and-forget
//! tasks with shared state" already summarises.

use crate::context::ContextStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use va_core::error::{Result, RuntimeError};
use va_core::{ActionDescriptor, ActionPolicy, ActionStatus};

struct RunningAction {
    cancel: Arc<Notify>,
}

/// Owns every in-flight detached task and mediates all writes to a
/// session's `active_actions` (§9 "breaks the cyclic task-holds-context
/// reference").
pub struct ActionCoordinator {
    contexts: Arc<ContextStore>,
    policies: parking_lot::RwLock<HashMap<String, ActionPolicy>>,
    running: parking_lot::Mutex<HashMap<(String, String), RunningAction>>,
}

impl ActionCoordinator {
    pub fn new(contexts: Arc<ContextStore>) -> Self {
        Self {
            contexts,
            policies: parking_lot::RwLock::new(HashMap::new()),
            running: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn set_policy(&self, domain: impl Into<String>, policy: ActionPolicy) {
        self.policies.write().insert(domain.into(), policy);
    }

    fn policy_for(&self, domain: &str) -> ActionPolicy {
        self.policies.read().get(domain).copied().unwrap_or_default()
    }

    /// Spawns `body` as a detached task for `session_id`, applying the
    /// domain's policy against any currently active action in that domain.
    pub async fn start_for_session(
        &self,
        session_id: &str,
        domain: &str,
        name: &str,
        handler: &str,
        body: va_core::traits::ActionBody,
    ) -> Result<()> {
        let ctx = self.contexts.get(session_id).ok_or_else(|| RuntimeError::ActionError {
            domain: domain.to_string(),
            name: name.to_string(),
            message: "unknown session".to_string(),
        })?;

        let key = (session_id.to_string(), domain.to_string());
        if ctx.active_action(domain).is_some() {
            match self.policy_for(domain) {
                ActionPolicy::Reject => {
                    return Err(RuntimeError::ActionError {
                        domain: domain.to_string(),
                        name: name.to_string(),
                        message: "an action is already active in this domain".to_string(),
                    });
                }
                ActionPolicy::Replace => {
                    self.cancel_key(&key);
                }
            }
        }

        let descriptor = ActionDescriptor::new(domain, name, handler);
        ctx.insert_active_action(domain, descriptor.clone());

        let cancel = Arc::new(Notify::new());
        self.running.lock().insert(key.clone(), RunningAction { cancel: cancel.clone() });

        let contexts = self.contexts.clone();
        let session_id = session_id.to_string();
        let domain_owned = domain.to_string();
        let mut descriptor = descriptor;
        let cancel_for_task = cancel.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                result = body => result,
                _ = cancel_for_task.notified() => {
                    descriptor.status = ActionStatus::Cancelled;
                    if let Some(ctx) = contexts.get(&session_id) {
                        ctx.finish_action(&domain_owned, descriptor);
                    }
                    return;
                }
            };

            descriptor.status = match outcome {
                Ok(()) => ActionStatus::Completed,
                Err(err) => {
                    tracing::warn!(domain = %domain_owned, error = %err, "background action failed");
                    ActionStatus::Failed
                }
            };
            if let Some(ctx) = contexts.get(&session_id) {
                ctx.finish_action(&domain_owned, descriptor);
            }
        });

        Ok(())
    }

    /// Signals the running task for `key` to stop. The spawned task itself
    /// is the sole writer of the resulting `Cancelled` descriptor (in its
    /// `cancel_for_task.notified()` branch below) — this only wakes it, so
    /// a cancellation never produces more than the one `recent_actions`
    /// entry §4.7 describes.
    fn cancel_key(&self, key: &(String, String)) {
        if let Some(running) = self.running.lock().remove(key) {
            running.cancel.notify_one();
        }
    }

    /// Administrative `cancel(session, domain)` (§6).
    pub fn cancel(&self, session_id: &str, domain: &str) -> bool {
        let Some(ctx) = self.contexts.get(session_id) else {
            return false;
        };
        if ctx.active_action(domain).is_none() {
            return false;
        }
        let key = (session_id.to_string(), domain.to_string());
        self.cancel_key(&key);
        true
    }

    /// Administrative `list_active(session)` (§6).
    pub fn list_active(&self, session_id: &str) -> Vec<ActionDescriptor> {
        self.contexts
            .get(session_id)
            .map(|ctx| ctx.list_active_actions())
            .unwrap_or_default()
    }
}

/// Narrows `ActionCoordinator` to the per-request `ActionSpawner` surface
/// intent handlers are given (§6 intent handler contract), binding the
/// session for the lifetime of one dispatch.
pub struct SessionActionSpawner {
    pub coordinator: Arc<ActionCoordinator>,
    pub session_id: String,
}

#[async_trait]
impl va_core::traits::ActionSpawner for SessionActionSpawner {
    async fn start(
        &self,
        domain: &str,
        name: &str,
        handler: &str,
        body: va_core::traits::ActionBody,
    ) -> Result<()> {
        self.coordinator
            .start_for_session(&self.session_id, domain, name, handler, body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn coordinator() -> (Arc<ActionCoordinator>, Arc<ContextStore>) {
        let contexts = Arc::new(ContextStore::new(10, 10, 10, 30));
        contexts.get_or_create("s1");
        (Arc::new(ActionCoordinator::new(contexts.clone())), contexts)
    }

    #[tokio::test]
    async fn second_action_in_domain_is_rejected_under_reject_policy() {
        let (coordinator, _contexts) = coordinator();
        coordinator.set_policy("timer", ActionPolicy::Reject);

        coordinator
            .start_for_session("s1", "timer", "set", "timer_handler", Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok(())
            }))
            .await
            .unwrap();

        let second = coordinator
            .start_for_session("s1", "timer", "set", "timer_handler", Box::pin(async { Ok(()) }))
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn replace_policy_cancels_prior_action() {
        let (coordinator, contexts) = coordinator();
        coordinator.set_policy("timer", ActionPolicy::Replace);

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        coordinator
            .start_for_session("s1", "timer", "first", "timer_handler", Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                ran_clone.store(true, Ordering::SeqCst);
                Ok(())
            }))
            .await
            .unwrap();

        coordinator
            .start_for_session("s1", "timer", "second", "timer_handler", Box::pin(async { Ok(()) }))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!ran.load(Ordering::SeqCst));
        let ctx = contexts.get("s1").unwrap();
        let cancelled: Vec<_> = ctx
            .recent_actions()
            .into_iter()
            .filter(|d| d.action_name == "first" && d.status == ActionStatus::Cancelled)
            .collect();
        assert_eq!(cancelled.len(), 1, "expected exactly one Cancelled entry for the replaced action");
    }

    #[tokio::test]
    async fn completed_action_moves_to_recent() {
        let (coordinator, contexts) = coordinator();
        coordinator
            .start_for_session("s1", "timer", "set", "timer_handler", Box::pin(async { Ok(()) }))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let ctx = contexts.get("s1").unwrap();
        assert!(ctx.active_action("timer").is_none());
        assert_eq!(ctx.recent_actions().len(), 1);
    }
}
