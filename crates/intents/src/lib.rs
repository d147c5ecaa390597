//! Intent Handler Registry and Dispatch (C8, §4.5).
//!
//! The read-mostly-registry-with-atomic-swap shape is grounded in the
//! teacher's `ConfigurableToolRegistry` (`crates/tools/src/registry.rs`);
//! the per-call timeout wrapped around dispatch mirrors
//! `ToolRegistry::execute`'s `tokio::time::timeout` pattern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use va_core::error::RuntimeError;
use va_core::traits::{ActionSpawner, IntentHandler};
use va_core::{Intent, IntentResult};

const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

struct RegisteredHandler {
    handler: Arc<dyn IntentHandler>,
    timeout: Duration,
}

#[derive(Default)]
struct Snapshot {
    /// Keyed by pattern string (`domain.action` or `domain.*`).
    by_pattern: HashMap<String, Arc<RegisteredHandler>>,
    fallback: Option<Arc<RegisteredHandler>>,
}

/// Read-mostly handler registry; dynamic add/remove takes the write lock,
/// in-flight dispatches keep the `Arc<Snapshot>` they began with (§4.5).
pub struct IntentRegistry {
    active: parking_lot::RwLock<Arc<Snapshot>>,
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self {
            active: parking_lot::RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut Snapshot)) {
        let mut snapshot = (**self.active.read()).clone_shallow();
        f(&mut snapshot);
        *self.active.write() = Arc::new(snapshot);
    }

    pub fn register(&self, handler: Arc<dyn IntentHandler>) {
        self.register_with_timeout(handler, DEFAULT_HANDLER_TIMEOUT);
    }

    pub fn register_with_timeout(&self, handler: Arc<dyn IntentHandler>, timeout: Duration) {
        let entry = Arc::new(RegisteredHandler {
            handler: handler.clone(),
            timeout,
        });
        let patterns = handler.patterns().to_vec();
        self.mutate(|snapshot| {
            for pattern in patterns {
                snapshot.by_pattern.insert(pattern, entry.clone());
            }
        });
    }

    pub fn set_fallback(&self, handler: Arc<dyn IntentHandler>) {
        let entry = Arc::new(RegisteredHandler {
            handler,
            timeout: DEFAULT_HANDLER_TIMEOUT,
        });
        self.mutate(|snapshot| snapshot.fallback = Some(entry));
    }

    pub fn remove_pattern(&self, pattern: &str) {
        let pattern = pattern.to_string();
        self.mutate(|snapshot| {
            snapshot.by_pattern.remove(&pattern);
        });
    }

    fn resolve(snapshot: &Snapshot, intent_name: &str) -> Option<Arc<RegisteredHandler>> {
        if let Some(entry) = snapshot.by_pattern.get(intent_name) {
            return Some(entry.clone());
        }

        let segments: Vec<&str> = intent_name.split('.').collect();
        let mut best: Option<(usize, &Arc<RegisteredHandler>)> = None;
        for (pattern, entry) in &snapshot.by_pattern {
            if pattern.ends_with(".*") {
                continue;
            }
            let pattern_segments: Vec<&str> = pattern.split('.').collect();
            if pattern_segments.len() <= segments.len()
                && pattern_segments == segments[..pattern_segments.len()]
            {
                let is_longer = best.map(|(len, _)| pattern_segments.len() > len).unwrap_or(true);
                if is_longer {
                    best = Some((pattern_segments.len(), entry));
                }
            }
        }
        if let Some((_, entry)) = best {
            return Some(entry.clone());
        }

        if let Some(domain) = segments.first() {
            let wildcard = format!("{domain}.*");
            if let Some(entry) = snapshot.by_pattern.get(&wildcard) {
                return Some(entry.clone());
            }
        }

        snapshot.fallback.clone()
    }

    /// Dispatches against the snapshot held at call start; concurrent
    /// `register`/`remove_pattern` calls never affect an in-flight
    /// dispatch (§4.5).
    pub async fn dispatch(&self, intent: &Intent, actions: &dyn ActionSpawner) -> IntentResult {
        let snapshot = self.active.read().clone();
        let Some(entry) = Self::resolve(&snapshot, &intent.name) else {
            let error = RuntimeError::HandlerError {
                handler: "<none>".to_string(),
                message: "no matching pattern and no fallback configured".to_string(),
            };
            return IntentResult::failure("no handler registered for this request", error.kind());
        };

        match tokio::time::timeout(entry.timeout, entry.handler.handle(intent, actions)).await {
            Ok(result) => result,
            Err(_) => {
                let error = RuntimeError::HandlerTimeout {
                    handler: entry.handler.name().to_string(),
                    intent: intent.name.clone(),
                    timeout_ms: entry.timeout.as_millis() as u64,
                };
                tracing::warn!(handler = entry.handler.name(), intent = %intent.name, "handler exceeded its deadline");
                IntentResult::failure("sorry, that took too long to process", error.kind())
            }
        }
    }
}

impl Default for IntentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    fn clone_shallow(&self) -> Self {
        Self {
            by_pattern: self.by_pattern.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubHandler {
        name: String,
        patterns: Vec<String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl IntentHandler for StubHandler {
        fn name(&self) -> &str {
            &self.name
        }

        fn patterns(&self) -> &[String] {
            &self.patterns
        }

        async fn handle(&self, intent: &Intent, _actions: &dyn ActionSpawner) -> IntentResult {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            IntentResult::success(format!("handled {}", intent.name))
        }
    }

    struct NoopSpawner;

    #[async_trait]
    impl ActionSpawner for NoopSpawner {
        async fn start(
            &self,
            _domain: &str,
            _name: &str,
            _handler: &str,
            _body: va_core::traits::ActionBody,
        ) -> va_core::Result<()> {
            Ok(())
        }
    }

    fn intent(name: &str) -> Intent {
        Intent::new(name, "test", "en")
    }

    #[tokio::test]
    async fn exact_match_wins_over_wildcard() {
        let registry = IntentRegistry::new();
        registry.register(Arc::new(StubHandler {
            name: "exact".to_string(),
            patterns: vec!["timer.set".to_string()],
            delay: None,
        }));
        registry.register(Arc::new(StubHandler {
            name: "wildcard".to_string(),
            patterns: vec!["timer.*".to_string()],
            delay: None,
        }));

        let result = registry.dispatch(&intent("timer.set"), &NoopSpawner).await;
        assert_eq!(result.text, "handled timer.set");
    }

    #[tokio::test]
    async fn wildcard_used_when_no_exact_match() {
        let registry = IntentRegistry::new();
        registry.register(Arc::new(StubHandler {
            name: "wildcard".to_string(),
            patterns: vec!["timer.*".to_string()],
            delay: None,
        }));
        let result = registry.dispatch(&intent("timer.cancel"), &NoopSpawner).await;
        assert_eq!(result.text, "handled timer.cancel");
    }

    #[tokio::test]
    async fn falls_back_to_configured_handler() {
        let registry = IntentRegistry::new();
        registry.set_fallback(Arc::new(StubHandler {
            name: "fallback".to_string(),
            patterns: vec![],
            delay: None,
        }));
        let result = registry.dispatch(&intent("unknown.thing"), &NoopSpawner).await;
        assert_eq!(result.text, "handled unknown.thing");
    }

    #[tokio::test]
    async fn handler_timeout_synthesises_apology() {
        let registry = IntentRegistry::new();
        registry.register_with_timeout(
            Arc::new(StubHandler {
                name: "slow".to_string(),
                patterns: vec!["slow.action".to_string()],
                delay: Some(Duration::from_millis(50)),
            }),
            Duration::from_millis(5),
        );
        let result = registry.dispatch(&intent("slow.action"), &NoopSpawner).await;
        assert!(!result.success);
        assert_eq!(
            result.metadata.get("error_kind").and_then(|v| v.as_str()),
            Some("handler_timeout")
        );
    }

    #[tokio::test]
    async fn no_handler_and_no_fallback_produces_apology() {
        let registry = IntentRegistry::new();
        let result = registry.dispatch(&intent("ghost.thing"), &NoopSpawner).await;
        assert!(!result.success);
    }
}
