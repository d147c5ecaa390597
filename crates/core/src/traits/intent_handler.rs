//! Intent handler contract (§6), consumed by the Intent Handler Registry (C8).

use crate::intent::{Intent, IntentResult};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// Boxed action body: runs detached from the request, may outlive it.
pub type ActionBody = Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send>>;

/// Narrow view of the Action Coordinator (C7) an intent handler is allowed
/// to spawn background actions through. The concrete implementation lives
/// in the runtime crate; handlers only see this trait object.
#[async_trait]
pub trait ActionSpawner: Send + Sync {
    /// Fire-and-forget: spawn `name` in `domain` for the current session,
    /// running `body` as the detached task. Returns an error immediately
    /// under the `reject` policy if a same-domain action is already active
    /// (§4.7); otherwise `body` runs detached from this call.
    async fn start(
        &self,
        domain: &str,
        name: &str,
        handler: &str,
        body: ActionBody,
    ) -> crate::error::Result<()>;
}

/// Handler-owned, opaque state keyed by handler name inside
/// `ConversationContext::handler_contexts` (§3).
pub trait HandlerState: Send + Sync + std::any::Any {}

#[async_trait]
pub trait IntentHandler: Send + Sync + 'static {
    /// Stable handler name used for registry diagnostics and dispatch logs.
    fn name(&self) -> &str;

    /// Intent-name patterns this handler serves: `domain.action` or
    /// `domain.*`.
    fn patterns(&self) -> &[String];

    /// Optional language filter; `None` means all languages.
    fn languages(&self) -> Option<&[String]> {
        None
    }

    async fn handle(&self, intent: &Intent, actions: &dyn ActionSpawner) -> IntentResult;
}
