//! NLU capability: `parse(text, language, context) -> Intent`.

use super::provider::Provider;
use crate::intent::Intent;
use async_trait::async_trait;

/// Read-only view of conversation state an NLU provider may consult (e.g.
/// for anaphora resolution). The full ConversationContext is owned by C6;
/// this is a narrow borrow of just what NLU needs.
pub struct NluContext<'a> {
    pub session_id: &'a str,
    pub recent_intents: &'a [String],
}

#[async_trait]
pub trait NaturalLanguageUnderstanding: Provider {
    async fn parse(&self, text: &str, language: &str, context: &NluContext<'_>) -> crate::error::Result<Intent>;
}
