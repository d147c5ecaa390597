//! LLM capability: `enhance_text(text, task, opts) -> text` and
//! `chat(messages, opts) -> text`, used only for the optional stage-6
//! enhancement of the Workflow Engine (§4.8).

use super::provider::Provider;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementTask {
    Tone,
    Translate,
    Summarize,
}

#[derive(Debug, Clone, Default)]
pub struct LlmOptions {
    pub target_language: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait LanguageModel: Provider {
    async fn enhance_text(
        &self,
        text: &str,
        task: EnhancementTask,
        opts: &LlmOptions,
    ) -> crate::error::Result<String>;

    async fn chat(&self, messages: &[ChatMessage], opts: &LlmOptions) -> crate::error::Result<String>;
}
