//! Text-processor capability: `normalise(text, stage, language) -> text`.
//! Each normaliser declares which stage tags it applies to (§4.8 stage 3/7).

use super::provider::Provider;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationStage {
    AsrOutput,
    TtsInput,
}

impl NormalizationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationStage::AsrOutput => "asr_output",
            NormalizationStage::TtsInput => "tts_input",
        }
    }
}

#[async_trait]
pub trait TextProcessor: Provider {
    /// Stages this normaliser applies to; a normaliser not listing a stage
    /// is skipped for it by the chain builder.
    fn applies_to(&self, stage: NormalizationStage) -> bool;

    async fn normalise(&self, text: &str, stage: NormalizationStage, language: &str) -> crate::error::Result<String>;
}
