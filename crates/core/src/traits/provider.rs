//! Provider contract (§6) — consumed by Components, implemented by
//! out-of-scope concrete backends (Whisper, Silero, SpaCy, …).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Common surface every provider exposes regardless of capability kind.
/// Capability-specific methods live on the per-kind traits in this module
/// (`SpeechToText`, `TextToSpeech`, `AudioPlayer`, `NaturalLanguageUnderstanding`,
/// `LanguageModel`, `VoiceTrigger`, `TextProcessor`).
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Stable identifier matched against config and fallback lists.
    fn name(&self) -> &str;

    /// Computed at init and refreshed on probe; a provider reporting `false`
    /// must never be selected (§8 invariant).
    async fn is_available(&self) -> bool;

    /// Supported formats, voices, models, wake words, etc. Aggregated by the
    /// owning Component's `get_capabilities()`.
    fn capabilities(&self) -> HashMap<String, Value>;

    /// JSON-Schema-like parameter schema, derived from the provider's typed
    /// model; consumed by the Schema Registry (§4.1) for API surfaces. Must
    /// be JSON-serialisable.
    fn parameter_schema(&self) -> Value;
}
