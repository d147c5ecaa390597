//! ComponentDescriptor — one per capability kind (§3). Owned by the
//! Component Manager; consulted during the four-phase startup in §4.3.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier for a capability kind. New kinds are added here, never
/// inferred from config keys, so the Schema Registry's name-convention match
/// (§4.1) has a fixed universe to check against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Tts,
    Audio,
    Asr,
    Llm,
    VoiceTrigger,
    Nlu,
    TextProcessor,
    IntentSystem,
    Monitoring,
    NluAnalysis,
    Configuration,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Tts => "tts",
            ComponentKind::Audio => "audio",
            ComponentKind::Asr => "asr",
            ComponentKind::Llm => "llm",
            ComponentKind::VoiceTrigger => "voice_trigger",
            ComponentKind::Nlu => "nlu",
            ComponentKind::TextProcessor => "text_processor",
            ComponentKind::IntentSystem => "intent_system",
            ComponentKind::Monitoring => "monitoring",
            ComponentKind::NluAnalysis => "nlu_analysis",
            ComponentKind::Configuration => "configuration",
        }
    }

    pub const ALL: &'static [ComponentKind] = &[
        ComponentKind::Tts,
        ComponentKind::Audio,
        ComponentKind::Asr,
        ComponentKind::Llm,
        ComponentKind::VoiceTrigger,
        ComponentKind::Nlu,
        ComponentKind::TextProcessor,
        ComponentKind::IntentSystem,
        ComponentKind::Monitoring,
        ComponentKind::NluAnalysis,
        ComponentKind::Configuration,
    ];
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared shape of one Component, built by the Component Manager from the
/// loaded ConfigTree before any construction happens (§4.3 phase 1-2).
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    pub kind: ComponentKind,
    pub enabled: bool,
    /// Other component kinds this component depends on.
    pub component_dependencies: Vec<ComponentKind>,
    /// Named external services this component depends on (e.g. a database),
    /// tracked only for dependency validation — the services themselves are
    /// out of scope.
    pub service_dependencies: Vec<String>,
    pub default_provider: Option<String>,
    pub fallback_providers: Vec<String>,
    /// Raw per-provider config blobs, keyed by provider name; interpreted by
    /// the component itself against its typed provider schemas.
    pub provider_configs: HashMap<String, serde_json::Value>,
    /// Marked optional components may be unhealthy without failing startup
    /// (§4.3 phase 4).
    pub optional: bool,
}

impl ComponentDescriptor {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            enabled: false,
            component_dependencies: Vec::new(),
            service_dependencies: Vec::new(),
            default_provider: None,
            fallback_providers: Vec::new(),
            provider_configs: HashMap::new(),
            optional: false,
        }
    }
}
