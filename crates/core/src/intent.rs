//! Intent and IntentResult — the data that flows out of NLU and out of an
//! intent handler, respectively.

use serde_json::Value;
use std::collections::HashMap;

/// Produced by NLU; consumed by the Intent Handler Registry. Immutable after
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    /// Dotted `domain.action` name, e.g. `"timer.set"`.
    pub name: String,
    pub confidence: f32,
    pub slots: HashMap<String, Value>,
    pub raw_text: String,
    pub language: String,
}

impl Intent {
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            confidence: 1.0,
            slots: HashMap::new(),
            raw_text: raw_text.into(),
            language: language.into(),
        }
    }

    /// The `domain` half of `domain.action`; empty string if the name carries
    /// no dot.
    pub fn domain(&self) -> &str {
        self.name.split('.').next().unwrap_or("")
    }

    /// The `action` half of `domain.action`; empty string if the name carries
    /// no dot.
    pub fn action(&self) -> &str {
        self.name.split_once('.').map(|(_, a)| a).unwrap_or("")
    }
}

/// Produced by a handler; consumed by the Workflow Engine.
#[derive(Debug, Clone)]
pub struct IntentResult {
    pub text: String,
    pub success: bool,
    pub confidence: f32,
    pub should_speak: bool,
    pub metadata: HashMap<String, Value>,
    pub error: Option<String>,
    /// Set by a handler that wants the text run through LLM enhancement
    /// before TTS (workflow stage 6, §4.8).
    pub request_llm_enhancement: bool,
}

impl IntentResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
            confidence: 1.0,
            should_speak: true,
            metadata: HashMap::new(),
            error: None,
            request_llm_enhancement: false,
        }
    }

    pub fn failure(text: impl Into<String>, error_kind: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("error_kind".to_string(), Value::String(error_kind.to_string()));
        Self {
            text: text.into(),
            success: false,
            confidence: 0.0,
            should_speak: true,
            metadata,
            error: Some(error_kind.to_string()),
            request_llm_enhancement: false,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_should_speak(mut self, should_speak: bool) -> Self {
        self.should_speak = should_speak;
        self
    }
}
