//! RequestContext — created fresh by the Workflow Engine on every call to
//! `process_text_input` / `process_audio_stream`.

use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    Microphone,
    Web,
    Cli,
    Api,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::Microphone => "microphone",
            RequestSource::Web => "web",
            RequestSource::Cli => "cli",
            RequestSource::Api => "api",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: String,
    pub source: RequestSource,
    pub wants_audio: bool,
    pub client_metadata: HashMap<String, Value>,
    pub skip_wake_word: bool,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>, source: RequestSource) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            wants_audio: false,
            client_metadata: HashMap::new(),
            skip_wake_word: false,
        }
    }

    pub fn with_wants_audio(mut self, wants_audio: bool) -> Self {
        self.wants_audio = wants_audio;
        self
    }

    pub fn with_skip_wake_word(mut self, skip: bool) -> Self {
        self.skip_wake_word = skip;
        self
    }

    pub fn with_client_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.client_metadata = metadata;
        self
    }
}
