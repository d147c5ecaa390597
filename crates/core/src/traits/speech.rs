//! ASR/TTS capability traits.
//!
//! Concrete backends (IndicConformer, Whisper, Silero, Piper, …) are out of
//! scope (§1); only the contract they must satisfy is specified here.

use super::provider::Provider;
use async_trait::async_trait;
use std::path::Path;

/// Single transcription result. `is_final = false` marks a partial result on
/// a streaming transcription call.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
}

/// ASR provider contract: `transcribe(audio_chunk) -> partial/final text`.
#[async_trait]
pub trait SpeechToText: Provider {
    /// Transcribe one chunk of audio. Providers that support streaming may
    /// be called repeatedly with successive chunks, yielding partials until
    /// a final transcript is produced.
    async fn transcribe(&self, audio_chunk: &[u8]) -> crate::error::Result<Transcript>;

    fn supported_languages(&self) -> &[String];
}

/// TTS provider contract: `synthesize_to_file(text, out_path, opts)`.
#[async_trait]
pub trait TextToSpeech: Provider {
    async fn synthesize_to_file(
        &self,
        text: &str,
        out_path: &Path,
        opts: &SynthesisOptions,
    ) -> crate::error::Result<()>;

    fn available_voices(&self) -> &[String];
}

#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    pub voice: Option<String>,
    pub language: Option<String>,
    pub speed: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::provider::Provider;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;

    struct MockStt {
        languages: Vec<String>,
    }

    #[async_trait]
    impl Provider for MockStt {
        fn name(&self) -> &str {
            "mock-stt"
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn capabilities(&self) -> HashMap<String, Value> {
            HashMap::new()
        }
        fn parameter_schema(&self) -> Value {
            serde_json::json!({})
        }
    }

    #[async_trait]
    impl SpeechToText for MockStt {
        async fn transcribe(&self, _audio_chunk: &[u8]) -> crate::error::Result<Transcript> {
            Ok(Transcript {
                text: "test transcription".to_string(),
                confidence: 0.95,
                is_final: true,
            })
        }

        fn supported_languages(&self) -> &[String] {
            &self.languages
        }
    }

    #[tokio::test]
    async fn transcribe_returns_final_transcript() {
        let stt = MockStt {
            languages: vec!["en".to_string()],
        };
        let t = stt.transcribe(b"fake-audio").await.unwrap();
        assert!(t.is_final);
        assert_eq!(t.text, "test transcription");
    }
}
