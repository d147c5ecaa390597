//! Capability interfaces for the voice assistant runtime.
//!
//! # Trait Hierarchy
//!
//! ```text
//! Provider (base, every capability kind)
//!   ├── SpeechToText / TextToSpeech     — ASR / TTS
//!   ├── AudioPlayer                     — audio playback
//!   ├── NaturalLanguageUnderstanding    — NLU
//!   ├── LanguageModel                   — optional LLM enhancement
//!   ├── VoiceTrigger                    — wake-word detection
//!   └── TextProcessor                   — normalisation chain
//!
//! IntentHandler — dispatched by the Intent Handler Registry (C8)
//! ```
//!
//! Concrete backends (Whisper, Silero, SpaCy, …) are out of scope (§1);
//! only the contracts above are specified.

mod audio;
mod intent_handler;
mod llm;
mod nlu;
mod provider;
mod speech;
mod text_processor;
mod voice_trigger;

pub use audio::{AudioPlayer, PlaybackOptions};
pub use intent_handler::{ActionBody, ActionSpawner, HandlerState, IntentHandler};
pub use llm::{ChatMessage, EnhancementTask, LanguageModel, LlmOptions};
pub use nlu::{NaturalLanguageUnderstanding, NluContext};
pub use provider::Provider;
pub use speech::{SpeechToText, SynthesisOptions, TextToSpeech, Transcript};
pub use text_processor::{NormalizationStage, TextProcessor};
pub use voice_trigger::{VoiceTrigger, VoiceTriggerEvent};
