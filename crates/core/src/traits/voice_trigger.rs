//! Voice-trigger capability: `detect(stream) -> events`. Wake-word providers
//! additionally report supported wake words.

use super::provider::Provider;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceTriggerEvent {
    /// Wake word detected; carries the pre-roll buffer (raw PCM, same
    /// sample-rate/channel layout this provider declares it accepts — see
    /// SPEC_FULL.md §4.8, "Pre-roll handoff") plus the audio tail following
    /// the trigger.
    Triggered { pre_roll: Vec<u8>, tail: Vec<u8> },
    Idle,
}

#[async_trait]
pub trait VoiceTrigger: Provider {
    fn detect<'a>(
        &'a self,
        stream: Pin<Box<dyn Stream<Item = Vec<u8>> + Send + 'a>>,
    ) -> Pin<Box<dyn Stream<Item = VoiceTriggerEvent> + Send + 'a>>;

    fn supported_wake_words(&self) -> &[String] {
        &[]
    }
}
