//! `ManagedComponent` wrappers (C5 seam) for the provider-backed capability
//! kinds, plus stubs for the four system kinds that have no fallback chain
//! of their own (§3).
//!
//! Concrete providers are out of scope (§1): nothing here constructs a
//! Whisper/Piper/SpaCy backend. A deployment wires real providers in by
//! calling `add_provider`/`declare_lazy` on the wrapped `Component` before
//! `ComponentManager::initialise` runs; this module only answers the four
//! lifecycle questions the Component Manager asks of every entry.

use async_trait::async_trait;
use std::sync::Arc;
use va_core::error::DependencyError;
use va_core::traits::{
    AudioPlayer, LanguageModel, NaturalLanguageUnderstanding, SpeechToText, TextProcessor,
    TextToSpeech, VoiceTrigger,
};
use va_core::ComponentKind;
use va_runtime::{Component, ManagedComponent};

macro_rules! managed_component {
    ($wrapper:ident, $kind:expr, $provider:ty) => {
        pub struct $wrapper(pub Arc<Component<$provider>>);

        #[async_trait]
        impl ManagedComponent for $wrapper {
            fn kind(&self) -> ComponentKind {
                $kind
            }

            async fn initialise(&self) -> Result<(), DependencyError> {
                self.0.mark_initialised();
                Ok(())
            }

            async fn is_healthy(&self) -> bool {
                self.0.is_healthy().await
            }

            async fn shutdown(&self) {
                self.0.shutdown(|_provider| async { Ok(()) }).await;
            }
        }
    };
}

managed_component!(TtsManagedComponent, ComponentKind::Tts, dyn TextToSpeech);
managed_component!(AudioManagedComponent, ComponentKind::Audio, dyn AudioPlayer);
managed_component!(AsrManagedComponent, ComponentKind::Asr, dyn SpeechToText);
managed_component!(LlmManagedComponent, ComponentKind::Llm, dyn LanguageModel);
managed_component!(
    VoiceTriggerManagedComponent,
    ComponentKind::VoiceTrigger,
    dyn VoiceTrigger
);
managed_component!(
    NluManagedComponent,
    ComponentKind::Nlu,
    dyn NaturalLanguageUnderstanding
);
managed_component!(
    TextProcessorManagedComponent,
    ComponentKind::TextProcessor,
    dyn TextProcessor
);

/// The four kinds with no `Component<P>` fallback chain of their own: they
/// stand in for already-constructed collaborators (the Intent Registry,
/// observability, NLU analysis reporting, the Config/Schema subsystem
/// itself), so their health is reported elsewhere and this wrapper is a
/// constant `true`.
pub struct SystemManagedComponent {
    kind: ComponentKind,
}

impl SystemManagedComponent {
    pub fn new(kind: ComponentKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ManagedComponent for SystemManagedComponent {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    async fn initialise(&self) -> Result<(), DependencyError> {
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn shutdown(&self) {}
}
