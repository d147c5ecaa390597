//! Composition root: wires the Config Store, Schema Registry, Component
//! Manager, and Workflow Engine into one `AppState` shared by every HTTP
//! handler (§2, §6).

use std::collections::HashMap;
use std::sync::Arc;

use va_config::{ConfigStore, SchemaCatalogue, SchemaRegistry, Settings};
use va_core::error::DependencyError;
use va_core::traits::{
    AudioPlayer, LanguageModel, NaturalLanguageUnderstanding, SpeechToText, TextProcessor,
    TextToSpeech, VoiceTrigger,
};
use va_core::ComponentKind;
use va_intents::IntentRegistry;
use va_pipeline::WorkflowEngine;
use va_runtime::{
    descriptors_from_settings, ActionCoordinator, Component, ComponentManager, ContextStore,
    LifecycleMode, ManagedComponent,
};

use crate::components::{
    AsrManagedComponent, AudioManagedComponent, LlmManagedComponent, NluManagedComponent,
    SystemManagedComponent, TextProcessorManagedComponent, TtsManagedComponent,
    VoiceTriggerManagedComponent,
};

/// The seven provider-backed `Component<dyn X>` handles, held alongside
/// `ComponentManager` so the administrative surface (§6) can reach
/// `set_default_provider`/`list_providers`/`get_providers_info` without
/// downcasting `Arc<dyn ManagedComponent>`.
pub struct RuntimeComponents {
    pub tts: Arc<Component<dyn TextToSpeech>>,
    pub audio: Arc<Component<dyn AudioPlayer>>,
    pub asr: Arc<Component<dyn SpeechToText>>,
    pub llm: Arc<Component<dyn LanguageModel>>,
    pub voice_trigger: Arc<Component<dyn VoiceTrigger>>,
    pub nlu: Arc<Component<dyn NaturalLanguageUnderstanding>>,
    pub text_processor: Arc<Component<dyn TextProcessor>>,
}

impl RuntimeComponents {
    fn mode(cfg: &va_config::ComponentProviderConfig) -> LifecycleMode {
        if cfg.lazy {
            LifecycleMode::Lazy
        } else {
            LifecycleMode::Eager
        }
    }

    /// Administrative `set_default_provider(kind, name)` (§6). Returns
    /// `false` for an unknown provider name or an unrecognised kind, never
    /// an error — mirrors `Component::set_default_provider`'s own contract.
    pub fn set_default_provider(&self, kind: ComponentKind, name: &str) -> bool {
        match kind {
            ComponentKind::Tts => self.tts.set_default_provider(name),
            ComponentKind::Audio => self.audio.set_default_provider(name),
            ComponentKind::Asr => self.asr.set_default_provider(name),
            ComponentKind::Llm => self.llm.set_default_provider(name),
            ComponentKind::VoiceTrigger => self.voice_trigger.set_default_provider(name),
            ComponentKind::Nlu => self.nlu.set_default_provider(name),
            ComponentKind::TextProcessor => self.text_processor.set_default_provider(name),
            _ => false,
        }
    }

    /// Administrative `list_providers(kind)` (§6).
    pub fn list_providers(&self, kind: ComponentKind) -> Vec<String> {
        match kind {
            ComponentKind::Tts => self.tts.list_available_providers(),
            ComponentKind::Audio => self.audio.list_available_providers(),
            ComponentKind::Asr => self.asr.list_available_providers(),
            ComponentKind::Llm => self.llm.list_available_providers(),
            ComponentKind::VoiceTrigger => self.voice_trigger.list_available_providers(),
            ComponentKind::Nlu => self.nlu.list_available_providers(),
            ComponentKind::TextProcessor => self.text_processor.list_available_providers(),
            _ => Vec::new(),
        }
    }

    /// Administrative `get_providers_info()` (§6): every provider-backed
    /// kind's available providers plus its aggregated capability map.
    pub fn get_providers_info(&self) -> serde_json::Value {
        let mut info = serde_json::Map::new();
        for kind in [
            ComponentKind::Tts,
            ComponentKind::Audio,
            ComponentKind::Asr,
            ComponentKind::Llm,
            ComponentKind::VoiceTrigger,
            ComponentKind::Nlu,
            ComponentKind::TextProcessor,
        ] {
            let capabilities = match kind {
                ComponentKind::Tts => self.tts.get_capabilities(),
                ComponentKind::Audio => self.audio.get_capabilities(),
                ComponentKind::Asr => self.asr.get_capabilities(),
                ComponentKind::Llm => self.llm.get_capabilities(),
                ComponentKind::VoiceTrigger => self.voice_trigger.get_capabilities(),
                ComponentKind::Nlu => self.nlu.get_capabilities(),
                ComponentKind::TextProcessor => self.text_processor.get_capabilities(),
                _ => HashMap::new(),
            };
            info.insert(
                kind.as_str().to_string(),
                serde_json::json!({
                    "providers": self.list_providers(kind),
                    "capabilities": capabilities,
                }),
            );
        }
        serde_json::Value::Object(info)
    }
}

/// Builds the seven provider components and the `ManagedComponent` map the
/// Component Manager initialises against. Always constructs every wrapper,
/// regardless of `settings.components.*` — `ComponentManager::get` already
/// gates on the descriptor's `enabled` flag, so an unused wrapper is simply
/// never reached.
fn build_components(
    settings: &Settings,
) -> (RuntimeComponents, HashMap<ComponentKind, Arc<dyn ManagedComponent>>) {
    let runtime = RuntimeComponents {
        tts: Arc::new(Component::new("tts", RuntimeComponents::mode(&settings.tts))),
        audio: Arc::new(Component::new("audio", RuntimeComponents::mode(&settings.audio))),
        asr: Arc::new(Component::new("asr", RuntimeComponents::mode(&settings.asr))),
        llm: Arc::new(Component::new("llm", RuntimeComponents::mode(&settings.llm))),
        voice_trigger: Arc::new(Component::new(
            "voice_trigger",
            RuntimeComponents::mode(&settings.voice_trigger),
        )),
        nlu: Arc::new(Component::new("nlu", RuntimeComponents::mode(&settings.nlu))),
        text_processor: Arc::new(Component::new(
            "text_processor",
            RuntimeComponents::mode(&settings.text_processor),
        )),
    };

    let mut managed: HashMap<ComponentKind, Arc<dyn ManagedComponent>> = HashMap::new();
    managed.insert(ComponentKind::Tts, Arc::new(TtsManagedComponent(runtime.tts.clone())));
    managed.insert(ComponentKind::Audio, Arc::new(AudioManagedComponent(runtime.audio.clone())));
    managed.insert(ComponentKind::Asr, Arc::new(AsrManagedComponent(runtime.asr.clone())));
    managed.insert(ComponentKind::Llm, Arc::new(LlmManagedComponent(runtime.llm.clone())));
    managed.insert(
        ComponentKind::VoiceTrigger,
        Arc::new(VoiceTriggerManagedComponent(runtime.voice_trigger.clone())),
    );
    managed.insert(ComponentKind::Nlu, Arc::new(NluManagedComponent(runtime.nlu.clone())));
    managed.insert(
        ComponentKind::TextProcessor,
        Arc::new(TextProcessorManagedComponent(runtime.text_processor.clone())),
    );
    for kind in [
        ComponentKind::IntentSystem,
        ComponentKind::Monitoring,
        ComponentKind::NluAnalysis,
        ComponentKind::Configuration,
    ] {
        managed.insert(kind, Arc::new(SystemManagedComponent::new(kind)));
    }

    (runtime, managed)
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub schema: Arc<SchemaRegistry>,
    pub manager: Arc<ComponentManager>,
    pub components: Arc<RuntimeComponents>,
    pub actions: Arc<ActionCoordinator>,
    pub intents: Arc<IntentRegistry>,
    pub workflow: Arc<WorkflowEngine>,
}

impl AppState {
    /// Runs the composition root end to end: builds the Component Manager's
    /// descriptors and wrappers from `settings`, runs the four-phase startup
    /// (§4.3), and assembles the Workflow Engine on top. Startup failures
    /// are `DependencyError` (§7) — fatal, the caller is expected to exit
    /// non-zero without serving any request.
    pub async fn assemble(config: ConfigStore) -> Result<Self, DependencyError> {
        let settings = config.current().settings.clone();

        let schema = SchemaRegistry::new(SchemaCatalogue::default());

        let (components, managed) = build_components(&settings);
        let descriptors = descriptors_from_settings(&settings);
        let manager = ComponentManager::new(descriptors, managed);
        manager.initialise().await?;

        let contexts = Arc::new(ContextStore::new(
            settings.session.max_history_entries,
            settings.session.max_recent_actions,
            settings.session.max_failed_actions,
            settings.session.idle_timeout_mins as i64,
        ));
        let actions = Arc::new(ActionCoordinator::new(contexts.clone()));
        let intents = Arc::new(IntentRegistry::new());

        let enabled = |kind: ComponentKind, component: &Arc<_>| {
            settings
                .components
                .is_enabled(kind.as_str())
                .unwrap_or(false)
                .then(|| component.clone())
        };

        let workflow = Arc::new(WorkflowEngine::new(
            &settings,
            contexts,
            actions.clone(),
            intents.clone(),
            enabled(ComponentKind::VoiceTrigger, &components.voice_trigger),
            enabled(ComponentKind::Asr, &components.asr),
            enabled(ComponentKind::TextProcessor, &components.text_processor),
            enabled(ComponentKind::Nlu, &components.nlu),
            enabled(ComponentKind::Llm, &components.llm),
            enabled(ComponentKind::Tts, &components.tts),
            enabled(ComponentKind::Audio, &components.audio),
        ));

        Ok(Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            manager: Arc::new(manager),
            components: Arc::new(components),
            actions,
            intents,
            workflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stock checkout with no concrete providers wired in must still
    /// start: `ComponentsConfig::default()` leaves every provider-backed
    /// kind disabled, so only the always-healthy system kinds are in the
    /// active set.
    #[tokio::test]
    async fn assemble_succeeds_against_default_settings() {
        let config = ConfigStore::from_settings(Settings::default());
        let state = AppState::assemble(config).await;
        assert!(state.is_ok(), "AppState::assemble failed against Settings::default(): {:?}", state.err());
    }
}
