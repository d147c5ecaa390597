//! Workflow Engine (C9) — the request pipeline state machine (§4.8).
//!
//! The nine documented stages are modelled as a straight-line async
//! function with a `tokio::time::timeout` wrapped around each suspension
//! point, mirroring the teacher's per-call `tokio::time::timeout` discipline
//! (`crates/tools/src/registry.rs`) generalised from one call to a whole
//! pipeline. Every error converts to an apology `IntentResult` at the
//! boundary (§7) — the engine never raises across `process_text_input` /
//! `process_audio_stream`.

use crate::trace::{StagePayload, TraceRecorder};
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use va_config::{LlmEnhancementPolicy, NluRoutingConfig, Settings, StageTimeouts};
use va_core::error::RuntimeError;
use va_core::traits::{
    AudioPlayer, EnhancementTask, LanguageModel, LlmOptions, NaturalLanguageUnderstanding, NluContext,
    NormalizationStage, PlaybackOptions, SpeechToText, SynthesisOptions, TextProcessor, TextToSpeech, VoiceTrigger,
    VoiceTriggerEvent,
};
use va_core::{Intent, IntentResult, RequestContext};
use va_intents::IntentRegistry;
use va_runtime::{ActionCoordinator, Component, ContextStore, SessionActionSpawner};

/// Raw audio chunk stream handed to `process_audio_stream`.
pub type AudioStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// The workflow's public return (§4.8 "Return contract"): an IntentResult
/// plus, when audio was produced, the bytes read back before the scoped
/// temp file was deleted.
pub struct WorkflowOutcome {
    pub result: IntentResult,
    pub audio: Option<Vec<u8>>,
    pub trace: Option<crate::trace::TraceRecord>,
}

/// Everything the Workflow Engine was wired with by whoever assembled the
/// runtime (the `server` crate); every capability is optional because a
/// deployment may run with any subset of components enabled.
pub struct WorkflowEngine {
    contexts: Arc<ContextStore>,
    actions: Arc<ActionCoordinator>,
    intents: Arc<IntentRegistry>,
    voice_trigger: Option<Arc<Component<dyn VoiceTrigger>>>,
    asr: Option<Arc<Component<dyn SpeechToText>>>,
    text_processor: Option<Arc<Component<dyn TextProcessor>>>,
    nlu: Option<Arc<Component<dyn NaturalLanguageUnderstanding>>>,
    llm: Option<Arc<Component<dyn LanguageModel>>>,
    tts: Option<Arc<Component<dyn TextToSpeech>>>,
    audio: Option<Arc<Component<dyn AudioPlayer>>>,
    stage_timeouts: StageTimeouts,
    temp_audio_dir: PathBuf,
    nlu_routing: NluRoutingConfig,
    llm_enhancement: LlmEnhancementPolicy,
    trace_enabled_by_default: bool,
    trace_config: va_config::TraceConfig,
}

#[allow(clippy::too_many_arguments)]
impl WorkflowEngine {
    pub fn new(
        settings: &Settings,
        contexts: Arc<ContextStore>,
        actions: Arc<ActionCoordinator>,
        intents: Arc<IntentRegistry>,
        voice_trigger: Option<Arc<Component<dyn VoiceTrigger>>>,
        asr: Option<Arc<Component<dyn SpeechToText>>>,
        text_processor: Option<Arc<Component<dyn TextProcessor>>>,
        nlu: Option<Arc<Component<dyn NaturalLanguageUnderstanding>>>,
        llm: Option<Arc<Component<dyn LanguageModel>>>,
        tts: Option<Arc<Component<dyn TextToSpeech>>>,
        audio: Option<Arc<Component<dyn AudioPlayer>>>,
    ) -> Self {
        Self {
            contexts,
            actions,
            intents,
            voice_trigger,
            asr,
            text_processor,
            nlu,
            llm,
            tts,
            audio,
            stage_timeouts: settings.stage_timeouts.clone(),
            temp_audio_dir: PathBuf::from(&settings.temp_audio_dir),
            nlu_routing: settings.nlu_routing.clone(),
            llm_enhancement: settings.llm_enhancement.clone(),
            trace_enabled_by_default: settings.trace.enabled_by_default,
            trace_config: settings.trace.clone(),
        }
    }

    pub async fn process_text_input(&self, request: RequestContext, text: String) -> WorkflowOutcome {
        self.run(request, Some(text), None).await
    }

    pub async fn process_audio_stream(&self, request: RequestContext, audio: AudioStream) -> WorkflowOutcome {
        self.run(request, None, Some(audio)).await
    }

    async fn run(&self, request: RequestContext, text: Option<String>, audio: Option<AudioStream>) -> WorkflowOutcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        let budget = Duration::from_millis(self.stage_timeouts.request_budget_ms);
        match tokio::time::timeout(budget, self.run_inner(request_id.clone(), request, text, audio)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let error = RuntimeError::StageTimeout {
                    stage: "request".to_string(),
                    timeout_ms: self.stage_timeouts.request_budget_ms,
                };
                tracing::warn!(request_id, "request exceeded its wall-clock budget");
                WorkflowOutcome {
                    result: IntentResult::failure("sorry, that took too long overall", error.kind()),
                    audio: None,
                    trace: None,
                }
            }
        }
    }

    async fn run_inner(
        &self,
        request_id: String,
        request: RequestContext,
        text: Option<String>,
        audio: Option<AudioStream>,
    ) -> WorkflowOutcome {
        let ctx = self.contexts.get_or_create(&request.session_id);
        let trace = TraceRecorder::new(self.trace_enabled_by_default, request_id.clone(), request.session_id.clone(), &self.trace_config);
        trace.record_before(&ctx.snapshot());

        let language = ctx.language().unwrap_or_else(|| "en".to_string());

        // Stages 1-2: voice trigger + ASR, or the text path straight through.
        let transcript = match (text, audio) {
            (Some(text), _) => text,
            (None, Some(stream)) => {
                match self.run_audio_front_end(&request, stream, &trace).await {
                    Ok(Some(text)) => text,
                    Ok(None) => {
                        return WorkflowOutcome {
                            result: IntentResult::success("").with_should_speak(false).with_metadata("voice_trigger", "idle"),
                            audio: None,
                            trace: trace.export(),
                        };
                    }
                    Err(result) => return WorkflowOutcome { result, audio: None, trace: trace.export() },
                }
            }
            (None, None) => {
                return WorkflowOutcome {
                    result: IntentResult::failure("no input was provided", "handler_error"),
                    audio: None,
                    trace: trace.export(),
                };
            }
        };

        // Stage 3: text normalisation, asr_output.
        let normalised = match self
            .run_stage_timed("text_normalization.asr_output", &trace, self.stage_timeouts.nlu_ms, false, || {
                self.normalise_chain(transcript.clone(), NormalizationStage::AsrOutput, &language)
            })
            .await
        {
            Ok(text) => text,
            Err(result) => return WorkflowOutcome { result, audio: None, trace: trace.export() },
        };

        ctx.append_history(va_runtime::HistoryEntry {
            role: "user".to_string(),
            text: normalised.clone(),
            timestamp: chrono::Utc::now(),
        });

        // Stage 4: NLU.
        let intent = match self.run_nlu(&normalised, &language, &ctx, &trace).await {
            Ok(intent) => intent,
            Err(result) => return WorkflowOutcome { result, audio: None, trace: trace.export() },
        };

        // Stage 5: intent dispatch.
        let spawner = SessionActionSpawner { coordinator: self.actions.clone(), session_id: request.session_id.clone() };
        let stage_started = Instant::now();
        let dispatch_timeout = Duration::from_millis(self.stage_timeouts.intent_dispatch_ms);
        let mut result = match tokio::time::timeout(dispatch_timeout, self.intents.dispatch(&intent, &spawner)).await {
            Ok(result) => {
                trace.record_stage(
                    "intent_dispatch",
                    false,
                    stage_started.elapsed(),
                    StagePayload::text(&intent.name),
                    StagePayload::text(&result.text),
                    result.error.clone(),
                );
                result
            }
            Err(_) => {
                let error = RuntimeError::StageTimeout { stage: "intent_dispatch".to_string(), timeout_ms: self.stage_timeouts.intent_dispatch_ms };
                trace.record_stage("intent_dispatch", false, stage_started.elapsed(), StagePayload::text(&intent.name), StagePayload::empty(), Some(error.kind().to_string()));
                IntentResult::failure("sorry, that took too long to process", error.kind())
            }
        };

        if !result.success {
            ctx.append_history(va_runtime::HistoryEntry { role: "assistant".to_string(), text: result.text.clone(), timestamp: chrono::Utc::now() });
            trace.record_after(&ctx.snapshot());
            return WorkflowOutcome { result, audio: None, trace: trace.export() };
        }

        // Stage 6: optional LLM enhancement.
        if self.should_enhance(&intent, &result) {
            result.text = self.run_llm_enhancement(&result.text, &language, &trace).await.unwrap_or(result.text.clone());
        }

        // Stage 7: text normalisation, tts_input.
        let spoken_text = self
            .run_stage_timed("text_normalization.tts_input", &trace, self.stage_timeouts.nlu_ms, false, || {
                self.normalise_chain(result.text.clone(), NormalizationStage::TtsInput, &language)
            })
            .await
            .unwrap_or_else(|_| result.text.clone());

        ctx.append_history(va_runtime::HistoryEntry { role: "assistant".to_string(), text: spoken_text.clone(), timestamp: chrono::Utc::now() });

        // Stages 8-9: TTS + audio playback, skippable per request/handler.
        let audio_bytes = if request.wants_audio && result.should_speak {
            match self.run_tts_and_playback(&spoken_text, &language, &trace).await {
                Ok(bytes) => bytes,
                Err(failure) => {
                    result = failure;
                    None
                }
            }
        } else {
            None
        };

        trace.record_after(&ctx.snapshot());
        WorkflowOutcome { result, audio: audio_bytes, trace: trace.export() }
    }

    async fn run_audio_front_end(&self, request: &RequestContext, stream: AudioStream, trace: &TraceRecorder) -> Result<Option<String>, IntentResult> {
        let raw = if request.skip_wake_word {
            collect_stream(stream).await
        } else if let Some(component) = &self.voice_trigger {
            let provider = component.select(None).await.map_err(|err| self.apology(err))?;
            let started = Instant::now();
            let wait_for_trigger = async {
                use futures::StreamExt;
                let mut events = provider.detect(stream);
                while let Some(event) = events.next().await {
                    if let VoiceTriggerEvent::Triggered { pre_roll, tail } = event {
                        return Some([pre_roll, tail].concat());
                    }
                }
                None
            };
            let triggered = tokio::time::timeout(Duration::from_millis(self.stage_timeouts.voice_trigger_ms), wait_for_trigger)
                .await
                .unwrap_or(None);
            trace.record_stage("voice_trigger", false, started.elapsed(), StagePayload::empty(), StagePayload::text(if triggered.is_some() { "triggered" } else { "idle" }), None);
            match triggered {
                Some(bytes) => bytes,
                None => return Ok(None),
            }
        } else {
            collect_stream(stream).await
        };

        let Some(component) = &self.asr else {
            return Err(self.apology(RuntimeError::CapabilityUnavailable { component: "asr".to_string() }));
        };
        let started = Instant::now();
        let provider = component.select(None).await.map_err(|err| self.apology(err))?;
        let result = tokio::time::timeout(Duration::from_millis(self.stage_timeouts.asr_ms), provider.transcribe(&raw)).await;
        match result {
            Ok(Ok(transcript)) => {
                trace.record_stage("asr", false, started.elapsed(), StagePayload::Binary(raw), StagePayload::text(&transcript.text), None);
                Ok(Some(transcript.text))
            }
            Ok(Err(err)) => {
                trace.record_stage("asr", false, started.elapsed(), StagePayload::Binary(raw), StagePayload::empty(), Some(err.to_string()));
                Err(self.apology(err))
            }
            Err(_) => {
                let err = RuntimeError::StageTimeout { stage: "asr".to_string(), timeout_ms: self.stage_timeouts.asr_ms };
                trace.record_stage("asr", false, started.elapsed(), StagePayload::empty(), StagePayload::empty(), Some(err.kind().to_string()));
                Err(self.apology(err))
            }
        }
    }

    async fn run_nlu(&self, text: &str, language: &str, ctx: &va_runtime::ConversationContext, trace: &TraceRecorder) -> Result<Intent, IntentResult> {
        let Some(component) = &self.nlu else {
            return Err(self.apology(RuntimeError::CapabilityUnavailable { component: "nlu".to_string() }));
        };
        let provider = component.select(None).await.map_err(|err| self.apology(err))?;
        // ConversationContext tracks conversation turns, not a dedicated
        // recent-intent-names list; NLU providers that want anaphora
        // context consult `recent_intents` when one is available.
        let nlu_context = NluContext { session_id: &ctx.session_id, recent_intents: &[] };

        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_millis(self.stage_timeouts.nlu_ms), provider.parse(text, language, &nlu_context)).await;
        let intent = match outcome {
            Ok(Ok(intent)) => intent,
            Ok(Err(err)) => {
                trace.record_stage("nlu", false, started.elapsed(), StagePayload::text(text), StagePayload::empty(), Some(err.to_string()));
                return Err(self.apology(err));
            }
            Err(_) => {
                let err = RuntimeError::StageTimeout { stage: "nlu".to_string(), timeout_ms: self.stage_timeouts.nlu_ms };
                trace.record_stage("nlu", false, started.elapsed(), StagePayload::text(text), StagePayload::empty(), Some(err.kind().to_string()));
                return Err(self.apology(err));
            }
        };

        let routed = if intent.confidence < self.nlu_routing.confidence_threshold {
            Intent::new(self.nlu_routing.fallback_intent.clone(), intent.raw_text.clone(), intent.language.clone())
        } else {
            intent
        };
        trace.record_stage("nlu", false, started.elapsed(), StagePayload::text(text), StagePayload::text(&routed.name), None);
        Ok(routed)
    }

    fn should_enhance(&self, intent: &Intent, result: &IntentResult) -> bool {
        if self.llm.is_none() {
            return false;
        }
        if result.request_llm_enhancement {
            return true;
        }
        self.llm_enhancement.auto_enhance_intents.iter().any(|pattern| {
            pattern == &intent.name || (pattern.ends_with(".*") && intent.name.starts_with(&pattern[..pattern.len() - 1]))
        })
    }

    /// Stage 6: failures here fall back to the unenhanced text (§4.8), so
    /// this returns `None` rather than an apology on any error.
    async fn run_llm_enhancement(&self, text: &str, language: &str, trace: &TraceRecorder) -> Option<String> {
        let component = self.llm.as_ref()?;
        let provider = component.select(None).await.ok()?;
        let started = Instant::now();
        let opts = va_core::traits::LlmOptions { target_language: Some(language.to_string()), max_tokens: None };
        let outcome = tokio::time::timeout(
            Duration::from_millis(self.stage_timeouts.llm_ms),
            provider.enhance_text(text, EnhancementTask::Tone, &opts),
        )
        .await;
        match outcome {
            Ok(Ok(enhanced)) => {
                trace.record_stage("llm_enhancement", false, started.elapsed(), StagePayload::text(text), StagePayload::text(&enhanced), None);
                Some(enhanced)
            }
            Ok(Err(err)) => {
                trace.record_stage("llm_enhancement", false, started.elapsed(), StagePayload::text(text), StagePayload::empty(), Some(err.to_string()));
                None
            }
            Err(_) => {
                trace.record_stage("llm_enhancement", false, started.elapsed(), StagePayload::text(text), StagePayload::empty(), Some("stage_timeout".to_string()));
                None
            }
        }
    }

    /// Runs every loaded TextProcessor that declares it applies to `stage`,
    /// in insertion order (§4.8 stages 3/7 "a chain of normalisers").
    async fn normalise_chain(&self, mut text: String, stage: NormalizationStage, language: &str) -> Result<String, RuntimeError> {
        let Some(component) = &self.text_processor else {
            return Ok(text);
        };
        for provider in component.loaded_in_order() {
            if !provider.applies_to(stage) {
                continue;
            }
            if let Some(langs) = provider.capabilities().get("languages").and_then(|v| v.as_array()) {
                if !langs.iter().any(|l| l.as_str() == Some(language)) {
                    continue;
                }
            }
            text = provider.normalise(&text, stage, language).await?;
        }
        Ok(text)
    }

    /// Writes TTS output to a `tempfile::NamedTempFile` under the
    /// configured temp-audio directory; the guard auto-deletes on drop
    /// regardless of how this function returns (§4.8 mandatory cleanup
    /// invariant), following the Open Question's resolution to use a
    /// scoped `tempfile` guard rather than a pipe.
    async fn run_tts_and_playback(&self, text: &str, language: &str, trace: &TraceRecorder) -> Result<Option<Vec<u8>>, IntentResult> {
        let Some(tts) = &self.tts else {
            return Err(self.apology(RuntimeError::CapabilityUnavailable { component: "tts".to_string() }));
        };
        let Some(audio) = &self.audio else {
            return Err(self.apology(RuntimeError::CapabilityUnavailable { component: "audio".to_string() }));
        };

        std::fs::create_dir_all(&self.temp_audio_dir).map_err(|e| {
            self.apology(RuntimeError::ActionError { domain: "tts".to_string(), name: "tempfile".to_string(), message: e.to_string() })
        })?;
        let guard = tempfile::Builder::new()
            .prefix("va-tts-")
            .suffix(".wav")
            .tempfile_in(&self.temp_audio_dir)
            .map_err(|e| self.apology(RuntimeError::ActionError { domain: "tts".to_string(), name: "tempfile".to_string(), message: e.to_string() }))?;
        let path = guard.path().to_path_buf();

        let tts_provider = tts.select(None).await.map_err(|err| self.apology(err))?;
        let started = Instant::now();
        let synth = tokio::time::timeout(
            Duration::from_millis(self.stage_timeouts.tts_ms),
            tts_provider.synthesize_to_file(text, &path, &SynthesisOptions { language: Some(language.to_string()), ..Default::default() }),
        )
        .await;
        match synth {
            Ok(Ok(())) => {
                trace.record_stage(
                    "tts",
                    false,
                    started.elapsed(),
                    StagePayload::text(text),
                    StagePayload::Json(serde_json::json!({ "provider_used": tts_provider.name() })),
                    None,
                );
            }
            Ok(Err(err)) => {
                trace.record_stage("tts", false, started.elapsed(), StagePayload::text(text), StagePayload::empty(), Some(err.to_string()));
                return Err(self.apology(err));
            }
            Err(_) => {
                let err = RuntimeError::StageTimeout { stage: "tts".to_string(), timeout_ms: self.stage_timeouts.tts_ms };
                trace.record_stage("tts", false, started.elapsed(), StagePayload::text(text), StagePayload::empty(), Some(err.kind().to_string()));
                return Err(self.apology(err));
            }
        }

        let bytes = tokio::fs::read(&path).await.ok();

        let audio_provider = audio.select(None).await.map_err(|err| self.apology(err))?;
        let started = Instant::now();
        let played = tokio::time::timeout(Duration::from_millis(self.stage_timeouts.audio_ms), audio_provider.play_file(&path, &PlaybackOptions::default())).await;
        match played {
            Ok(Ok(())) => {
                trace.record_stage("audio_playback", false, started.elapsed(), StagePayload::AudioFile(path.clone()), StagePayload::empty(), None);
                Ok(bytes)
            }
            Ok(Err(err)) => {
                trace.record_stage("audio_playback", false, started.elapsed(), StagePayload::AudioFile(path.clone()), StagePayload::empty(), Some(err.to_string()));
                Err(self.apology(err))
            }
            Err(_) => {
                let err = RuntimeError::StageTimeout { stage: "audio_playback".to_string(), timeout_ms: self.stage_timeouts.audio_ms };
                trace.record_stage("audio_playback", false, started.elapsed(), StagePayload::AudioFile(path.clone()), StagePayload::empty(), Some(err.kind().to_string()));
                Err(self.apology(err))
            }
        }
        // `guard` drops here, deleting the temp file on every exit path.
    }

    async fn run_stage_timed<F, Fut>(&self, stage: &str, trace: &TraceRecorder, timeout_ms: u64, skipped: bool, f: F) -> Result<String, IntentResult>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<String, RuntimeError>>,
    {
        let started = Instant::now();
        match tokio::time::timeout(Duration::from_millis(timeout_ms), f()).await {
            Ok(Ok(text)) => {
                trace.record_stage(stage, skipped, started.elapsed(), StagePayload::empty(), StagePayload::text(&text), None);
                Ok(text)
            }
            Ok(Err(err)) => {
                trace.record_stage(stage, skipped, started.elapsed(), StagePayload::empty(), StagePayload::empty(), Some(err.to_string()));
                Err(self.apology(err))
            }
            Err(_) => {
                let err = RuntimeError::StageTimeout { stage: stage.to_string(), timeout_ms };
                trace.record_stage(stage, skipped, started.elapsed(), StagePayload::empty(), StagePayload::empty(), Some(err.kind().to_string()));
                Err(self.apology(err))
            }
        }
    }

    fn apology(&self, error: RuntimeError) -> IntentResult {
        tracing::warn!(error = %error, kind = error.kind(), "workflow stage failed");
        IntentResult::failure("sorry, I couldn't do that right now", error.kind())
    }
}

async fn collect_stream(mut stream: AudioStream) -> Vec<u8> {
    use futures::StreamExt;
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use va_config::Settings;
    use va_core::traits::{ActionSpawner, IntentHandler, Provider};
    use va_runtime::{descriptors_from_settings, ComponentManager, LifecycleMode, ManagedComponent};

    struct StubNlu;
    #[async_trait]
    impl Provider for StubNlu {
        fn name(&self) -> &str {
            "stub-nlu"
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
    impl NaturalLanguageUnderstanding for StubNlu {
        async fn parse(&self, text: &str, language: &str, _ctx: &NluContext<'_>) -> va_core::error::Result<Intent> {
            Ok(Intent::new("greeting.hello", text, language))
        }
    }

    struct EchoHandler;
    #[async_trait]
    impl IntentHandler for EchoHandler {
        fn name(&self) -> &str {
            "echo"
        }
        fn patterns(&self) -> &[String] {
            static P: [String; 0] = [];
            &P
        }
        async fn handle(&self, intent: &Intent, _actions: &dyn ActionSpawner) -> IntentResult {
            IntentResult::success(format!("hello back: {}", intent.raw_text))
        }
    }

    fn engine() -> WorkflowEngine {
        let settings = Settings::default();
        let contexts = Arc::new(ContextStore::new(10, 10, 10, 30));
        let actions = Arc::new(ActionCoordinator::new(contexts.clone()));
        let intents = Arc::new(IntentRegistry::new());
        intents.set_fallback(Arc::new(EchoHandler));

        let nlu_component = Arc::new(Component::<dyn NaturalLanguageUnderstanding>::new("nlu", LifecycleMode::Eager));
        nlu_component.add_provider(Arc::new(StubNlu));
        nlu_component.mark_initialised();

        WorkflowEngine::new(&settings, contexts, actions, intents, None, None, None, Some(nlu_component), None, None, None)
    }

    #[tokio::test]
    async fn text_request_dispatches_through_nlu_and_intent_registry() {
        let engine = engine();
        let request = RequestContext::new("s1", va_core::RequestSource::Cli);
        let outcome = engine.process_text_input(request, "hello there".to_string()).await;
        assert!(outcome.result.success);
        assert_eq!(outcome.result.text, "hello back: hello there");
        assert!(outcome.audio.is_none());
    }

    #[tokio::test]
    async fn missing_nlu_capability_produces_apology() {
        let settings = Settings::default();
        let contexts = Arc::new(ContextStore::new(10, 10, 10, 30));
        let actions = Arc::new(ActionCoordinator::new(contexts.clone()));
        let intents = Arc::new(IntentRegistry::new());
        let engine = WorkflowEngine::new(&settings, contexts, actions, intents, None, None, None, None, None, None, None);

        let request = RequestContext::new("s1", va_core::RequestSource::Cli);
        let outcome = engine.process_text_input(request, "hi".to_string()).await;
        assert!(!outcome.result.success);
        assert_eq!(outcome.result.metadata.get("error_kind").and_then(|v| v.as_str()), Some("capability_unavailable"));
    }

    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<WorkflowEngine>();
    }

    // Exercises descriptors/manager wiring referenced by this module's
    // doc comments without pulling a full server assembly into this crate.
    #[tokio::test]
    async fn descriptors_from_settings_matches_fixed_component_universe() {
        let settings = Settings::default();
        let descriptors = descriptors_from_settings(&settings);
        assert_eq!(descriptors.len(), va_core::ComponentKind::ALL.len());

        struct NoopComponent;
        #[async_trait]
        impl ManagedComponent for NoopComponent {
            fn kind(&self) -> va_core::ComponentKind {
                va_core::ComponentKind::Monitoring
            }
            async fn initialise(&self) -> Result<(), va_core::error::DependencyError> {
                Ok(())
            }
            async fn is_healthy(&self) -> bool {
                true
            }
            async fn shutdown(&self) {}
        }
        let mut components: HashMap<va_core::ComponentKind, Arc<dyn ManagedComponent>> = HashMap::new();
        components.insert(va_core::ComponentKind::Monitoring, Arc::new(NoopComponent));
        let manager = ComponentManager::new(descriptors.clone(), components);
        assert!(manager.initialise().await.is_ok());
    }
}
