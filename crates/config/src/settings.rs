//! Root configuration model.
//!
//! `Settings` is the typed root the Schema Registry (C2) introspects to
//! derive section/component/provider catalogues (§4.1), and the shape the
//! Config Store (C1) validates against on `load` (§4.2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use va_core::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, RuntimeEnvironment::Production)
    }

    /// Staging and production apply hard validation rules as errors; in
    /// development the same checks only warn.
    pub fn is_strict(&self) -> bool {
        matches!(self, RuntimeEnvironment::Staging | RuntimeEnvironment::Production)
    }
}

/// Boolean enablement flags, one per `ComponentKind` (§3 ComponentDescriptor,
/// §4.1 `get_component_schemas`). Field names follow `ComponentKind::as_str`
/// by convention so the Schema Registry can match them to schema classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsConfig {
    pub tts: bool,
    pub audio: bool,
    pub asr: bool,
    pub llm: bool,
    pub voice_trigger: bool,
    pub nlu: bool,
    pub text_processor: bool,
    pub intent_system: bool,
    pub monitoring: bool,
    pub nlu_analysis: bool,
    pub configuration: bool,
}

impl Default for ComponentsConfig {
    /// Provider-backed kinds (`tts`/`audio`/`asr`/`voice_trigger`/`nlu`/
    /// `text_processor`/`llm`) default to disabled: concrete providers are a
    /// deployment concern this crate doesn't supply, and none of these
    /// descriptors is `optional`, so enabling one with no provider ever
    /// registered would make `ComponentManager::initialise()` fail its
    /// health check on a stock checkout. A deployment turns on only the
    /// kinds it has actually wired a provider for. The four system kinds
    /// have no provider dependency and stay enabled.
    fn default() -> Self {
        Self {
            tts: false,
            audio: false,
            asr: false,
            llm: false,
            voice_trigger: false,
            nlu: false,
            text_processor: false,
            intent_system: true,
            monitoring: true,
            nlu_analysis: false,
            configuration: true,
        }
    }
}

impl ComponentsConfig {
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        Some(match name {
            "tts" => self.tts,
            "audio" => self.audio,
            "asr" => self.asr,
            "llm" => self.llm,
            "voice_trigger" => self.voice_trigger,
            "nlu" => self.nlu,
            "text_processor" => self.text_processor,
            "intent_system" => self.intent_system,
            "monitoring" => self.monitoring,
            "nlu_analysis" => self.nlu_analysis,
            "configuration" => self.configuration,
            _ => return None,
        })
    }
}

/// Per-component-kind config: which providers are visible, which is default,
/// the fallback order, and each provider's raw sub-config (validated later
/// against its typed schema by the Schema Registry).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComponentProviderConfig {
    pub default_provider: Option<String>,
    #[serde(default)]
    pub fallback_providers: Vec<String>,
    /// Config-driven "essential" set for lazy loading (SPEC_FULL.md §4.8
    /// Open Question resolution); `None` defaults to
    /// `[default_provider] + always_on_fallback`.
    pub essential_providers: Option<Vec<String>>,
    #[serde(default)]
    pub lazy: bool,
    #[serde(default)]
    pub providers: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTimeouts {
    pub voice_trigger_ms: u64,
    pub asr_ms: u64,
    pub nlu_ms: u64,
    pub intent_dispatch_ms: u64,
    pub llm_ms: u64,
    pub tts_ms: u64,
    pub audio_ms: u64,
    /// Per-request wall-clock budget (§5).
    pub request_budget_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            voice_trigger_ms: 10_000,
            asr_ms: 30_000,
            nlu_ms: 5_000,
            intent_dispatch_ms: 30_000,
            llm_ms: 30_000,
            tts_ms: 30_000,
            audio_ms: 60_000,
            request_budget_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_timeout_mins: u64,
    pub max_history_entries: usize,
    pub max_recent_actions: usize,
    pub max_failed_actions: usize,
    pub pre_roll_buffer_seconds: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_mins: 30,
            max_history_entries: 50,
            max_recent_actions: 20,
            max_failed_actions: 20,
            pre_roll_buffer_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    pub enabled_by_default: bool,
    pub max_stages: usize,
    pub max_data_size_mb: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: false,
            max_stages: 100,
            max_data_size_mb: 10,
        }
    }
}

/// Stage-4 routing policy (§4.8): below `confidence_threshold`, NLU's
/// Intent is replaced with `fallback_intent` before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluRoutingConfig {
    pub confidence_threshold: f32,
    pub fallback_intent: String,
}

impl Default for NluRoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            fallback_intent: "system.fallback".to_string(),
        }
    }
}

/// Stage-6 policy (§4.8): intents in `auto_enhance_intents` (exact name or
/// `domain.*` wildcard) get LLM enhancement even when the handler itself
/// didn't request it via `IntentResult::request_llm_enhancement`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmEnhancementPolicy {
    pub auto_enhance_intents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_json: bool,
    pub otlp_endpoint: Option<String>,
    pub tracing_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            otlp_endpoint: None,
            tracing_enabled: false,
        }
    }
}

fn default_temp_audio_dir() -> String {
    std::env::temp_dir()
        .join("voice-assistant-audio")
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: RuntimeEnvironment,
    pub components: ComponentsConfig,
    pub tts: ComponentProviderConfig,
    pub audio: ComponentProviderConfig,
    pub asr: ComponentProviderConfig,
    pub llm: ComponentProviderConfig,
    pub voice_trigger: ComponentProviderConfig,
    pub nlu: ComponentProviderConfig,
    pub text_processor: ComponentProviderConfig,
    #[serde(default = "default_temp_audio_dir")]
    pub temp_audio_dir: String,
    pub stage_timeouts: StageTimeouts,
    pub session: SessionConfig,
    pub trace: TraceConfig,
    pub observability: ObservabilityConfig,
    pub nlu_routing: NluRoutingConfig,
    pub llm_enhancement: LlmEnhancementPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: RuntimeEnvironment::default(),
            components: ComponentsConfig::default(),
            tts: ComponentProviderConfig::default(),
            audio: ComponentProviderConfig::default(),
            asr: ComponentProviderConfig::default(),
            llm: ComponentProviderConfig::default(),
            voice_trigger: ComponentProviderConfig::default(),
            nlu: ComponentProviderConfig::default(),
            text_processor: ComponentProviderConfig::default(),
            temp_audio_dir: default_temp_audio_dir(),
            stage_timeouts: StageTimeouts::default(),
            session: SessionConfig::default(),
            trace: TraceConfig::default(),
            observability: ObservabilityConfig::default(),
            nlu_routing: NluRoutingConfig::default(),
            llm_enhancement: LlmEnhancementPolicy::default(),
        }
    }
}

impl Settings {
    /// Hard validation rules enforced at load (§6). Structural rules are
    /// enforced in every environment; the filesystem probe for
    /// `temp_audio_dir` is a separate call (`probe_temp_audio_dir`) so unit
    /// tests can exercise validation without touching disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Rule 1: TTS without Audio is always a hard error (S6).
        if self.components.tts && !self.components.audio {
            return Err(ConfigError::ValidationRule(
                "TTS requires Audio: components.tts=true but components.audio=false".to_string(),
            ));
        }

        if self.temp_audio_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "temp_audio_dir".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        self.validate_provider_configs()?;
        Ok(())
    }

    fn validate_provider_configs(&self) -> Result<(), ConfigError> {
        for (name, cfg) in [
            ("tts", &self.tts),
            ("audio", &self.audio),
            ("asr", &self.asr),
            ("llm", &self.llm),
            ("voice_trigger", &self.voice_trigger),
            ("nlu", &self.nlu),
            ("text_processor", &self.text_processor),
        ] {
            if let Some(default) = &cfg.default_provider {
                if !cfg.providers.contains_key(default) {
                    return Err(ConfigError::InvalidValue {
                        field: format!("{name}.default_provider"),
                        message: format!("'{default}' is not listed under {name}.providers"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rule 3 (§6): `temp_audio_dir` must be writable; a probe write occurs
    /// at startup. Separate from `validate()` since it touches disk.
    pub fn probe_temp_audio_dir(&self) -> Result<(), ConfigError> {
        let dir = std::path::Path::new(&self.temp_audio_dir);
        std::fs::create_dir_all(dir).map_err(|e| {
            ConfigError::ValidationRule(format!("temp_audio_dir '{}' is not writable: {e}", self.temp_audio_dir))
        })?;
        let probe = dir.join(".write-probe");
        std::fs::write(&probe, b"ok").map_err(|e| {
            ConfigError::ValidationRule(format!("temp_audio_dir '{}' is not writable: {e}", self.temp_audio_dir))
        })?;
        let _ = std::fs::remove_file(&probe);
        Ok(())
    }
}

/// Layered load: defaults < `config/default.{toml,yaml}` < `config/{env}.{toml,yaml}`
/// < `VOICE_ASSISTANT__`-prefixed environment variables, mirroring the
/// teacher's `load_settings`.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let env_name = env.unwrap_or("development");

    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(
            config::Environment::with_prefix("VOICE_ASSISTANT")
                .separator("__")
                .try_parsing(true),
        );

    let raw: Settings = builder.build()?.try_deserialize()?;
    raw.validate()?;
    Ok(raw)
}
