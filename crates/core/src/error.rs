//! Error kinds shared across the runtime.
//!
//! Each variant here corresponds to one of the abstract error kinds from the
//! component design: startup errors (`ConfigError`, `DependencyError`) are
//! fatal and terminate the process; request-path errors never unwind across
//! a public entry point, they are converted into an `IntentResult` with
//! `success = false` instead (see `voice_agent_pipeline::workflow`).

use thiserror::Error;

/// Configuration is malformed or fails a validation rule. Fatal at startup,
/// never raised on a request path.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration at {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("environment error: {0}")]
    Environment(String),

    #[error("hard validation rule violated: {0}")]
    ValidationRule(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError {
            path: "<layered sources>".to_string(),
            message: err.to_string(),
        }
    }
}

/// A declared component- or service-dependency is missing, disabled, or the
/// dependency graph has a cycle. Fatal at startup.
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("dependency cycle detected among components: {0:?}")]
    Cycle(Vec<String>),

    #[error("component '{component}' declares a dependency on '{dependency}', which is disabled")]
    DisabledDependency { component: String, dependency: String },

    #[error("component '{component}' declares a dependency on unknown component '{dependency}'")]
    UnknownDependency { component: String, dependency: String },

    #[error("component '{component}' is enabled but unhealthy after initialisation")]
    UnhealthyComponent { component: String },

    #[error("component '{component}' failed to initialise: {message}")]
    ComponentInitFailed { component: String, message: String },
}

/// Errors surfaced while a request is in flight. These never unwind across
/// a public entry point; the Workflow Engine converts every variant here
/// into an apology `IntentResult` carrying the same information as metadata.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("provider '{provider}' for component '{component}' is unavailable: {reason}")]
    ProviderUnavailable {
        component: String,
        provider: String,
        reason: String,
    },

    #[error("component '{component}' has no working provider")]
    CapabilityUnavailable { component: String },

    #[error("stage '{stage}' exceeded its {timeout_ms}ms deadline")]
    StageTimeout { stage: String, timeout_ms: u64 },

    #[error("handler '{handler}' for intent '{intent}' exceeded its {timeout_ms}ms deadline")]
    HandlerTimeout {
        handler: String,
        intent: String,
        timeout_ms: u64,
    },

    #[error("handler '{handler}' failed: {message}")]
    HandlerError { handler: String, message: String },

    #[error("background action '{domain}/{name}' failed: {message}")]
    ActionError {
        domain: String,
        name: String,
        message: String,
    },

    #[error("administrative update rejected: {0}")]
    ValidationError(String),

    #[error("trace recording degraded: {0}")]
    TraceError(String),
}

impl RuntimeError {
    /// Stable machine-readable kind, used as the `error.kind` metadata field
    /// on the apology `IntentResult` the Workflow Engine synthesises.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::ProviderUnavailable { .. } => "provider_unavailable",
            RuntimeError::CapabilityUnavailable { .. } => "capability_unavailable",
            RuntimeError::StageTimeout { .. } => "stage_timeout",
            RuntimeError::HandlerTimeout { .. } => "handler_timeout",
            RuntimeError::HandlerError { .. } => "handler_error",
            RuntimeError::ActionError { .. } => "action_error",
            RuntimeError::ValidationError(_) => "validation_error",
            RuntimeError::TraceError(_) => "trace_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
