//! Config Store and Schema Registry (C1, C2).
//!
//! `settings` holds the typed root model; `tree` wraps it in an atomically
//! swappable, dotted-path-addressable snapshot; `schema` is the catalogue of
//! provider parameter models used to validate coverage and answer
//! introspection queries.

pub mod schema;
pub mod settings;
pub mod tree;

pub use schema::{
    CompletenessReport, CoverageReport, ParameterSchema, ParameterType, ProviderSchema,
    SchemaCatalogue, SchemaRegistry, SECTION_NAMES,
};
pub use settings::{
    load_settings, ComponentProviderConfig, ComponentsConfig, LlmEnhancementPolicy,
    NluRoutingConfig, ObservabilityConfig, RuntimeEnvironment, SessionConfig, Settings,
    StageTimeouts, TraceConfig,
};
pub use tree::{resolve_env_placeholders, ConfigSnapshot, ConfigStore};

pub use va_core::error::ConfigError;
