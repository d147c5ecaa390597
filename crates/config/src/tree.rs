//! ConfigTree — the immutable snapshot addressable by dotted path (§3, §4.2).

use crate::settings::Settings;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use va_core::error::ConfigError;

/// One regex-free, literal `${NAME}` substitution pass over every string
/// leaf of a freshly-parsed document, run before typed deserialization.
/// Unresolved placeholders are left in place and reported as warnings, never
/// as a load error (§4.2).
pub fn resolve_env_placeholders(value: &mut Value, warnings: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(resolved) = substitute_one(s, warnings) {
                *s = resolved;
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_env_placeholders(item, warnings);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                resolve_env_placeholders(v, warnings);
            }
        }
        _ => {}
    }
}

fn substitute_one(input: &str, warnings: &mut Vec<String>) -> Option<String> {
    if !input.contains("${") {
        return None;
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut changed = false;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            let name = &after[..end];
            match std::env::var(name) {
                Ok(val) => {
                    out.push_str(&val);
                    changed = true;
                }
                Err(_) => {
                    warnings.push(format!("unresolved environment placeholder ${{{name}}}"));
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        } else {
            out.push_str("${");
            rest = after;
        }
    }
    out.push_str(rest);
    changed.then_some(out)
}

/// Immutable snapshot of the whole configuration, addressable by dotted
/// path. A new snapshot is built on every successful `load`/reload; nothing
/// mutates a `ConfigSnapshot` in place.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub settings: Settings,
    /// Parsed-but-untyped view, used by `resolve` for paths that don't map
    /// onto a `Settings` field (still typed JSON, just not part of the root
    /// struct).
    raw: Value,
}

impl ConfigSnapshot {
    fn dotted_lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
        let mut current = value;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// `resolve(path, expected_type)` — returns the typed value or `None`
    /// for unknown leaves (never an error, per §4.2).
    pub fn resolve<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        Self::dotted_lookup(&self.raw, path).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_component_enabled(&self, name: &str) -> Option<bool> {
        self.settings.components.is_enabled(name)
    }

    /// Administrative `get(path)` (§6): the untyped view, so any dotted path
    /// present in the raw document resolves, not just `Settings` fields.
    pub fn get_raw(&self, path: &str) -> Option<Value> {
        Self::dotted_lookup(&self.raw, path).cloned()
    }
}

/// Owns the live `ConfigSnapshot`, swapping it atomically on reload (C1).
pub struct ConfigStore {
    active: RwLock<Arc<ConfigSnapshot>>,
    source_path: Option<PathBuf>,
}

impl ConfigStore {
    /// `load(path)` — parse and validate, producing the first snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let snapshot = Self::load_snapshot(path)?;
        Ok(Self {
            active: RwLock::new(Arc::new(snapshot)),
            source_path: Some(path.to_path_buf()),
        })
    }

    pub fn from_settings(settings: Settings) -> Self {
        let raw = serde_json::to_value(&settings).expect("Settings always serializes");
        Self {
            active: RwLock::new(Arc::new(ConfigSnapshot { settings, raw })),
            source_path: None,
        }
    }

    fn load_snapshot(path: &Path) -> Result<ConfigSnapshot, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let mut raw: Value = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&text).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&text).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };

        let mut warnings = Vec::new();
        resolve_env_placeholders(&mut raw, &mut warnings);
        for w in &warnings {
            tracing::warn!(path = %path.display(), "{w}");
        }

        let settings: Settings = serde_json::from_value(raw.clone()).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        settings.validate()?;

        Ok(ConfigSnapshot { settings, raw })
    }

    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.active.read().clone()
    }

    /// `watch`'s reload step: parse, validate, and on success atomically
    /// swap; on failure the previous tree is kept and the error returned.
    /// Never partially applies a tree (§4.2).
    pub fn reload(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let path = self
            .source_path
            .as_ref()
            .ok_or_else(|| ConfigError::FileNotFound("<in-memory config has no source path>".to_string()))?;
        let snapshot = Arc::new(Self::load_snapshot(path)?);
        *self.active.write() = snapshot.clone();
        Ok(snapshot)
    }

    /// `save(tree, path)` — writes the typed tree back out, creating a
    /// timestamped backup of whatever was previously at `path` (§4.2, §8).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        Self::backup_if_exists(path)?;
        let snapshot = self.current();
        let text = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::to_string_pretty(&snapshot.settings).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::to_string(&snapshot.settings).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };
        std::fs::write(path, text).map_err(|e| ConfigError::Environment(e.to_string()))
    }

    /// `save_raw(text, path)` — writes verbatim text (expected to already be
    /// a round-trip-preserving document, e.g. produced via `toml_edit`),
    /// still taking a backup first.
    pub fn save_raw(path: impl AsRef<Path>, text: &str) -> Result<(), ConfigError> {
        let path = path.as_ref();
        Self::backup_if_exists(path)?;
        std::fs::write(path, text).map_err(|e| ConfigError::Environment(e.to_string()))
    }

    /// `apply_section_to_raw(section, dict, text)` — edits only the named
    /// top-level table in an existing TOML document, leaving every other
    /// key's formatting and comments untouched (§6, §8 round-trip
    /// property). Grounded in `original_source/irene/config/toml_roundtrip.py`'s
    /// "edit via a round-trip-preserving representation" behaviour.
    pub fn apply_section_to_raw(text: &str, section: &str, value: &Value) -> Result<String, ConfigError> {
        let mut doc = text.parse::<toml_edit::DocumentMut>().map_err(|e| ConfigError::ParseError {
            path: "<raw text>".to_string(),
            message: e.to_string(),
        })?;
        let sub_text = toml::to_string(value).map_err(|e| ConfigError::ParseError {
            path: "<raw text>".to_string(),
            message: e.to_string(),
        })?;
        let sub_doc = sub_text.parse::<toml_edit::DocumentMut>().map_err(|e| ConfigError::ParseError {
            path: "<raw text>".to_string(),
            message: e.to_string(),
        })?;
        doc[section] = toml_edit::Item::Table(sub_doc.as_table().clone());
        Ok(doc.to_string())
    }

    /// Administrative `validate(section, dict)` (§6): merges `value` into a
    /// throwaway clone of the live settings and runs the same hard rules
    /// `load` enforces, without touching the live snapshot.
    pub fn validate_section(&self, section: &str, value: &Value) -> Result<Settings, ConfigError> {
        let mut raw = serde_json::to_value(&self.current().settings).map_err(|e| ConfigError::ParseError {
            path: "<live settings>".to_string(),
            message: e.to_string(),
        })?;
        raw[section] = value.clone();
        let candidate: Settings = serde_json::from_value(raw).map_err(|e| ConfigError::ParseError {
            path: section.to_string(),
            message: e.to_string(),
        })?;
        candidate.validate()?;
        Ok(candidate)
    }

    /// Administrative `put(section, dict)` (§6): validates first, then
    /// applies. With a file-backed store this round-trips through
    /// `apply_section_to_raw` so unrelated comments/formatting survive and a
    /// timestamped backup is taken (§8); an in-memory store (no
    /// `source_path`, e.g. built via `from_settings`) just swaps the typed
    /// snapshot. Either way the live tree fully reflects the change or is
    /// left exactly as it was (§8).
    pub fn put(&self, section: &str, value: &Value) -> Result<(), ConfigError> {
        let candidate = self.validate_section(section, value)?;
        match &self.source_path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
                let updated = ConfigSnapshot::apply_section_to_raw(&text, section, value)?;
                Self::save_raw(path, &updated)?;
                self.reload()?;
            }
            None => {
                let raw = serde_json::to_value(&candidate).map_err(|e| ConfigError::ParseError {
                    path: "<in-memory settings>".to_string(),
                    message: e.to_string(),
                })?;
                *self.active.write() = Arc::new(ConfigSnapshot { settings: candidate, raw });
            }
        }
        Ok(())
    }

    fn backup_if_exists(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }
        let backups_dir = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups");
        std::fs::create_dir_all(&backups_dir).map_err(|e| ConfigError::Environment(e.to_string()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("config");
        let backup_path = backups_dir.join(format!("{file_name}.{}.bak", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
        std::fs::copy(path, &backup_path).map_err(|e| ConfigError::Environment(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_substitution_leaves_unresolved_as_warning() {
        std::env::set_var("VA_TEST_PLACEHOLDER", "resolved");
        let mut value = serde_json::json!({
            "a": "${VA_TEST_PLACEHOLDER}",
            "b": "${VA_TEST_MISSING}",
        });
        let mut warnings = Vec::new();
        resolve_env_placeholders(&mut value, &mut warnings);
        assert_eq!(value["a"], "resolved");
        assert_eq!(value["b"], "${VA_TEST_MISSING}");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn resolve_unknown_leaf_is_none_not_error() {
        let store = ConfigStore::from_settings(Settings::default());
        let snapshot = store.current();
        let value: Option<bool> = snapshot.resolve("components.nonexistent");
        assert!(value.is_none());
    }

    #[test]
    fn resolve_known_leaf() {
        let store = ConfigStore::from_settings(Settings::default());
        let snapshot = store.current();
        let value: Option<bool> = snapshot.resolve("components.tts");
        assert_eq!(value, Some(true));
    }

    #[test]
    fn apply_section_to_raw_preserves_unrelated_comments() {
        let original = "# top comment\n[components]\ntts = true\n\n# nlu comment\n[nlu]\ndefault_provider = \"hybrid\"\n";
        let updated = ConfigSnapshot::apply_section_to_raw(
            original,
            "nlu",
            &serde_json::json!({ "default_provider": "spacy" }),
        )
        .unwrap();
        assert!(updated.contains("# top comment"));
        assert!(updated.contains("# nlu comment"));
        assert!(updated.contains("spacy"));
        assert!(!updated.contains("hybrid"));
    }
}
