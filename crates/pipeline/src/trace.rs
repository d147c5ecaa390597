//! Trace Recorder (C10) — conditional, per-request stage recorder with
//! safety limits and sanitisation (§4.9).
//!
//! Supplemented from `original_source/irene/core/trace_context.py`: the
//! `context_changes()` diff and the `summary()`/`export()` split are both
//! lifted from that module's `_calculate_context_changes` and
//! `get_trace_summary()`/`export_trace()` methods.

use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use va_runtime::ContextSnapshot;

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "api_key",
    "secret",
    "auth",
    "credential",
    "authorisation",
    "authorization",
    "bearer",
    "private",
    "cookie",
    "jwt",
    "access_token",
    "refresh_token",
    "certificate",
];

const MAX_STRING_CHARS: usize = 2_000;
const MAX_INLINE_BINARY_BYTES: usize = 1024 * 1024;
const OVERSIZE_SAMPLE_BYTES: usize = 1024;
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "m4a"];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| lower.contains(s))
}

/// Recursively drops sensitive keys and truncates long strings (§4.9
/// sanitisation rules 1-2). Never fails: unrepresentable input degrades to
/// a `sanitization_error` record rather than propagating.
fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if is_sensitive_key(k) {
                    continue;
                }
                out.insert(k.clone(), sanitize_json(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_json).collect()),
        Value::String(s) if s.chars().count() > MAX_STRING_CHARS => {
            let preview: String = s.chars().take(MAX_STRING_CHARS).collect();
            serde_json::json!({
                "_truncated": true,
                "original_length": s.chars().count(),
                "preview": preview,
            })
        }
        other => other.clone(),
    }
}

fn sanitize_binary(bytes: &[u8]) -> Value {
    if bytes.len() <= MAX_INLINE_BINARY_BYTES {
        serde_json::json!({
            "_binary": true,
            "size": bytes.len(),
            "encoding": "base64",
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    } else {
        let sample = &bytes[..OVERSIZE_SAMPLE_BYTES.min(bytes.len())];
        serde_json::json!({
            "_binary": true,
            "size": bytes.len(),
            "truncated": true,
            "sample_base64": base64::engine::general_purpose::STANDARD.encode(sample),
        })
    }
}

/// What a stage hands the Trace Recorder for its input/output (§4.9).
pub enum StagePayload {
    Json(Value),
    Binary(Vec<u8>),
    AudioFile(std::path::PathBuf),
}

impl StagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        StagePayload::Json(Value::String(text.into()))
    }

    pub fn empty() -> Self {
        StagePayload::Json(Value::Null)
    }

    fn sanitize(self) -> Value {
        match self {
            StagePayload::Json(v) => sanitize_json(&v),
            StagePayload::Binary(bytes) => sanitize_binary(&bytes),
            StagePayload::AudioFile(path) => sanitize_audio_file(&path),
        }
    }
}

fn sanitize_audio_file(path: &Path) -> Value {
    let recognised = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);

    let metadata = std::fs::metadata(path);
    let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);

    if recognised && metadata.is_ok() && size <= MAX_INLINE_BINARY_BYTES as u64 {
        match std::fs::read(path) {
            Ok(bytes) => {
                let mut payload = sanitize_binary(&bytes);
                payload["path"] = Value::String(path.display().to_string());
                payload
            }
            Err(err) => serde_json::json!({ "sanitization_error": err.to_string(), "path": path.display().to_string() }),
        }
    } else {
        serde_json::json!({
            "_audio_file": true,
            "path": path.display().to_string(),
            "size": size,
            "recognised_extension": recognised,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub skipped: bool,
    pub duration_ms: u64,
    pub input: Value,
    pub output: Value,
    pub error: Option<String>,
}

/// Full exportable trace structure, returned by `export()` (administrative
/// surface) and never allocated when the recorder is disabled.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub request_id: String,
    pub session_id: String,
    pub before: Option<ContextSnapshotView>,
    pub after: Option<ContextSnapshotView>,
    pub stages: Vec<StageRecord>,
    pub overflowed: bool,
    pub dropped_stage_count: usize,
    pub total_size_bytes: usize,
}

/// Serialisable mirror of `va_runtime::ContextSnapshot`.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshotView {
    pub history_len: usize,
    pub active_action_domains: Vec<String>,
    pub language: Option<String>,
    pub device_count: usize,
}

impl From<&ContextSnapshot> for ContextSnapshotView {
    fn from(s: &ContextSnapshot) -> Self {
        Self {
            history_len: s.history_len,
            active_action_domains: s.active_action_domains.clone(),
            language: s.language.clone(),
            device_count: s.device_count,
        }
    }
}

/// Cheap aggregate, always safe to compute even mid-request (`summary()`).
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    pub request_id: String,
    pub stage_count: usize,
    pub total_duration_ms: u64,
    pub overflowed: bool,
}

/// Derived, lazily-computed diff between before/after snapshots
/// (`original_source/irene/core/trace_context.py::_calculate_context_changes`).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContextChanges {
    pub added_action_domains: Vec<String>,
    pub removed_action_domains: Vec<String>,
    pub history_growth: i64,
    pub language_changed: bool,
    pub device_count_delta: i64,
}

struct TraceState {
    record: TraceRecord,
    max_stages: usize,
    max_size_bytes: usize,
    warned_overflow: bool,
}

/// When disabled, every method is an `if` check and a `None`/early-return —
/// O(1), no allocation (§4.9).
pub enum TraceRecorder {
    Disabled,
    Enabled(parking_lot::Mutex<TraceState>),
}

impl TraceRecorder {
    pub fn new(enabled: bool, request_id: impl Into<String>, session_id: impl Into<String>, config: &va_config::TraceConfig) -> Self {
        if !enabled {
            return TraceRecorder::Disabled;
        }
        TraceRecorder::Enabled(parking_lot::Mutex::new(TraceState {
            record: TraceRecord {
                request_id: request_id.into(),
                session_id: session_id.into(),
                before: None,
                after: None,
                stages: Vec::new(),
                overflowed: false,
                dropped_stage_count: 0,
                total_size_bytes: 0,
            },
            max_stages: config.max_stages,
            max_size_bytes: config.max_data_size_mb * 1024 * 1024,
            warned_overflow: false,
        }))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TraceRecorder::Enabled(_))
    }

    pub fn record_before(&self, snapshot: &ContextSnapshot) {
        if let TraceRecorder::Enabled(state) = self {
            state.lock().record.before = Some(snapshot.into());
        }
    }

    pub fn record_after(&self, snapshot: &ContextSnapshot) {
        if let TraceRecorder::Enabled(state) = self {
            state.lock().record.after = Some(snapshot.into());
        }
    }

    /// Sanitises and appends one stage record, honouring the stage-count
    /// and total-size caps. Overflow drops silently after one warning log
    /// and is surfaced via `overflowed`/`dropped_stage_count` (§4.9).
    pub fn record_stage(
        &self,
        stage: &str,
        skipped: bool,
        duration: Duration,
        input: StagePayload,
        output: StagePayload,
        error: Option<String>,
    ) {
        let TraceRecorder::Enabled(state) = self else {
            return;
        };
        let mut state = state.lock();

        if state.record.stages.len() >= state.max_stages || state.record.total_size_bytes >= state.max_size_bytes {
            state.record.overflowed = true;
            state.record.dropped_stage_count += 1;
            if !state.warned_overflow {
                tracing::warn!(stage, "trace recorder capacity exceeded; further stages dropped silently");
                state.warned_overflow = true;
            }
            return;
        }

        let input = input.sanitize();
        let output = output.sanitize();
        let size = serde_json::to_vec(&input).map(|v| v.len()).unwrap_or(0)
            + serde_json::to_vec(&output).map(|v| v.len()).unwrap_or(0);

        state.record.total_size_bytes += size;
        state.record.stages.push(StageRecord {
            stage: stage.to_string(),
            skipped,
            duration_ms: duration.as_millis() as u64,
            input,
            output,
            error,
        });
    }

    pub fn summary(&self) -> Option<TraceSummary> {
        let TraceRecorder::Enabled(state) = self else {
            return None;
        };
        let state = state.lock();
        Some(TraceSummary {
            request_id: state.record.request_id.clone(),
            stage_count: state.record.stages.len(),
            total_duration_ms: state.record.stages.iter().map(|s| s.duration_ms).sum(),
            overflowed: state.record.overflowed,
        })
    }

    pub fn export(&self) -> Option<TraceRecord> {
        let TraceRecorder::Enabled(state) = self else {
            return None;
        };
        Some(state.lock().record.clone())
    }

    pub fn context_changes(&self) -> Option<ContextChanges> {
        let TraceRecorder::Enabled(state) = self else {
            return None;
        };
        let state = state.lock();
        let before = state.record.before.as_ref()?;
        let after = state.record.after.as_ref()?;

        let added = after
            .active_action_domains
            .iter()
            .filter(|d| !before.active_action_domains.contains(d))
            .cloned()
            .collect();
        let removed = before
            .active_action_domains
            .iter()
            .filter(|d| !after.active_action_domains.contains(d))
            .cloned()
            .collect();

        Some(ContextChanges {
            added_action_domains: added,
            removed_action_domains: removed,
            history_growth: after.history_len as i64 - before.history_len as i64,
            language_changed: before.language != after.language,
            device_count_delta: after.device_count as i64 - before.device_count as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> va_config::TraceConfig {
        va_config::TraceConfig {
            enabled_by_default: false,
            max_stages: 2,
            max_data_size_mb: 10,
        }
    }

    #[test]
    fn disabled_recorder_never_allocates_a_record() {
        let recorder = TraceRecorder::new(false, "r1", "s1", &config());
        recorder.record_stage("asr", false, Duration::from_millis(5), StagePayload::empty(), StagePayload::empty(), None);
        assert!(recorder.summary().is_none());
        assert!(recorder.export().is_none());
    }

    #[test]
    fn sanitizes_sensitive_keys_and_truncates_long_strings() {
        let recorder = TraceRecorder::new(true, "r1", "s1", &config());
        let input = StagePayload::Json(serde_json::json!({ "api_key": "shh", "text": "a".repeat(3000) }));
        recorder.record_stage("nlu", false, Duration::from_millis(1), input, StagePayload::empty(), None);
        let record = recorder.export().unwrap();
        let sanitized = &record.stages[0].input;
        assert!(sanitized.get("api_key").is_none());
        assert_eq!(sanitized["text"]["original_length"], 3000);
    }

    #[test]
    fn overflow_is_silent_after_one_warning_and_marks_summary() {
        let recorder = TraceRecorder::new(true, "r1", "s1", &config());
        for _ in 0..5 {
            recorder.record_stage("stage", false, Duration::from_millis(1), StagePayload::empty(), StagePayload::empty(), None);
        }
        let summary = recorder.summary().unwrap();
        assert_eq!(summary.stage_count, 2);
        assert!(summary.overflowed);
    }

    #[test]
    fn context_changes_reports_added_domains_and_history_growth() {
        let recorder = TraceRecorder::new(true, "r1", "s1", &config());
        recorder.record_before(&ContextSnapshot {
            session_id: "s1".to_string(),
            history_len: 1,
            last_history: vec![],
            active_action_domains: vec![],
            language: Some("en".to_string()),
            device_count: 0,
        });
        recorder.record_after(&ContextSnapshot {
            session_id: "s1".to_string(),
            history_len: 2,
            last_history: vec![],
            active_action_domains: vec!["timer".to_string()],
            language: Some("en".to_string()),
            device_count: 0,
        });
        let changes = recorder.context_changes().unwrap();
        assert_eq!(changes.added_action_domains, vec!["timer".to_string()]);
        assert_eq!(changes.history_growth, 1);
        assert!(!changes.language_changed);
    }
}
