//! HTTP surface: the two invocation entry points and the administrative
//! surface named in §6. No WebSocket/WebRTC transport is specified here —
//! concrete transports are a deployment concern layered on top of
//! `process_text_input`/`process_audio_stream`.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use va_core::{ComponentKind, RequestContext, RequestSource};

use crate::error::ServerError;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/text", post(process_text))
        .route("/v1/audio", post(process_audio))
        .route("/admin/config/:section", get(get_config_section).put(put_config_section))
        .route("/admin/config/:section/validate", post(validate_config_section))
        .route("/admin/schema", get(get_schema))
        .route(
            "/admin/components/:kind/providers",
            get(list_providers).post(set_default_provider),
        )
        .route("/admin/components/providers-info", get(providers_info))
        .route("/admin/sessions/:session_id/actions", get(list_active_actions))
        .route(
            "/admin/sessions/:session_id/actions/:domain",
            post(cancel_action),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Minimal JSON-serialisable mirror of `IntentResult` — the core type
/// deliberately isn't `Serialize` (it is produced and consumed internally,
/// never persisted), so the HTTP boundary owns its own wire shape.
#[derive(Serialize)]
struct IntentResultDto {
    text: String,
    success: bool,
    confidence: f32,
    should_speak: bool,
    metadata: HashMap<String, Value>,
    error: Option<String>,
    audio_base64: Option<String>,
}

impl IntentResultDto {
    fn from_outcome(outcome: va_pipeline::WorkflowOutcome) -> Self {
        use base64::Engine;
        Self {
            text: outcome.result.text,
            success: outcome.result.success,
            confidence: outcome.result.confidence,
            should_speak: outcome.result.should_speak,
            metadata: outcome.result.metadata,
            error: outcome.result.error,
            audio_base64: outcome
                .audio
                .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

#[derive(Deserialize)]
struct TextRequest {
    session_id: String,
    text: String,
    #[serde(default)]
    wants_audio: bool,
    #[serde(default)]
    client_metadata: HashMap<String, Value>,
}

async fn process_text(State(state): State<AppState>, Json(req): Json<TextRequest>) -> Json<IntentResultDto> {
    let request = RequestContext::new(req.session_id, RequestSource::Api)
        .with_wants_audio(req.wants_audio)
        .with_client_metadata(req.client_metadata);
    let outcome = state.workflow.process_text_input(request, req.text).await;
    Json(IntentResultDto::from_outcome(outcome))
}

#[derive(Deserialize)]
struct AudioRequest {
    session_id: String,
    /// Base64-encoded raw PCM, one-shot (no true streaming over this
    /// surface — a transport layer wanting partials should drive
    /// `process_audio_stream` directly as a library call instead).
    audio_base64: String,
    #[serde(default)]
    wants_audio: bool,
    #[serde(default)]
    skip_wake_word: bool,
}

async fn process_audio(
    State(state): State<AppState>,
    Json(req): Json<AudioRequest>,
) -> Result<Json<IntentResultDto>, ServerError> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.audio_base64)
        .map_err(|e| ServerError::Config(va_core::error::ConfigError::InvalidValue {
            field: "audio_base64".to_string(),
            message: e.to_string(),
        }))?;
    let request = RequestContext::new(req.session_id, RequestSource::Api)
        .with_wants_audio(req.wants_audio)
        .with_skip_wake_word(req.skip_wake_word);
    let stream: va_pipeline::AudioStream = Box::pin(futures::stream::once(async move { bytes }));
    let outcome = state.workflow.process_audio_stream(request, stream).await;
    Ok(Json(IntentResultDto::from_outcome(outcome)))
}

async fn get_config_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .config
        .current()
        .get_raw(&section)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn put_config_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
    Json(value): Json<Value>,
) -> Result<StatusCode, ServerError> {
    state.config.put(&section, &value)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_config_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
    Json(value): Json<Value>,
) -> Result<StatusCode, ServerError> {
    state.config.validate_section(&section, &value)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_schema(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "sections": state.schema.get_section_models(),
        "components": state.schema.get_component_schemas(),
    }))
}

fn parse_kind(raw: &str) -> Option<ComponentKind> {
    ComponentKind::ALL.iter().copied().find(|k| k.as_str() == raw)
}

async fn list_providers(State(state): State<AppState>, Path(kind): Path<String>) -> Result<Json<Vec<String>>, StatusCode> {
    let kind = parse_kind(&kind).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(state.components.list_providers(kind)))
}

#[derive(Deserialize)]
struct SetDefaultProviderRequest {
    name: String,
}

async fn set_default_provider(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<SetDefaultProviderRequest>,
) -> Result<StatusCode, StatusCode> {
    let kind = parse_kind(&kind).ok_or(StatusCode::NOT_FOUND)?;
    if state.components.set_default_provider(kind, &req.name) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::UNPROCESSABLE_ENTITY)
    }
}

async fn providers_info(State(state): State<AppState>) -> Json<Value> {
    Json(state.components.get_providers_info())
}

async fn list_active_actions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Vec<Value>> {
    let actions = state
        .actions
        .list_active(&session_id)
        .into_iter()
        .map(|a| serde_json::json!({ "domain": a.domain, "name": a.action_name, "status": a.status }))
        .collect();
    Json(actions)
}

async fn cancel_action(
    State(state): State<AppState>,
    Path((session_id, domain)): Path<(String, String)>,
) -> StatusCode {
    if state.actions.cancel(&session_id, &domain) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn health(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({ "status": "ok", "deployment_profile": state.manager.deployment_profile() })).into_response()
}
