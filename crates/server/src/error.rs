//! Maps the runtime's typed error kinds (§7) onto HTTP status codes for the
//! administrative surface. Request-path failures never reach here — the
//! Workflow Engine already converts them into an `IntentResult` (§7
//! propagation policy).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] va_core::error::ConfigError),

    #[error(transparent)]
    Dependency(#[from] va_core::error::DependencyError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Config(_) => StatusCode::BAD_REQUEST,
            ServerError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
