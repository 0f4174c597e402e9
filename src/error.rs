//! Hub-wide error taxonomy and its mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced by the session registry, backend supervisor, and proxy.
///
/// Variant names mirror the taxonomy in the hub's design document
/// (`CapacityExhausted`, `BackendStartTimeout`, ...) so that a log line or a
/// `Debug` dump reads the same as the spec that describes it.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No free port, or `max_sessions` reached.
    #[error("no capacity available for a new session")]
    CapacityExhausted,

    /// The backend process never reached `/status` readiness within its timeout.
    #[error("backend did not become ready in time")]
    BackendStartTimeout,

    /// The backend rejected its own `POST /session` with a non-2xx status.
    #[error("backend rejected session creation: {status}: {body}")]
    BackendCreateRejected {
        status: StatusCode,
        body: String,
    },

    /// Connection refused, timed out, or failed mid-stream on an outbound call.
    #[error("transport error talking to backend: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unknown hub session id.
    #[error("session not found")]
    NotFound,

    /// Anything else unexpected.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::CapacityExhausted => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Self::BackendStartTimeout => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Self::BackendCreateRejected { status, body } => {
                tracing::warn!(%status, %body, "backend rejected session creation");
                (*status, body.clone())
            }
            Self::Transport(err) => {
                tracing::warn!(error = %err, "transport error");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            Self::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}
