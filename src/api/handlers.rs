//! Gateway HTTP handlers: the session-create/delete/list/health/info
//! endpoints, plus the path-proxied passthrough.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use super::state::{AppState, BACKEND_CREATE_TIMEOUT, BACKEND_DELETE_TIMEOUT};
use super::types::{
    CreateSessionRequest, CreateSessionResponse, DeleteSessionResponse, HealthResponse,
    RootResponse, SessionsResponse,
};
use crate::error::HubError;
use crate::proxy;

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        name: "appium-hub".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running",
        sessions: state.registry.count(),
    })
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.registry.health().await;
    Json(HealthResponse {
        total_sessions: report.total_sessions,
        healthy_sessions: report.healthy_sessions,
        unhealthy_sessions: report.unhealthy_ids,
        available_ports: report.available_ports,
        used_ports: report.used_ports,
    })
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.registry.list().await,
    })
}

pub async fn session_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HubError> {
    let view = state.registry.view(&id).await.ok_or(HubError::NotFound)?;
    Ok(Json(view).into_response())
}

/// `POST /session`: the create choreography. `Registry::create` has
/// already reserved a port and brought the backend up by the time this
/// forwards the client's capabilities; a backend-side rejection or
/// transport error compensates by deleting the just-created record.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Response, HubError> {
    let hub_session_id = state
        .registry
        .create(req.device_udid, req.device_name)
        .await?;

    let Some((service_url, ..)) = state.registry.touch(&hub_session_id) else {
        return Err(HubError::Internal(anyhow::anyhow!(
            "session disappeared immediately after creation"
        )));
    };

    let payload = serde_json::json!({ "capabilities": req.capabilities });
    let outcome = state
        .http
        .post(format!("{service_url}/session"))
        .timeout(BACKEND_CREATE_TIMEOUT)
        .json(&payload)
        .send()
        .await;

    let appium_session: Value = match outcome {
        Ok(resp) if resp.status().is_success() => match resp.json().await {
            Ok(body) => body,
            Err(err) => {
                state.registry.delete(&hub_session_id).await;
                return Err(HubError::Internal(err.into()));
            }
        },
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            state.registry.delete(&hub_session_id).await;
            return Err(HubError::BackendCreateRejected { status, body });
        }
        Err(err) => {
            state.registry.delete(&hub_session_id).await;
            return Err(HubError::Transport(err));
        }
    };

    Ok(Json(CreateSessionResponse {
        hub_session_id,
        appium_session,
        service_url,
    })
    .into_response())
}

/// `DELETE /session/{id}`: best-effort backend delete, then unconditional
/// registry teardown.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HubError> {
    let Some((service_url, ..)) = state.registry.touch(&id) else {
        return Err(HubError::NotFound);
    };

    if let Err(err) = state
        .http
        .delete(format!("{service_url}/session"))
        .timeout(BACKEND_DELETE_TIMEOUT)
        .send()
        .await
    {
        tracing::warn!(session_id = %id, error = %err, "backend delete failed, tearing down anyway");
    }

    if state.registry.delete(&id).await {
        Ok(Json(DeleteSessionResponse {
            message: "session deleted".to_string(),
        })
        .into_response())
    } else {
        Err(HubError::Internal(anyhow::anyhow!(
            "session vanished between lookup and delete"
        )))
    }
}

/// `{GET,POST,PUT,DELETE,PATCH} /session/{id}/{tail}`: dispatch to the
/// reverse proxy once the session is known to exist.
pub async fn proxy_session(
    State(state): State<AppState>,
    Path((id, tail)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HubError> {
    let (base_url, ..) = state.registry.touch(&id).ok_or(HubError::NotFound)?;
    Ok(proxy::forward(&state.http, &base_url, &tail, method, headers, body).await)
}
