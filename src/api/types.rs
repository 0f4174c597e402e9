//! Request/response shapes for the gateway's HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SessionView;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub capabilities: Value,
    pub device_udid: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub hub_session_id: String,
    pub appium_session: Value,
    pub service_url: String,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub status: &'static str,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub total_sessions: usize,
    pub healthy_sessions: usize,
    pub unhealthy_sessions: Vec<String>,
    pub available_ports: usize,
    pub used_ports: Vec<u16>,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub message: String,
}
