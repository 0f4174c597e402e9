//! Shared state threaded through every HTTP handler.

use std::sync::Arc;
use std::time::Duration;

use crate::core::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub http: reqwest::Client,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            http: reqwest::Client::new(),
        }
    }
}

/// Timeout for the backend's own `POST /session`, per the gateway's
/// create choreography.
pub const BACKEND_CREATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for the best-effort `DELETE /session` sent to a backend before
/// the registry tears it down.
pub const BACKEND_DELETE_TIMEOUT: Duration = Duration::from_secs(30);
