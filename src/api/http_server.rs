//! Router assembly: wires every gateway endpoint onto shared state.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

#[must_use]
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/health", get(handlers::health))
        .route("/sessions", get(handlers::list_sessions))
        .route("/session", post(handlers::create_session))
        .route("/session/:id", delete(handlers::delete_session))
        .route("/session/:id/info", get(handlers::session_info))
        .route(
            "/session/:id/*tail",
            get(handlers::proxy_session)
                .post(handlers::proxy_session)
                .put(handlers::proxy_session)
                .delete(handlers::proxy_session)
                .patch(handlers::proxy_session),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
