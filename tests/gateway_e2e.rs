//! End-to-end gateway scenarios against an in-process hub and a wiremock
//! fake backend standing in for a real Appium process.

use std::sync::Arc;
use std::time::Duration;

use appium_hub::api::{build_router, AppState};
use appium_hub::core::{Backend, BackendFactory, PortRange, SessionRegistry};
use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Backend whose `base_url` points at a wiremock server instead of
/// spawning a real process.
struct WiremockBackend {
    base_url: String,
    port: u16,
}

#[async_trait]
impl Backend for WiremockBackend {
    async fn start(&self, _timeout: Duration) -> Result<(), appium_hub::error::HubError> {
        Ok(())
    }

    async fn stop(&self) {}

    async fn is_alive(&self) -> bool {
        true
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn log_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("appium_server_wiremock_{}.log", self.port))
    }
}

async fn app_with_backend(mock_server: &MockServer, max_sessions: usize) -> Router {
    let uri = mock_server.uri();
    let factory: BackendFactory = Arc::new(move |port, _id| {
        Arc::new(WiremockBackend {
            base_url: uri.clone(),
            port,
        }) as Arc<dyn Backend>
    });

    let range = PortRange::new(4723, 4724).unwrap();
    let registry = Arc::new(SessionRegistry::new(
        range,
        max_sessions,
        Duration::from_secs(1),
        factory,
    ));
    build_router(AppState::new(registry))
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scenario_happy_path_create_and_delete() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "abc"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let app = app_with_backend(&mock_server, 2).await;

    use tower::ServiceExt;
    let create_resp = app
        .clone()
        .oneshot(
            axum::http::Request::post("/session")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(
                    json!({"capabilities": {"platformName": "X"}}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create_resp.status(), axum::http::StatusCode::OK);
    let body = body_json(create_resp).await;
    let hub_session_id = body["hub_session_id"].as_str().unwrap().to_string();

    let delete_resp = app
        .clone()
        .oneshot(
            axum::http::Request::delete(format!("/session/{hub_session_id}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), axum::http::StatusCode::OK);

    let health_resp = app
        .oneshot(
            axum::http::Request::get("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let health = body_json(health_resp).await;
    assert_eq!(health["total_sessions"], 0);
    assert_eq!(health["available_ports"], 2);
}

#[tokio::test]
async fn scenario_port_exhaustion() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "abc"})))
        .mount(&mock_server)
        .await;

    let app = app_with_backend(&mock_server, 1).await;

    use tower::ServiceExt;
    let first = app
        .clone()
        .oneshot(
            axum::http::Request::post("/session")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json!({"capabilities": {}}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), axum::http::StatusCode::OK);

    let second = app
        .oneshot(
            axum::http::Request::post("/session")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json!({"capabilities": {}}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn scenario_compensation_on_backend_create_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let app = app_with_backend(&mock_server, 2).await;

    use tower::ServiceExt;
    let create_resp = app
        .clone()
        .oneshot(
            axum::http::Request::post("/session")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json!({"capabilities": {}}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create_resp.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

    let health_resp = app
        .oneshot(
            axum::http::Request::get("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let health = body_json(health_resp).await;
    assert_eq!(health["total_sessions"], 0);
    assert!(health["used_ports"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_unknown_session_proxy_is_404() {
    let mock_server = MockServer::start().await;
    let app = app_with_backend(&mock_server, 2).await;

    use tower::ServiceExt;
    let resp = app
        .oneshot(
            axum::http::Request::get("/session/deadbeef/status")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scenario_proxied_request_relays_backend_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "abc"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ready": true})))
        .mount(&mock_server)
        .await;

    let app = app_with_backend(&mock_server, 2).await;

    use tower::ServiceExt;
    let create_resp = app
        .clone()
        .oneshot(
            axum::http::Request::post("/session")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json!({"capabilities": {}}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(create_resp).await;
    let hub_session_id = body["hub_session_id"].as_str().unwrap();

    let proxied = app
        .oneshot(
            axum::http::Request::get(format!("/session/{hub_session_id}/status"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(proxied.status(), axum::http::StatusCode::OK);
}
