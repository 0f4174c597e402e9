//! Session-affinity reverse proxy: forward a request to a session's
//! backend and relay its response verbatim.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};

const PROXY_TIMEOUT: Duration = Duration::from_secs(60);

/// Headers that must never be forwarded through the proxy (case-insensitive).
const HOP_BY_HOP: &[&str] = &["host", "content-length", "connection", "upgrade"];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h))
}

/// Forward `method`/`headers`/`body` to `base_url/session/<tail>` and relay
/// the backend's status, headers, and body back unmodified.
///
/// Transport failures (connection refused, timeout, read error) become a
/// 503; anything else unexpected becomes a 500 — the proxy never surfaces
/// its own error shape, since the caller is a test client expecting the
/// backend's own response format.
pub async fn forward(
    client: &reqwest::Client,
    base_url: &str,
    tail: &str,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = format!("{base_url}/session/{tail}");

    let reqwest_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut request = client.request(reqwest_method, &target).timeout(PROXY_TIMEOUT);
    for (name, value) in &headers {
        if is_hop_by_hop(name) {
            continue;
        }
        request = request.header(name.as_str(), value.as_bytes());
    }
    request = request.body(body);

    match request.send().await {
        Ok(resp) => relay(resp).await,
        Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
            tracing::warn!(error = %err, target, "proxy transport error");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, target, "unexpected proxy error");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn relay(resp: reqwest::Response) -> Response {
    let status = resp.status();
    let mut headers = HeaderMap::new();
    for (name, value) in resp.headers() {
        headers.insert(name.clone(), value.clone());
    }

    let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };

    (status, headers, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn forwards_method_and_relays_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = forward(
            &client,
            &server.uri(),
            "status",
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn strips_hop_by_hop_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/status"))
            .and(header_exists("x-session-token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("host", "example.com".parse().unwrap());
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("x-session-token", "abc".parse().unwrap());

        let client = reqwest::Client::new();
        let resp = forward(
            &client,
            &server.uri(),
            "status",
            Method::GET,
            headers,
            Bytes::new(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn transport_error_becomes_503() {
        let client = reqwest::Client::new();
        let resp = forward(
            &client,
            "http://127.0.0.1:1",
            "status",
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
