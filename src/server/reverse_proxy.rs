//! Forwarding of unmatched requests to the configured target host

use crate::server::AppState;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

/// Largest request body forwarded upstream
const MAX_FORWARD_BODY: usize = 16 * 1024 * 1024;

/// Hop-by-hop headers that never cross the proxy
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
];

/// Upstream URL for a request. A target without a scheme is reached over
/// HTTPS.
pub fn target_url(target: &str, uri: &Uri) -> String {
    let base = if target.starts_with("http://") || target.starts_with("https://") {
        target.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", target.trim_end_matches('/'))
    };
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}{}", base, path)
}

/// Host header sent upstream
fn target_host(target: &str) -> &str {
    let host = target
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    host.split('/').next().unwrap_or(host)
}

fn bad_gateway(message: String) -> Response {
    error!("{}", message);
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

/// Forward the request as is, with the Host header rewritten
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    let target = state.config.reverse_proxy_target.as_str();
    let (parts, body) = request.into_parts();
    let url = target_url(target, &parts.uri);
    debug!("Forwarding {} {} to {}", parts.method, parts.uri, url);

    let body = match to_bytes(body, MAX_FORWARD_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => return bad_gateway(format!("Reverse proxy error: {}", e)),
    };

    let method = match reqwest::Method::from_bytes(parts.method.as_str().as_bytes()) {
        Ok(method) => method,
        Err(e) => return bad_gateway(format!("Reverse proxy error: {}", e)),
    };

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        if name == header::HOST || HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }
    if let Ok(host) = reqwest::header::HeaderValue::from_str(target_host(target)) {
        headers.insert(reqwest::header::HOST, host);
    }

    let upstream = state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body.to_vec())
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) => return bad_gateway(format!("Reverse proxy error: {}", e)),
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let upstream_headers = upstream.headers().clone();
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return bad_gateway(format!("Reverse proxy error: {}", e)),
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    for (name, value) in upstream_headers.iter() {
        let name = name.as_str();
        if HOP_BY_HOP.contains(&name) || name == "content-length" {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response.headers_mut().append(name, value);
        }
    }
    response
}
