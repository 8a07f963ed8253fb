use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use sub_forge::server::{router, AppState};
use sub_forge::Config;
use tower::ServiceExt;

const LIST: &str = "\
1.1.1.1,80,ID,ProviderA
2.2.2.2,443,SG,ProviderB
3.3.3.3,8443,ID,ProviderC
";

/// Serve the proxy list and an echo endpoint on an ephemeral port
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/list.txt", get(|| async { LIST }))
        .fallback(|request: Request<Body>| async move {
            let host = request
                .headers()
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            format!("upstream {} {} host={}", request.method(), request.uri(), host)
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn app() -> (Router, SocketAddr) {
    let upstream = spawn_upstream().await;
    let config = Config::new()
        .with_proxy_list_url(format!("http://{}/list.txt", upstream))
        .with_reverse_proxy_target(format!("http://{}", upstream));
    (router(AppState::new(config).unwrap()), upstream)
}

async fn get_text(app: Router, uri: &str) -> (StatusCode, String, String) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "sub.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_v2ray_vless_subscription() {
    let (app, _) = app().await;
    let (status, content_type, body) =
        get_text(app, "/sub/v2ray?type=vless&cc=SG&limit=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/plain; charset=utf-8");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("vless://fccdaaae-af39-41a7-9fde-fd32a48278cf@sub.example.com:443?"));
    assert!(lines[0].contains("path=%2FFree%2F2.2.2.2-443"));
    assert!(lines[0].ends_with("%5B1%5D%20SG%20-%20ProviderB%20%5BVLESS-TLS%5D"));
}

#[tokio::test]
async fn test_mix_without_tls() {
    let (app, _) = app().await;
    let (status, _, body) = get_text(app, "/sub/v2rayng?tls=false&cc=id").await;

    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body.lines().collect();
    // two Indonesian records, four protocols each
    assert_eq!(lines.len(), 8);
    assert!(lines.iter().all(|l| !l.contains("sni=")));

    let vmess = lines
        .iter()
        .find(|l| l.starts_with("vmess://"))
        .unwrap()
        .trim_start_matches("vmess://");
    let json: serde_json::Value =
        serde_json::from_slice(&STANDARD.decode(vmess).unwrap()).unwrap();
    assert_eq!(json["port"], 80);
    assert_eq!(json["tls"], "");
    assert!(json.get("sni").is_none());
}

#[tokio::test]
async fn test_unknown_country_falls_back_to_all() {
    let (app, _) = app().await;
    let (status, _, body) = get_text(app, "/sub/husi?type=trojan&cc=XX").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.lines().count(), 3);
    assert!(body.lines().all(|l| l.starts_with("trojan://")));
}

#[tokio::test]
async fn test_wildcard_bug_hosts() {
    let (app, _) = app().await;
    let (_, _, body) = get_text(
        app,
        "/sub/v2ray?type=trojan&wildcard=true&bug=cdn,ava&cc=SG",
    )
    .await;

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("@cdn.sub.example.com:443?"));
    assert!(lines[1].contains("@ava.sub.example.com:443?"));
}

#[tokio::test]
async fn test_clash_subscription() {
    let (app, _) = app().await;
    let (status, _, body) = get_text(app, "/sub/clash?type=vmess&limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("# Clash Proxy Provider Configuration\n"));
    assert!(body.contains("# Protocol: VMESS\n"));
    assert!(body.contains("# TLS: Enabled\n"));

    let doc: serde_yaml::Value = serde_yaml::from_str(&body).unwrap();
    let proxies = doc["proxies"].as_sequence().unwrap();
    assert_eq!(proxies.len(), 2);
    assert_eq!(proxies[0]["type"], "vmess");
    assert_eq!(proxies[0]["server"], "sub.example.com");
}

#[tokio::test]
async fn test_nekobox_subscription() {
    let (app, _) = app().await;
    let (status, _, body) = get_text(app, "/sub/nekobox?type=shadowsocks&limit=1").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value =
        serde_json::from_str(body.strip_prefix("##Free##\n").unwrap()).unwrap();
    let outbounds = json["outbounds"].as_array().unwrap();
    assert_eq!(outbounds.len(), 7);
    assert_eq!(outbounds[2]["type"], "shadowsocks");
    assert_eq!(outbounds[2]["method"], "none");
}

#[tokio::test]
async fn test_limit_is_clamped() {
    let (app, _) = app().await;
    let (_, _, body) = get_text(app, "/sub/v2ray?type=vless&limit=0").await;
    assert_eq!(body.lines().count(), 1);
}

#[tokio::test]
async fn test_repeated_query_keys_use_first_value() {
    let (app, _) = app().await;
    let (status, _, body) = get_text(app, "/sub/v2ray?type=vless&cc=SG&cc=ID").await;

    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("2.2.2.2-443"));
}

#[tokio::test]
async fn test_invalid_type_is_bad_request() {
    let (app, _) = app().await;
    let (status, _, _) = get_text(app, "/sub/v2ray?type=socks5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_fetch_failure_is_bad_gateway() {
    let config = Config::new().with_proxy_list_url("http://127.0.0.1:9/list.txt".to_string());
    let app = router(AppState::new(config).unwrap());
    let (status, _, body) = get_text(app, "/sub/v2ray").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.starts_with("Proxy list fetch failed"));
}

#[tokio::test]
async fn test_pages() {
    let (app, _) = app().await;
    let (status, content_type, body) = get_text(app.clone(), "/sub").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/html; charset=utf-8");
    assert!(body.contains("<strong>sub.example.com</strong>"));

    let (status, _, body) = get_text(app, "/web").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("https://sub.example.com/sub/clash?"));
}

#[tokio::test]
async fn test_unmatched_paths_are_reverse_proxied() {
    let (app, upstream) = app().await;

    let (status, _, body) = get_text(app.clone(), "/anything/here?x=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        format!("upstream GET /anything/here?x=1 host={}", upstream)
    );

    // An unknown subscription format is forwarded too
    let (status, _, body) = get_text(app, "/sub/quantumult").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("upstream GET /sub/quantumult"));
}

#[tokio::test]
async fn test_reverse_proxy_failure_is_bad_gateway() {
    let config = Config::new().with_reverse_proxy_target("http://127.0.0.1:9".to_string());
    let app = router(AppState::new(config).unwrap());
    let (status, _, body) = get_text(app, "/elsewhere").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.starts_with("Reverse proxy error:"));
}
