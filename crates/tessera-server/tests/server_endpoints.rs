use std::{net::SocketAddr, sync::Arc};

use serde_json::Value;
use tessera_server::{AppConfig, bootstrap, build_app};
use tokio::task::JoinHandle;

fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.secure_cookies = false;
    cfg.auth.signing.allow_ephemeral_key = true;
    cfg.auth.signing.algorithm = "ES384".into();
    cfg.auth.hashing.memory_kib = 64;
    cfg.auth.hashing.iterations = 1;
    cfg.auth.anomaly.enabled = false;
    cfg
}

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let cfg = test_config();
    let engine = bootstrap::build_engine(&cfg).await.expect("build engine");
    let app = build_app(&cfg, Arc::new(engine));

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = rx.await;
        })
        .await;
    });

    (format!("http://{addr}"), tx, server)
}

async fn create_pair(client: &reqwest::Client, base: &str, identity: &str) -> (String, String) {
    let resp = client
        .post(format!("{base}/auth/tokens/{identity}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn healthz_and_request_id() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // Incoming request id is echoed back
    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-42");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn token_lifecycle_over_http() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let identity = uuid::Uuid::new_v4().to_string();

    let (access, refresh) = create_pair(&client, &base, &identity).await;

    // Identify with the fresh access token
    let resp = client
        .get(format!("{base}/auth/identity"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["identity"], identity.as_str());

    // Refresh rotates the pair
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .bearer_auth(&access)
        .header("x-refresh-token", &refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let access2 = body["access_token"].as_str().unwrap().to_string();
    assert_ne!(access2, access);

    // Replaying the redeemed pair is rejected
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .bearer_auth(&access)
        .header("x-refresh-token", &refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(resp.headers().contains_key("www-authenticate"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "refresh_mismatch");

    // The superseded access token no longer identifies
    let resp = client
        .get(format!("{base}/auth/identity"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Revoke, then the current access token stops working too
    let resp = client
        .delete(format!("{base}/auth/tokens"))
        .bearer_auth(&access2)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{base}/auth/identity"))
        .bearer_auth(&access2)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "revoked_token");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn cookies_are_set_and_accepted() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let identity = uuid::Uuid::new_v4().to_string();

    let resp = client
        .post(format!("{base}/auth/tokens/{identity}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let cookies: Vec<String> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/auth"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    let cookie_header = cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .collect::<Vec<_>>()
        .join("; ");

    // Cookies alone are enough for identify and refresh
    let resp = client
        .get(format!("{base}/auth/identity"))
        .header("cookie", &cookie_header)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{base}/auth/refresh"))
        .header("cookie", &cookie_header)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn device_change_revokes_session() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let identity = uuid::Uuid::new_v4().to_string();

    let resp = client
        .post(format!("{base}/auth/tokens/{identity}"))
        .header("user-agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{base}/auth/refresh"))
        .header("user-agent", "curl/8.5.0")
        .bearer_auth(&access)
        .header("x-refresh-token", &refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "device_mismatch");

    // Even the original device cannot use the pair anymore
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .header("user-agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
        .bearer_auth(&access)
        .header("x-refresh-token", &refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/auth/tokens/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let resp = client
        .get(format!("{base}/auth/identity"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let identity = uuid::Uuid::new_v4().to_string();
    let (access, _) = create_pair(&client, &base, &identity).await;
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .bearer_auth(&access)
        .header("x-refresh-token", "garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "malformed_token");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
