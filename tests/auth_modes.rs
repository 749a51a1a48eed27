//! Handshake tests for password and delegated authentication.

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;

use tunnel_relay::config::{AuthConfig, DelegatedAuthConfig, RelayConfig};

mod common;
use common::TestRelay;

fn password_config(secret: &str) -> RelayConfig {
    RelayConfig {
        auth: AuthConfig::Password {
            secret: secret.into(),
        },
        ..RelayConfig::default()
    }
}

#[tokio::test]
async fn test_password_accepted() {
    let relay = TestRelay::start(password_config("hunter2")).await;
    let mut client = relay.connect_client().await;

    let challenge = client.recv_json().await;
    assert_eq!(challenge["require"], "password");
    assert!(challenge["reqId"].is_string());

    client.reply(&challenge, json!("hunter2")).await;
    let registered = client.recv_json().await;
    let key = registered["hash"].as_str().unwrap();
    assert!(relay.relay.registry().contains(key));
    assert_eq!(relay.relay.registry().len(), 1);
}

#[tokio::test]
async fn test_wrong_password_closes_connection() {
    let relay = TestRelay::start(password_config("hunter2")).await;
    let mut client = relay.connect_client().await;

    let challenge = client.recv_json().await;
    client.reply(&challenge, json!("letmein")).await;

    client.expect_closed().await;
    assert!(relay.relay.registry().is_empty());
}

#[tokio::test]
async fn test_silent_client_is_closed_after_timeout() {
    let mut config = password_config("hunter2");
    config.timeouts.reply_secs = 1;
    let relay = TestRelay::start(config).await;
    let mut client = relay.connect_client().await;

    let challenge = client.recv_json().await;
    assert_eq!(challenge["require"], "password");

    client.expect_closed().await;
    assert!(relay.relay.registry().is_empty());
}

/// Login service whose authorize endpoint grants `good-token` only.
async fn start_login_service() -> String {
    async fn authorize(headers: HeaderMap, body: String) -> (StatusCode, &'static str) {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if bearer != Some("Bearer relay-secret") {
            return (StatusCode::UNAUTHORIZED, "");
        }
        match body.as_str() {
            "good-token" => (StatusCode::OK, "granted"),
            "empty-grant" => (StatusCode::OK, ""),
            _ => (StatusCode::FORBIDDEN, "denied"),
        }
    }

    let app = Router::new().route("/api/authorize", post(authorize));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn delegated_config(base_url: String) -> RelayConfig {
    RelayConfig {
        auth: AuthConfig::Delegated(DelegatedAuthConfig {
            base_url,
            login_path: "/login".into(),
            validate_path: "/api/validate".into(),
            authorize_path: "/api/authorize".into(),
            bearer_secret: "relay-secret".into(),
        }),
        ..RelayConfig::default()
    }
}

#[tokio::test]
async fn test_delegated_login_granted() {
    let base_url = start_login_service().await;
    let relay = TestRelay::start(delegated_config(base_url.clone())).await;
    let mut client = relay.connect_client().await;

    let challenge = client.recv_json().await;
    assert_eq!(challenge["require"], "login");
    let login_url = challenge["loginURL"].as_str().unwrap();
    let validate_url = challenge["validateURL"].as_str().unwrap();
    assert!(login_url.starts_with(&format!("{base_url}/login?shareId=")));
    assert!(validate_url.starts_with(&format!("{base_url}/api/validate?shareId=")));

    let share_id = login_url.split("shareId=").nth(1).unwrap();
    assert!(!share_id.is_empty());
    assert!(validate_url.ends_with(share_id));

    client.reply(&challenge, json!("good-token")).await;
    let registered = client.recv_json().await;
    assert!(relay
        .relay
        .registry()
        .contains(registered["hash"].as_str().unwrap()));
}

#[tokio::test]
async fn test_delegated_login_denied() {
    let base_url = start_login_service().await;
    let relay = TestRelay::start(delegated_config(base_url)).await;

    for token in [json!("bad-token"), json!("empty-grant"), json!(""), json!(7)] {
        let mut client = relay.connect_client().await;
        let challenge = client.recv_json().await;
        client.reply(&challenge, token).await;
        client.expect_closed().await;
    }
    assert!(relay.relay.registry().is_empty());
}

#[tokio::test]
async fn test_delegated_login_service_unreachable() {
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", unused.local_addr().unwrap());
    drop(unused);

    let relay = TestRelay::start(delegated_config(base_url)).await;
    let mut client = relay.connect_client().await;
    let challenge = client.recv_json().await;
    client.reply(&challenge, json!("good-token")).await;

    client.expect_closed().await;
    assert!(relay.relay.registry().is_empty());
}
