//! Admin API tests.

use serde_json::Value;
use tokio::net::TcpListener;

use tunnel_relay::admin::{setup_admin_router, AdminState};

mod common;
use common::TestRelay;

async fn start_admin(relay: &TestRelay) -> String {
    let app = setup_admin_router(AdminState {
        relay: relay.relay.clone(),
        api_key: "admin-key".into(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let relay = TestRelay::open().await;
    let admin = start_admin(&relay).await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let missing = client
        .get(format!("{admin}/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = client
        .get(format!("{admin}/admin/status"))
        .bearer_auth("nope")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    for partial in ["admin-ke", "admin-key2", "admin-keY"] {
        let response = client
            .get(format!("{admin}/admin/status"))
            .bearer_auth(partial)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401, "token {partial:?}");
    }

    let accepted = client
        .get(format!("{admin}/admin/status"))
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);
}

#[tokio::test]
async fn test_admin_reports_tunnels() {
    let relay = TestRelay::open().await;
    let admin = start_admin(&relay).await;
    let (mut client, key) = relay.register().await;

    let _public = relay
        .websocket(&format!("{key}.example.com"), "/live")
        .await;
    client.recv_json().await;
    assert!(relay.eventually(|r| r.multiplexer().len() == 1).await);

    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let status: Value = http
        .get(format!("{admin}/admin/status"))
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["tunnels"], 1);
    assert_eq!(status["proxied_sockets"], 1);

    let tunnels: Value = http
        .get(format!("{admin}/admin/tunnels"))
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tunnels = tunnels.as_array().unwrap();
    assert_eq!(tunnels.len(), 1);
    assert_eq!(tunnels[0]["key"], key.as_str());
    assert_eq!(tunnels[0]["proxied_sockets"], 1);
    assert_eq!(tunnels[0]["pending_requests"], 0);
}
