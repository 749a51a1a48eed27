//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tunnel_relay::config::RelayConfig;
use tunnel_relay::http::HttpServer;
use tunnel_relay::lifecycle::Shutdown;
use tunnel_relay::relay::Relay;

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on any single wait in these tests.
pub const STEP: Duration = Duration::from_secs(5);

/// A relay serving on an ephemeral local port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub relay: Arc<Relay>,
    shutdown: Shutdown,
}

impl TestRelay {
    pub async fn start(config: RelayConfig) -> Self {
        let server = HttpServer::new(&config).unwrap();
        let relay = server.relay();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        tokio::spawn(server.run(listener, shutdown.subscribe()));
        Self {
            addr,
            relay,
            shutdown,
        }
    }

    pub async fn open() -> Self {
        Self::start(RelayConfig::default()).await
    }

    /// HTTP client that resolves `<key>.example.com` to this relay.
    pub fn public_client(&self, key: &str) -> reqwest::Client {
        reqwest::Client::builder()
            .resolve(&format!("{key}.example.com"), self.addr)
            .no_proxy()
            .build()
            .unwrap()
    }

    /// Public URL for `path` under tunnel `key`.
    pub fn public_url(&self, key: &str, path: &str) -> String {
        format!("http://{key}.example.com:{}{path}", self.addr.port())
    }

    /// Open a WebSocket to the relay with the given `Host` header.
    pub async fn websocket(&self, host: &str, path: &str) -> Socket {
        let mut request = format!("ws://{}{}", self.addr, path)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("host", HeaderValue::from_str(host).unwrap());
        let (socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        socket
    }

    /// Connect a tunnel client without completing any handshake.
    pub async fn connect_client(&self) -> TunnelClient {
        TunnelClient {
            socket: self.websocket("control.localhost", "/").await,
        }
    }

    /// Connect and register in open mode. Returns the client and its key.
    pub async fn register(&self) -> (TunnelClient, String) {
        let mut client = self.connect_client().await;
        let hash = client.recv_json().await;
        let key = hash["hash"].as_str().unwrap().to_string();
        (client, key)
    }

    /// Poll until `check` holds or `STEP` elapses.
    pub async fn eventually(&self, check: impl Fn(&Relay) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + STEP;
        while tokio::time::Instant::now() < deadline {
            if check(&self.relay) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check(&self.relay)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// The tunnel client side of a control connection.
pub struct TunnelClient {
    pub socket: Socket,
}

impl TunnelClient {
    pub async fn send_json(&mut self, value: Value) {
        self.socket
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.socket
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    /// Next JSON frame from the relay.
    pub async fn recv_json(&mut self) -> Value {
        next_text(&mut self.socket).await
    }

    /// Answer a correlated request.
    pub async fn reply(&mut self, request: &Value, data: Value) {
        let req_id = request["reqId"].clone();
        self.send_json(json!({ "reqId": req_id, "data": data })).await;
    }

    /// Wait for the relay to close the control connection.
    pub async fn expect_closed(&mut self) {
        expect_closed(&mut self.socket).await;
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// Next text frame on `socket`, parsed as JSON.
pub async fn next_text(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(STEP, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

/// Wait until `socket` is closed by the peer.
pub async fn expect_closed(socket: &mut Socket) {
    loop {
        let next = tokio::time::timeout(STEP, socket.next())
            .await
            .expect("timed out waiting for close");
        match next {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("unexpected frame before close {:?}", other),
        }
    }
}
