//! Public WebSocket multiplexing over control connections.
//!
//! # Data Flow
//! ```text
//! Public socket frame ──→ serve_public ──→ {ws, wsId, data} ──→ control socket
//! Control frame {ws, wsId, data} ──→ deliver ──→ SocketCommand ──→ public socket
//! Either side closes ──→ remove(wsId) ──→ close notice to the other side
//! ```
//!
//! # Design Decisions
//! - Each public socket is pumped by its own task which owns the socket
//! - The table holds only a command sender per socket
//! - Whoever removes the table entry first notifies the other side, so close
//!   handling is idempotent and never echoes

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{TunnelError, TunnelResult};
use crate::observability::metrics;
use crate::protocol::{Outbound, SocketData, SocketFrame, TunnelKey, WsId};
use crate::tunnel::connection::ControlConnection;

/// Instruction for the task pumping a public socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    Send(SocketData),
    Close,
}

/// Table entry for one proxied public socket.
struct ProxiedSocket {
    owner: TunnelKey,
    commands: mpsc::UnboundedSender<SocketCommand>,
}

/// Proxied socket table shared by every control connection.
#[derive(Default)]
pub struct Multiplexer {
    sockets: DashMap<WsId, ProxiedSocket>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open proxied sockets.
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn contains(&self, ws_id: &WsId) -> bool {
        self.sockets.contains_key(ws_id)
    }

    /// Record a new proxied socket and announce it to the tunnel client.
    ///
    /// The returned receiver yields what the client wants written to the
    /// public socket. Fails with `ConnectionClosed` once `close_all` has run
    /// for `conn`.
    pub async fn open(
        &self,
        conn: &ControlConnection,
        headers: Map<String, Value>,
        url: String,
    ) -> TunnelResult<(WsId, mpsc::UnboundedReceiver<SocketCommand>)> {
        let ws_id = WsId::generate();
        let (commands, rx) = mpsc::unbounded_channel();
        self.sockets.insert(
            ws_id.clone(),
            ProxiedSocket {
                owner: conn.key().clone(),
                commands,
            },
        );
        conn.attach_socket(ws_id.clone());
        metrics::record_socket_opened();

        // close_all may already have swept this connection.
        if conn.is_closed() {
            self.remove(conn, &ws_id);
            return Err(TunnelError::ConnectionClosed);
        }

        let announced = conn
            .send(Outbound::Socket(SocketFrame::Open {
                ws_id: ws_id.clone(),
                headers,
                url,
            }))
            .await;
        if let Err(e) = announced {
            self.remove(conn, &ws_id);
            return Err(e);
        }
        Ok((ws_id, rx))
    }

    /// Apply a socket frame received from `conn`'s tunnel client.
    ///
    /// Frames for unknown ids, or ids owned by another connection, are
    /// dropped.
    pub fn deliver(&self, conn: &ControlConnection, frame: SocketFrame) {
        match frame {
            SocketFrame::Data { ws_id, data } => {
                let delivered = match self.sockets.get(&ws_id) {
                    Some(socket) if socket.owner == *conn.key() => {
                        socket.commands.send(SocketCommand::Send(data)).is_ok()
                    }
                    _ => false,
                };
                if !delivered {
                    debug!(key = %conn.key(), ws_id = %ws_id, "Dropping data for unknown socket");
                    metrics::record_dropped_frame("unknown_ws_id");
                }
            }
            SocketFrame::Close { ws_id } => match self.remove(conn, &ws_id) {
                Some(socket) => {
                    debug!(key = %conn.key(), ws_id = %ws_id, "Client closed proxied socket");
                    let _ = socket.commands.send(SocketCommand::Close);
                }
                None => metrics::record_dropped_frame("unknown_ws_id"),
            },
            SocketFrame::Open { ws_id, .. } => {
                debug!(key = %conn.key(), ws_id = %ws_id, "Ignoring client-initiated socket open");
                metrics::record_dropped_frame("client_open");
            }
        }
    }

    /// Remove a socket owned by `conn`. Idempotent.
    fn remove(&self, conn: &ControlConnection, ws_id: &WsId) -> Option<ProxiedSocket> {
        let (_, socket) = self
            .sockets
            .remove_if(ws_id, |_, socket| socket.owner == *conn.key())?;
        conn.detach_socket(ws_id);
        metrics::record_socket_closed();
        Some(socket)
    }

    /// Close every proxied socket opened through `conn`.
    pub fn close_all(&self, conn: &ControlConnection) -> usize {
        conn.mark_closed();
        let mut closed = 0;
        for ws_id in conn.socket_ids() {
            if let Some(socket) = self.remove(conn, &ws_id) {
                let _ = socket.commands.send(SocketCommand::Close);
                closed += 1;
            }
        }
        if closed > 0 {
            info!(key = %conn.key(), closed, "Closed proxied sockets of departing tunnel");
        }
        closed
    }

    /// Pump one accepted public WebSocket until either side closes it.
    pub async fn serve_public(
        self: Arc<Self>,
        conn: Arc<ControlConnection>,
        socket: WebSocket,
        headers: Map<String, Value>,
        url: String,
    ) {
        let (ws_id, mut commands) = match self.open(&conn, headers, url).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(key = %conn.key(), error = %e, "Could not announce proxied socket");
                return;
            }
        };
        debug!(key = %conn.key(), ws_id = %ws_id, "Proxied socket opened");

        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                incoming = stream.next() => {
                    let data = match incoming {
                        Some(Ok(Message::Text(text))) => SocketData::Text(text.as_str().to_string()),
                        Some(Ok(Message::Binary(bytes))) => SocketData::Binary(bytes.to_vec()),
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            debug!(ws_id = %ws_id, error = %e, "Public socket error");
                            break;
                        }
                    };
                    let frame = Outbound::Socket(SocketFrame::Data { ws_id: ws_id.clone(), data });
                    if conn.send(frame).await.is_err() {
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(SocketCommand::Send(data)) => {
                        let message = match data {
                            SocketData::Text(text) => Message::Text(text.into()),
                            SocketData::Binary(bytes) => Message::Binary(bytes.into()),
                        };
                        if sink.send(message).await.is_err() {
                            break;
                        }
                    }
                    Some(SocketCommand::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
            }
        }

        if self.remove(&conn, &ws_id).is_some() {
            // The client may already be gone; nothing to do about it.
            let _ = conn
                .send(Outbound::Socket(SocketFrame::Close { ws_id: ws_id.clone() }))
                .await;
        }
        debug!(key = %conn.key(), ws_id = %ws_id, "Proxied socket closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::connection::tests::connection;

    fn frame_json(message: Message) -> Value {
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn open_announces_socket() {
        let mux = Multiplexer::new();
        let (conn, mut rx) = connection("ab12");

        let (ws_id, _commands) = mux
            .open(&conn, Map::new(), "/chat".to_string())
            .await
            .unwrap();

        assert!(mux.contains(&ws_id));
        assert_eq!(conn.socket_ids(), vec![ws_id.clone()]);

        let value = frame_json(rx.recv().await.unwrap());
        assert_eq!(value["ws"], Value::Bool(true));
        assert_eq!(value["wsId"], Value::from(ws_id.as_str()));
        assert_eq!(value["url"], Value::from("/chat"));
        assert!(value["headers"].is_object());
    }

    #[tokio::test]
    async fn data_is_routed_to_owning_socket_only() {
        let mux = Multiplexer::new();
        let (owner, _rx1) = connection("ab12");
        let (stranger, _rx2) = connection("zz99");

        let (ws_id, mut commands) = mux.open(&owner, Map::new(), "/".into()).await.unwrap();

        mux.deliver(
            &stranger,
            SocketFrame::Data {
                ws_id: ws_id.clone(),
                data: SocketData::Text("nope".into()),
            },
        );
        mux.deliver(
            &owner,
            SocketFrame::Data {
                ws_id: ws_id.clone(),
                data: SocketData::Text("hi".into()),
            },
        );

        assert_eq!(
            commands.recv().await,
            Some(SocketCommand::Send(SocketData::Text("hi".into())))
        );
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let mux = Multiplexer::new();
        let (conn, _rx) = connection("ab12");

        mux.deliver(
            &conn,
            SocketFrame::Data {
                ws_id: WsId::from("ghost"),
                data: SocketData::Text("hi".into()),
            },
        );
        mux.deliver(&conn, SocketFrame::Close { ws_id: WsId::from("ghost") });
        assert!(mux.is_empty());
    }

    #[tokio::test]
    async fn client_close_removes_mapping_once() {
        let mux = Multiplexer::new();
        let (conn, _rx) = connection("ab12");
        let (ws_id, mut commands) = mux.open(&conn, Map::new(), "/".into()).await.unwrap();

        mux.deliver(&conn, SocketFrame::Close { ws_id: ws_id.clone() });
        mux.deliver(&conn, SocketFrame::Close { ws_id: ws_id.clone() });

        assert!(!mux.contains(&ws_id));
        assert_eq!(conn.socket_count(), 0);
        assert_eq!(commands.recv().await, Some(SocketCommand::Close));
        assert_eq!(commands.recv().await, None);
    }

    #[tokio::test]
    async fn close_all_closes_every_owned_socket() {
        let mux = Multiplexer::new();
        let (conn, _rx) = connection("ab12");
        let (other, _rx2) = connection("zz99");

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (_, commands) = mux.open(&conn, Map::new(), "/".into()).await.unwrap();
            receivers.push(commands);
        }
        let (other_id, _other_commands) = mux.open(&other, Map::new(), "/".into()).await.unwrap();

        assert_eq!(mux.close_all(&conn), 3);
        assert_eq!(mux.len(), 1);
        assert!(mux.contains(&other_id));
        assert_eq!(conn.socket_count(), 0);

        for mut commands in receivers {
            assert_eq!(commands.recv().await, Some(SocketCommand::Close));
        }
        assert_eq!(mux.close_all(&conn), 0);
    }

    #[tokio::test]
    async fn open_on_closed_connection_leaves_no_entry() {
        let mux = Multiplexer::new();
        let (conn, rx) = connection("ab12");
        drop(rx);

        assert!(mux.open(&conn, Map::new(), "/".into()).await.is_err());
        assert!(mux.is_empty());
        assert_eq!(conn.socket_count(), 0);
    }

    #[tokio::test]
    async fn open_after_close_all_is_refused() {
        let mux = Multiplexer::new();
        let (conn, mut rx) = connection("ab12");

        assert_eq!(mux.close_all(&conn), 0);
        let result = mux.open(&conn, Map::new(), "/chat".into()).await;

        assert!(matches!(result, Err(TunnelError::ConnectionClosed)));
        assert!(mux.is_empty());
        assert_eq!(conn.socket_count(), 0);
        assert!(rx.try_recv().is_err());
    }
}
