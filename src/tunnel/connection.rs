//! Control connection handles.
//!
//! # Responsibilities
//! - `ControlLink`: outbound frame queue plus correlator for one control
//!   socket, usable from the first frame (handshake included)
//! - `ControlConnection`: an authorized link registered under a tunnel key,
//!   tracking the proxied sockets opened through it
//!
//! # Design Decisions
//! - The socket itself is owned by the session task; handles only hold the
//!   sending side of its outbound queue
//! - Proxied sockets are referenced by id, never owned, from here

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use dashmap::DashSet;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{TunnelError, TunnelResult};
use crate::protocol::{Outbound, ReqId, RequestPayload, TunnelKey, WsId};
use crate::tunnel::correlation::{Correlator, FrameSink};

/// Using relaxed ordering is sufficient since we only need uniqueness.
static LINK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a control socket, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    pub fn new() -> Self {
        Self(LINK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Sending half and correlation state of one control socket.
pub struct ControlLink {
    id: LinkId,
    tx: mpsc::Sender<Message>,
    correlator: Correlator,
}

impl ControlLink {
    pub fn new(tx: mpsc::Sender<Message>, reply_timeout: Duration) -> Self {
        Self {
            id: LinkId::new(),
            tx,
            correlator: Correlator::new(reply_timeout),
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Queue a frame for the client.
    pub async fn send(&self, frame: Outbound) -> TunnelResult<()> {
        self.tx
            .send(Message::Text(frame.encode().into()))
            .await
            .map_err(|_| TunnelError::ConnectionClosed)
    }

    /// Send a correlated request and wait for its reply.
    pub async fn request(&self, payload: RequestPayload) -> TunnelResult<Value> {
        self.correlator.await_reply(self, payload).await
    }

    /// Route a reply to its waiting request. False if nobody is waiting.
    pub fn resolve(&self, req_id: &ReqId, data: Value) -> bool {
        self.correlator.resolve(req_id, data)
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Ask the writer to send a close frame and stop.
    pub fn close(&self) {
        let _ = self.tx.try_send(Message::Close(None));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl FrameSink for ControlLink {
    async fn send_frame(&self, frame: Outbound) -> TunnelResult<()> {
        self.send(frame).await
    }
}

/// An authorized control connection registered under a tunnel key.
pub struct ControlConnection {
    key: TunnelKey,
    link: Arc<ControlLink>,
    sockets: DashSet<WsId>,
    closed: AtomicBool,
    connected_at: Instant,
}

impl ControlConnection {
    pub fn new(key: TunnelKey, link: Arc<ControlLink>) -> Self {
        Self {
            key,
            link,
            sockets: DashSet::new(),
            closed: AtomicBool::new(false),
            connected_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &TunnelKey {
        &self.key
    }

    pub fn link(&self) -> &Arc<ControlLink> {
        &self.link
    }

    pub async fn send(&self, frame: Outbound) -> TunnelResult<()> {
        self.link.send(frame).await
    }

    pub async fn request(&self, payload: RequestPayload) -> TunnelResult<Value> {
        self.link.request(payload).await
    }

    /// Refuse new proxied sockets from now on. Set before the departing
    /// connection's sockets are closed.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn attach_socket(&self, ws_id: WsId) {
        self.sockets.insert(ws_id);
    }

    pub(crate) fn detach_socket(&self, ws_id: &WsId) -> bool {
        self.sockets.remove(ws_id).is_some()
    }

    /// Ids of the proxied sockets currently open through this connection.
    pub fn socket_ids(&self) -> Vec<WsId> {
        self.sockets.iter().map(|id| id.key().clone()).collect()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
