//! Session loop for one control socket.
//!
//! # Responsibilities
//! - Own the socket: a writer task drains the link's outbound queue
//! - Drive the handshake while still reading frames, so challenge replies
//!   reach the correlator
//! - Dispatch decoded frames: replies to the correlator, socket frames to
//!   the multiplexer
//! - Tear down: unregister the tunnel and close its proxied sockets

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::observability::metrics;
use crate::protocol::Inbound;
use crate::relay::Relay;
use crate::tunnel::connection::{ControlConnection, ControlLink};

/// Time the writer gets to flush queued frames after the session ends.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Serve an accepted control socket until it closes.
pub async fn serve_control(relay: Arc<Relay>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(relay.settings().outbound_buffer.max(1));

    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let link = Arc::new(ControlLink::new(tx, relay.settings().reply_timeout));
    debug!(link = %link.id(), "Control connection accepted");

    let registered = match pump(&relay, &link, &mut stream).await {
        Some(conn) => {
            relay.registry().unregister(conn.key());
            Some(conn)
        }
        // The handshake may have registered just before the socket dropped.
        None => relay.registry().unregister_link(link.id()),
    };
    if let Some(conn) = registered {
        relay.multiplexer().close_all(&conn);
        info!(
            key = %conn.key(),
            link = %link.id(),
            connected_secs = conn.connected_for().as_secs(),
            "Control connection closed"
        );
    }

    link.close();
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Read frames until the socket closes or the handshake fails.
///
/// Returns the registered connection, if the handshake completed.
async fn pump(
    relay: &Relay,
    link: &Arc<ControlLink>,
    stream: &mut SplitStream<WebSocket>,
) -> Option<Arc<ControlConnection>> {
    let negotiation = relay.negotiator().run(link, relay.registry());
    tokio::pin!(negotiation);
    let mut negotiating = true;
    let mut conn: Option<Arc<ControlConnection>> = None;

    loop {
        tokio::select! {
            outcome = &mut negotiation, if negotiating => {
                negotiating = false;
                match outcome {
                    Ok(registered) => conn = Some(registered),
                    Err(_) => return None,
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    dispatch(relay, link, conn.as_deref(), text.as_str())
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => dispatch(relay, link, conn.as_deref(), text),
                    Err(_) => {
                        warn!(link = %link.id(), "Ignoring non-UTF-8 control frame");
                        metrics::record_dropped_frame("malformed");
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(link = %link.id(), error = %e, "Control socket error");
                    break;
                }
            },
        }
    }
    conn
}

/// Route one decoded frame. Never fails: bad frames are logged and skipped.
fn dispatch(relay: &Relay, link: &ControlLink, conn: Option<&ControlConnection>, text: &str) {
    match Inbound::decode(text) {
        Ok(Inbound::Reply { req_id, data }) => {
            if !link.resolve(&req_id, data) {
                debug!(link = %link.id(), req_id = %req_id, "Dropping reply without pending request");
                metrics::record_dropped_frame("unknown_req_id");
            }
        }
        Ok(Inbound::Socket(frame)) => match conn {
            Some(conn) => relay.multiplexer().deliver(conn, frame),
            None => {
                debug!(link = %link.id(), ws_id = %frame.ws_id(), "Socket frame before registration");
                metrics::record_dropped_frame("unregistered");
            }
        },
        Err(e) => {
            warn!(link = %link.id(), error = %e, "Ignoring malformed control frame");
            metrics::record_dropped_frame("malformed");
        }
    }
}
