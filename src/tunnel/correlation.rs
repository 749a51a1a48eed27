//! Request/reply correlation over a single control connection.
//!
//! Every correlated request gets a fresh `ReqId` and a pending slot holding a
//! oneshot resolver. The slot is consumed exactly once: by the matching reply
//! or by the timeout. A reply that finds no slot is dropped.

use std::future::Future;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{TunnelError, TunnelResult};
use crate::observability::metrics;
use crate::protocol::{Outbound, ReqId, RequestPayload};

/// Default time a correlated request waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Destination for outbound frames.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: Outbound) -> impl Future<Output = TunnelResult<()>> + Send;
}

/// An in-flight request awaiting its reply.
struct PendingRequest {
    resolver: oneshot::Sender<Value>,
    created: Instant,
}

/// Pending-request table for one control connection.
pub struct Correlator {
    pending: DashMap<ReqId, PendingRequest>,
    timeout: Duration,
}

impl Correlator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Send `payload` tagged with a fresh `ReqId` and wait for the reply's
    /// `data`, or fail with `RequestTimeout`.
    pub async fn await_reply<S: FrameSink>(
        &self,
        sink: &S,
        payload: RequestPayload,
    ) -> TunnelResult<Value> {
        let kind = payload.kind();
        let req_id = ReqId::generate();
        let (resolver, mut reply) = oneshot::channel();
        self.pending.insert(
            req_id.clone(),
            PendingRequest {
                resolver,
                created: Instant::now(),
            },
        );
        // Frees the slot if the caller is dropped mid-wait.
        let _slot = PendingSlot {
            correlator: self,
            req_id: &req_id,
        };

        sink.send_frame(Outbound::Request {
            req_id: req_id.clone(),
            payload,
        })
        .await?;

        match tokio::time::timeout(self.timeout, &mut reply).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => Err(TunnelError::ConnectionClosed),
            Err(_) => {
                if self.pending.remove(&req_id).is_none() {
                    // The reply claimed the slot as the timer fired.
                    if let Ok(data) = reply.try_recv() {
                        return Ok(data);
                    }
                }
                tracing::debug!(req_id = %req_id, kind, "Correlated request timed out");
                metrics::record_reply_timeout(kind);
                Err(TunnelError::RequestTimeout(self.timeout))
            }
        }
    }

    /// Hand a reply to its waiting request.
    ///
    /// Returns false when no request is waiting under `req_id`.
    pub fn resolve(&self, req_id: &ReqId, data: Value) -> bool {
        let Some((_, pending)) = self.pending.remove(req_id) else {
            return false;
        };
        tracing::trace!(
            req_id = %req_id,
            elapsed_ms = pending.created.elapsed().as_millis() as u64,
            "Reply matched"
        );
        pending.resolver.send(data).is_ok()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_TIMEOUT)
    }
}

struct PendingSlot<'a> {
    correlator: &'a Correlator,
    req_id: &'a ReqId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.correlator.pending.remove(self.req_id);
    }
}
