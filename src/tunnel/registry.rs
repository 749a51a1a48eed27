//! Registry of authorized control connections keyed by tunnel key.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::{TunnelError, TunnelResult};
use crate::observability::metrics;
use crate::protocol::TunnelKey;
use crate::tunnel::connection::{ControlConnection, LinkId};

/// Thread-safe map from tunnel key to control connection.
#[derive(Default)]
pub struct TunnelRegistry {
    tunnels: DashMap<TunnelKey, Arc<ControlConnection>>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its key. An occupied key is refused.
    pub fn register(&self, conn: Arc<ControlConnection>) -> TunnelResult<()> {
        match self.tunnels.entry(conn.key().clone()) {
            Entry::Occupied(entry) => Err(TunnelError::KeyTaken(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(key = %conn.key(), link = %conn.link().id(), "Tunnel registered");
                entry.insert(conn);
                metrics::record_tunnel_registered();
                Ok(())
            }
        }
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<ControlConnection>> {
        self.tunnels.get(key).map(|entry| entry.value().clone())
    }

    /// Remove the connection registered under `key`.
    pub fn unregister(&self, key: &TunnelKey) -> Option<Arc<ControlConnection>> {
        let removed = self.tunnels.remove(key).map(|(_, conn)| conn);
        match &removed {
            Some(_) => {
                info!(key = %key, "Tunnel unregistered");
                metrics::record_tunnel_unregistered();
            }
            None => warn!(key = %key, "Tried to unregister unknown tunnel"),
        }
        removed
    }

    /// Remove whichever tunnel is served by `link`, if any.
    ///
    /// Used when a control socket drops before its session learned the key
    /// it was registered under.
    pub fn unregister_link(&self, link: LinkId) -> Option<Arc<ControlConnection>> {
        let key = self
            .tunnels
            .iter()
            .find(|entry| entry.value().link().id() == link)
            .map(|entry| entry.key().clone())?;
        let (_, conn) = self
            .tunnels
            .remove_if(&key, |_, conn| conn.link().id() == link)?;
        info!(key = %key, link = %link, "Tunnel unregistered");
        metrics::record_tunnel_unregistered();
        Some(conn)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tunnels.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    /// Snapshot of every registered connection.
    pub fn connections(&self) -> Vec<Arc<ControlConnection>> {
        self.tunnels.iter().map(|entry| entry.value().clone()).collect()
    }
}
