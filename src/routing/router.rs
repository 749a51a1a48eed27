//! Route decision for inbound requests.

use std::sync::Arc;

use crate::tunnel::{ControlConnection, TunnelRegistry};

/// Where an inbound request goes.
pub enum Route {
    /// Plain request for a registered tunnel: forward it.
    Tunnel(Arc<ControlConnection>),
    /// Upgrade for a registered tunnel: proxy the socket through it.
    ProxiedSocket(Arc<ControlConnection>),
    /// Upgrade for no tunnel: a new control connection.
    NewControl,
    /// Plain request for no tunnel: the default handler.
    Fallthrough,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tunnel(conn) => write!(f, "Tunnel({})", conn.key()),
            Self::ProxiedSocket(conn) => write!(f, "ProxiedSocket({})", conn.key()),
            Self::NewControl => f.write_str("NewControl"),
            Self::Fallthrough => f.write_str("Fallthrough"),
        }
    }
}

/// Decide the route for a request with routing key `key`.
pub fn resolve(registry: &TunnelRegistry, key: Option<&str>, upgrade: bool) -> Route {
    let conn = key.and_then(|key| registry.lookup(key));
    match (conn, upgrade) {
        (Some(conn), false) => Route::Tunnel(conn),
        (Some(conn), true) => Route::ProxiedSocket(conn),
        (None, true) => Route::NewControl,
        (None, false) => Route::Fallthrough,
    }
}
