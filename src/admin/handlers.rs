use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tunnels: usize,
    pub proxied_sockets: usize,
}

#[derive(Debug, Serialize)]
pub struct TunnelStatus {
    pub key: String,
    pub proxied_sockets: usize,
    pub pending_requests: usize,
    pub connected_secs: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tunnels: state.relay.registry().len(),
        proxied_sockets: state.relay.multiplexer().len(),
    })
}

pub async fn get_tunnels(State(state): State<AdminState>) -> Json<Vec<TunnelStatus>> {
    let mut tunnels: Vec<TunnelStatus> = state
        .relay
        .registry()
        .connections()
        .into_iter()
        .map(|conn| TunnelStatus {
            key: conn.key().to_string(),
            proxied_sockets: conn.socket_count(),
            pending_requests: conn.link().pending_requests(),
            connected_secs: conn.connected_for().as_secs(),
        })
        .collect();
    tunnels.sort_by(|a, b| a.key.cmp(&b.key));

    Json(tunnels)
}
