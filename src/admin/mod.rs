//! Management API.
//!
//! Served on its own listener, disabled by default, behind a bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::relay::Relay;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub relay: Arc<Relay>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/tunnels", get(get_tunnels))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
