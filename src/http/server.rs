//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the ingress fallback handler
//! - Wire up middleware (request id, tracing, body limit)
//! - Bind server to listener
//! - Stop accepting on shutdown

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthError;
use crate::config::RelayConfig;
use crate::http::ingress::ingress_handler;
use crate::http::landing::DefaultPage;
use crate::relay::Relay;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub landing: Arc<DefaultPage>,
}

/// Public listener of the relay.
pub struct HttpServer {
    router: Router,
    relay: Arc<Relay>,
}

impl HttpServer {
    /// Create a server with a fresh relay built from `config`.
    pub fn new(config: &RelayConfig) -> Result<Self, AuthError> {
        let relay = Arc::new(Relay::from_config(config)?);
        Ok(Self::with_relay(relay, DefaultPage::from_config(&config.landing)))
    }

    /// Create a server around an existing relay.
    pub fn with_relay(relay: Arc<Relay>, landing: DefaultPage) -> Self {
        let state = AppState {
            relay: relay.clone(),
            landing: Arc::new(landing),
        };
        let router = Self::build_router(state);
        Self { router, relay }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let max_body_bytes = state.relay.settings().max_body_bytes;
        Router::new()
            .fallback(ingress_handler)
            .with_state(state)
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Shared relay state, for the admin API.
    pub fn relay(&self) -> Arc<Relay> {
        self.relay.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            auth = self.relay.negotiator().mode_name(),
            "Relay listener starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Relay listener draining");
            })
            .await?;

        tracing::info!("Relay listener stopped");
        Ok(())
    }
}
