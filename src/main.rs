//! Reverse-tunnel relay.
//!
//! Tunnel clients behind NAT hold one WebSocket control connection each and
//! are addressed by a per-client subdomain. Public traffic for that
//! subdomain is forwarded over the control connection.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  TUNNEL RELAY                     │
//!   Public request    │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ──────────────────┼─▶│ ingress │──▶│ registry │──▶│  forwarder   │───┼──┐
//!                     │  │ router  │   └──────────┘   │  multiplexer │   │  │ control
//!                     │  └────┬────┘                  └──────┬───────┘   │  │ socket
//!                     │       │ new control socket            │           │  │
//!                     │       ▼                               ▼           │  │
//!                     │  ┌──────────┐                 ┌──────────────┐   │  │
//!                     │  │   auth   │────────────────▶│  correlator  │◀──┼──┘
//!                     │  │negotiator│                 └──────────────┘   │  Tunnel
//!                     │  └──────────┘                                     │  client
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tunnel_relay::admin::{setup_admin_router, AdminState};
use tunnel_relay::config::load_config;
use tunnel_relay::http::HttpServer;
use tunnel_relay::lifecycle::{shutdown_signal, Shutdown};
use tunnel_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "tunnel-relay")]
#[command(about = "Expose local HTTP servers through per-client subdomains", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the public bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tunnel-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        auth = config.auth.mode_name(),
        reply_timeout_secs = config.timeouts.reply_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(&config)?;
    let shutdown = Shutdown::new();

    if config.admin.enabled {
        let admin = setup_admin_router(AdminState {
            relay: server.relay(),
            api_key: config.admin.api_key.as_str().into(),
        });
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(admin_listener, admin)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
