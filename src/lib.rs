//! Reverse-tunnel relay library.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod protocol;
pub mod relay;
pub mod routing;
pub mod tunnel;

pub use config::RelayConfig;
pub use error::{TunnelError, TunnelResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{Relay, RelaySettings};
