//! HTTP listener subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, body limit)
//!     → ingress.rs (routing key + upgrade detection)
//!         → Fallthrough:   landing.rs (default page)
//!         → Tunnel:        forward.rs (one correlated round trip)
//!         → ProxiedSocket: tunnel::multiplex
//!         → NewControl:    tunnel::control
//!     → response.rs (reply headers, status, body)
//!     → Send to client
//! ```

pub mod forward;
pub mod ingress;
pub mod landing;
pub mod request;
pub mod response;
pub mod server;

pub use landing::DefaultPage;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
