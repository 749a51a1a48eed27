//! Tunnel protocol engine.
//!
//! # Data Flow
//! ```text
//! Control socket accepted (control.rs)
//!     → ControlLink: outbound queue + correlator (connection.rs, correlation.rs)
//!     → AuthNegotiator handshake (crate::auth)
//!     → TunnelRegistry::register under a fresh key (registry.rs)
//!     → frames dispatched: replies → correlator, socket frames → multiplex.rs
//!     → socket closes: unregister, close every proxied socket
//! ```
//!
//! # Design Decisions
//! - One task per control socket; frames are handled in arrival order
//! - Correlation is by id, so replies may arrive in any order
//! - Pending requests of a closed connection run to their own timeout

pub mod connection;
pub mod control;
pub mod correlation;
pub mod multiplex;
pub mod registry;

pub use connection::{ControlConnection, ControlLink, LinkId};
pub use control::serve_control;
pub use correlation::{Correlator, FrameSink, DEFAULT_REPLY_TIMEOUT};
pub use multiplex::{Multiplexer, SocketCommand};
pub use registry::TunnelRegistry;
