//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host, Upgrade headers)
//!     → matcher.rs (routing key = first Host label, upgrade detection)
//!     → router.rs (registry lookup)
//!     → Route: Tunnel | ProxiedSocket | NewControl | Fallthrough
//! ```
//!
//! # Design Decisions
//! - Keys are compared as received (no case folding)
//! - An unmatched plain request is not an error; it falls through unchanged
//! - An unmatched upgrade is a new tunnel client

pub mod matcher;
pub mod router;

pub use matcher::{is_websocket_upgrade, request_host, routing_key};
pub use router::{resolve, Route};
