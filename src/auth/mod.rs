//! Control connection authentication.
//!
//! # Data Flow
//! ```text
//! New control socket
//!     → negotiator.rs (challenge per configured mode, AuthState machine)
//!         Open       → authorized immediately
//!         Password   → {require: "password"} → compare secret
//!         Delegated  → {require: "login", loginURL, validateURL}
//!                      → token reply → delegated.rs (server-to-server authorize)
//!     → authorized: fresh tunnel key, registry insert, {hash} to client
//!     → rejected: socket closed, never registered
//! ```

pub mod delegated;
pub mod negotiator;
pub mod secret;

pub use delegated::{AuthError, DelegatedAuth};
pub use negotiator::{AuthNegotiator, AuthState};
pub use secret::constant_time_eq;
