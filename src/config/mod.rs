//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: RELAY_PASSWORD, RELAY_AUTH_URL, ...)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to the relay and the HTTP server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the auth mode is fixed for the process
//! - All fields have defaults so an empty file (or no file) is a valid open relay
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, DelegatedAuthConfig, LandingConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RelayConfig, TimeoutConfig, TunnelConfig,
};
