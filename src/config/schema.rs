//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placeholder admin key; validation refuses it when the admin API is on.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the tunnel relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Public listener (bind address, body limits).
    pub listener: ListenerConfig,

    /// How new control connections authenticate.
    pub auth: AuthConfig,

    /// Correlation and outbound call deadlines.
    pub timeouts: TimeoutConfig,

    /// Tunnel identity and buffering.
    pub tunnel: TunnelConfig,

    /// Default page served for unmatched hosts.
    pub landing: LandingConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Management API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body buffered for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Authentication mode for new control connections.
///
/// Exactly one mode is active per process.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AuthConfig {
    /// Every control connection is accepted.
    #[default]
    Open,

    /// Clients must answer a challenge with the shared secret.
    Password { secret: String },

    /// Clients log in through an external service which the relay asks to
    /// authorize the resulting token.
    Delegated(DelegatedAuthConfig),
}

impl AuthConfig {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Password { .. } => "password",
            Self::Delegated(_) => "delegated",
        }
    }
}

/// Endpoints of the external login service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DelegatedAuthConfig {
    /// Base URL of the login service (e.g., "https://auth.example.com").
    pub base_url: String,

    /// Suffix appended to the base URL for the human login page.
    #[serde(default)]
    pub login_path: String,

    /// Suffix for the endpoint the tunnel client polls for its login token.
    #[serde(default = "default_validate_path")]
    pub validate_path: String,

    /// Suffix for the server-to-server authorize call.
    #[serde(default = "default_authorize_path")]
    pub authorize_path: String,

    /// Bearer secret presented on the authorize call.
    pub bearer_secret: String,
}

fn default_validate_path() -> String {
    "/validate".to_string()
}

fn default_authorize_path() -> String {
    "/authorize".to_string()
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a correlated request waits for its reply, in seconds.
    pub reply_secs: u64,

    /// Deadline for the delegated authorize call, in seconds.
    pub authorize_secs: u64,
}

impl TimeoutConfig {
    pub fn reply(&self) -> Duration {
        Duration::from_secs(self.reply_secs)
    }

    pub fn authorize(&self) -> Duration {
        Duration::from_secs(self.authorize_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            reply_secs: 30,
            authorize_secs: 10,
        }
    }
}

/// Tunnel identity and buffering.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Length of generated tunnel keys.
    pub key_length: usize,

    /// Frames queued per control connection before senders wait.
    pub outbound_buffer: usize,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            key_length: 8,
            outbound_buffer: 256,
        }
    }
}

/// Default page configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LandingConfig {
    /// Page title.
    pub title: String,

    /// HTML snippets injected into the root page body, in order.
    pub inject: Vec<String>,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            title: "Tunnel Relay".to_string(),
            inject: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
