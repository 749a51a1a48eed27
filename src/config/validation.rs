//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, key length)
//! - Check auth mode settings are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{AuthConfig, RelayConfig, ADMIN_KEY_PLACEHOLDER};

/// Valid range for generated tunnel key lengths.
pub const KEY_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=32;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("password mode requires a non-empty secret")]
    EmptyPassword,

    #[error("delegated auth base_url `{0}` is not an absolute http(s) URL")]
    InvalidAuthUrl(String),

    #[error("delegated auth requires a bearer secret")]
    EmptyBearerSecret,

    #[error("tunnel key_length {0} outside 4..=32")]
    KeyLength(usize),

    #[error("admin api_key must be changed when the admin API is enabled")]
    AdminKeyPlaceholder,

    #[error("password and delegated auth are mutually exclusive")]
    ConflictingAuthModes,
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_body_bytes"));
    }

    if config.timeouts.reply_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.reply_secs"));
    }
    if config.timeouts.authorize_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.authorize_secs"));
    }

    if !KEY_LENGTH_RANGE.contains(&config.tunnel.key_length) {
        errors.push(ValidationError::KeyLength(config.tunnel.key_length));
    }
    if config.tunnel.outbound_buffer == 0 {
        errors.push(ValidationError::ZeroValue("tunnel.outbound_buffer"));
    }

    match &config.auth {
        AuthConfig::Open => {}
        AuthConfig::Password { secret } => {
            if secret.is_empty() {
                errors.push(ValidationError::EmptyPassword);
            }
        }
        AuthConfig::Delegated(delegated) => {
            let usable = Url::parse(&delegated.base_url)
                .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
                .unwrap_or(false);
            if !usable {
                errors.push(ValidationError::InvalidAuthUrl(delegated.base_url.clone()));
            }
            if delegated.bearer_secret.is_empty() {
                errors.push(ValidationError::EmptyBearerSecret);
            }
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::AdminKeyPlaceholder);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
