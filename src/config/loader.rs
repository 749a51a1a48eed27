//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AuthConfig, DelegatedAuthConfig, RelayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply process environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RelayConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())
        .map_err(|e| ConfigError::Validation(vec![e]))?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay bootstrap environment variables onto `config`.
///
/// `RELAY_PASSWORD` selects password mode and `RELAY_AUTH_URL` selects
/// delegated mode; setting both is an error. Empty values count as unset.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(bind) = var("RELAY_BIND") {
        config.listener.bind_address = bind;
    }

    match (var("RELAY_PASSWORD"), var("RELAY_AUTH_URL")) {
        (Some(_), Some(_)) => return Err(ValidationError::ConflictingAuthModes),
        (Some(secret), None) => config.auth = AuthConfig::Password { secret },
        (None, Some(base_url)) => {
            let mut delegated = match &config.auth {
                AuthConfig::Delegated(existing) => existing.clone(),
                _ => DelegatedAuthConfig {
                    base_url: String::new(),
                    login_path: String::new(),
                    validate_path: "/validate".to_string(),
                    authorize_path: "/authorize".to_string(),
                    bearer_secret: String::new(),
                },
            };
            delegated.base_url = base_url;
            config.auth = AuthConfig::Delegated(delegated);
        }
        (None, None) => {}
    }

    if let AuthConfig::Delegated(delegated) = &mut config.auth {
        if let Some(path) = var("RELAY_AUTH_LOGIN_PATH") {
            delegated.login_path = path;
        }
        if let Some(path) = var("RELAY_AUTH_VALIDATE_PATH") {
            delegated.validate_path = path;
        }
        if let Some(path) = var("RELAY_AUTH_AUTHORIZE_PATH") {
            delegated.authorize_path = path;
        }
        if let Some(secret) = var("RELAY_AUTH_SECRET") {
            delegated.bearer_secret = secret;
        }
    }

    Ok(())
}
