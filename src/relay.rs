//! Shared relay state handed to every connection handler.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthError, AuthNegotiator};
use crate::config::RelayConfig;
use crate::tunnel::correlation::DEFAULT_REPLY_TIMEOUT;
use crate::tunnel::{Multiplexer, TunnelRegistry};

/// Per-connection limits derived from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// How long a correlated request waits for its reply.
    pub reply_timeout: Duration,
    /// Frames queued per control connection before senders wait.
    pub outbound_buffer: usize,
    /// Largest request body buffered for forwarding.
    pub max_body_bytes: usize,
}

impl RelaySettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            reply_timeout: config.timeouts.reply(),
            outbound_buffer: config.tunnel.outbound_buffer,
            max_body_bytes: config.listener.max_body_bytes,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            outbound_buffer: 256,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Registry, multiplexer and negotiator of one relay process.
pub struct Relay {
    registry: TunnelRegistry,
    multiplexer: Arc<Multiplexer>,
    negotiator: AuthNegotiator,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(negotiator: AuthNegotiator, settings: RelaySettings) -> Self {
        Self {
            registry: TunnelRegistry::new(),
            multiplexer: Arc::new(Multiplexer::new()),
            negotiator,
            settings,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, AuthError> {
        let negotiator =
            AuthNegotiator::from_config(&config.auth, &config.timeouts, config.tunnel.key_length)?;
        Ok(Self::new(negotiator, RelaySettings::from_config(config)))
    }

    pub fn registry(&self) -> &TunnelRegistry {
        &self.registry
    }

    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.multiplexer
    }

    pub fn negotiator(&self) -> &AuthNegotiator {
        &self.negotiator
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    #[test]
    fn settings_follow_config() {
        let mut config = RelayConfig::default();
        config.timeouts.reply_secs = 5;
        config.tunnel.outbound_buffer = 16;

        let relay = Relay::from_config(&config).unwrap();
        assert_eq!(relay.settings().reply_timeout, Duration::from_secs(5));
        assert_eq!(relay.settings().outbound_buffer, 16);
        assert_eq!(relay.negotiator().mode_name(), "open");
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn password_mode_is_selected() {
        let mut config = RelayConfig::default();
        config.auth = AuthConfig::Password {
            secret: "s3cret".into(),
        };
        let relay = Relay::from_config(&config).unwrap();
        assert_eq!(relay.negotiator().mode_name(), "password");
    }
}
