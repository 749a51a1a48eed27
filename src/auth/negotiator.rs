//! Handshake state machine for new control connections.
//!
//! # State Transitions
//! ```text
//! None → Authorized                         (open mode)
//! None → AwaitingCredential → Authorized    (credential accepted)
//! None → AwaitingCredential → Rejected      (mismatch, timeout, authorize failure)
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::delegated::{AuthError, DelegatedAuth};
use crate::auth::secret::constant_time_eq;
use crate::config::{AuthConfig, TimeoutConfig};
use crate::error::{TunnelError, TunnelResult};
use crate::observability::metrics;
use crate::protocol::{Challenge, Outbound, RequestPayload, TunnelKey};
use crate::tunnel::connection::{ControlConnection, ControlLink, LinkId};
use crate::tunnel::registry::TunnelRegistry;

/// Fresh keys drawn before giving up on a crowded key space.
const MAX_KEY_ATTEMPTS: usize = 8;

/// Progress of one control connection's handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    None,
    AwaitingCredential,
    Authorized,
    Rejected,
}

/// Tracks and logs the state of a single handshake.
struct Handshake {
    link: LinkId,
    state: AuthState,
}

impl Handshake {
    fn new(link: LinkId) -> Self {
        Self {
            link,
            state: AuthState::None,
        }
    }

    fn advance(&mut self, next: AuthState) {
        debug!(link = %self.link, from = ?self.state, to = ?next, "Handshake state change");
        self.state = next;
    }
}

enum AuthMode {
    Open,
    Password { secret: String },
    Delegated(DelegatedAuth),
}

/// Runs the configured handshake and registers authorized connections.
pub struct AuthNegotiator {
    mode: AuthMode,
    key_length: usize,
}

impl AuthNegotiator {
    pub fn from_config(
        auth: &AuthConfig,
        timeouts: &TimeoutConfig,
        key_length: usize,
    ) -> Result<Self, AuthError> {
        let mode = match auth {
            AuthConfig::Open => AuthMode::Open,
            AuthConfig::Password { secret } => AuthMode::Password {
                secret: secret.clone(),
            },
            AuthConfig::Delegated(delegated) => {
                AuthMode::Delegated(DelegatedAuth::new(delegated, timeouts.authorize())?)
            }
        };
        Ok(Self { mode, key_length })
    }

    pub fn open(key_length: usize) -> Self {
        Self {
            mode: AuthMode::Open,
            key_length,
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            AuthMode::Open => "open",
            AuthMode::Password { .. } => "password",
            AuthMode::Delegated(_) => "delegated",
        }
    }

    /// Authenticate `link`, then register it under a fresh key and confirm
    /// the key to the client.
    ///
    /// On `Err` the caller closes the socket; nothing was registered.
    pub async fn run(
        &self,
        link: &Arc<ControlLink>,
        registry: &TunnelRegistry,
    ) -> TunnelResult<Arc<ControlConnection>> {
        let mut handshake = Handshake::new(link.id());

        if let Err(e) = self.authenticate(link, &mut handshake).await {
            handshake.advance(AuthState::Rejected);
            metrics::record_auth(self.mode_name(), "rejected");
            info!(link = %link.id(), mode = self.mode_name(), reason = %e, "Control connection rejected");
            return Err(e);
        }
        handshake.advance(AuthState::Authorized);
        metrics::record_auth(self.mode_name(), "authorized");

        let key_length = self.key_length;
        let conn = admit(link, registry, || TunnelKey::generate(key_length))?;

        let confirmed = conn
            .send(Outbound::Registered {
                hash: conn.key().clone(),
            })
            .await;
        if let Err(e) = confirmed {
            registry.unregister(conn.key());
            return Err(e);
        }
        Ok(conn)
    }

    async fn authenticate(&self, link: &ControlLink, handshake: &mut Handshake) -> TunnelResult<()> {
        match &self.mode {
            AuthMode::Open => Ok(()),
            AuthMode::Password { secret } => {
                handshake.advance(AuthState::AwaitingCredential);
                let reply = link
                    .request(RequestPayload::Challenge(Challenge::Password))
                    .await
                    .map_err(rejection)?;
                match reply.as_str() {
                    Some(candidate) if constant_time_eq(candidate.as_bytes(), secret.as_bytes()) => {
                        Ok(())
                    }
                    _ => Err(TunnelError::AuthRejected("password mismatch".into())),
                }
            }
            AuthMode::Delegated(delegated) => {
                let share_id = uuid::Uuid::new_v4().simple().to_string();
                let login_url = delegated.login_url(&share_id).map_err(auth_failure)?;
                let validate_url = delegated.validate_url(&share_id).map_err(auth_failure)?;

                handshake.advance(AuthState::AwaitingCredential);
                let reply = link
                    .request(RequestPayload::Challenge(Challenge::Login {
                        login_url: login_url.into(),
                        validate_url: validate_url.into(),
                    }))
                    .await
                    .map_err(rejection)?;

                let token = match &reply {
                    Value::String(token) if !token.is_empty() => token,
                    _ => return Err(TunnelError::AuthRejected("missing login token".into())),
                };
                delegated.authorize(token).await.map_err(auth_failure)?;
                Ok(())
            }
        }
    }
}

/// Register `link` under the first free key `next_key` produces.
fn admit<F>(
    link: &Arc<ControlLink>,
    registry: &TunnelRegistry,
    mut next_key: F,
) -> TunnelResult<Arc<ControlConnection>>
where
    F: FnMut() -> TunnelKey,
{
    for _ in 0..MAX_KEY_ATTEMPTS {
        let conn = Arc::new(ControlConnection::new(next_key(), link.clone()));
        match registry.register(conn.clone()) {
            Ok(()) => return Ok(conn),
            Err(TunnelError::KeyTaken(key)) => {
                warn!(key = %key, link = %link.id(), "Tunnel key collision, drawing another")
            }
            Err(e) => return Err(e),
        }
    }
    Err(TunnelError::AuthRejected("no free tunnel key".into()))
}

fn rejection(e: TunnelError) -> TunnelError {
    if matches!(e, TunnelError::AuthRejected(_)) {
        return e;
    }
    TunnelError::AuthRejected(format!("no credential: {}", e))
}

fn auth_failure(e: AuthError) -> TunnelError {
    TunnelError::AuthRejected(e.to_string())
}
