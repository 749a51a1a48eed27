//! Error taxonomy for tunnel operations.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::protocol::{ProtocolError, TunnelKey};

/// Errors raised while serving a tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Handshake failed; the control connection is closed unregistered.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// No correlated reply arrived in time.
    #[error("no reply within {} seconds", .0.as_secs())]
    RequestTimeout(Duration),

    /// The control connection can no longer accept frames.
    #[error("control connection closed")]
    ConnectionClosed,

    /// A reply arrived but its payload could not be used.
    #[error("malformed reply: {0}")]
    MalformedReply(#[from] ProtocolError),

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// Tunnel key is already registered.
    #[error("tunnel key {0} already registered")]
    KeyTaken(TunnelKey),
}

/// Result type for tunnel operations.
pub type TunnelResult<T> = Result<T, TunnelError>;

impl TunnelError {
    /// Status written by the listener when a forwarded request goes unanswered.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RequestTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::AuthRejected(_) => StatusCode::UNAUTHORIZED,
            Self::ConnectionClosed | Self::MalformedReply(_) | Self::KeyTaken(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for TunnelError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
