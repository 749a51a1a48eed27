//! Building the public response from a tunnel client's reply.
//!
//! # Design Decisions
//! - Reply headers are appended in order, so repeated names survive
//! - Hop-by-hop headers and `content-length` are dropped; the listener
//!   frames the body itself
//! - The body is written byte-for-byte

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tracing::debug;

use crate::error::TunnelResult;
use crate::protocol::{HttpReply, ProtocolError};

/// Headers that describe one hop and are never relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Turn a decoded reply into a response.
pub fn build_response(reply: HttpReply) -> TunnelResult<Response> {
    let status =
        StatusCode::from_u16(reply.status).map_err(|_| ProtocolError::MissingField("status"))?;

    let mut response = Response::new(Body::from(reply.body.into_inner()));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in reply.headers {
        if is_hop_by_hop(&name) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            debug!(header = %name, "Skipping invalid reply header name");
            continue;
        };
        for value in header_values(value) {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.append(name.clone(), value);
                }
                Err(_) => debug!(header = %name, "Skipping invalid reply header value"),
            }
        }
    }
    Ok(response)
}

/// A header value may be a string, a scalar, or a list of either.
fn header_values(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().flat_map(header_values).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}
