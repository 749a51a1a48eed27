//! HTTP Forwarder: one inbound request, one correlated round trip.
//!
//! # Data Flow
//! ```text
//! Request → buffer body (bounded) → {reqId, headers, method, url, body}
//!     → tunnel client → {reqId, data: {status, headers, body}}
//!     → response.rs → Response
//! ```
//!
//! Bodies are buffered in full; nothing is streamed.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::FromRequest;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::error::{TunnelError, TunnelResult};
use crate::http::request::{headers_to_json, request_id, request_url};
use crate::http::response::build_response;
use crate::observability::metrics;
use crate::protocol::{BodyBytes, ForwardedRequest, HttpReply, RequestPayload};
use crate::tunnel::ControlConnection;

/// Forward `request` through `conn` and write back the reply.
///
/// When the round trip fails nothing comes from the tunnel client. The
/// response is the listener's own error mapping, `TunnelError`'s
/// `IntoResponse`: 504 when the reply timed out, 502 when the tunnel closed
/// or the reply was malformed, 413 when the body exceeds `max_body_bytes`.
pub async fn forward_request(
    conn: &ControlConnection,
    request: Request<Body>,
    max_body_bytes: usize,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = request_id(request.headers()).to_string();

    let response = match forward(conn, request, max_body_bytes).await {
        Ok(response) => response,
        Err(e) => {
            warn!(
                request_id = %request_id,
                key = %conn.key(),
                error = %e,
                "Forwarding failed"
            );
            e.into_response()
        }
    };
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

async fn forward(
    conn: &ControlConnection,
    request: Request<Body>,
    max_body_bytes: usize,
) -> TunnelResult<Response> {
    let (parts, body) = request.into_parts();
    let headers = headers_to_json(&parts.headers);
    let method = parts.method.to_string();
    let url = request_url(&parts.uri);

    let body = Bytes::from_request(Request::from_parts(parts, body), &())
        .await
        .map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                TunnelError::BodyTooLarge(max_body_bytes)
            } else {
                TunnelError::BodyRead(rejection.body_text())
            }
        })?;
    let payload = ForwardedRequest {
        headers,
        method,
        url,
        body: BodyBytes::from(body.to_vec()),
    };

    debug!(
        key = %conn.key(),
        method = %payload.method,
        url = %payload.url,
        body_len = payload.body.as_slice().len(),
        "Forwarding request"
    );

    let data = conn.request(RequestPayload::Http(payload)).await?;
    build_response(HttpReply::from_data(data)?)
}
