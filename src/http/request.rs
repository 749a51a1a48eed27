//! Inbound request inspection.
//!
//! # Responsibilities
//! - Read the request id assigned by the request-id layer
//! - Flatten request headers into the forwarded JSON object
//! - Extract the URL (path and query) the tunnel client sees

use axum::http::{HeaderMap, Uri};
use serde_json::{Map, Value};

/// Header carrying the per-request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request id set by the request-id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Headers as a JSON object of lower-case name to value. Repeated headers
/// are joined with `", "`.
pub fn headers_to_json(headers: &HeaderMap) -> Map<String, Value> {
    let mut object = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        object.insert(name.as_str().to_string(), Value::String(joined));
    }
    object
}

/// Path and query of the request, as the client sent them.
pub fn request_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
