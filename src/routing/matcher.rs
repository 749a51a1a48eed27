//! Request inspection for routing.

use axum::http::{header, HeaderMap, Uri};

/// The host a request was addressed to: the `Host` header, else the URI
/// authority.
pub fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
}

/// First DNS label of `host` (`ab12.example.com:8080` → `ab12`).
pub fn routing_key(host: &str) -> Option<&str> {
    let label = host.split(['.', ':']).next()?;
    (!label.is_empty()).then_some(label)
}

/// True for a WebSocket upgrade request.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_routing_key() {
        assert_eq!(routing_key("ab12cd.example.com"), Some("ab12cd"));
        assert_eq!(routing_key("ab12cd.example.com:8080"), Some("ab12cd"));
        assert_eq!(routing_key("localhost:8080"), Some("localhost"));
        assert_eq!(routing_key("AB12.example.com"), Some("AB12"));
        assert_eq!(routing_key(".example.com"), None);
        assert_eq!(routing_key(""), None);
    }

    #[test]
    fn test_request_host_prefers_header() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "http://other.example.com/path".parse().unwrap();
        assert_eq!(request_host(&headers, &uri), Some("other.example.com"));

        headers.insert(header::HOST, HeaderValue::from_static("ab12.example.com"));
        assert_eq!(request_host(&headers, &uri), Some("ab12.example.com"));

        let relative: Uri = "/path".parse().unwrap();
        assert_eq!(request_host(&HeaderMap::new(), &relative), None);
    }

    #[test]
    fn test_websocket_upgrade_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_websocket_upgrade(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_websocket_upgrade(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_websocket_upgrade(&headers));
    }
}
