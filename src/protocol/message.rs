//! Control connection frames.
//!
//! # Frames
//! | Direction | Shape |
//! |---|---|
//! | relay → client | `{reqId, require: "password"}` |
//! | relay → client | `{reqId, require: "login", loginURL, validateURL}` |
//! | relay → client | `{hash}` |
//! | relay → client | `{reqId, headers, method, url, body}` |
//! | client → relay | `{reqId, data}` |
//! | both ways      | `{ws: true, wsId, headers, url}` / `{.., data}` / `{.., close: true}` |

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::protocol::body::{BodyBytes, SocketData};
use crate::protocol::ids::{ReqId, TunnelKey, WsId};

/// Reasons a frame could not be decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),

    #[error("unrecognized frame shape")]
    Unrecognized,
}

/// A frame received from a tunnel client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to a correlated request.
    Reply { req_id: ReqId, data: Value },
    /// Multiplexed public socket traffic.
    Socket(SocketFrame),
}

impl Inbound {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        if obj.get("ws").and_then(Value::as_bool) == Some(true) {
            return SocketFrame::from_object(obj).map(Inbound::Socket);
        }

        match obj.remove("reqId") {
            Some(Value::String(req_id)) => Ok(Inbound::Reply {
                req_id: ReqId::from(req_id),
                data: obj.remove("data").unwrap_or(Value::Null),
            }),
            Some(_) => Err(ProtocolError::MissingField("reqId")),
            None => Err(ProtocolError::Unrecognized),
        }
    }
}

/// Traffic for one proxied public socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketFrame {
    Open {
        ws_id: WsId,
        headers: Map<String, Value>,
        url: String,
    },
    Data {
        ws_id: WsId,
        data: SocketData,
    },
    Close {
        ws_id: WsId,
    },
}

impl SocketFrame {
    pub fn ws_id(&self) -> &WsId {
        match self {
            Self::Open { ws_id, .. } | Self::Data { ws_id, .. } | Self::Close { ws_id } => ws_id,
        }
    }

    fn from_object(mut obj: Map<String, Value>) -> Result<Self, ProtocolError> {
        let ws_id = match obj.remove("wsId") {
            Some(Value::String(id)) => WsId::from(id),
            _ => return Err(ProtocolError::MissingField("wsId")),
        };

        if obj.get("close").and_then(Value::as_bool) == Some(true) {
            return Ok(Self::Close { ws_id });
        }
        if let Some(data) = obj.get("data") {
            return Ok(Self::Data {
                ws_id,
                data: SocketData::from_json(data),
            });
        }
        if let Some(Value::String(url)) = obj.remove("url") {
            let headers = match obj.remove("headers") {
                Some(Value::Object(headers)) => headers,
                _ => Map::new(),
            };
            return Ok(Self::Open { ws_id, headers, url });
        }
        Err(ProtocolError::Unrecognized)
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Open { ws_id, headers, url } => json!({
                "ws": true,
                "wsId": ws_id,
                "headers": headers,
                "url": url,
            }),
            Self::Data { ws_id, data } => json!({
                "ws": true,
                "wsId": ws_id,
                "data": data.to_json(),
            }),
            Self::Close { ws_id } => json!({
                "ws": true,
                "wsId": ws_id,
                "close": true,
            }),
        }
    }
}

/// Credential challenge sent during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Password,
    Login {
        login_url: String,
        validate_url: String,
    },
}

/// One buffered HTTP request forwarded to the tunnel client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardedRequest {
    pub headers: Map<String, Value>,
    pub method: String,
    pub url: String,
    pub body: BodyBytes,
}

/// Payloads that expect a correlated reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Challenge(Challenge),
    Http(ForwardedRequest),
}

impl RequestPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Challenge(Challenge::Password) => "password",
            Self::Challenge(Challenge::Login { .. }) => "login",
            Self::Http(_) => "http",
        }
    }
}

/// A frame sent to a tunnel client.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Request {
        req_id: ReqId,
        payload: RequestPayload,
    },
    Registered {
        hash: TunnelKey,
    },
    Socket(SocketFrame),
}

impl Outbound {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Request { req_id, payload } => {
                let mut value = match payload {
                    RequestPayload::Challenge(Challenge::Password) => {
                        json!({ "require": "password" })
                    }
                    RequestPayload::Challenge(Challenge::Login {
                        login_url,
                        validate_url,
                    }) => json!({
                        "require": "login",
                        "loginURL": login_url,
                        "validateURL": validate_url,
                    }),
                    RequestPayload::Http(request) => json!(request),
                };
                if let Value::Object(obj) = &mut value {
                    obj.insert("reqId".into(), json!(req_id));
                }
                value
            }
            Self::Registered { hash } => json!({ "hash": hash }),
            Self::Socket(frame) => frame.to_json(),
        }
    }

    /// Encode as the text of a WebSocket frame.
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }
}

/// The `data` of a reply to a forwarded HTTP request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpReply {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, Value)>,
    #[serde(default)]
    pub body: BodyBytes,
}

impl HttpReply {
    pub fn from_data(data: Value) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reply() {
        let frame = Inbound::decode(r#"{"reqId":"r1","data":"secret"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Reply {
                req_id: ReqId::from("r1"),
                data: json!("secret"),
            }
        );
    }

    #[test]
    fn socket_frames_are_not_mistaken_for_replies() {
        let frame = Inbound::decode(r#"{"ws":true,"wsId":"w1","data":"hi","reqId":"r1"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Socket(SocketFrame::Data {
                ws_id: WsId::from("w1"),
                data: SocketData::Text("hi".into()),
            })
        );
    }

    #[test]
    fn decodes_socket_close_and_open() {
        let close = Inbound::decode(r#"{"ws":true,"wsId":"w1","close":true}"#).unwrap();
        assert_eq!(
            close,
            Inbound::Socket(SocketFrame::Close { ws_id: WsId::from("w1") })
        );

        let open = Inbound::decode(r#"{"ws":true,"wsId":"w2","url":"/chat","headers":{}}"#).unwrap();
        assert!(matches!(open, Inbound::Socket(SocketFrame::Open { ref url, .. }) if url == "/chat"));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(Inbound::decode("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(Inbound::decode("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(
            Inbound::decode(r#"{"ws":true,"data":"x"}"#),
            Err(ProtocolError::MissingField("wsId"))
        ));
        assert!(matches!(Inbound::decode(r#"{"hello":1}"#), Err(ProtocolError::Unrecognized)));
    }

    #[test]
    fn encodes_challenges_with_req_id() {
        let password = Outbound::Request {
            req_id: ReqId::from("r1"),
            payload: RequestPayload::Challenge(Challenge::Password),
        };
        assert_eq!(password.to_json(), json!({"require": "password", "reqId": "r1"}));

        let login = Outbound::Request {
            req_id: ReqId::from("r2"),
            payload: RequestPayload::Challenge(Challenge::Login {
                login_url: "https://auth/login?shareId=s".into(),
                validate_url: "https://auth/validate?shareId=s".into(),
            }),
        };
        assert_eq!(
            login.to_json(),
            json!({
                "require": "login",
                "loginURL": "https://auth/login?shareId=s",
                "validateURL": "https://auth/validate?shareId=s",
                "reqId": "r2",
            })
        );
    }

    #[test]
    fn encodes_forwarded_request() {
        let frame = Outbound::Request {
            req_id: ReqId::from("r3"),
            payload: RequestPayload::Http(ForwardedRequest {
                headers: Map::new(),
                method: "GET".into(),
                url: "/widgets".into(),
                body: BodyBytes::default(),
            }),
        };
        assert_eq!(
            frame.to_json(),
            json!({"reqId": "r3", "headers": {}, "method": "GET", "url": "/widgets", "body": ""})
        );
    }

    #[test]
    fn parses_http_reply() {
        let reply = HttpReply::from_data(json!({
            "status": 200,
            "headers": [["content-type", "text/plain"]],
            "body": "ok",
        }))
        .unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.headers, vec![("content-type".to_string(), json!("text/plain"))]);
        assert_eq!(reply.body.as_slice(), b"ok");

        assert!(HttpReply::from_data(json!({"headers": []})).is_err());
    }
}
