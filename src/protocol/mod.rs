//! Wire protocol spoken over the control connection.
//!
//! # Data Flow
//! ```text
//! Control socket text frame
//!     → message.rs (decode once into Inbound)
//!     → Inbound::Reply        → tunnel::correlation
//!     → Inbound::Socket(..)   → tunnel::multiplex
//!
//! Relay events
//!     → Outbound (challenge, registration, forwarded request, socket frame)
//!     → message.rs (encode to JSON text)
//!     → Control socket
//! ```
//!
//! # Design Decisions
//! - Every frame is a JSON object; shapes are distinguished by the keys they
//!   carry (`ws`, `reqId`), never by position in the stream
//! - Undecodable frames surface as `ProtocolError` and are skipped by callers
//! - Byte payloads accept several JSON encodings (see body.rs)

pub mod body;
pub mod ids;
pub mod message;

pub use body::{BodyBytes, SocketData};
pub use ids::{ReqId, TunnelKey, WsId};
pub use message::{
    Challenge, ForwardedRequest, HttpReply, Inbound, Outbound, ProtocolError, RequestPayload,
    SocketFrame,
};
