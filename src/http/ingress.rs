//! Ingress Router: the listener's single request handler.
//!
//! # Responsibilities
//! - Extract the routing key from the Host header
//! - Dispatch plain requests to the forwarder or the default page
//! - Accept upgrades as proxied sockets or new control connections

use axum::body::Body;
use axum::extract::{FromRequestParts, State, WebSocketUpgrade};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::http::forward::forward_request;
use crate::http::request::{headers_to_json, request_id, request_url};
use crate::http::server::AppState;
use crate::routing::{is_websocket_upgrade, request_host, resolve, routing_key, Route};
use crate::tunnel::serve_control;

pub async fn ingress_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let upgrade = is_websocket_upgrade(request.headers());
    let route = {
        let key = request_host(request.headers(), request.uri()).and_then(routing_key);
        resolve(state.relay.registry(), key, upgrade)
    };

    debug!(
        request_id = %request_id(request.headers()),
        method = %request.method(),
        path = %request.uri().path(),
        route = ?route,
        "Ingress"
    );

    match route {
        Route::Fallthrough => state.landing.respond(request.method(), request.uri()),
        Route::Tunnel(conn) => {
            forward_request(&conn, request, state.relay.settings().max_body_bytes).await
        }
        Route::ProxiedSocket(conn) => {
            let (mut parts, _body) = request.into_parts();
            let headers = headers_to_json(&parts.headers);
            let url = request_url(&parts.uri);
            let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
                Ok(ws) => ws,
                Err(rejection) => return rejection.into_response(),
            };
            let mux = state.relay.multiplexer().clone();
            ws.on_upgrade(move |socket| mux.serve_public(conn, socket, headers, url))
        }
        Route::NewControl => {
            let (mut parts, _body) = request.into_parts();
            let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
                Ok(ws) => ws,
                Err(rejection) => return rejection.into_response(),
            };
            let relay = state.relay.clone();
            ws.on_upgrade(move |socket| serve_control(relay, socket))
        }
    }
}
