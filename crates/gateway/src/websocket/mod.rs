//! Live connection endpoint

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{future, SinkExt, StreamExt};
use parley_chats::{run_session, Frame};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::state::GatewayState;

/// Create all WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

/// Upgrade to a live connection if the origin is acceptable
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .map(|value| value.to_str().unwrap_or_default());

    if !state.origin_allowed(origin) {
        warn!(origin = ?origin, "rejected websocket origin");
        return GatewayError::Forbidden("Origin not allowed".to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Adapt the socket to the frame sink/stream a session expects, then run it.
async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (sender, receiver) = socket.split();

    let sink = sender.with(|frame: Frame| {
        future::ready(Ok::<_, axum::Error>(Message::Text(frame.to_string())))
    });

    let stream = receiver
        .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
        .filter_map(|message| future::ready(into_text(message)));

    run_session(Arc::clone(&state.engine), sink, stream).await;
}

/// Text payload of an inbound message. Control frames are skipped.
fn into_text(message: Result<Message, axum::Error>) -> Option<Result<String, axum::Error>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => Some(Ok(text)),
            Err(_) => {
                debug!("skipping non UTF-8 binary frame");
                None
            }
        },
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Close(_)) => None,
        Err(error) => Some(Err(error)),
    }
}
