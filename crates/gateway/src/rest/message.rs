//! Message REST endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parley_database::Message;
use std::sync::Arc;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/messages", post(create_message))
        .route("/api/messages/:message_id", get(get_message))
}

/// Persist a message and broadcast it to every live connection.
///
/// The body is taken raw so malformed JSON reports through the same error
/// path as a failed validation.
pub async fn create_message(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> GatewayResult<StatusCode> {
    let message = state.engine.submit(&body).await?;
    debug!(msg_id = %message.id, "message submitted over HTTP");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_message(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<Message>> {
    let message = state
        .engine
        .store()
        .find(&message_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Message not found".to_string()))?;

    Ok(Json(message))
}
