//! REST API endpoints for the gateway

pub mod health;
pub mod message;

use axum::Router;
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        // Message routes
        .merge(message::create_message_routes())
        // Health routes
        .merge(health::create_health_routes())
}
