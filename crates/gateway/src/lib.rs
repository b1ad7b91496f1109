//! # Parley Gateway Crate
//!
//! HTTP and WebSocket surface for Parley. Routes requests to the broadcast
//! engine and adapts WebSocket connections into chat sessions.
//!
//! ## Architecture
//!
//! - **REST**: message submission and lookup, health check
//! - **WebSocket**: the live connection endpoint
//! - **State**: the engine plus origin and rate-limit policy
//! - **Middleware**: rate limiting, CORS and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(engine, config.cors.clone(), &config.rate_limit);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

// Re-export main types for convenience
pub use error::{GatewayError, GatewayResult};
pub use middleware::RateLimiter;
pub use state::GatewayState;

use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;

/// Create the main application router with all routes.
///
/// CORS and rate limiting apply to the REST routes only; the live endpoint
/// enforces its origin policy at upgrade time.
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    let rest = rest::create_rest_routes()
        .layer(axum_middleware::from_fn_with_state(
            arc_state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(middleware::cors_layer(&arc_state.cors))
        .with_state(arc_state.clone());

    Router::new()
        // REST API routes
        .merge(rest)
        // WebSocket routes
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        // Logging middleware
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
