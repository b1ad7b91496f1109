//! Shared application state for the gateway

use std::sync::Arc;

use parley_chats::BroadcastEngine;
use parley_config::{CorsConfig, RateLimitConfig};

use crate::middleware::RateLimiter;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct GatewayState {
    /// Persist-and-broadcast engine, which also owns the connection registry
    pub engine: Arc<BroadcastEngine>,
    /// Origin policy applied to HTTP routes and WebSocket upgrades
    pub cors: CorsConfig,
    /// Global limiter for non-WebSocket routes; `None` when disabled
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl GatewayState {
    pub fn new(engine: Arc<BroadcastEngine>, cors: CorsConfig, rate_limit: &RateLimitConfig) -> Self {
        let rate_limiter = rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(rate_limit.per_second, rate_limit.burst)));

        Self {
            engine,
            cors,
            rate_limiter,
        }
    }

    /// Whether a WebSocket upgrade from `origin` may proceed. Requests
    /// without an `Origin` header are not browser-initiated and are allowed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        origin.map_or(true, |origin| self.cors.allows(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_chats::{ConnectionRegistry, MessageLimits};
    use parley_database::MemoryMessageStore;

    fn state(rate_limit: RateLimitConfig) -> GatewayState {
        let engine = Arc::new(BroadcastEngine::new(
            Arc::new(MemoryMessageStore::new()),
            Arc::new(ConnectionRegistry::new(4)),
            MessageLimits::default(),
        ));
        GatewayState::new(engine, CorsConfig::default(), &rate_limit)
    }

    #[test]
    fn disabled_rate_limit_builds_no_limiter() {
        let disabled = state(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        assert!(disabled.rate_limiter.is_none());
        assert!(state(RateLimitConfig::default()).rate_limiter.is_some());
    }

    #[test]
    fn origin_policy() {
        let state = state(RateLimitConfig::default());
        assert!(state.origin_allowed(None));
        assert!(state.origin_allowed(Some("http://localhost:3000")));
        assert!(!state.origin_allowed(Some("https://evil.example")));
    }
}
