//! Cross-cutting HTTP concerns: rate limiting, CORS and request logging

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, request, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use parley_config::CorsConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::GatewayError;
use crate::state::GatewayState;

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// Process-wide token bucket
#[derive(Debug)]
pub struct RateLimiter {
    per_second: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(per_second: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            per_second: per_second.max(0.0),
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens < 1.0 {
            return false;
        }
        bucket.tokens -= 1.0;
        true
    }
}

/// Reject requests once the global bucket is empty
pub async fn rate_limit_middleware(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        if !limiter.try_acquire() {
            tracing::debug!(uri = %request.uri(), "rate limit exceeded");
            return GatewayError::RateLimitExceeded.into_response();
        }
    }

    next.run(request).await
}

/// CORS layer built from the configured origin policy
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let config = config.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request: &request::Parts| {
                origin
                    .to_str()
                    .map(|origin| config.allows(origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_allows_burst_then_refuses() {
        let limiter = RateLimiter::new(1.0, 4);
        let now = Instant::now();
        for _ in 0..4 {
            assert!(limiter.try_acquire_at(now));
        }
        assert!(!limiter.try_acquire_at(now));
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let limiter = RateLimiter::new(2.0, 1);
        let start = Instant::now();
        assert!(limiter.try_acquire_at(start));
        assert!(!limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start + Duration::from_millis(500)));
    }

    #[test]
    fn test_bucket_never_exceeds_capacity() {
        let limiter = RateLimiter::new(100.0, 2);
        let later = Instant::now() + Duration::from_secs(60);
        assert!(limiter.try_acquire_at(later));
        assert!(limiter.try_acquire_at(later));
        assert!(!limiter.try_acquire_at(later));
    }
}
