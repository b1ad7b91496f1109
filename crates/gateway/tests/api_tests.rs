use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN},
        Method, Request, StatusCode,
    },
    Router,
};
use http_body_util::BodyExt;
use parley_chats::{BroadcastEngine, ConnectionRegistry, MessageLimits};
use parley_config::{CorsConfig, RateLimitConfig};
use parley_database::{MemoryMessageStore, MessageStore};
use parley_gateway::{create_router, GatewayState};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryMessageStore>,
    engine: Arc<BroadcastEngine>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        })
    }

    fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryMessageStore::new());
        let engine = Arc::new(BroadcastEngine::new(
            store.clone(),
            Arc::new(ConnectionRegistry::new(16)),
            MessageLimits::default(),
        ));
        let state = GatewayState::new(engine.clone(), CorsConfig::default(), &rate_limit);

        Self {
            router: create_router(state),
            store,
            engine,
        }
    }

    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("dispatch request");

        let status = response.status();
        let allow_origin = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|value| value.to_str().unwrap_or_default().to_string());
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect response body")
            .to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap_or_default();
        let json = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            json,
            allow_origin,
        }
    }

    async fn post_message(&self, body: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::POST)
                .uri("/api/messages")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("build request"),
        )
        .await
    }

    async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .expect("build request"),
        )
        .await
    }
}

struct TestResponse {
    status: StatusCode,
    json: Value,
    allow_origin: Option<String>,
}

#[tokio::test]
async fn submit_persists_and_broadcasts() {
    let app = TestApp::new();
    let (_client, mut queue) = app.engine.registry().connect();

    let response = app
        .post_message(r#"{"author":"alice","body":"hi"}"#)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let stored = app.store.recent(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].author, "alice");

    let frame: Value = serde_json::from_str(&queue.try_recv().unwrap()).unwrap();
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["id"], stored[0].id.as_str());
    assert!(queue.try_recv().is_err());
}

#[tokio::test]
async fn submit_accepts_legacy_field_names() {
    let app = TestApp::new();
    let response = app
        .post_message(r#"{"userid":"bob","text":"yo","msgid":"m-7"}"#)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let fetched = app.get("/api/messages/m-7").await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json["author"], "bob");
    assert_eq!(fetched.json["body"], "yo");
}

#[tokio::test]
async fn malformed_submissions_are_rejected() {
    let app = TestApp::new();
    let (_client, mut queue) = app.engine.registry().connect();

    for body in ["{not json", r#"{"author":"alice"}"#, r#"{"author":"","body":"x"}"#] {
        let response = app.post_message(body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response.json["error"].is_string());
    }

    assert_eq!(app.store.save_calls(), 0);
    assert!(queue.try_recv().is_err());
}

#[tokio::test]
async fn store_failure_returns_500_without_broadcast() {
    let app = TestApp::new();
    let (_client, mut queue) = app.engine.registry().connect();
    app.store.set_failing(true);

    let response = app
        .post_message(r#"{"author":"alice","body":"hi"}"#)
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json, json!({ "error": "Failed to save message" }));
    assert!(queue.try_recv().is_err());
}

#[tokio::test]
async fn unknown_message_is_404() {
    let app = TestApp::new();
    let response = app.get("/api/messages/missing").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reflects_store_liveness() {
    let app = TestApp::new();

    let healthy = app.get("/health").await;
    assert_eq!(healthy.status, StatusCode::OK);
    assert_eq!(healthy.json, json!({ "status": "ok" }));

    app.store.set_failing(true);
    let unhealthy = app.get("/health").await;
    assert_eq!(unhealthy.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        unhealthy.json,
        json!({ "status": "error", "message": "Database connection failed" })
    );
}

#[tokio::test]
async fn rate_limit_returns_429_when_bucket_is_empty() {
    let app = TestApp::with_rate_limit(RateLimitConfig {
        enabled: true,
        per_second: 0.001,
        burst: 2,
    });

    assert_eq!(app.get("/health").await.status, StatusCode::OK);
    assert_eq!(app.get("/health").await.status, StatusCode::OK);

    let limited = app.get("/health").await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json, json!({ "message": "Limit exceeded" }));
}

#[tokio::test]
async fn cors_allows_configured_origins_only() {
    let app = TestApp::new();

    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/messages")
            .header(ORIGIN, origin)
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .expect("build request")
    };

    let allowed = app.request(preflight("http://localhost:5173")).await;
    assert_eq!(allowed.allow_origin.as_deref(), Some("http://localhost:5173"));

    let exact = app.request(preflight("http://client:80")).await;
    assert_eq!(exact.allow_origin.as_deref(), Some("http://client:80"));

    let denied = app.request(preflight("https://evil.example")).await;
    assert_eq!(denied.allow_origin, None);
}
