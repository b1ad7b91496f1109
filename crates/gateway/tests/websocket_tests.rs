//! Live endpoint tests against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parley_chats::{BroadcastEngine, ConnectionRegistry, MessageLimits};
use parley_config::{CorsConfig, RateLimitConfig};
use parley_database::{MemoryMessageStore, MessageStore};
use parley_gateway::{create_router, GatewayState};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct LiveServer {
    addr: SocketAddr,
    router: Router,
    store: Arc<MemoryMessageStore>,
    engine: Arc<BroadcastEngine>,
}

impl LiveServer {
    async fn start() -> anyhow::Result<Self> {
        let store = Arc::new(MemoryMessageStore::new());
        let engine = Arc::new(BroadcastEngine::new(
            store.clone(),
            Arc::new(ConnectionRegistry::new(64)),
            MessageLimits::default(),
        ));
        let rate_limit = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        let router = create_router(GatewayState::new(
            engine.clone(),
            CorsConfig::default(),
            &rate_limit,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let served = router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, served).await;
        });

        Ok(Self {
            addr,
            router,
            store,
            engine,
        })
    }

    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn connect(&self) -> Client {
        let before = self.engine.registry().len();
        let (client, _) = connect_async(self.url()).await.expect("websocket connects");
        self.wait_for_clients(before + 1).await;
        client
    }

    async fn wait_for_clients(&self, expected: usize) {
        for _ in 0..200 {
            if self.engine.registry().len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {expected} clients, registry has {}",
            self.engine.registry().len()
        );
    }

    async fn post(&self, body: &str) -> StatusCode {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/messages")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("dispatch request")
            .status()
    }
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("frame arrives in time")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("frame is JSON");
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let next = tokio::time::timeout(Duration::from_millis(100), client.next()).await;
    assert!(next.is_err(), "unexpected frame: {next:?}");
}

#[tokio::test]
async fn http_submission_reaches_every_live_client_once() -> anyhow::Result<()> {
    let server = LiveServer::start().await?;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(server.connect().await);
    }

    assert_eq!(
        server.post(r#"{"author":"alice","body":"hi"}"#).await,
        StatusCode::NO_CONTENT
    );

    let stored = server.store.recent(10).await?;
    assert_eq!(stored.len(), 1);
    let expected = serde_json::to_value(&stored[0])?;

    for client in clients.iter_mut() {
        let frame = next_json(client).await;
        assert_eq!(frame["type"], "message");
        for key in ["id", "author", "body", "created_at"] {
            assert_eq!(frame[key], expected[key], "{key}");
        }
        assert_silent(client).await;
    }
    Ok(())
}

#[tokio::test]
async fn live_message_and_typing_frames() -> anyhow::Result<()> {
    let server = LiveServer::start().await?;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    alice
        .send(Message::Text(r#"{"type":"typing","author":"alice"}"#.into()))
        .await?;
    assert_eq!(next_json(&mut bob).await["type"], "typing");
    assert_eq!(next_json(&mut alice).await["type"], "typing");
    assert_eq!(server.store.save_calls(), 0);

    alice
        .send(Message::Text(
            r#"{"type":"message","author":"alice","body":"hello"}"#.into(),
        ))
        .await?;
    assert_eq!(next_json(&mut bob).await["body"], "hello");
    assert_eq!(next_json(&mut alice).await["body"], "hello");
    assert_eq!(server.store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn bad_live_frame_is_answered_only_to_sender() -> anyhow::Result<()> {
    let server = LiveServer::start().await?;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    alice.send(Message::Text("definitely not json".into())).await?;
    assert_eq!(next_json(&mut alice).await["type"], "error");
    assert_silent(&mut bob).await;

    alice
        .send(Message::Text(r#"{"type":"wave","author":"alice"}"#.into()))
        .await?;
    assert_silent(&mut alice).await;
    assert_silent(&mut bob).await;
    assert_eq!(server.engine.registry().len(), 2);
    Ok(())
}

#[tokio::test]
async fn disconnect_unregisters_client() -> anyhow::Result<()> {
    let server = LiveServer::start().await?;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    alice.close(None).await?;
    server.wait_for_clients(1).await;

    assert_eq!(
        server.post(r#"{"author":"bob","body":"still here"}"#).await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(next_json(&mut bob).await["body"], "still here");
    Ok(())
}

#[tokio::test]
async fn foreign_origin_is_refused_upgrade() -> anyhow::Result<()> {
    let server = LiveServer::start().await?;

    let mut request = server.url().into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://evil.example"));

    match connect_async(request).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), StatusCode::FORBIDDEN.as_u16());
        }
        Err(other) => panic!("expected HTTP 403, got {other}"),
        Ok(_) => panic!("upgrade from a foreign origin succeeded"),
    }
    assert!(server.engine.registry().is_empty());

    let mut allowed = server.url().into_client_request()?;
    allowed
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://localhost:3000"));
    let (_client, _) = connect_async(allowed).await?;
    server.wait_for_clients(1).await;
    Ok(())
}
