//! Persist-then-fan-out engine shared by every submission path.

use std::sync::Arc;

use parley_database::{Message, MessageStore, NewMessage};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::registry::{ConnectionRegistry, FanOut};
use crate::types::{ChatError, ChatResult, ClientFrame, MessagePayload, ServerFrame};
use crate::utils::validation::{MessageLimits, Validator};

/// What the engine did with one frame from a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Published(Message),
    Typing,
    /// A frame type this server does not handle.
    Ignored(String),
}

/// Accepts messages from HTTP and from live connections, persists them and
/// enqueues them on every registered client.
///
/// Persistence and fan-out for one message run under a single lock, so a
/// message is never broadcast before its own save completes and every client
/// sees messages in the order they were stored.
pub struct BroadcastEngine {
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
    limits: MessageLimits,
    publish_lock: Mutex<()>,
}

impl BroadcastEngine {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<ConnectionRegistry>,
        limits: MessageLimits,
    ) -> Self {
        Self {
            store,
            registry,
            limits,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// One-shot submission of a raw `{author, body}` payload.
    pub async fn submit(&self, raw: &[u8]) -> ChatResult<Message> {
        let payload: MessagePayload = serde_json::from_slice(raw)
            .map_err(|e| ChatError::invalid_input(format!("invalid message payload: {e}")))?;
        let candidate = Validator::message(payload, self.limits)?;
        self.publish(candidate).await
    }

    /// Persist a validated candidate, then broadcast it.
    ///
    /// Nothing is broadcast when the save fails.
    pub async fn publish(&self, candidate: NewMessage) -> ChatResult<Message> {
        let _guard = self.publish_lock.lock().await;

        let message = self.store.save(candidate).await?;
        let frame = ServerFrame::Message(message.clone()).encode()?;
        let FanOut { delivered, dropped } = self.registry.fan_out(&frame);

        info!(msg_id = %message.id, delivered, dropped, "broadcast message");
        Ok(message)
    }

    /// Broadcast a typing signal. Never touches the store.
    pub fn signal_typing(&self, author: &str) -> ChatResult<FanOut> {
        let author = Validator::author(author)?;
        self.broadcast_typing(author)
    }

    fn broadcast_typing(&self, author: String) -> ChatResult<FanOut> {
        let frame = ServerFrame::Typing { author }.encode()?;
        let outcome = self.registry.fan_out(&frame);
        debug!(delivered = outcome.delivered, "broadcast typing");
        Ok(outcome)
    }

    /// Dispatch one text frame received on a live connection.
    pub async fn handle_frame(&self, raw: &str) -> ChatResult<FrameOutcome> {
        match ClientFrame::parse(raw)? {
            ClientFrame::Message(payload) => {
                let candidate = Validator::message(payload, self.limits)?;
                self.publish(candidate).await.map(FrameOutcome::Published)
            }
            ClientFrame::Typing(payload) => {
                self.broadcast_typing(Validator::typing(payload)?)?;
                Ok(FrameOutcome::Typing)
            }
            ClientFrame::Unknown(kind) => {
                warn!(kind = %kind, "ignoring frame of unknown type");
                Ok(FrameOutcome::Ignored(kind))
            }
        }
    }
}
