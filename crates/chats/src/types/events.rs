//! Wire frames exchanged with live clients.

use std::sync::Arc;

use parley_database::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ChatError, ChatResult};

/// An encoded outbound frame, shared by every queue it is fanned out to.
pub type Frame = Arc<str>;

/// Body of a chat message as submitted by a client.
///
/// Field aliases accept the older `user`/`userid`, `text` and `msgid` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, alias = "msgid", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "user", alias = "userid")]
    pub author: String,
    #[serde(alias = "text")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    #[serde(alias = "user", alias = "userid")]
    pub author: String,
}

/// Frames received from a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Persist and broadcast.
    Message(MessagePayload),
    /// Broadcast only, never persisted.
    Typing(TypingPayload),
    /// A well-formed frame whose `type` this server does not know.
    Unknown(String),
}

impl ClientFrame {
    pub fn parse(raw: &str) -> ChatResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ChatError::invalid_input(format!("malformed JSON: {e}")))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChatError::invalid_input("frame has no string `type` field"))?
            .to_owned();

        match kind.as_str() {
            "message" => serde_json::from_value(value)
                .map(ClientFrame::Message)
                .map_err(|e| ChatError::invalid_input(e.to_string())),
            "typing" => serde_json::from_value(value)
                .map(ClientFrame::Typing)
                .map_err(|e| ChatError::invalid_input(e.to_string())),
            _ => Ok(ClientFrame::Unknown(kind)),
        }
    }
}

/// Frames sent to live clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A persisted message, in canonical form.
    Message(Message),
    /// Someone is typing.
    Typing { author: String },
    /// Sent only to the connection whose frame was rejected.
    Error { message: String },
}

impl ServerFrame {
    pub fn encode(&self) -> ChatResult<Frame> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }
}
