//! Message entity definitions

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

const ID_SUFFIX_LEN: usize = 6;

/// A persisted chat message. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A message candidate that has passed validation but is not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Caller supplied identifier. When absent the store generates one.
    pub id: Option<String>,
    pub author: String,
    pub body: String,
}

impl NewMessage {
    pub fn new(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: None,
            author: author.into(),
            body: body.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach the identifier and timestamp the store decided on.
    pub fn into_message(self, created_at: DateTime<Utc>) -> Message {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => generate_message_id(),
        };

        Message {
            id,
            author: self.author,
            body: self.body,
            created_at,
        }
    }
}

/// Nanosecond timestamp plus a random alphanumeric suffix, so concurrent
/// writers in the same nanosecond still get distinct ids.
pub fn generate_message_id() -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros().saturating_mul(1_000));
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{nanos}-{suffix}")
}
