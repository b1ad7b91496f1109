//! Validation utilities.

use parley_database::NewMessage;

use crate::types::{ChatError, MessagePayload, TypingPayload};

/// Limits applied to inbound messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageLimits {
    /// Maximum body size in bytes. `None` leaves the body unbounded.
    pub max_body_bytes: Option<usize>,
}

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate an author identifier
    pub fn author(author: &str) -> Result<String, ChatError> {
        let author = author.trim();
        if author.is_empty() {
            return Err(ChatError::invalid_input("author cannot be empty"));
        }
        Ok(author.to_string())
    }

    /// Validate message content
    pub fn body(body: &str, limits: MessageLimits) -> Result<(), ChatError> {
        if body.trim().is_empty() {
            return Err(ChatError::invalid_input("body cannot be empty"));
        }

        if let Some(max) = limits.max_body_bytes {
            if body.len() > max {
                return Err(ChatError::invalid_input(format!(
                    "body too long (max {max} bytes)"
                )));
            }
        }

        Ok(())
    }

    /// Turn a submitted payload into a store candidate
    pub fn message(payload: MessagePayload, limits: MessageLimits) -> Result<NewMessage, ChatError> {
        let author = Self::author(&payload.author)?;
        Self::body(&payload.body, limits)?;

        let id = payload
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Ok(NewMessage {
            id,
            author,
            body: payload.body,
        })
    }

    pub fn typing(payload: TypingPayload) -> Result<String, ChatError> {
        Self::author(&payload.author)
    }
}
