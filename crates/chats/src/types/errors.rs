//! Error types for the chat core.

use parley_database::DatabaseError;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors reported to whoever submitted a message.
///
/// Transport failures are deliberately absent: they only ever end the one
/// connection they happened on and are logged there.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid message: {message}")]
    InvalidInput { message: String },

    #[error("Failed to save message: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChatError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization error: {}", err),
        }
    }
}
