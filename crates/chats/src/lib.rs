//! # Parley Chats Crate
//!
//! The real-time core of Parley: the set of live connections and the engine
//! that persists each message and fans it out to all of them.
//!
//! ## Architecture
//!
//! - **Client**: `ClientHandle`, one per live connection, owning a bounded
//!   outbound queue and a one-shot close signal
//! - **Registry**: `ConnectionRegistry`, the lock-guarded membership set
//! - **Broadcast**: `BroadcastEngine`, persist then fan out, with slow
//!   clients dropped instead of waited on
//! - **Session**: the read and delivery loops driving one connection over
//!   any sink/stream pair
//! - **Types**: wire frames and errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_chats::{BroadcastEngine, ConnectionRegistry, MessageLimits};
//!
//! let registry = Arc::new(ConnectionRegistry::new(100));
//! let engine = Arc::new(BroadcastEngine::new(store, registry, MessageLimits::default()));
//! let message = engine.submit(br#"{"author":"alice","body":"hi"}"#).await?;
//! ```

pub mod broadcast;
pub mod client;
pub mod registry;
pub mod session;
pub mod types;
pub mod utils;

pub use broadcast::{BroadcastEngine, FrameOutcome};
pub use client::{ClientHandle, ClientId, ClientState, EnqueueError};
pub use registry::{ConnectionRegistry, FanOut};
pub use session::run_session;
pub use types::{
    ChatError, ChatResult, ClientFrame, Frame, MessagePayload, ServerFrame, TypingPayload,
};
pub use utils::validation::{MessageLimits, Validator};
