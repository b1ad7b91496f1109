//! Domain entities for the database layer

pub mod message;

pub use message::{generate_message_id, Message, NewMessage};
