//! Database repository implementations

pub mod message_repository;

pub use message_repository::*;
