//! Parley Database Crate
//!
//! Connection management, migrations, the `Message` entity and the
//! `MessageStore` persistence seam with its SQLite and in-memory
//! implementations.

use sqlx::SqlitePool;
use tracing::info;
use parley_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod store;
pub mod types;

pub use connection::{connect_with_retry, prepare_database};
pub use entities::{generate_message_id, Message, NewMessage};
pub use migrations::run_migrations;
pub use repos::MessageRepository;
pub use store::{MemoryMessageStore, MessageStore, MonotonicClock};
pub use types::{DatabaseError, DatabaseResult};

/// Connect with bounded retries and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = connect_with_retry(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    info!(url = %config.url, "database ready");
    Ok(pool)
}
