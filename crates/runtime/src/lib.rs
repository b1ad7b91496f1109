use std::sync::Arc;

use anyhow::{Context, Result};
use parley_chats::{BroadcastEngine, ConnectionRegistry, MessageLimits};
use parley_config::AppConfig;
use parley_database::{initialize_database, MessageRepository};
use parley_gateway::GatewayState;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the server needs, wired together with explicit ownership.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub store: Arc<MessageRepository>,
    pub registry: Arc<ConnectionRegistry>,
    pub engine: Arc<BroadcastEngine>,
}

impl BackendServices {
    /// Connect to the store (with bounded retries), migrate, and build the
    /// registry and broadcast engine. Failing to reach the store is fatal.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise message store")?;

        let store = Arc::new(MessageRepository::new(db_pool.clone()));
        let registry = Arc::new(ConnectionRegistry::new(config.chat.outbound_queue_capacity));
        let limits = MessageLimits {
            max_body_bytes: config.chat.max_body_bytes,
        };
        let engine = Arc::new(BroadcastEngine::new(
            store.clone(),
            Arc::clone(&registry),
            limits,
        ));

        info!(
            queue_capacity = registry.queue_capacity(),
            max_body_bytes = ?limits.max_body_bytes,
            "broadcast engine ready"
        );

        Ok(Self {
            db_pool,
            store,
            registry,
            engine,
        })
    }

    /// State for the HTTP/WebSocket router.
    pub fn gateway_state(&self, config: &AppConfig) -> GatewayState {
        GatewayState::new(
            Arc::clone(&self.engine),
            config.cors.clone(),
            &config.rate_limit,
        )
    }

    /// Close every live connection, then the pool.
    pub async fn shutdown(&self) {
        let closed = self.registry.close_all();
        self.db_pool.close().await;
        info!(closed, "backend services stopped");
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
