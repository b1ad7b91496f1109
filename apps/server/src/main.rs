use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_config::load as load_config;
use parley_database::MessageStore;
use parley_gateway::create_router;
use parley_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley real-time chat server (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Print the most recent stored messages as JSON lines
    DumpMessages {
        /// How many messages to print
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::DumpMessages { limit } => dump_messages(limit).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Parley server");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let app = create_router(services.gateway_state(&config));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    // Live connections must be closed before the drain can finish.
    let registry = services.registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            parley_runtime::shutdown_signal().await;
            registry.close_all();
        })
        .await
        .context("http server error")?;

    services.shutdown().await;
    info!("server shut down");
    Ok(())
}

async fn dump_messages(limit: u32) -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let messages = services
        .store
        .recent(limit)
        .await
        .context("failed to fetch messages")?;

    if messages.is_empty() {
        eprintln!("No messages found in database");
    }
    for message in &messages {
        println!("{}", serde_json::to_string(message)?);
    }

    services.shutdown().await;
    Ok(())
}
