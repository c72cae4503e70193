use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use devora_tasks::auth::{JwtMaker, PasswordHasher};
use devora_tasks::config::AppConfig;
use devora_tasks::database::{MemoryStore, PgStore, Store};
use devora_tasks::{app, handlers, AppState};

#[derive(Parser, Debug)]
#[command(name = "devora-tasks", about = "Task tracking REST API server")]
struct Cli {
    /// Address to bind, overrides SERVER_ADDRESS
    #[arg(long)]
    address: Option<String>,

    /// Ignore DB_SOURCE and keep everything in memory
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DB_SOURCE, TOKEN_SYMMETRIC_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(address) = cli.address {
        config.server.address = address;
    }
    tracing::info!("Starting Devora Tasks in {:?} mode", config.environment);

    // Schema defects are programming errors: refuse to start
    let schemas = handlers::schemas().context("invalid request schema declaration")?;

    let tokens = JwtMaker::new(&config.security.token_symmetric_key)
        .context("cannot create token maker (check TOKEN_SYMMETRIC_KEY)")?;
    let passwords = PasswordHasher::new(config.security.password_hash_cost)
        .context("cannot create password hasher (check PASSWORD_HASH_COST)")?;

    let store: Arc<dyn Store> = match (&config.database.url, cli.in_memory) {
        (Some(url), false) => Arc::new(
            PgStore::connect(url, &config.database)
                .await
                .context("cannot connect to database")?,
        ),
        _ => {
            tracing::warn!("No database configured, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let address = config.server.address.clone();
    let state = AppState::new(config, store, Arc::new(tokens), passwords, schemas);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("Devora Tasks listening on http://{}", address);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
