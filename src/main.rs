use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use gestor_api::auth::{HttpIdentityProvider, IdentityProvider};
use gestor_api::config::AppConfig;
use gestor_api::routes;
use gestor_api::state::AppState;
use gestor_api::store::{MemoryRecordStore, PgRecordStore, RecordStore};

#[derive(Debug, Parser)]
#[command(name = "gestor-api", about = "Multi-tenant business management API")]
struct Args {
    /// Listen port (overrides PORT / config)
    #[arg(long)]
    port: Option<u16>,
    /// Bind address (overrides SERVER_BIND / config)
    #[arg(long)]
    bind: Option<String>,
    /// Run against the in-memory store instead of Postgres
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.in_memory {
        config.store.in_memory = true;
    }

    tracing::info!("starting gestor-api in {:?} mode", config.environment);

    let store: Arc<dyn RecordStore> = if config.store.in_memory {
        tracing::warn!("running with the in-memory record store; data will not survive restarts");
        Arc::new(MemoryRecordStore::new())
    } else {
        let url = config
            .store
            .database_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required unless --in-memory is set"))?;
        Arc::new(PgRecordStore::connect(&url, config.store.max_connections).await?)
    };

    let identity: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(
        config.security.introspection_url.clone(),
        Duration::from_secs(config.security.introspection_timeout_secs),
    )?);

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = AppState::new(Arc::new(config), store, identity);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("gestor-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
