use anyhow::Context;
use server::{AppState, app};
use services::services::{
    addition_pruner::AdditionLogPruner, config::Config, storage::open_store,
    thegamesdb::ThegamesdbClient,
};
use tracing::{info, warn};
use utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let config = Config::from_env()?;
    let store = open_store(&config)
        .await
        .context("failed to open collection store")?;

    let catalog = match config.thegamesdb_api_key.clone() {
        Some(key) => Some(ThegamesdbClient::new(
            key,
            Some(config.thegamesdb_base_url.clone()),
        )?),
        None => {
            warn!("THEGAMESDB_API_KEY not set, catalog routes are disabled");
            None
        }
    };

    let pruner = AdditionLogPruner::spawn(store.clone(), config.trending_retention_days);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!(
        address = %listener.local_addr()?,
        backend = %store.backend(),
        "Server running"
    );

    axum::serve(listener, app(AppState::new(store, catalog)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
