use anyhow::{Context, Result};
use covid_core::{DocumentStore, MemoryStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use covid_query::{create_router, AppState, QueryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = QueryConfig::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;
    info!("Loaded configuration: {:?}", config);

    // Initialize document store
    let store: Arc<dyn DocumentStore> = match &config.store.data_dir {
        Some(dir) => {
            let store = MemoryStore::load_dir(dir)
                .with_context(|| format!("Failed to load data from {}", dir.display()))?;
            info!(
                "Loaded collections {:?} from {}",
                store.collection_names(),
                dir.display()
            );
            Arc::new(store)
        }
        None => {
            warn!("No data directory configured, serving an empty store");
            Arc::new(MemoryStore::new())
        }
    };

    // Create shared state and router
    let bind_address = config.server.bind_address.clone();
    let state = AppState::new(config, store);
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&bind_address).await?;
    let addr = listener.local_addr()?;
    info!("Covid Query Service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Covid Query Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
