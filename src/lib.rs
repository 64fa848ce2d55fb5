pub mod api;
pub mod config;
pub mod factory;
pub mod gedcom;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export factory types
pub use factory::{Factories, RecordFactory, ResolveError, ResolveResult};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use std::sync::Arc;

/// Open the configured store, apply migrations and optional seed data, and
/// serve the API until the process is stopped.
pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,sqlx=warn"))
        .try_init();

    let config = crate::config::AppConfig::load()?;
    log::info!("Configuration loaded: server={}", config.server_address());

    if config.database.in_memory {
        log::info!("Using in-memory store");
        serve_store(Arc::new(MemoryStore::new()), &config).await
    } else {
        log::info!("Connecting to PostgreSQL...");
        let postgres_store =
            PostgresStore::new(&config.database_url(), config.max_connections()).await?;

        log::info!("Running database migrations...");
        postgres_store.migrate().await?;

        serve_store(Arc::new(postgres_store), &config).await
    }
}

async fn serve_store<S: Store + 'static>(
    store: Arc<S>,
    config: &crate::config::AppConfig,
) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(store.as_ref()).await?;
    }

    let app = routes::create_router::<S>().with_state(store);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("gedtree server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
