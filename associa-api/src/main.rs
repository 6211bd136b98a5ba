//! # Associa API Server
//!
//! Serves the membership API and the gated client views.
//!
//! ## Usage
//!
//! ```bash
//! ASSOCIA__SESSION__JWT_SECRET=$(openssl rand -hex 32) cargo run -p associa-api
//! ```

use associa_api::{
    app::{build_router, AppState},
    config::Config,
};
use associa_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "associa_api=debug,associa_shared=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.api.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Associa API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    let pool = create_pool(config.database.pool_config()).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }

    let address = config.bind_address();
    let state = AppState::postgres(pool.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing database pool");
    close_pool(pool).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
