mod config;
mod routes;

use anyhow::{Context, Result};
use backend::PostgrestBackend;
use cache::QueryCache;
use queries::DashboardClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing::info!(mode = ?config.mode, bind = %config.server.bind, "Starting dashboard api");

    let backend = PostgrestBackend::new(
        config.backend.url.clone(),
        config.backend.anon_key.clone(),
        config.request_timeout(),
    )
    .context("Failed to create backend client")?;

    let cache = Arc::new(QueryCache::new(config.cache_config()));
    let gc_task = cache.spawn_gc(config.gc_interval());

    let client = DashboardClient::new(cache.clone(), Arc::new(backend)).with_options(config.query_options());
    let app = router(AppState { client });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tracing::info!("Server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    gc_task.abort();
    cache.shutdown();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
