use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schedule_backend::api::router;
use schedule_backend::catalog::{HttpPageClient, JsonCourseBuilder};
use schedule_backend::config::AppConfig;
use schedule_backend::db::{CATALOG_SCHEMA, DurableStore};
use schedule_backend::services::{Preapproved, SyncOrchestrator, SyncScheduler};
use schedule_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "schedule_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let store = DurableStore::open(&CATALOG_SCHEMA, &config.store).await?;
    if let Some(reason) = store.recovered_from() {
        warn!("Catalog store was reset and starts empty: {}", reason);
    }

    let client = Arc::new(HttpPageClient::new(config.http_timeout)?);
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        client,
        Arc::new(JsonCourseBuilder),
        config.sync.clone(),
    ));

    let shutdown = CancellationToken::new();
    if let Some(interval) = config.auto_sync_interval_secs {
        let scheduler = SyncScheduler::new(
            orchestrator.clone(),
            interval,
            Arc::new(Preapproved(config.auto_sync_confirm)),
        );
        tokio::spawn(scheduler.start(shutdown.clone()));
    }

    let app = router(AppState::new(store.clone(), orchestrator.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown, orchestrator))
        .await?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken, orchestrator: Arc<SyncOrchestrator>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");
    orchestrator.abort();
    shutdown.cancel();
}
