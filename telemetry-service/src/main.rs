use anyhow::Result;
use std::{net::SocketAddr, sync::Arc};
use telemetry_service::{
    config::AppConfig,
    http::{self, AppState},
    metrics_server, observability,
    registry::PlantRegistry,
    retention::RetentionScheduler,
    status::StatusClassifier,
    store::{self, RetryPolicy},
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let registry = Arc::new(PlantRegistry::new(cfg.plants.clone())?);
    for plant in registry.plants() {
        tracing::info!(plant_id = plant.id, name = %plant.name, units = plant.unit_count, "plant configured");
    }
    tracing::info!(total_units = registry.total_units(), "plant registry loaded");

    let store = store::open(&cfg.store).await?;

    let cancel = CancellationToken::new();
    let retention = RetentionScheduler::new(
        store.clone(),
        registry.clone(),
        cfg.retention.horizon(),
        cfg.retention.interval(),
    )
    .spawn(cancel.clone());

    let state = AppState {
        classifier: StatusClassifier::new(store.clone(), registry.clone(), cfg.status.freshness_window()),
        store,
        registry,
        retry: RetryPolicy::from_config(&cfg.store),
        history_lookback: cfg.history.lookback(),
        history_bucket_width: cfg.history.bucket_width(),
        presentation_offset: cfg.http.presentation_offset()?,
    };

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "telemetry service listening");

    axum::serve(listener, http::router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background work once the server has drained.
    cancel.cancel();
    retention.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
