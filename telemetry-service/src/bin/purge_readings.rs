use anyhow::Result;
use std::sync::Arc;
use telemetry_service::{
    config::AppConfig, observability, registry::PlantRegistry, retention::RetentionScheduler, store,
};
use time::OffsetDateTime;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let registry = Arc::new(PlantRegistry::new(cfg.plants.clone())?);
    let store = store::open(&cfg.store).await?;

    let scheduler = RetentionScheduler::new(store, registry, cfg.retention.horizon(), cfg.retention.interval());
    let report = scheduler.run_cycle(OffsetDateTime::now_utc()).await;

    tracing::info!(
        cutoff = %report.cutoff,
        deleted = report.total_deleted(),
        failed_plants = report.failed.len(),
        "one-off retention pass finished"
    );

    if !report.failed.is_empty() {
        anyhow::bail!("retention failed for {} plant(s)", report.failed.len());
    }

    Ok(())
}
