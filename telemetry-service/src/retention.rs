use std::{sync::Arc, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{config::saturating_before, registry::PlantRegistry, store::ReadingStore};

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionReport {
    pub cutoff: OffsetDateTime,
    pub deleted: Vec<(i32, u64)>,
    pub failed: Vec<(i32, String)>,
}

impl RetentionReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

/// Periodically deletes readings older than the retention horizon.
pub struct RetentionScheduler {
    store: Arc<dyn ReadingStore>,
    registry: Arc<PlantRegistry>,
    horizon: Duration,
    interval: StdDuration,
}

impl RetentionScheduler {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        registry: Arc<PlantRegistry>,
        horizon: Duration,
        interval: StdDuration,
    ) -> Self {
        Self {
            store,
            registry,
            horizon,
            interval,
        }
    }

    /// One pass over every plant. A failing plant is recorded and skipped.
    pub async fn run_cycle(&self, now: OffsetDateTime) -> RetentionReport {
        let cutoff = saturating_before(now, self.horizon);
        let mut report = RetentionReport {
            cutoff,
            deleted: Vec::new(),
            failed: Vec::new(),
        };

        for plant in self.registry.plants() {
            match self.store.delete_older_than(plant.id, cutoff).await {
                Ok(n) => {
                    tracing::info!(plant_id = plant.id, deleted = n, "retention pass for plant");
                    metrics::counter!("retention_deleted_readings_total").increment(n);
                    report.deleted.push((plant.id, n));
                }
                Err(e) => {
                    tracing::error!(plant_id = plant.id, error = %e, "retention pass failed for plant");
                    metrics::counter!("retention_plant_errors_total").increment(1);
                    report.failed.push((plant.id, e.to_string()));
                }
            }
        }

        report
    }

    /// Run cycles until `cancel` fires: one immediately, then every `interval`.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            horizon_secs = self.horizon.whole_seconds(),
            interval_secs = self.interval.as_secs(),
            "retention scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                report = self.run_cycle(OffsetDateTime::now_utc()) => {
                    tracing::info!(
                        deleted = report.total_deleted(),
                        failed_plants = report.failed.len(),
                        "retention cycle completed"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("retention scheduler stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
