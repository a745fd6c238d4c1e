pub mod memory;
pub mod postgres;

pub use memory::MemoryReadingStore;
pub use postgres::PgReadingStore;

use std::{sync::Arc, time::Duration};

use plant_client::domain::{UnitReading, UnitReadingDraft};
use time::OffsetDateTime;

use crate::config::{StoreConfig, StoreKind};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow view of the reading table. Every call is scoped to one plant.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a draft stamped with `ts`, returning the store-assigned id.
    async fn insert(&self, draft: &UnitReadingDraft, ts: OffsetDateTime) -> Result<i64, StoreError>;

    /// Newest reading of the unit with `ts >= since`.
    async fn latest(
        &self,
        plant_id: i32,
        unit_id: i32,
        since: OffsetDateTime,
    ) -> Result<Option<UnitReading>, StoreError>;

    /// All readings of the plant with `ts >= since`, ascending by `ts`.
    async fn range(&self, plant_id: i32, since: OffsetDateTime) -> Result<Vec<UnitReading>, StoreError>;

    /// Remove readings with `ts < cutoff` and return how many were removed.
    async fn delete_older_than(&self, plant_id: i32, cutoff: OffsetDateTime) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Open the store selected by configuration.
pub async fn open(cfg: &StoreConfig) -> Result<Arc<dyn ReadingStore>, StoreError> {
    let store: Arc<dyn ReadingStore> = match cfg.kind {
        StoreKind::Postgres => Arc::new(PgReadingStore::connect(&cfg.uri, cfg.max_connections).await?),
        StoreKind::Memory => {
            tracing::warn!("using in-memory reading store; readings are lost on restart");
            Arc::new(MemoryReadingStore::new())
        }
    };
    Ok(store)
}

impl RetryPolicy {
    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self {
            max_attempts: cfg.max_write_attempts,
            backoff: cfg.retry_backoff(),
        }
    }
}

/// Insert with bounded retries, sleeping `backoff * attempt` after each failure.
pub async fn write_with_retry(
    store: &dyn ReadingStore,
    draft: &UnitReadingDraft,
    ts: OffsetDateTime,
    policy: RetryPolicy,
) -> Result<i64, StoreError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match store.insert(draft, ts).await {
            Ok(id) => {
                metrics::counter!("telemetry_readings_stored_total").increment(1);
                return Ok(id);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    plant_id = draft.plant_id,
                    unit_id = draft.unit_id,
                    "reading write failed, retrying with backoff"
                );
                metrics::counter!("telemetry_store_write_retry_total").increment(1);
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempt,
                    plant_id = draft.plant_id,
                    unit_id = draft.unit_id,
                    "reading write failed, giving up"
                );
                metrics::counter!("telemetry_store_write_errors_total").increment(1);
                return Err(e);
            }
        }
    }
}
