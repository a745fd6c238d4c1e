use plant_client::{
    db::reading_queries,
    domain::{UnitReading, UnitReadingDraft},
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use time::OffsetDateTime;

use super::{ReadingStore, StoreError};

/// Readings persisted in the shared `unit_readings` table.
///
/// The schema lives in `sql/schema/` and is applied out-of-band.
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(uri: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(uri)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, draft: &UnitReadingDraft, ts: OffsetDateTime) -> Result<i64, StoreError> {
        Ok(reading_queries::insert_reading(&self.pool, draft, ts).await?)
    }

    async fn latest(
        &self,
        plant_id: i32,
        unit_id: i32,
        since: OffsetDateTime,
    ) -> Result<Option<UnitReading>, StoreError> {
        Ok(reading_queries::latest_reading(&self.pool, plant_id, unit_id, since).await?)
    }

    async fn range(&self, plant_id: i32, since: OffsetDateTime) -> Result<Vec<UnitReading>, StoreError> {
        Ok(reading_queries::readings_since(&self.pool, plant_id, since).await?)
    }

    async fn delete_older_than(&self, plant_id: i32, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        Ok(reading_queries::delete_readings_before(&self.pool, plant_id, cutoff).await?)
    }
}
