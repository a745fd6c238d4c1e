use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use plant_client::domain::{UnitReading, UnitReadingDraft};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{ReadingStore, StoreError};

/// In-process store with one partition per plant.
///
/// Partitions are kept sorted by `(ts, id)` so ranged reads come back in
/// time order even when writes arrive out of order.
#[derive(Default)]
pub struct MemoryReadingStore {
    partitions: RwLock<HashMap<i32, Vec<UnitReading>>>,
    next_id: AtomicI64,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, plant_id: i32) -> usize {
        self.partitions
            .read()
            .await
            .get(&plant_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, draft: &UnitReadingDraft, ts: OffsetDateTime) -> Result<i64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let reading = draft.clone().into_reading(id, ts);

        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(draft.plant_id).or_default();
        let pos = partition.partition_point(|r| (r.ts, r.id) <= (ts, id));
        partition.insert(pos, reading);

        Ok(id)
    }

    async fn latest(
        &self,
        plant_id: i32,
        unit_id: i32,
        since: OffsetDateTime,
    ) -> Result<Option<UnitReading>, StoreError> {
        let partitions = self.partitions.read().await;
        let found = partitions.get(&plant_id).and_then(|readings| {
            readings
                .iter()
                .rev()
                .take_while(|r| r.ts >= since)
                .find(|r| r.unit_id == unit_id)
                .cloned()
        });
        Ok(found)
    }

    async fn range(&self, plant_id: i32, since: OffsetDateTime) -> Result<Vec<UnitReading>, StoreError> {
        let partitions = self.partitions.read().await;
        let readings = partitions
            .get(&plant_id)
            .map(|readings| {
                let start = readings.partition_point(|r| r.ts < since);
                readings[start..].to_vec()
            })
            .unwrap_or_default();
        Ok(readings)
    }

    async fn delete_older_than(&self, plant_id: i32, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut partitions = self.partitions.write().await;
        let Some(readings) = partitions.get_mut(&plant_id) else {
            return Ok(0);
        };

        let expired = readings.partition_point(|r| r.ts < cutoff);
        readings.drain(..expired);
        Ok(expired as u64)
    }
}
