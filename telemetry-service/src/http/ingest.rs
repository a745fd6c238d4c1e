use axum::{body::Bytes, extract::State, Json};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::{format_date_time, ApiError, AppState};
use crate::{store::write_with_retry, transform};

#[derive(Debug, Serialize)]
pub struct StoredRecord {
    pub plant_id: i32,
    pub unit_id: i32,
    pub id: i64,
    pub power: Option<f64>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct FailedRecord {
    pub plant_id: i32,
    pub unit_id: i32,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub stored_records: usize,
    pub records: Vec<StoredRecord>,
    pub failed_records: Vec<FailedRecord>,
}

/// `POST /data`: decode a device payload and persist one reading per unit.
pub async fn receive_data(State(state): State<AppState>, body: Bytes) -> Result<Json<IngestResponse>, ApiError> {
    metrics::counter!("telemetry_ingest_requests_total").increment(1);

    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(ApiError::BadRequest("No JSON data provided".to_string())),
    };

    let drafts = transform::decode(&payload, &state.registry);
    if drafts.is_empty() {
        return Err(ApiError::BadRequest("No valid unit data found in request".to_string()));
    }

    let drafts = transform::retain_known_units(drafts, &state.registry);
    let received_at = OffsetDateTime::now_utc();

    let outcomes = join_all(
        drafts
            .iter()
            .map(|d| write_with_retry(state.store.as_ref(), d, received_at, state.retry)),
    )
    .await;

    let mut records = Vec::new();
    let mut failed_records = Vec::new();
    let mut first_error = None;
    for (draft, outcome) in drafts.iter().zip(outcomes) {
        match outcome {
            Ok(id) => records.push(StoredRecord {
                plant_id: draft.plant_id,
                unit_id: draft.unit_id,
                id,
                power: draft.measurements.power,
                timestamp: format_date_time(received_at, state.presentation_offset),
            }),
            Err(e) => {
                failed_records.push(FailedRecord {
                    plant_id: draft.plant_id,
                    unit_id: draft.unit_id,
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    if records.is_empty() {
        return Err(match first_error {
            Some(e) => ApiError::Store(e),
            None => ApiError::BadRequest("No valid data could be stored".to_string()),
        });
    }

    tracing::info!(
        stored = records.len(),
        failed = failed_records.len(),
        "telemetry payload ingested"
    );

    Ok(Json(IngestResponse {
        status: "success",
        stored_records: records.len(),
        records,
        failed_records,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use axum::http::StatusCode;
    use plant_client::domain::{UnitReading, UnitReadingDraft};
    use serde_json::json;

    use crate::{
        http::{
            router,
            tests::{post_json, send, test_state},
        },
        store::{MemoryReadingStore, ReadingStore, StoreError},
    };

    /// Rejects every write for one plant.
    struct RejectingStore {
        reject_plant: i32,
        rejected: AtomicBool,
        inner: MemoryReadingStore,
    }

    #[async_trait::async_trait]
    impl ReadingStore for RejectingStore {
        async fn insert(&self, draft: &UnitReadingDraft, ts: time::OffsetDateTime) -> Result<i64, StoreError> {
            if draft.plant_id == self.reject_plant {
                self.rejected.store(true, Ordering::SeqCst);
                return Err(StoreError::Unavailable("database is locked".to_string()));
            }
            self.inner.insert(draft, ts).await
        }

        async fn latest(
            &self,
            plant_id: i32,
            unit_id: i32,
            since: time::OffsetDateTime,
        ) -> Result<Option<UnitReading>, StoreError> {
            self.inner.latest(plant_id, unit_id, since).await
        }

        async fn range(&self, plant_id: i32, since: time::OffsetDateTime) -> Result<Vec<UnitReading>, StoreError> {
            self.inner.range(plant_id, since).await
        }

        async fn delete_older_than(&self, plant_id: i32, cutoff: time::OffsetDateTime) -> Result<u64, StoreError> {
            self.inner.delete_older_than(plant_id, cutoff).await
        }
    }

    #[tokio::test]
    async fn empty_or_malformed_body_is_bad_request() {
        let app = router(test_state(Arc::new(MemoryReadingStore::new())));

        for body in ["", "{}", "not json", "[1, 2]"] {
            let (status, resp) = send(app.clone(), post_json("/data", body.to_string())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(resp["message"], "No JSON data provided");
        }
    }

    #[tokio::test]
    async fn payload_without_decodable_units_is_bad_request() {
        let app = router(test_state(Arc::new(MemoryReadingStore::new())));
        let body = json!({ "xyz_u1_power": 5, "hello": "world" }).to_string();

        let (status, resp) = send(app, post_json("/data", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "No valid unit data found in request");
    }

    #[tokio::test]
    async fn out_of_range_units_are_dropped_silently() {
        let store = Arc::new(MemoryReadingStore::new());
        let app = router(test_state(store.clone()));

        let only_bad = json!({ "pta_u2_power": 5 }).to_string();
        let (status, resp) = send(app.clone(), post_json("/data", only_bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "No valid data could be stored");

        let mixed = json!({ "pta_u2_power": 5, "bgd_u2_power": 7, "bgd_u3_power": 9 }).to_string();
        let (status, resp) = send(app, post_json("/data", mixed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["stored_records"], 1);
        assert_eq!(resp["records"][0]["plant_id"], 2);
        assert_eq!(resp["records"][0]["unit_id"], 2);
        assert_eq!(resp["records"][0]["power"], 7.0);
        assert_eq!(store.len(1).await, 0);
        assert_eq!(store.len(2).await, 1);
    }

    #[tokio::test]
    async fn failed_write_is_reported_alongside_successes() {
        let store = Arc::new(RejectingStore {
            reject_plant: 1,
            rejected: AtomicBool::new(false),
            inner: MemoryReadingStore::new(),
        });
        let app = router(test_state(store.clone()));

        let body = json!({ "pta_u1_power": 10, "bgd_u1_power": 20 }).to_string();
        let (status, resp) = send(app.clone(), post_json("/data", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["stored_records"], 1);
        assert_eq!(resp["failed_records"][0]["plant_id"], 1);
        assert!(store.rejected.load(Ordering::SeqCst));

        let only_failing = json!({ "pta_u1_power": 10 }).to_string();
        let (status, _) = send(app, post_json("/data", only_failing)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
