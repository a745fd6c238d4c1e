use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{format_date_time, format_time_of_day, ApiError, AppState};
use crate::{
    config::secs,
    history::{self, round2, HistorySeries},
    status::{PlantStatus, UnitState, UnitStatusView},
};

/// Upper bound on buckets per history request.
const MAX_HISTORY_BUCKETS: u64 = 50_000;

#[derive(Debug, Serialize)]
pub struct UnitDetail {
    pub unit_id: i32,
    pub status: UnitState,
    pub online: bool,
    pub standby: bool,
    pub power: f64,
    pub current_avg: f64,
    pub voltage_avg: f64,
    pub current_l1: f64,
    pub current_l2: f64,
    pub current_l3: f64,
    pub voltage_l12: f64,
    pub voltage_l23: f64,
    pub voltage_l13: f64,
    pub energy: f64,
    pub runtime: f64,
    pub last_seen: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlantDetail {
    pub plant_id: i32,
    pub name: String,
    pub total_units: i32,
    pub running_units: u32,
    pub standby_units: u32,
    pub offline_units: u32,
    pub online_units: u32,
    pub total_power: f64,
    pub average_power_per_unit: f64,
    pub units: Vec<UnitDetail>,
}

#[derive(Debug, Serialize)]
pub struct PlantDetailsResponse {
    #[serde(flatten)]
    pub plant: PlantDetail,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct MasterLiveResponse {
    pub plants: Vec<PlantDetail>,
    pub total_power: f64,
    pub total_running_units: u32,
    pub total_standby_units: u32,
    pub total_offline_units: u32,
    pub total_online_units: u32,
    pub total_units: i32,
    pub active_plants: u32,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub lookback_secs: Option<u64>,
    pub bucket_secs: Option<u64>,
}

fn unit_detail(view: &UnitStatusView, state: &AppState) -> UnitDetail {
    let m = &view.measurements;
    let v = |x: Option<f64>| round2(x.unwrap_or(0.0));

    UnitDetail {
        unit_id: view.unit_id,
        status: view.state,
        online: view.state != UnitState::Offline,
        standby: view.state == UnitState::Standby,
        power: v(m.power),
        current_avg: v(m.current_avg),
        voltage_avg: v(m.voltage_avg),
        current_l1: v(m.current_l1),
        current_l2: v(m.current_l2),
        current_l3: v(m.current_l3),
        voltage_l12: v(m.voltage_l12),
        voltage_l23: v(m.voltage_l23),
        voltage_l13: v(m.voltage_l13),
        energy: v(m.energy),
        runtime: v(m.runtime),
        last_seen: view
            .last_seen
            .map(|ts| format_time_of_day(ts, state.presentation_offset)),
    }
}

fn plant_detail(status: &PlantStatus, state: &AppState) -> PlantDetail {
    PlantDetail {
        plant_id: status.plant_id,
        name: status.name.clone(),
        total_units: status.total_units,
        running_units: status.running_units,
        standby_units: status.standby_units,
        offline_units: status.offline_units,
        online_units: status.online_units(),
        total_power: round2(status.total_power),
        average_power_per_unit: round2(status.average_power_per_unit()),
        units: status.units.iter().map(|u| unit_detail(u, state)).collect(),
    }
}

/// `GET /api/master/live`
pub async fn master_live(State(state): State<AppState>) -> Result<Json<MasterLiveResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let system = state.classifier.classify_system(now).await?;

    Ok(Json(MasterLiveResponse {
        plants: system.plants.iter().map(|p| plant_detail(p, &state)).collect(),
        total_power: round2(system.total_power),
        total_running_units: system.running_units,
        total_standby_units: system.standby_units,
        total_offline_units: system.offline_units,
        total_online_units: system.online_units(),
        total_units: system.total_units,
        active_plants: system.active_plants,
        timestamp: format_date_time(now, state.presentation_offset),
    }))
}

/// `GET /api/plant/:plant_id/details`
pub async fn plant_details(
    State(state): State<AppState>,
    Path(plant_id): Path<i32>,
) -> Result<Json<PlantDetailsResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let status = state
        .classifier
        .classify_plant(plant_id, now)
        .await?
        .ok_or(ApiError::PlantNotFound(plant_id))?;

    Ok(Json(PlantDetailsResponse {
        plant: plant_detail(&status, &state),
        timestamp: format_date_time(now, state.presentation_offset),
    }))
}

/// `GET /api/plant/:plant_id/history?lookback_secs=&bucket_secs=`
pub async fn plant_history(
    State(state): State<AppState>,
    Path(plant_id): Path<i32>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistorySeries>, ApiError> {
    if !state.registry.contains(plant_id) {
        return Err(ApiError::PlantNotFound(plant_id));
    }

    let lookback = params.lookback_secs.map(secs).unwrap_or(state.history_lookback);
    let width = params.bucket_secs.map(secs).unwrap_or(state.history_bucket_width);

    let width_secs = width.whole_seconds();
    if width_secs < 1 {
        return Err(ApiError::BadRequest("bucket_secs must be at least 1".to_string()));
    }
    if lookback.whole_seconds() / width_secs > MAX_HISTORY_BUCKETS as i64 {
        return Err(ApiError::BadRequest(format!(
            "history window exceeds {MAX_HISTORY_BUCKETS} buckets"
        )));
    }

    let now = OffsetDateTime::now_utc();
    let start = now
        .checked_sub(lookback)
        .ok_or_else(|| ApiError::BadRequest("lookback_secs reaches past the supported date range".to_string()))?;
    let buckets = history::plant_history(state.store.as_ref(), plant_id, start, now, width).await?;

    Ok(Json(HistorySeries::from_buckets(&buckets, state.presentation_offset, width)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use plant_client::domain::{UnitReading, UnitReadingDraft};
    use time::{Duration, OffsetDateTime};

    use crate::{
        http::{
            router,
            tests::{get, send, test_state},
        },
        store::{MemoryReadingStore, ReadingStore, StoreError},
    };

    /// Every read fails as if the database were down.
    struct UnreachableStore;

    #[async_trait::async_trait]
    impl ReadingStore for UnreachableStore {
        async fn insert(&self, _draft: &UnitReadingDraft, _ts: OffsetDateTime) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn latest(
            &self,
            _plant_id: i32,
            _unit_id: i32,
            _since: OffsetDateTime,
        ) -> Result<Option<UnitReading>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn range(&self, _plant_id: i32, _since: OffsetDateTime) -> Result<Vec<UnitReading>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn delete_older_than(&self, _plant_id: i32, _cutoff: OffsetDateTime) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn unknown_plant_is_not_found() {
        let app = router(test_state(Arc::new(MemoryReadingStore::new())));

        let (status, body) = send(app.clone(), get("/api/plant/99/details")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Plant 99 not found");

        let (status, _) = send(app, get("/api/plant/99/history")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn silent_plant_reports_all_units_offline() {
        let app = router(test_state(Arc::new(MemoryReadingStore::new())));

        let (status, body) = send(app, get("/api/plant/5/details")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "GRU");
        assert_eq!(body["offline_units"], 3);
        assert_eq!(body["total_power"], 0.0);
        assert_eq!(body["average_power_per_unit"], 0.0);
        let units = body["units"].as_array().expect("units array");
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u["status"] == "offline" && u["last_seen"].is_null()));
    }

    #[tokio::test]
    async fn stale_unit_is_excluded_from_plant_power() {
        let store = Arc::new(MemoryReadingStore::new());
        let now = OffsetDateTime::now_utc();
        let mut fresh = UnitReadingDraft::new(2, 1);
        fresh.measurements.power = Some(400.0);
        let mut stale = UnitReadingDraft::new(2, 2);
        stale.measurements.power = Some(900.0);
        store.insert(&fresh, now).await.unwrap();
        store.insert(&stale, now - Duration::minutes(5)).await.unwrap();

        let (_, body) = send(router(test_state(store)), get("/api/plant/2/details")).await;

        assert_eq!(body["running_units"], 1);
        assert_eq!(body["offline_units"], 1);
        assert_eq!(body["total_power"], 400.0);
        assert_eq!(body["units"][1]["power"], 0.0);
    }

    #[tokio::test]
    async fn history_is_contiguous_for_empty_plant() {
        let app = router(test_state(Arc::new(MemoryReadingStore::new())));

        let (status, body) = send(app.clone(), get("/api/plant/2/history")).await;
        assert_eq!(status, StatusCode::OK);
        let labels = body["labels"].as_array().expect("labels");
        let power = body["power"].as_array().expect("power");
        assert_eq!(labels.len(), 61);
        assert_eq!(labels.len(), power.len());
        assert!(power.iter().all(|p| p.as_f64() == Some(0.0)));

        let (status, body) = send(app.clone(), get("/api/plant/2/history?lookback_secs=600&bucket_secs=300")).await;
        assert_eq!(status, StatusCode::OK);
        assert!((2..=3).contains(&body["labels"].as_array().expect("labels").len()));

        let (status, _) = send(app, get("/api/plant/2/history?bucket_secs=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lookback_beyond_date_range_is_bad_request() {
        let app = router(test_state(Arc::new(MemoryReadingStore::new())));

        let (status, body) = send(
            app,
            get("/api/plant/2/history?lookback_secs=1000000000000&bucket_secs=100000000"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn store_failure_on_queries_is_server_error() {
        let app = router(test_state(Arc::new(UnreachableStore)));

        for uri in ["/api/master/live", "/api/plant/1/details", "/api/plant/1/history"] {
            let (status, body) = send(app.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "uri {uri}");
            assert_eq!(body["status"], "error", "uri {uri}");
            assert!(body.get("plants").is_none() && body.get("labels").is_none());
        }
    }
}
