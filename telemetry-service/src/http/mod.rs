pub mod ingest;
pub mod query;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime, UtcOffset};

use crate::{
    registry::PlantRegistry,
    status::StatusClassifier,
    store::{ReadingStore, RetryPolicy, StoreError},
};

const DATE_TIME: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const TIME_OF_DAY: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Shared handles for every route; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub registry: Arc<PlantRegistry>,
    pub classifier: StatusClassifier,
    pub retry: RetryPolicy,
    pub history_lookback: Duration,
    pub history_bucket_width: Duration,
    pub presentation_offset: UtcOffset,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", post(ingest::receive_data))
        .route("/api/master/live", get(query::master_live))
        .route("/api/plant/:plant_id/details", get(query::plant_details))
        .route("/api/plant/:plant_id/history", get(query::plant_history))
        .with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Plant {0} not found")]
    PlantNotFound(i32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PlantNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(e) => {
                tracing::error!(error = %e, "store failure while serving request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub(crate) fn format_date_time(ts: OffsetDateTime, offset: UtcOffset) -> String {
    ts.to_offset(offset).format(DATE_TIME).unwrap_or_default()
}

pub(crate) fn format_time_of_day(ts: OffsetDateTime, offset: UtcOffset) -> String {
    ts.to_offset(offset).format(TIME_OF_DAY).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{registry::test_registry, store::MemoryReadingStore};
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use time::macros::{datetime, offset};
    use tower::ServiceExt;

    pub(crate) fn test_state(store: Arc<dyn ReadingStore>) -> AppState {
        let registry = Arc::new(test_registry());
        AppState {
            classifier: StatusClassifier::new(store.clone(), registry.clone(), Duration::minutes(2)),
            store,
            registry,
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: std::time::Duration::ZERO,
            },
            history_lookback: Duration::hours(1),
            history_bucket_width: Duration::minutes(1),
            presentation_offset: offset!(+5:30),
        }
    }

    pub(crate) async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.expect("router is infallible");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn timestamps_render_in_presentation_offset() {
        let ts = datetime!(2024-05-10 20:45:07 UTC);
        assert_eq!(format_date_time(ts, offset!(+5:30)), "2024-05-11 02:15:07");
        assert_eq!(format_time_of_day(ts, offset!(+5:30)), "02:15:07");
    }

    #[tokio::test]
    async fn ingested_unit_shows_up_as_running() {
        let store = Arc::new(MemoryReadingStore::new());
        let app = router(test_state(store.clone()));

        let payload = serde_json::json!({
            "pta_u1_power": 1500,
            "pta_u1_current_L1": 150,
            "pta_u1_current_L2": 150,
            "pta_u1_voltage_L12": 230
        });
        let (status, body) = send(app.clone(), post_json("/data", payload.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored_records"], 1);

        let (status, live) = send(app.clone(), get("/api/master/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(live["total_running_units"], 1);
        assert_eq!(live["total_power"], 1500.0);
        assert_eq!(live["active_plants"], 1);

        let (status, details) = send(app, get("/api/plant/1/details")).await;
        assert_eq!(status, StatusCode::OK);
        let unit = &details["units"][0];
        assert_eq!(unit["status"], "running");
        assert_eq!(unit["current_avg"], 150.0);
        assert_eq!(unit["voltage_avg"], 230.0);
        assert_eq!(unit["online"], true);
    }
}
