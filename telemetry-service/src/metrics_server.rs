use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and serve `/metrics` on `bind_addr`.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics.bind_addr: {e}"))?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus metrics recorder: {e}"))?;

    // Only the first handle is kept; init is called once per process.
    let _ = PROM_HANDLE.set(handle);
    describe_metrics();

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(metrics_handler));

        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    tracing::error!(error = %e, "metrics server error");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to bind metrics listener");
            }
        }
    });

    Ok(())
}

fn describe_metrics() {
    describe_counter!("telemetry_ingest_requests_total", "POST /data requests received");
    describe_counter!("telemetry_readings_stored_total", "Unit readings persisted");
    describe_counter!("telemetry_store_write_retry_total", "Reading writes retried after a store error");
    describe_counter!("telemetry_store_write_errors_total", "Reading writes abandoned after the last attempt");
    describe_counter!("telemetry_decode_skipped_keys_total", "Payload keys skipped while decoding");
    describe_counter!("telemetry_dropped_drafts_total", "Decoded readings dropped for an out-of-range unit");
    describe_counter!("retention_deleted_readings_total", "Readings removed by retention");
    describe_counter!("retention_plant_errors_total", "Per-plant retention failures");
}

async fn metrics_handler() -> String {
    PROM_HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}
