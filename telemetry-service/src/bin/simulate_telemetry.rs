use anyhow::{bail, Result};
use rand::Rng;
use serde_json::{Map, Value};
use std::{env, time::Duration};
use telemetry_service::{config::AppConfig, observability};

const MAX_POST_ATTEMPTS: u32 = 3;
const CYCLE_PAUSE: Duration = Duration::from_secs(5);
const UNIT_PAUSE: Duration = Duration::from_millis(100);

/// One device payload for a unit, keyed `<plant>_u<unit>_<param>`.
fn unit_payload(rng: &mut impl Rng, plant: &str, unit_id: i32) -> Map<String, Value> {
    let token = plant.to_ascii_lowercase();
    let mut payload = Map::new();
    let mut put = |param: &str, value: u32| {
        payload.insert(format!("{token}_u{unit_id}_{param}"), Value::from(value));
    };

    put("power", rng.gen_range(1000..=2000));
    for phase in ["current_L1", "current_L2", "current_L3"] {
        put(phase, rng.gen_range(100..=200));
    }
    for phase in ["voltage_L12", "voltage_L23", "voltage_L13"] {
        put(phase, rng.gen_range(100..=230));
    }
    put("energy", rng.gen_range(1_000_000..=2_000_000));
    put("runtime", rng.gen_range(1000..=100_000));

    payload
}

async fn post_with_retry(client: &reqwest::Client, url: &str, payload: &Map<String, Value>) -> Result<Value> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let res = client
            .post(url)
            .json(payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match res {
            Ok(resp) => return Ok(resp.json().await?),
            Err(e) if attempt < MAX_POST_ATTEMPTS => {
                tracing::warn!(error = %e, attempt, "post failed, retrying");
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn run(url: &str, cfg: &AppConfig) -> Result<()> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
    let mut sent: u64 = 0;

    loop {
        for plant in &cfg.plants {
            for unit_id in 1..=plant.unit_count {
                let payload = unit_payload(&mut rand::thread_rng(), &plant.name, unit_id);
                sent += 1;

                match post_with_retry(&client, url, &payload).await {
                    Ok(resp) => tracing::info!(sample = sent, plant = %plant.name, unit_id, status = %resp["status"], "sample sent"),
                    Err(e) => tracing::error!(sample = sent, plant = %plant.name, unit_id, error = %e, "sample failed"),
                }

                tokio::time::sleep(UNIT_PAUSE).await;
            }
        }

        tracing::info!(total_sent = sent, "cycle complete");
        tokio::time::sleep(CYCLE_PAUSE).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: simulate_telemetry <ingest_url>");
    }
    let url = &args[1];

    // Plant names and unit counts come from the same config the service uses.
    let cfg = AppConfig::load()?;

    tokio::select! {
        res = run(url, &cfg) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("simulation stopped");
            Ok(())
        }
    }
}
