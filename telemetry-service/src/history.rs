//! Gap-filled power history for charting.

use std::collections::{BTreeMap, HashMap};

use plant_client::domain::UnitReading;
use serde::Serialize;
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime, UtcOffset};

use crate::store::{ReadingStore, StoreError};

const MINUTE_LABEL: &[FormatItem<'static>] = format_description!("[hour]:[minute]");
const SECOND_LABEL: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryBucket {
    pub interval_start: OffsetDateTime,
    pub total_power: f64,
}

fn width_secs(width: Duration) -> i64 {
    width.whole_seconds().max(1)
}

fn bucket_key(ts: OffsetDateTime, width: i64) -> i64 {
    ts.unix_timestamp().div_euclid(width) * width
}

/// Bucket readings into contiguous `width`-sized intervals covering `[start, end]`.
///
/// Inside a bucket each unit contributes only its most recent power value;
/// the bucket total is the sum over units. Buckets nobody reported in are
/// still emitted with zero power. Widths are whole seconds, minimum one.
pub fn bucket_readings(
    readings: &[UnitReading],
    start: OffsetDateTime,
    end: OffsetDateTime,
    width: Duration,
) -> Vec<HistoryBucket> {
    let width = width_secs(width);
    let first = bucket_key(start, width);
    let last = bucket_key(end, width);

    let mut latest_per_unit: BTreeMap<i64, HashMap<i32, (OffsetDateTime, f64)>> = BTreeMap::new();
    for r in readings {
        let key = bucket_key(r.ts, width);
        if key < first || key > last {
            continue;
        }

        let power = r.measurements.power.unwrap_or(0.0);
        latest_per_unit
            .entry(key)
            .or_default()
            .entry(r.unit_id)
            .and_modify(|slot| {
                if r.ts >= slot.0 {
                    *slot = (r.ts, power);
                }
            })
            .or_insert((r.ts, power));
    }

    let mut buckets = Vec::new();
    let mut key = first;
    while key <= last {
        let total_power = latest_per_unit
            .get(&key)
            .map(|units| units.values().map(|(_, p)| p).sum::<f64>())
            .unwrap_or(0.0);

        if let Ok(interval_start) = OffsetDateTime::from_unix_timestamp(key) {
            buckets.push(HistoryBucket {
                interval_start,
                total_power,
            });
        }
        key += width;
    }

    buckets
}

/// Fetch a plant's readings in `[start, now]` and bucket them.
pub async fn plant_history(
    store: &dyn ReadingStore,
    plant_id: i32,
    start: OffsetDateTime,
    now: OffsetDateTime,
    width: Duration,
) -> Result<Vec<HistoryBucket>, StoreError> {
    let readings = store.range(plant_id, start).await?;
    Ok(bucket_readings(&readings, start, now, width))
}

/// Chart-ready series: `labels[i]` names the bucket whose total is `power[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySeries {
    pub labels: Vec<String>,
    pub power: Vec<f64>,
}

impl HistorySeries {
    pub fn from_buckets(buckets: &[HistoryBucket], offset: UtcOffset, width: Duration) -> Self {
        let format = if width_secs(width) % 60 == 0 {
            MINUTE_LABEL
        } else {
            SECOND_LABEL
        };

        let labels = buckets
            .iter()
            .map(|b| b.interval_start.to_offset(offset).format(format).unwrap_or_default())
            .collect();
        let power = buckets.iter().map(|b| round2(b.total_power)).collect();

        Self { labels, power }
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
