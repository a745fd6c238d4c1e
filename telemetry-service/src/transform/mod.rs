pub mod decode;

pub use decode::{decode, Parameter};

use plant_client::domain::UnitReadingDraft;

use crate::registry::PlantRegistry;

/// Drop drafts whose unit is outside `1..=unit_count` for their plant.
///
/// Returns the drafts that may be persisted; dropped ones are logged and
/// counted but never reported back to the device.
pub fn retain_known_units(
    drafts: Vec<UnitReadingDraft>,
    registry: &PlantRegistry,
) -> Vec<UnitReadingDraft> {
    let (valid, dropped): (Vec<_>, Vec<_>) = drafts
        .into_iter()
        .partition(|d| registry.validate(d.plant_id, d.unit_id));

    for d in &dropped {
        tracing::warn!(plant_id = d.plant_id, unit_id = d.unit_id, "dropping reading for unknown unit");
    }
    if !dropped.is_empty() {
        metrics::counter!("telemetry_dropped_drafts_total").increment(dropped.len() as u64);
    }

    valid
}
