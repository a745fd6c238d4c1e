use std::collections::BTreeMap;

use plant_client::domain::{Measurements, UnitReadingDraft};
use serde_json::{Map, Value};

use crate::registry::PlantRegistry;

/// A measurement a field device may report, keyed by its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Power,
    CurrentL1,
    CurrentL2,
    CurrentL3,
    VoltageL12,
    VoltageL23,
    VoltageL13,
    Energy,
    Runtime,
}

/// Wire names are case-sensitive.
const PARAMETERS: &[(&str, Parameter)] = &[
    ("power", Parameter::Power),
    ("current_L1", Parameter::CurrentL1),
    ("current_L2", Parameter::CurrentL2),
    ("current_L3", Parameter::CurrentL3),
    ("voltage_L12", Parameter::VoltageL12),
    ("voltage_L23", Parameter::VoltageL23),
    ("voltage_L13", Parameter::VoltageL13),
    ("energy", Parameter::Energy),
    ("runtime", Parameter::Runtime),
];

impl Parameter {
    pub fn from_name(name: &str) -> Option<Self> {
        PARAMETERS
            .iter()
            .find(|(wire, _)| *wire == name)
            .map(|(_, p)| *p)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        PARAMETERS.iter().map(|(wire, _)| *wire)
    }

    fn slot(self, m: &mut Measurements) -> &mut Option<f64> {
        match self {
            Parameter::Power => &mut m.power,
            Parameter::CurrentL1 => &mut m.current_l1,
            Parameter::CurrentL2 => &mut m.current_l2,
            Parameter::CurrentL3 => &mut m.current_l3,
            Parameter::VoltageL12 => &mut m.voltage_l12,
            Parameter::VoltageL23 => &mut m.voltage_l23,
            Parameter::VoltageL13 => &mut m.voltage_l13,
            Parameter::Energy => &mut m.energy,
            Parameter::Runtime => &mut m.runtime,
        }
    }
}

/// The three parts of a `<plant>_u<unit>_<param>` key.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct KeyParts<'a> {
    pub plant_token: &'a str,
    pub unit_id: i32,
    pub param: &'a str,
}

/// Split a key of the shape `<alnum token>_u<digits>_<param>`.
pub(crate) fn split_key(key: &str) -> Option<KeyParts<'_>> {
    let (plant_token, rest) = key.split_once('_')?;
    if plant_token.is_empty() || !plant_token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let rest = rest.strip_prefix('u')?;
    let (digits, param) = rest.split_once('_')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || param.is_empty() {
        return None;
    }

    let unit_id = digits.parse().ok()?;
    Some(KeyParts {
        plant_token,
        unit_id,
        param,
    })
}

fn parse_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decode a flat device payload into one draft per (plant, unit).
///
/// Keys that do not match the expected shape, name an unknown plant or an
/// unknown parameter, or carry a non-numeric value are skipped one by one;
/// they never abort the rest of the payload. Drafts come back ordered by
/// plant then unit, with phase averages filled in.
pub fn decode(payload: &Map<String, Value>, registry: &PlantRegistry) -> Vec<UnitReadingDraft> {
    let mut drafts: BTreeMap<(i32, i32), UnitReadingDraft> = BTreeMap::new();
    let mut skipped: u64 = 0;

    for (key, value) in payload {
        let Some(parts) = split_key(key) else {
            skipped += 1;
            continue;
        };
        let Some(plant_id) = registry.resolve_token(parts.plant_token) else {
            tracing::debug!(key = %key, "skipping key for unknown plant");
            skipped += 1;
            continue;
        };

        let draft = drafts
            .entry((plant_id, parts.unit_id))
            .or_insert_with(|| UnitReadingDraft::new(plant_id, parts.unit_id));

        let (Some(param), Some(v)) = (Parameter::from_name(parts.param), parse_value(value)) else {
            skipped += 1;
            continue;
        };
        *param.slot(&mut draft.measurements) = Some(v);
    }

    if skipped > 0 {
        metrics::counter!("telemetry_decode_skipped_keys_total").increment(skipped);
    }

    drafts
        .into_values()
        .map(|mut draft| {
            draft.measurements.compute_averages();
            draft
        })
        .collect()
}
