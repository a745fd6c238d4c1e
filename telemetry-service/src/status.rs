//! Live unit state derived from the newest reading inside a freshness window.

use std::sync::Arc;

use plant_client::domain::{Measurements, UnitReading};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
    config::saturating_before,
    registry::PlantRegistry,
    store::{ReadingStore, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Running,
    Standby,
    Offline,
}

/// Classify the newest in-window reading of a unit, or its absence.
///
/// A unit that reports but has zero (or missing) power, current average
/// and voltage average is on standby, not offline.
pub fn classify_reading(reading: Option<&UnitReading>) -> UnitState {
    let Some(reading) = reading else {
        return UnitState::Offline;
    };

    let m = &reading.measurements;
    let is_zero = |v: Option<f64>| v.unwrap_or(0.0) == 0.0;
    if is_zero(m.power) && is_zero(m.current_avg) && is_zero(m.voltage_avg) {
        UnitState::Standby
    } else {
        UnitState::Running
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitStatusView {
    pub unit_id: i32,
    pub state: UnitState,
    /// Zeroed when the unit is offline.
    pub measurements: Measurements,
    pub last_seen: Option<OffsetDateTime>,
}

impl UnitStatusView {
    pub fn power(&self) -> f64 {
        self.measurements.power.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlantStatus {
    pub plant_id: i32,
    pub name: String,
    pub total_units: i32,
    pub running_units: u32,
    pub standby_units: u32,
    pub offline_units: u32,
    /// Sum of running units' power only.
    pub total_power: f64,
    pub units: Vec<UnitStatusView>,
}

impl PlantStatus {
    pub fn online_units(&self) -> u32 {
        self.running_units + self.standby_units
    }

    pub fn is_active(&self) -> bool {
        self.running_units > 0
    }

    pub fn average_power_per_unit(&self) -> f64 {
        if self.running_units == 0 {
            0.0
        } else {
            self.total_power / f64::from(self.running_units)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub plants: Vec<PlantStatus>,
    pub total_power: f64,
    pub running_units: u32,
    pub standby_units: u32,
    pub offline_units: u32,
    pub total_units: i32,
    pub active_plants: u32,
}

impl SystemStatus {
    pub fn online_units(&self) -> u32 {
        self.running_units + self.standby_units
    }
}

#[derive(Clone)]
pub struct StatusClassifier {
    store: Arc<dyn ReadingStore>,
    registry: Arc<PlantRegistry>,
    freshness_window: Duration,
}

impl StatusClassifier {
    pub fn new(store: Arc<dyn ReadingStore>, registry: Arc<PlantRegistry>, freshness_window: Duration) -> Self {
        Self {
            store,
            registry,
            freshness_window,
        }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub async fn classify_unit(
        &self,
        plant_id: i32,
        unit_id: i32,
        now: OffsetDateTime,
    ) -> Result<UnitStatusView, StoreError> {
        let latest = self
            .store
            .latest(plant_id, unit_id, saturating_before(now, self.freshness_window))
            .await?;
        let state = classify_reading(latest.as_ref());

        Ok(match latest {
            Some(reading) => UnitStatusView {
                unit_id,
                state,
                measurements: reading.measurements,
                last_seen: Some(reading.ts),
            },
            None => UnitStatusView {
                unit_id,
                state: UnitState::Offline,
                measurements: Measurements::default(),
                last_seen: None,
            },
        })
    }

    /// Classify every unit of a plant; `None` when the plant is not configured.
    pub async fn classify_plant(&self, plant_id: i32, now: OffsetDateTime) -> Result<Option<PlantStatus>, StoreError> {
        let Some(unit_count) = self.registry.unit_count(plant_id) else {
            return Ok(None);
        };

        let mut status = PlantStatus {
            plant_id,
            name: self.registry.display_name(plant_id),
            total_units: unit_count,
            running_units: 0,
            standby_units: 0,
            offline_units: 0,
            total_power: 0.0,
            units: Vec::with_capacity(usize::try_from(unit_count).unwrap_or_default()),
        };

        for unit_id in 1..=unit_count {
            let view = self.classify_unit(plant_id, unit_id, now).await?;
            match view.state {
                UnitState::Running => {
                    status.running_units += 1;
                    status.total_power += view.power();
                }
                UnitState::Standby => status.standby_units += 1,
                UnitState::Offline => status.offline_units += 1,
            }
            status.units.push(view);
        }

        Ok(Some(status))
    }

    pub async fn classify_system(&self, now: OffsetDateTime) -> Result<SystemStatus, StoreError> {
        let mut system = SystemStatus {
            plants: Vec::new(),
            total_power: 0.0,
            running_units: 0,
            standby_units: 0,
            offline_units: 0,
            total_units: self.registry.total_units(),
            active_plants: 0,
        };

        for plant in self.registry.plants() {
            let Some(status) = self.classify_plant(plant.id, now).await? else {
                continue;
            };

            system.total_power += status.total_power;
            system.running_units += status.running_units;
            system.standby_units += status.standby_units;
            system.offline_units += status.offline_units;
            if status.is_active() {
                system.active_plants += 1;
            }
            system.plants.push(status);
        }

        Ok(system)
    }
}
