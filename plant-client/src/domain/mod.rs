mod plant;
mod unit_reading;

pub use plant::PlantDefinition;
pub use unit_reading::{Measurements, UnitReading, UnitReadingDraft};
