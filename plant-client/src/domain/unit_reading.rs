use time::OffsetDateTime;

/// Electrical measurements carried by one reading.
///
/// Every field is optional: a phase the device did not report stays `None`
/// rather than being treated as zero.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct Measurements {
    pub power: Option<f64>,
    pub current_l1: Option<f64>,
    pub current_l2: Option<f64>,
    pub current_l3: Option<f64>,
    pub current_avg: Option<f64>,
    pub voltage_l12: Option<f64>,
    pub voltage_l23: Option<f64>,
    pub voltage_l13: Option<f64>,
    pub voltage_avg: Option<f64>,
    pub energy: Option<f64>,
    pub runtime: Option<f64>,
}

impl Measurements {
    /// Fill `current_avg` and `voltage_avg` from whichever phases are present.
    pub fn compute_averages(&mut self) {
        self.current_avg = mean_of_present(&[self.current_l1, self.current_l2, self.current_l3]);
        self.voltage_avg = mean_of_present(&[self.voltage_l12, self.voltage_l23, self.voltage_l13]);
    }
}

fn mean_of_present(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count))
    }
}

/// A decoded, not yet persisted reading for one (plant, unit) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReadingDraft {
    pub plant_id: i32,
    pub unit_id: i32,
    pub measurements: Measurements,
}

impl UnitReadingDraft {
    pub fn new(plant_id: i32, unit_id: i32) -> Self {
        Self {
            plant_id,
            unit_id,
            measurements: Measurements::default(),
        }
    }

    pub fn into_reading(self, id: i64, ts: OffsetDateTime) -> UnitReading {
        UnitReading {
            id,
            plant_id: self.plant_id,
            unit_id: self.unit_id,
            measurements: self.measurements,
            ts,
        }
    }
}

/// A persisted reading as stored in `unit_readings`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UnitReading {
    pub id: i64,
    pub plant_id: i32,
    pub unit_id: i32,
    #[sqlx(flatten)]
    pub measurements: Measurements,
    pub ts: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_skip_missing_phases() {
        let mut m = Measurements {
            current_l1: Some(150.0),
            current_l2: Some(150.0),
            voltage_l12: Some(230.0),
            ..Default::default()
        };
        m.compute_averages();

        assert_eq!(m.current_avg, Some(150.0));
        assert_eq!(m.voltage_avg, Some(230.0));
    }

    #[test]
    fn averages_absent_when_no_phase_reported() {
        let mut m = Measurements {
            power: Some(0.0),
            ..Default::default()
        };
        m.compute_averages();

        assert_eq!(m.current_avg, None);
        assert_eq!(m.voltage_avg, None);
    }

    #[test]
    fn averages_include_reported_zero_values() {
        let mut m = Measurements {
            current_l1: Some(0.0),
            current_l2: Some(90.0),
            current_l3: Some(0.0),
            ..Default::default()
        };
        m.compute_averages();

        assert_eq!(m.current_avg, Some(30.0));
    }
}
