use crate::meteorology::source::MeteorologySource;
use crate::meteorology::store::{IntervalStore, StoreEntry};
use crate::prelude::TimeInterval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plume altitude in metres above sea level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlumeHeight {
    pub altitude: f64,
    pub altitude_error: f64,
    pub source: MeteorologySource,
    pub valid: TimeInterval,
}

impl StoreEntry for PlumeHeight {
    fn valid(&self) -> &TimeInterval {
        &self.valid
    }

    fn error(&self) -> f64 {
        self.altitude_error
    }

    fn source(&self) -> MeteorologySource {
        self.source
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlumeHeightDataBase {
    heights: IntervalStore<PlumeHeight>,
}

impl PlumeHeightDataBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, height: PlumeHeight) {
        self.heights.insert(height);
    }

    pub fn plume_height(&self, time: DateTime<Utc>) -> Option<PlumeHeight> {
        self.heights.best_at(time).cloned()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn triangulated_height_beats_default_inside_its_window() {
        let mut db = PlumeHeightDataBase::new();
        db.insert(PlumeHeight {
            altitude: 6000.0,
            altitude_error: 2000.0,
            source: MeteorologySource::Default,
            valid: TimeInterval::unbounded(),
        });
        db.insert(PlumeHeight {
            altitude: 5400.0,
            altitude_error: 150.0,
            source: MeteorologySource::GeometryCalculation,
            valid: TimeInterval::new(at(10), at(11)),
        });
        assert_eq!(db.plume_height(at(10)).unwrap().altitude, 5400.0);
        assert_eq!(db.plume_height(at(12)).unwrap().altitude, 6000.0);
        assert_eq!(db.len(), 2);
    }
}
