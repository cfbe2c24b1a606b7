use crate::math::geo::GeoPoint;
use crate::meteorology::source::MeteorologySource;
use crate::meteorology::store::{IntervalStore, StoreEntry};
use crate::prelude::TimeInterval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored wind fact: either a speed (m/s) or a direction (degrees, wind from).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindComponent {
    pub value: f64,
    pub error: f64,
    pub source: MeteorologySource,
    pub valid: TimeInterval,
    /// Where the value applies; `None` applies network-wide.
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl StoreEntry for WindComponent {
    fn valid(&self) -> &TimeInterval {
        &self.valid
    }

    fn error(&self) -> f64 {
        self.error
    }

    fn source(&self) -> MeteorologySource {
        self.source
    }
}

/// Wind speed and direction active for one place and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindField {
    pub speed: f64,
    pub speed_error: f64,
    pub speed_source: MeteorologySource,
    /// Direction the wind blows from, degrees clockwise from north.
    pub direction: f64,
    pub direction_error: f64,
    pub direction_source: MeteorologySource,
    pub valid: TimeInterval,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl WindField {
    pub fn with_direction(&self, direction: f64) -> WindField {
        WindField {
            direction,
            ..self.clone()
        }
    }
}

/// Speeds and directions kept as independent interval stores.
#[derive(Debug, Clone)]
pub struct WindDataBase {
    speeds: IntervalStore<WindComponent>,
    directions: IntervalStore<WindComponent>,
    lookup_radius_m: f64,
}

impl WindDataBase {
    pub fn new(lookup_radius_m: f64) -> Self {
        Self {
            speeds: IntervalStore::new(),
            directions: IntervalStore::new(),
            lookup_radius_m,
        }
    }

    pub fn insert_speed(&mut self, speed: WindComponent) {
        self.speeds.insert(speed);
    }

    pub fn insert_direction(&mut self, direction: WindComponent) {
        self.directions.insert(direction);
    }

    /// Stores both halves of a complete field.
    pub fn insert_field(&mut self, field: &WindField) {
        self.insert_speed(WindComponent {
            value: field.speed,
            error: field.speed_error,
            source: field.speed_source,
            valid: field.valid,
            location: field.location,
        });
        self.insert_direction(WindComponent {
            value: field.direction,
            error: field.direction_error,
            source: field.direction_source,
            valid: field.valid,
            location: field.location,
        });
    }

    pub fn speed_count(&self) -> usize {
        self.speeds.len()
    }

    pub fn direction_count(&self) -> usize {
        self.directions.len()
    }

    fn best<'a>(
        &self,
        store: &'a IntervalStore<WindComponent>,
        time: DateTime<Utc>,
        at: Option<&GeoPoint>,
    ) -> Option<&'a WindComponent> {
        let distance = |c: &WindComponent| match (c.location.as_ref(), at) {
            (Some(loc), Some(p)) => loc.distance_to(p),
            _ => 0.0,
        };
        let radius = self.lookup_radius_m;
        store.best_at_with(
            time,
            |c| distance(c) <= radius,
            |a, b| distance(a).total_cmp(&distance(b)),
        )
    }

    /// The active wind at `time` near `at`.
    ///
    /// Located entries further away than the lookup radius are ignored; among
    /// the rest the smallest error wins, then the more trusted source, then the
    /// nearest location.
    pub fn wind_field(&self, time: DateTime<Utc>, at: Option<&GeoPoint>) -> Option<WindField> {
        let speed = self.best(&self.speeds, time, at)?;
        let direction = self.best(&self.directions, time, at)?;
        let valid = speed
            .valid
            .intersection(&direction.valid)
            .unwrap_or(TimeInterval::new(time, time));
        Some(WindField {
            speed: speed.value,
            speed_error: speed.error,
            speed_source: speed.source,
            direction: direction.value,
            direction_error: direction.error,
            direction_source: direction.source,
            valid,
            location: speed.location.or(direction.location),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    fn component(value: f64, error: f64, source: MeteorologySource, location: Option<GeoPoint>) -> WindComponent {
        WindComponent {
            value,
            error,
            source,
            valid: TimeInterval::new(at(0), at(23)),
            location,
        }
    }

    #[test]
    fn speed_and_direction_are_chosen_independently() {
        let mut db = WindDataBase::new(50_000.0);
        db.insert_speed(component(10.0, 3.0, MeteorologySource::Default, None));
        db.insert_direction(component(0.0, 90.0, MeteorologySource::Default, None));
        db.insert_speed(component(8.0, 0.5, MeteorologySource::DualBeamMeasurement, None));
        db.insert_direction(component(265.0, 4.0, MeteorologySource::GeometryCalculation, None));
        let field = db.wind_field(at(12), None).unwrap();
        assert_eq!(field.speed, 8.0);
        assert_eq!(field.speed_source, MeteorologySource::DualBeamMeasurement);
        assert_eq!(field.direction, 265.0);
        assert_eq!(field.direction_source, MeteorologySource::GeometryCalculation);
    }

    #[test]
    fn missing_component_means_no_field() {
        let mut db = WindDataBase::new(50_000.0);
        db.insert_speed(component(10.0, 3.0, MeteorologySource::Default, None));
        assert!(db.wind_field(at(12), None).is_none());
    }

    #[test]
    fn far_away_model_points_are_ignored_and_ties_go_to_the_nearest() {
        let here = GeoPoint::new(-1.5, -78.4, 2500.0);
        let near = GeoPoint::new(-1.6, -78.4, 0.0);
        let nearer = GeoPoint::new(-1.51, -78.4, 0.0);
        let far = GeoPoint::new(10.0, -78.4, 0.0);
        let mut db = WindDataBase::new(50_000.0);
        db.insert_speed(component(5.0, 1.0, MeteorologySource::EcmwfAnalysis, Some(far)));
        db.insert_speed(component(7.0, 2.0, MeteorologySource::EcmwfAnalysis, Some(near)));
        db.insert_speed(component(6.0, 2.0, MeteorologySource::EcmwfAnalysis, Some(nearer)));
        db.insert_direction(component(90.0, 5.0, MeteorologySource::EcmwfAnalysis, None));
        let field = db.wind_field(at(12), Some(&here)).unwrap();
        assert_eq!(field.speed, 6.0);
    }
}
