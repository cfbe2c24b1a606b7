use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Closed validity interval used by every time-keyed fact in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Interval covering all representable times, used for user defaults.
    pub fn unbounded() -> Self {
        Self {
            from: DateTime::<Utc>::MIN_UTC,
            to: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// `centre ± half_width_s`.
    pub fn around(centre: DateTime<Utc>, half_width_s: f64) -> Self {
        let half = Duration::milliseconds((half_width_s * 1000.0).round() as i64);
        Self {
            from: centre - half,
            to: centre + half,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.from <= time && time <= self.to
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    pub fn intersection(&self, other: &TimeInterval) -> Option<TimeInterval> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        (from <= to).then_some(TimeInterval { from, to })
    }

    pub fn is_inverted(&self) -> bool {
        self.from > self.to
    }

    pub fn is_unbounded(&self) -> bool {
        self.from == DateTime::<Utc>::MIN_UTC && self.to == DateTime::<Utc>::MAX_UTC
    }
}

impl Default for TimeInterval {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Seconds between two time stamps (`later - earlier`), with millisecond resolution.
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Value with its absolute one-sigma error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub error: f64,
}

impl Estimate {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    pub fn relative_error(&self) -> f64 {
        if self.value.abs() > f64::EPSILON {
            (self.error / self.value).abs()
        } else {
            f64::INFINITY
        }
    }
}

/// Per-scan failures: lookups that came back empty and numerical dead ends.
///
/// None of these abort a batch; the affected scan simply produces no result.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("instrument {0} is not configured")]
    InstrumentNotConfigured(String),
    #[error("no valid location for {serial} at {time}")]
    NoLocation { serial: String, time: DateTime<Utc> },
    #[error("no fit window '{window}' for {serial} at {time}")]
    NoFitWindow {
        serial: String,
        window: String,
        time: DateTime<Utc>,
    },
    #[error("no wind field available at {0}")]
    NoWindField(DateTime<Utc>),
    #[error("no plume height available at {0}")]
    NoPlumeHeight(DateTime<Utc>),
    #[error("plume completeness {completeness:.2} below limit {limit:.2}")]
    LowCompleteness { completeness: f64, limit: f64 },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Configuration problems that must stop the run before any scan is touched.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("instrument serial {0} is configured more than once")]
    DuplicateSerial(String),
    #[error("instrument {serial}: locations '{first}' and '{second}' have overlapping valid times")]
    OverlappingLocations {
        serial: String,
        first: String,
        second: String,
    },
    #[error("instrument {serial}: fit window '{window}' has overlapping valid times")]
    OverlappingFitWindows { serial: String, window: String },
    #[error("instrument {serial}: '{item}' has an inverted valid-time range")]
    InvertedTimeRange { serial: String, item: String },
    #[error("instrument {0} has no locations")]
    NoLocations(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn interval_contains_is_inclusive() {
        let interval = TimeInterval::new(at(10, 0), at(11, 0));
        assert!(interval.contains(at(10, 0)));
        assert!(interval.contains(at(11, 0)));
        assert!(!interval.contains(at(11, 1)));
    }

    #[test]
    fn around_builds_symmetric_window() {
        let interval = TimeInterval::around(at(12, 0), 600.0);
        assert_eq!(interval.from, at(11, 50));
        assert_eq!(interval.to, at(12, 10));
    }

    #[test]
    fn intersection_of_disjoint_intervals_is_none() {
        let a = TimeInterval::new(at(10, 0), at(10, 30));
        let b = TimeInterval::new(at(10, 31), at(11, 0));
        assert!(a.intersection(&b).is_none());
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn unbounded_interval_contains_everything() {
        assert!(TimeInterval::unbounded().contains(at(0, 0)));
    }
}
