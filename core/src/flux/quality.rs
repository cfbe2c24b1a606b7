use crate::meteorology::source::MeteorologySource;
use crate::meteorology::plume_height::PlumeHeight;
use crate::meteorology::wind::WindField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic-light rating of a flux; ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityFlag {
    Green,
    Yellow,
    Red,
}

impl QualityFlag {
    pub fn letter(self) -> char {
        match self {
            QualityFlag::Green => 'g',
            QualityFlag::Yellow => 'y',
            QualityFlag::Red => 'r',
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

pub fn wind_source_quality(source: MeteorologySource) -> QualityFlag {
    if source.is_model()
        || matches!(
            source,
            MeteorologySource::DualBeamMeasurement
                | MeteorologySource::GeometryCalculation
                | MeteorologySource::GeometryCalculationSingleInstrument
        )
    {
        QualityFlag::Green
    } else if source.is_user_supplied() {
        QualityFlag::Red
    } else {
        QualityFlag::Yellow
    }
}

pub fn plume_height_source_quality(source: MeteorologySource) -> QualityFlag {
    match source {
        MeteorologySource::GeometryCalculation => QualityFlag::Green,
        s if s.is_user_supplied() => QualityFlag::Red,
        _ => QualityFlag::Yellow,
    }
}

pub fn completeness_quality(completeness: f64) -> QualityFlag {
    if completeness >= 0.9 {
        QualityFlag::Green
    } else if completeness >= 0.7 {
        QualityFlag::Yellow
    } else {
        QualityFlag::Red
    }
}

/// Worst of the wind, plume-height and completeness ratings.
///
/// Speed and direction are rated separately; the wind rating is the worse of the two.
pub fn flux_quality(wind: &WindField, plume_height: &PlumeHeight, completeness: f64) -> QualityFlag {
    [
        wind_source_quality(wind.speed_source),
        wind_source_quality(wind.direction_source),
        plume_height_source_quality(plume_height.source),
        completeness_quality(completeness),
    ]
    .into_iter()
    .max()
    .unwrap_or(QualityFlag::Red)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::TimeInterval;

    fn wind(speed_source: MeteorologySource, direction_source: MeteorologySource) -> WindField {
        WindField {
            speed: 8.0,
            speed_error: 1.0,
            speed_source,
            direction: 270.0,
            direction_error: 5.0,
            direction_source,
            valid: TimeInterval::unbounded(),
            location: None,
        }
    }

    fn height(source: MeteorologySource) -> PlumeHeight {
        PlumeHeight {
            altitude: 3000.0,
            altitude_error: 200.0,
            source,
            valid: TimeInterval::unbounded(),
        }
    }

    #[test]
    fn default_wind_makes_flux_red() {
        let flag = flux_quality(
            &wind(MeteorologySource::Default, MeteorologySource::Default),
            &height(MeteorologySource::GeometryCalculation),
            0.95,
        );
        assert_eq!(flag, QualityFlag::Red);
    }

    #[test]
    fn low_completeness_is_always_red() {
        let flag = flux_quality(
            &wind(MeteorologySource::DualBeamMeasurement, MeteorologySource::GeometryCalculation),
            &height(MeteorologySource::GeometryCalculation),
            0.69,
        );
        assert_eq!(flag, QualityFlag::Red);
    }

    #[test]
    fn green_needs_all_three_green() {
        let good_wind = wind(MeteorologySource::EcmwfAnalysis, MeteorologySource::GeometryCalculation);
        assert_eq!(
            flux_quality(&good_wind, &height(MeteorologySource::GeometryCalculation), 0.92),
            QualityFlag::Green
        );
        assert_eq!(
            flux_quality(&good_wind, &height(MeteorologySource::EcmwfForecast), 0.92),
            QualityFlag::Yellow
        );
        assert_eq!(
            flux_quality(&good_wind, &height(MeteorologySource::GeometryCalculation), 0.8),
            QualityFlag::Yellow
        );
    }

    #[test]
    fn flags_are_ordered_best_first() {
        assert!(QualityFlag::Green < QualityFlag::Yellow);
        assert!(QualityFlag::Yellow < QualityFlag::Red);
        assert_eq!(QualityFlag::Yellow.to_string(), "y");
    }
}
