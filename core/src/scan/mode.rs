use crate::scan::spectrum::SpectrumInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

const MIN_WIND_SPECTRA: usize = 50;
const MIN_FLUX_POSITIONS: usize = 10;
const ZENITH_TOLERANCE_DEG: f64 = 1.0;

/// What kind of measurement a scan is, judged from its spectra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeasurementMode {
    Flux,
    WindSpeed,
    Stratosphere,
    DirectSun,
    Composition,
    Lunar,
    Unknown,
}

impl MeasurementMode {
    pub const ALL: [MeasurementMode; 7] = [
        MeasurementMode::Flux,
        MeasurementMode::WindSpeed,
        MeasurementMode::Stratosphere,
        MeasurementMode::DirectSun,
        MeasurementMode::Composition,
        MeasurementMode::Lunar,
        MeasurementMode::Unknown,
    ];

    /// Directory name used by the evaluation archive.
    pub fn directory_name(self) -> &'static str {
        match self {
            MeasurementMode::Flux => "flux",
            MeasurementMode::WindSpeed => "windspeed",
            MeasurementMode::Stratosphere => "stratosphere",
            MeasurementMode::DirectSun => "directsun",
            MeasurementMode::Composition => "composition",
            MeasurementMode::Lunar => "lunar",
            MeasurementMode::Unknown => "unknown",
        }
    }

    /// Infers the mode from spectrum names first, then from the pattern of viewing angles.
    pub fn infer(spectra: &[&SpectrumInfo]) -> MeasurementMode {
        if spectra.is_empty() {
            return MeasurementMode::Unknown;
        }
        let majority = |pred: fn(&SpectrumInfo) -> bool| {
            2 * spectra.iter().filter(|s| pred(s)).count() > spectra.len()
        };
        if majority(SpectrumInfo::is_direct_sun) {
            return MeasurementMode::DirectSun;
        }
        if majority(SpectrumInfo::is_lunar) {
            return MeasurementMode::Lunar;
        }
        if majority(SpectrumInfo::is_composition) {
            return MeasurementMode::Composition;
        }

        let mut positions: Vec<(i64, i64)> = spectra
            .iter()
            .map(|s| {
                (
                    (s.scan_angle * 10.0).round() as i64,
                    (s.scan_angle2 * 10.0).round() as i64,
                )
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();

        if spectra.len() >= MIN_WIND_SPECTRA && positions.len() <= 2 {
            return MeasurementMode::WindSpeed;
        }
        if positions.len() >= MIN_FLUX_POSITIONS {
            return MeasurementMode::Flux;
        }
        let zenith = spectra
            .iter()
            .filter(|s| s.scan_angle.abs() < ZENITH_TOLERANCE_DEG)
            .count();
        if 5 * zenith >= 4 * spectra.len() {
            return MeasurementMode::Stratosphere;
        }
        MeasurementMode::Unknown
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn info(name: &str, angle: f64) -> SpectrumInfo {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        SpectrumInfo {
            name: name.to_string(),
            scan_angle: angle,
            scan_angle2: 0.0,
            start_time: t,
            stop_time: t,
            exposure_time_ms: 100,
            num_spectra: 15,
            channel: 0,
            peak_intensity: 0.5,
            fit_intensity: 0.5,
        }
    }

    fn infer(spectra: &[SpectrumInfo]) -> MeasurementMode {
        let refs: Vec<&SpectrumInfo> = spectra.iter().collect();
        MeasurementMode::infer(&refs)
    }

    #[test]
    fn sweep_is_flux() {
        let spectra: Vec<_> = (0..51).map(|i| info("sky", -90.0 + 3.6 * f64::from(i))).collect();
        assert_eq!(infer(&spectra), MeasurementMode::Flux);
    }

    #[test]
    fn fixed_pointing_is_wind_speed() {
        let spectra: Vec<_> = (0..120).map(|_| info("sky", 0.0)).collect();
        assert_eq!(infer(&spectra), MeasurementMode::WindSpeed);
    }

    #[test]
    fn short_zenith_sequence_is_stratosphere() {
        let spectra: Vec<_> = (0..12)
            .map(|i| info("sky", if i == 0 { 30.0 } else { 0.0 }))
            .collect();
        assert_eq!(infer(&spectra), MeasurementMode::Stratosphere);
    }

    #[test]
    fn names_take_priority() {
        let spectra: Vec<_> = (0..20).map(|i| info("direct_sun", f64::from(i))).collect();
        assert_eq!(infer(&spectra), MeasurementMode::DirectSun);
    }
}
