use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const AVOGADRO: f64 = 6.022_140_76e23;

/// Trace gases the spectral fit can report columns for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Molecule {
    #[default]
    #[serde(rename = "SO2")]
    So2,
    #[serde(rename = "O3")]
    O3,
    #[serde(rename = "BrO")]
    Bro,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "HCHO")]
    Hcho,
    #[serde(rename = "O4")]
    O4,
}

impl Molecule {
    /// Molar mass in g/mol.
    pub fn molar_mass(self) -> f64 {
        match self {
            Molecule::So2 => 64.0638,
            Molecule::O3 => 47.9982,
            Molecule::Bro => 95.9034,
            Molecule::No2 => 46.0055,
            Molecule::Hcho => 30.0260,
            Molecule::O4 => 63.9976,
        }
    }

    /// Factor turning a column in molecules/cm² into kg/m².
    pub fn kg_per_m2_factor(self) -> f64 {
        self.molar_mass() * 1e-3 / AVOGADRO * 1e4
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Molecule::So2 => "SO2",
            Molecule::O3 => "O3",
            Molecule::Bro => "BrO",
            Molecule::No2 => "NO2",
            Molecule::Hcho => "HCHO",
            Molecule::O4 => "O4",
        };
        f.write_str(name)
    }
}

/// Acquisition metadata of one measured spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumInfo {
    #[serde(default)]
    pub name: String,
    pub scan_angle: f64,
    /// Azimuth of two-axis scanners; unused by single-axis instruments.
    #[serde(default)]
    pub scan_angle2: f64,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    #[serde(default)]
    pub exposure_time_ms: u32,
    #[serde(default = "one")]
    pub num_spectra: u32,
    /// 0 for the master channel, 1 for the slave channel.
    #[serde(default)]
    pub channel: u8,
    /// Highest intensity as a fraction of the dynamic range.
    #[serde(default)]
    pub peak_intensity: f64,
    /// Mean intensity in the fit region as a fraction of the dynamic range.
    #[serde(default = "half")]
    pub fit_intensity: f64,
}

fn one() -> u32 {
    1
}

fn half() -> f64 {
    0.5
}

impl SpectrumInfo {
    pub fn is_direct_sun(&self) -> bool {
        self.name.eq_ignore_ascii_case("direct_sun")
    }

    pub fn is_lunar(&self) -> bool {
        self.name.eq_ignore_ascii_case("lunar")
    }

    pub fn is_composition(&self) -> bool {
        self.name.eq_ignore_ascii_case("composition")
    }
}

/// Fitted slant column of one reference in one spectrum (molecules/cm²).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFit {
    pub molecule: Molecule,
    pub column: f64,
    pub column_error: f64,
    #[serde(default)]
    pub shift: f64,
    #[serde(default)]
    pub shift_error: f64,
    #[serde(default = "unit_squeeze")]
    pub squeeze: f64,
    #[serde(default)]
    pub squeeze_error: f64,
}

fn unit_squeeze() -> f64 {
    1.0
}

/// Outcome of the external spectral fit for one spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumFit {
    pub info: SpectrumInfo,
    pub references: Vec<ReferenceFit>,
    #[serde(default)]
    pub chi_square: f64,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub bad: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl SpectrumFit {
    pub fn is_good(&self) -> bool {
        !self.bad && !self.deleted
    }

    pub fn reference(&self, molecule: Molecule) -> Option<&ReferenceFit> {
        self.references.iter().find(|r| r.molecule == molecule)
    }
}

/// Sky spectrum of a scan, read before any fit is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkySpectrum {
    pub start_time: DateTime<Utc>,
    pub exposure_time_ms: u32,
    pub num_spectra: u32,
    /// Maximum intensity of a single (not co-added) spectrum.
    pub dynamic_range: f64,
    pub pixels: Vec<f64>,
}

impl SkySpectrum {
    fn co_adds(&self) -> f64 {
        f64::from(self.num_spectra.max(1))
    }

    /// Mean intensity per co-added spectrum below `dark_limit` of the dynamic range.
    pub fn is_dark(&self, dark_limit: f64) -> bool {
        if self.pixels.is_empty() {
            return true;
        }
        let mean = self.pixels.iter().sum::<f64>() / self.pixels.len() as f64;
        mean / self.co_adds() < dark_limit * self.dynamic_range
    }

    /// Any pixel in `[first, last]` at or above `limit` of the co-added dynamic range.
    pub fn is_saturated(&self, first: usize, last: usize, limit: f64) -> bool {
        let last = last.min(self.pixels.len().saturating_sub(1));
        if self.pixels.is_empty() || first > last {
            return false;
        }
        let ceiling = limit * self.co_adds() * self.dynamic_range;
        self.pixels[first..=last].iter().any(|&v| v >= ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sky(pixels: Vec<f64>) -> SkySpectrum {
        SkySpectrum {
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            exposure_time_ms: 300,
            num_spectra: 10,
            dynamic_range: 4095.0,
            pixels,
        }
    }

    #[test]
    fn so2_conversion_factor_matches_molar_mass() {
        let factor = Molecule::So2.kg_per_m2_factor();
        assert!((factor - 1.0638e-21).abs() / 1.0638e-21 < 1e-3);
    }

    #[test]
    fn dark_sky_is_detected() {
        assert!(sky(vec![100.0; 64]).is_dark(0.05));
        assert!(!sky(vec![20_000.0; 64]).is_dark(0.05));
        assert!(sky(Vec::new()).is_dark(0.05));
    }

    #[test]
    fn saturation_only_counts_the_fit_range() {
        let mut pixels = vec![10_000.0; 64];
        pixels[5] = 40_950.0;
        let spectrum = sky(pixels);
        assert!(spectrum.is_saturated(0, 10, 0.99));
        assert!(!spectrum.is_saturated(20, 63, 0.99));
    }

    #[test]
    fn molecule_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Molecule::Bro).unwrap();
        assert_eq!(json, "\"BrO\"");
        assert_eq!(Molecule::Bro.to_string(), "BrO");
    }
}
