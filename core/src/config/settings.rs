use crate::config::setup::InstrumentType;
use crate::scan::spectrum::Molecule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User settings for one post-processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub max_threads: usize,
    /// Fit windows evaluated for every scan; the first one is the main window.
    pub fit_windows: Vec<String>,
    pub molecule: Molecule,
    pub continuation: bool,
    pub output_directory: PathBuf,
    pub wind_lookup_radius_m: f64,
    pub sky: SkyQualitySettings,
    pub fit_quality: FitQualitySettings,
    pub geometry: GeometrySettings,
    pub dual_beam: DualBeamSettings,
    pub flux: FluxSettings,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_threads: 2,
            fit_windows: vec!["SO2".to_string()],
            molecule: Molecule::So2,
            continuation: false,
            output_directory: PathBuf::from("output"),
            wind_lookup_radius_m: 50_000.0,
            sky: SkyQualitySettings::default(),
            fit_quality: FitQualitySettings::default(),
            geometry: GeometrySettings::default(),
            dual_beam: DualBeamSettings::default(),
            flux: FluxSettings::default(),
        }
    }
}

impl ProcessingSettings {
    pub fn main_fit_window(&self) -> Option<&str> {
        self.fit_windows.first().map(String::as_str)
    }
}

/// Gates applied to the sky spectrum before a scan is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyQualitySettings {
    pub max_exposure_time_gothenburg_ms: u32,
    pub max_exposure_time_heidelberg_ms: u32,
    /// Fraction of the dynamic range below which the sky counts as dark.
    pub dark_limit: f64,
    /// Fraction of the co-added dynamic range at which a pixel counts as saturated.
    pub saturation_limit: f64,
}

impl Default for SkyQualitySettings {
    fn default() -> Self {
        Self {
            max_exposure_time_gothenburg_ms: 900,
            max_exposure_time_heidelberg_ms: 4000,
            dark_limit: 0.05,
            saturation_limit: 0.99,
        }
    }
}

impl SkyQualitySettings {
    pub fn max_exposure_time_ms(&self, instrument: InstrumentType) -> u32 {
        match instrument {
            InstrumentType::Gothenburg => self.max_exposure_time_gothenburg_ms,
            InstrumentType::Heidelberg => self.max_exposure_time_heidelberg_ms,
        }
    }
}

/// Per-spectrum limits used to mark individual fits as bad.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitQualitySettings {
    pub max_chi_square: f64,
    pub dark_limit: f64,
    pub saturation_limit: f64,
}

impl Default for FitQualitySettings {
    fn default() -> Self {
        Self {
            max_chi_square: 0.9,
            dark_limit: 0.02,
            saturation_limit: 0.99,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    /// Minimum completeness for a scan to take part in triangulation.
    pub completeness_limit: f64,
    /// Half-width of the validity window of a geometry result.
    pub valid_time_s: f64,
    pub max_time_difference_s: f64,
    pub min_distance_m: f64,
    pub max_distance_m: f64,
    pub max_altitude_error_m: f64,
    pub max_wind_direction_error_deg: f64,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            completeness_limit: 0.7,
            valid_time_s: 600.0,
            max_time_difference_s: 900.0,
            min_distance_m: 200.0,
            max_distance_m: 10_000.0,
            max_altitude_error_m: 1000.0,
            max_wind_direction_error_deg: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DualBeamSettings {
    pub low_pass_order: usize,
    pub shift_max_s: f64,
    pub test_length_s: f64,
    /// Use the longest comparison window the series allows instead of `test_length_s`.
    pub use_max_test_length: bool,
    /// Mean upwind column (molecules/cm²) below which a window is skipped.
    pub column_min: f64,
    /// Largest accepted relative wind-speed error.
    pub max_wind_speed_error: f64,
    /// Half-width added on both sides of the scan when the speed is stored.
    pub valid_time_s: f64,
    pub min_good_points: usize,
    pub correlation_threshold: f64,
}

impl Default for DualBeamSettings {
    fn default() -> Self {
        Self {
            low_pass_order: 20,
            shift_max_s: 90.0,
            test_length_s: 300.0,
            use_max_test_length: false,
            column_min: 1.0e17,
            max_wind_speed_error: 0.5,
            valid_time_s: 1200.0,
            min_good_points: 50,
            correlation_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxSettings {
    pub completeness_limit: f64,
    pub min_good_points: usize,
    /// Smallest cone angle a scanner may have to be used for flux.
    pub min_cone_angle_deg: f64,
}

impl Default for FluxSettings {
    fn default() -> Self {
        Self {
            completeness_limit: 0.7,
            min_good_points: 10,
            min_cone_angle_deg: 45.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_and_flux_completeness_limits_are_independent() {
        let settings: ProcessingSettings = serde_json::from_str(
            r#"{"geometry": {"completeness_limit": 0.5}, "flux": {"completeness_limit": 0.8}}"#,
        )
        .unwrap();
        assert_eq!(settings.geometry.completeness_limit, 0.5);
        assert_eq!(settings.flux.completeness_limit, 0.8);
        assert_eq!(settings.geometry.max_distance_m, 10_000.0);
        assert_eq!(settings.main_fit_window(), Some("SO2"));
    }

    #[test]
    fn exposure_limit_depends_on_instrument_type() {
        let sky = SkyQualitySettings::default();
        assert_eq!(sky.max_exposure_time_ms(InstrumentType::Gothenburg), 900);
        assert_eq!(sky.max_exposure_time_ms(InstrumentType::Heidelberg), 4000);
    }
}
