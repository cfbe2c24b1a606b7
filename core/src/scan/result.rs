use crate::config::settings::FitQualitySettings;
use crate::flux::FluxResult;
use crate::scan::mode::MeasurementMode;
use crate::scan::plume::{calculate_offset, find_plume, PlumeInScanProperty, PlumePoint};
use crate::scan::spectrum::{Molecule, SkySpectrum, SpectrumFit, SpectrumInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

/// Every per-spectrum fit outcome of one scan in one fit window.
///
/// The measurement mode is derived once on first use. After the dispatcher
/// hands the scan downstream, the only field that changes is `flux`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub serial: String,
    pub fit_window: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub sky: Option<SkySpectrum>,
    pub spectra: Vec<SpectrumFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flux: Option<FluxResult>,
    #[serde(skip)]
    mode: OnceCell<MeasurementMode>,
}

impl ScanResult {
    pub fn new(
        serial: impl Into<String>,
        fit_window: impl Into<String>,
        channel: u8,
        sky: Option<SkySpectrum>,
        spectra: Vec<SpectrumFit>,
    ) -> Self {
        Self {
            serial: serial.into(),
            fit_window: fit_window.into(),
            channel,
            sky,
            spectra,
            flux: None,
            mode: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.spectra
            .iter()
            .map(|s| s.info.start_time)
            .min()
            .or_else(|| self.sky.as_ref().map(|s| s.start_time))
    }

    pub fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.spectra.iter().map(|s| s.info.stop_time).max()
    }

    /// Time of the sky spectrum, falling back to the first measured spectrum.
    pub fn sky_start_time(&self) -> Option<DateTime<Utc>> {
        self.sky
            .as_ref()
            .map(|s| s.start_time)
            .or_else(|| self.start_time())
    }

    pub fn good_spectra(&self) -> impl Iterator<Item = &SpectrumFit> {
        self.spectra.iter().filter(|s| s.is_good())
    }

    pub fn good_count(&self) -> usize {
        self.good_spectra().count()
    }

    pub fn mark_deleted(&mut self, index: usize) {
        if let Some(spectrum) = self.spectra.get_mut(index) {
            spectrum.deleted = true;
        }
    }

    pub fn measurement_mode(&self) -> MeasurementMode {
        *self.mode.get_or_init(|| {
            let infos: Vec<&SpectrumInfo> = self.spectra.iter().map(|s| &s.info).collect();
            MeasurementMode::infer(&infos)
        })
    }

    fn plume_points(&self, molecule: Molecule) -> Vec<PlumePoint> {
        self.good_spectra()
            .filter(|s| !s.info.is_direct_sun())
            .filter_map(|s| {
                s.reference(molecule).map(|r| PlumePoint {
                    angle: s.info.scan_angle,
                    angle2: s.info.scan_angle2,
                    column: r.column,
                    column_error: r.column_error,
                })
            })
            .collect()
    }

    /// Mean of the lowest good columns of `molecule`.
    pub fn offset(&self, molecule: Molecule) -> Option<f64> {
        let columns: Vec<f64> = self.plume_points(molecule).iter().map(|p| p.column).collect();
        calculate_offset(&columns)
    }

    pub fn plume_properties(&self, molecule: Molecule) -> Option<PlumeInScanProperty> {
        find_plume(&self.plume_points(molecule))
    }

    /// Marks spectra whose fit or intensity is unusable as bad.
    ///
    /// Returns the number of spectra newly marked.
    pub fn check_goodness_of_fit(&mut self, quality: &FitQualitySettings, molecule: Molecule) -> usize {
        let mut marked = 0;
        for spectrum in self.spectra.iter_mut().filter(|s| !s.bad) {
            let missing = spectrum.reference(molecule).is_none();
            let poor_fit = spectrum.chi_square > quality.max_chi_square;
            let dark = spectrum.info.fit_intensity < quality.dark_limit;
            let saturated = spectrum.info.peak_intensity > quality.saturation_limit;
            if missing || poor_fit || dark || saturated {
                spectrum.bad = true;
                marked += 1;
            }
        }
        marked
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::scan::spectrum::ReferenceFit;
    use chrono::Duration;

    /// Builds a scan whose columns follow `column(angle)` over the given angles.
    pub fn scan_with_columns(
        serial: &str,
        start: DateTime<Utc>,
        angles: &[f64],
        column: impl Fn(f64) -> f64,
    ) -> ScanResult {
        let spectra = angles
            .iter()
            .enumerate()
            .map(|(i, &angle)| {
                let t0 = start + Duration::seconds(2 * i as i64);
                SpectrumFit {
                    info: SpectrumInfo {
                        name: "sky".into(),
                        scan_angle: angle,
                        scan_angle2: 0.0,
                        start_time: t0,
                        stop_time: t0 + Duration::seconds(2),
                        exposure_time_ms: 100,
                        num_spectra: 15,
                        channel: 0,
                        peak_intensity: 0.6,
                        fit_intensity: 0.4,
                    },
                    references: vec![ReferenceFit {
                        molecule: Molecule::So2,
                        column: column(angle),
                        column_error: 1.0e16,
                        shift: 0.0,
                        shift_error: 0.0,
                        squeeze: 1.0,
                        squeeze_error: 0.0,
                    }],
                    chi_square: 0.01,
                    delta: 0.01,
                    bad: false,
                    deleted: false,
                }
            })
            .collect();
        ScanResult::new(serial, "SO2", 0, None, spectra)
    }

    pub fn sweep_angles(first: f64, last: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| first + (last - first) * i as f64 / (count - 1) as f64)
            .collect()
    }

    pub fn gaussian(centre: f64, width: f64) -> impl Fn(f64) -> f64 {
        move |angle| 1.0e16 + 4.0e17 * (-(angle - centre).powi(2) / (2.0 * width * width)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn sweep_scan_is_flux_mode_with_visible_plume() {
        let scan = scan_with_columns("D2J2124", start(), &sweep_angles(-80.0, 80.0, 51), gaussian(10.0, 12.0));
        assert_eq!(scan.measurement_mode(), MeasurementMode::Flux);
        let plume = scan.plume_properties(Molecule::So2).unwrap();
        assert!((plume.centre - 10.0).abs() < 3.0);
        assert_eq!(scan.start_time(), Some(start()));
        assert_eq!(scan.sky_start_time(), Some(start()));
    }

    #[test]
    fn deleted_spectra_are_not_good() {
        let mut scan = scan_with_columns("D2J2124", start(), &sweep_angles(-80.0, 80.0, 11), gaussian(0.0, 10.0));
        scan.mark_deleted(3);
        assert_eq!(scan.good_count(), 10);
    }

    #[test]
    fn goodness_of_fit_marks_saturated_and_poor_fits() {
        let mut scan = scan_with_columns("D2J2124", start(), &sweep_angles(-80.0, 80.0, 11), gaussian(0.0, 10.0));
        scan.spectra[0].info.peak_intensity = 1.0;
        scan.spectra[1].chi_square = 5.0;
        scan.spectra[2].info.fit_intensity = 0.001;
        let marked = scan.check_goodness_of_fit(&FitQualitySettings::default(), Molecule::So2);
        assert_eq!(marked, 3);
        assert_eq!(scan.good_count(), 8);
    }

    #[test]
    fn missing_molecule_has_no_offset() {
        let scan = scan_with_columns("D2J2124", start(), &sweep_angles(-80.0, 80.0, 11), gaussian(0.0, 10.0));
        assert!(scan.offset(Molecule::Bro).is_none());
        assert!(scan.offset(Molecule::So2).is_some());
    }
}
