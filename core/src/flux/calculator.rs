use crate::config::settings::FluxSettings;
use crate::config::setup::{InstrumentType, NetworkSetup, ScannerGeometry};
use crate::flux::formula::{integrate, FluxConditions, FluxPoint};
use crate::flux::quality::{flux_quality, QualityFlag};
use crate::meteorology::plume_height::{PlumeHeight, PlumeHeightDataBase};
use crate::meteorology::wind::{WindDataBase, WindField};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::processing::dispatcher::AcceptedScan;
use crate::scan::mode::MeasurementMode;
use crate::scan::result::ScanResult;
use crate::scan::spectrum::Molecule;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mass flux of one scan with everything that went into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxResult {
    pub serial: String,
    pub instrument_type: InstrumentType,
    pub molecule: Molecule,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    /// kg/s
    pub flux: f64,
    pub flux_error_wind: f64,
    pub flux_error_plume_height: f64,
    pub quality: QualityFlag,
    pub wind: WindField,
    pub plume_height: PlumeHeight,
    pub compass: f64,
    pub cone_angle: f64,
    pub tilt: f64,
    pub good_points: usize,
    pub completeness: f64,
    pub plume_centre: f64,
    pub plume_centre2: f64,
    pub offset: f64,
}

pub struct FluxCalculator<'a> {
    setup: &'a NetworkSetup,
    settings: &'a FluxSettings,
    molecule: Molecule,
}

impl<'a> FluxCalculator<'a> {
    pub fn new(setup: &'a NetworkSetup, settings: &'a FluxSettings, molecule: Molecule) -> Self {
        Self {
            setup,
            settings,
            molecule,
        }
    }

    /// Computes a flux for every flux-mode scan and attaches it to the scan's main result.
    ///
    /// Scans without a flux are logged and left untouched.
    pub fn calculate_all(
        &self,
        scans: &mut [AcceptedScan],
        winds: &WindDataBase,
        plume_heights: &PlumeHeightDataBase,
    ) -> Vec<FluxResult> {
        let mut fluxes = Vec::new();
        for scan in scans.iter_mut().filter(|s| s.mode == MeasurementMode::Flux) {
            let log = LogManager::for_scan(&scan.path, Some(&scan.serial));
            let Some(main) = scan.main_result_mut() else {
                continue;
            };
            match self.calculate(main, winds, plume_heights) {
                Ok(flux) => {
                    log.record(&format!(
                        "flux {:.2} kg/s ({}), wind error {:.2}, plume height error {:.2}",
                        flux.flux, flux.quality, flux.flux_error_wind, flux.flux_error_plume_height
                    ));
                    main.flux = Some(flux.clone());
                    fluxes.push(flux);
                }
                Err(err) => log.warn(&format!("no flux: {}", err)),
            }
        }
        fluxes
    }

    pub fn calculate(
        &self,
        result: &ScanResult,
        winds: &WindDataBase,
        plume_heights: &PlumeHeightDataBase,
    ) -> ProcessingResult<FluxResult> {
        let (start_time, stop_time, sky_time) =
            match (result.start_time(), result.stop_time(), result.sky_start_time()) {
                (Some(start), Some(stop), Some(sky)) => (start, stop, sky),
                _ => return Err(ProcessingError::InsufficientData("scan holds no spectra".into())),
            };
        let (instrument, location) = self.setup.locate(&result.serial, sky_time)?;
        let position = location.position();

        let wind = winds
            .wind_field(sky_time, Some(&position))
            .ok_or(ProcessingError::NoWindField(sky_time))?;
        let plume = plume_heights
            .plume_height(sky_time)
            .ok_or(ProcessingError::NoPlumeHeight(sky_time))?;

        let geometry = location.geometry(instrument.instrument_type);
        if !matches!(geometry, ScannerGeometry::Heidelberg)
            && location.cone_angle < self.settings.min_cone_angle_deg
        {
            return Err(ProcessingError::UnsupportedGeometry(format!(
                "cone angle {:.1} deg below {:.1} deg",
                location.cone_angle, self.settings.min_cone_angle_deg
            )));
        }
        let height = plume.altitude - location.altitude;
        if height <= 0.0 {
            return Err(ProcessingError::DegenerateGeometry(format!(
                "plume at {:.0} m is not above the instrument at {:.0} m",
                plume.altitude, location.altitude
            )));
        }

        let property = result
            .plume_properties(self.molecule)
            .ok_or_else(|| ProcessingError::InsufficientData("no plume in scan".into()))?;
        if property.completeness < self.settings.completeness_limit {
            return Err(ProcessingError::LowCompleteness {
                completeness: property.completeness,
                limit: self.settings.completeness_limit,
            });
        }

        let points: Vec<FluxPoint> = result
            .good_spectra()
            .filter(|s| !s.info.is_direct_sun())
            .filter_map(|s| {
                s.reference(self.molecule).map(|r| FluxPoint {
                    angle: s.info.scan_angle,
                    angle2: s.info.scan_angle2,
                    column: r.column,
                })
            })
            .collect();

        let conditions = FluxConditions {
            offset: property.offset,
            plume_height: height,
            wind_speed: wind.speed,
            wind_direction: wind.direction,
            gas_factor: self.molecule.kg_per_m2_factor(),
        };
        let min_points = self.settings.min_good_points;
        let flux = integrate(&points, &geometry, &conditions, min_points)?;

        let mut direction_term: f64 = 0.0;
        for sign in [-1.0, 1.0] {
            let turned = FluxConditions {
                wind_direction: wind.direction + sign * wind.direction_error,
                ..conditions
            };
            let other = integrate(&points, &geometry, &turned, min_points)?;
            direction_term = direction_term.max((other - flux).abs());
        }
        let speed_term = if wind.speed.abs() > f64::EPSILON {
            flux * (wind.speed_error / wind.speed).abs()
        } else {
            0.0
        };

        Ok(FluxResult {
            serial: result.serial.clone(),
            instrument_type: instrument.instrument_type,
            molecule: self.molecule,
            start_time,
            stop_time,
            flux,
            flux_error_wind: direction_term.hypot(speed_term),
            flux_error_plume_height: flux * (plume.altitude_error / height).abs(),
            quality: flux_quality(&wind, &plume, property.completeness),
            compass: location.compass,
            cone_angle: location.cone_angle,
            tilt: location.tilt,
            good_points: points.len(),
            completeness: property.completeness,
            plume_centre: property.centre,
            plume_centre2: property.centre2,
            offset: property.offset,
            wind,
            plume_height: plume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meteorology::source::MeteorologySource;
    use crate::meteorology::wind::WindComponent;
    use crate::prelude::TimeInterval;
    use crate::processing::dispatcher::fixtures::{instrument, network};
    use crate::scan::result::fixtures::{gaussian, scan_with_columns, sweep_angles};
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn winds(direction_source: MeteorologySource) -> WindDataBase {
        let mut db = WindDataBase::new(50_000.0);
        db.insert_speed(WindComponent {
            value: 10.0,
            error: 1.0,
            source: MeteorologySource::EcmwfAnalysis,
            valid: TimeInterval::unbounded(),
            location: None,
        });
        db.insert_direction(WindComponent {
            value: 270.0,
            error: 10.0,
            source: direction_source,
            valid: TimeInterval::unbounded(),
            location: None,
        });
        db
    }

    fn heights(altitude: f64, source: MeteorologySource) -> PlumeHeightDataBase {
        let mut db = PlumeHeightDataBase::new();
        db.insert(PlumeHeight {
            altitude,
            altitude_error: 300.0,
            source,
            valid: TimeInterval::unbounded(),
        });
        db
    }

    fn centred_scan() -> ScanResult {
        scan_with_columns("D2J2124", start(), &sweep_angles(-80.0, 80.0, 51), gaussian(0.0, 12.0))
    }

    #[test]
    fn flux_carries_errors_and_quality() {
        let setup = network(vec![instrument("D2J2124", -1.5, -78.4)]);
        let settings = FluxSettings::default();
        let calculator = FluxCalculator::new(&setup, &settings, Molecule::So2);
        let flux = calculator
            .calculate(
                &centred_scan(),
                &winds(MeteorologySource::GeometryCalculation),
                &heights(2500.0, MeteorologySource::GeometryCalculation),
            )
            .unwrap();

        assert!(flux.flux > 0.0);
        assert_eq!(flux.good_points, 51);
        assert_eq!(flux.quality, QualityFlag::Green);
        // Wind blows straight through a scanner facing east, so turning it
        // either way can only lower the flux.
        let direction_term = flux.flux * (1.0 - 10f64.to_radians().cos());
        let speed_term = flux.flux * 0.1;
        assert_relative_eq!(
            flux.flux_error_wind,
            direction_term.hypot(speed_term),
            max_relative = 1e-9
        );
        // 1000 m above the instrument with a 300 m error.
        assert_relative_eq!(flux.flux_error_plume_height, 0.3 * flux.flux, max_relative = 1e-9);
    }

    #[test]
    fn missing_plume_height_fails() {
        let setup = network(vec![instrument("D2J2124", -1.5, -78.4)]);
        let settings = FluxSettings::default();
        let calculator = FluxCalculator::new(&setup, &settings, Molecule::So2);
        let err = calculator
            .calculate(
                &centred_scan(),
                &winds(MeteorologySource::GeometryCalculation),
                &PlumeHeightDataBase::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessingError::NoPlumeHeight(_)));
    }

    #[test]
    fn plume_below_instrument_fails() {
        let setup = network(vec![instrument("D2J2124", -1.5, -78.4)]);
        let settings = FluxSettings::default();
        let calculator = FluxCalculator::new(&setup, &settings, Molecule::So2);
        let err = calculator
            .calculate(
                &centred_scan(),
                &winds(MeteorologySource::GeometryCalculation),
                &heights(1200.0, MeteorologySource::Default),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessingError::DegenerateGeometry(_)));
    }

    #[test]
    fn narrow_cone_is_unsupported() {
        let mut scanner = instrument("D2J2124", -1.5, -78.4);
        scanner.locations[0].cone_angle = 30.0;
        let setup = network(vec![scanner]);
        let settings = FluxSettings::default();
        let calculator = FluxCalculator::new(&setup, &settings, Molecule::So2);
        let err = calculator
            .calculate(
                &centred_scan(),
                &winds(MeteorologySource::GeometryCalculation),
                &heights(2500.0, MeteorologySource::Default),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessingError::UnsupportedGeometry(_)));
    }

    #[test]
    fn plume_at_scan_edge_is_too_incomplete() {
        let setup = network(vec![instrument("D2J2124", -1.5, -78.4)]);
        let settings = FluxSettings::default();
        let calculator = FluxCalculator::new(&setup, &settings, Molecule::So2);
        let scan = scan_with_columns("D2J2124", start(), &sweep_angles(-80.0, 80.0, 51), gaussian(75.0, 15.0));
        let err = calculator
            .calculate(
                &scan,
                &winds(MeteorologySource::GeometryCalculation),
                &heights(2500.0, MeteorologySource::GeometryCalculation),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessingError::LowCompleteness { .. }));
    }
}
