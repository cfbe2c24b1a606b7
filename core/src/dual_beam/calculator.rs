use crate::config::settings::DualBeamSettings;
use crate::config::setup::{InstrumentLocation, InstrumentType, NetworkSetup, ScannerGeometry};
use crate::dual_beam::correlation::{estimate_lag, LagEstimate};
use crate::dual_beam::series::{series_by_position, series_of, MeasurementSeries};
use crate::meteorology::plume_height::PlumeHeightDataBase;
use crate::meteorology::source::MeteorologySource;
use crate::meteorology::wind::{WindComponent, WindDataBase};
use crate::prelude::{Estimate, ProcessingError, ProcessingResult, TimeInterval};
use crate::processing::dispatcher::AcceptedScan;
use crate::scan::mode::MeasurementMode;
use crate::scan::result::ScanResult;
use crate::scan::spectrum::Molecule;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Wind speed derived from one dual-beam measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindSpeedResult {
    pub serial: String,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    /// Plume altitude above sea level used for the beam distance.
    pub plume_altitude: Estimate,
    /// Horizontal distance between the two beams at plume altitude.
    pub beam_distance: f64,
    pub lag: LagEstimate,
    pub speed: Estimate,
    pub valid: TimeInterval,
}

/// The two series of a dual-beam measurement plus what the distance formula needs.
struct BeamPair {
    first: MeasurementSeries,
    second: MeasurementSeries,
    first_angle: f64,
    second_angle: f64,
    start_time: DateTime<Utc>,
    stop_time: DateTime<Utc>,
}

/// Turns wind-speed scans into dual-beam wind speeds.
pub struct DualBeamCalculator<'a> {
    setup: &'a NetworkSetup,
    settings: &'a DualBeamSettings,
    molecule: Molecule,
}

impl<'a> DualBeamCalculator<'a> {
    pub fn new(setup: &'a NetworkSetup, settings: &'a DualBeamSettings, molecule: Molecule) -> Self {
        Self {
            setup,
            settings,
            molecule,
        }
    }

    /// Handles every wind-speed scan: Heidelberg scans on their own, Gothenburg
    /// master channels together with the slave channel recorded at the same
    /// start time. Each speed is added to `winds`.
    pub fn calculate(
        &self,
        scans: &[AcceptedScan],
        plume_heights: &PlumeHeightDataBase,
        winds: &mut WindDataBase,
    ) -> Vec<WindSpeedResult> {
        let wind_scans: Vec<&AcceptedScan> = scans
            .iter()
            .filter(|s| s.mode == MeasurementMode::WindSpeed)
            .collect();
        let mut results = Vec::new();
        for scan in &wind_scans {
            let log = LogManager::for_scan(&scan.path, Some(&scan.serial));
            let Some(main) = scan.main_result() else {
                continue;
            };
            let (instrument, location) = match self.setup.locate(&scan.serial, scan.start_time) {
                Ok(found) => found,
                Err(err) => {
                    log.warn(&err.to_string());
                    continue;
                }
            };
            let outcome = match instrument.instrument_type {
                InstrumentType::Heidelberg => self.interleaved(main),
                InstrumentType::Gothenburg if main.channel == 0 => {
                    match find_slave(&wind_scans, scan) {
                        Some(slave) => self.master_slave(main, slave),
                        None => {
                            log.record("no slave channel recorded with this master scan");
                            continue;
                        }
                    }
                }
                // Slave channels are consumed together with their master.
                InstrumentType::Gothenburg => continue,
            };
            let result = outcome.and_then(|pair| {
                self.wind_speed(&scan.serial, location, instrument.instrument_type, &pair, plume_heights)
            });
            match result {
                Ok(result) => {
                    log.record(&format!(
                        "dual-beam wind speed {:.2} +- {:.2} m/s",
                        result.speed.value, result.speed.error
                    ));
                    winds.insert_speed(WindComponent {
                        value: result.speed.value,
                        error: result.speed.error,
                        source: MeteorologySource::DualBeamMeasurement,
                        valid: result.valid,
                        location: Some(location.position()),
                    });
                    results.push(result);
                }
                Err(err) => log.warn(&format!("no wind speed: {}", err)),
            }
        }
        results
    }

    /// One scan alternating between exactly two viewing directions.
    fn interleaved(&self, result: &ScanResult) -> ProcessingResult<BeamPair> {
        let mut positions = series_by_position(result, self.molecule);
        if positions.len() != 2 {
            return Err(ProcessingError::InsufficientData(format!(
                "expected two viewing directions, found {}",
                positions.len()
            )));
        }
        let (second_angles, second) = positions.remove(1);
        let (first_angles, first) = positions.remove(0);
        let len = first.len().min(second.len());
        let (start_time, stop_time) = scan_times(result)?;
        Ok(BeamPair {
            first: first.truncate(len),
            second: second.truncate(len),
            first_angle: first_angles.0,
            second_angle: second_angles.0,
            start_time,
            stop_time,
        })
    }

    fn master_slave(&self, master: &ScanResult, slave: &ScanResult) -> ProcessingResult<BeamPair> {
        let missing = || ProcessingError::InsufficientData("no good spectra".into());
        let (first_angle, first) = series_of(master, self.molecule).ok_or_else(missing)?;
        let (second_angle, second) = series_of(slave, self.molecule).ok_or_else(missing)?;
        if first.len() != second.len() {
            return Err(ProcessingError::InvalidInput(format!(
                "master has {} good spectra, slave {}",
                first.len(),
                second.len()
            )));
        }
        let (start_time, stop_time) = scan_times(master)?;
        Ok(BeamPair {
            first,
            second,
            first_angle,
            second_angle,
            start_time,
            stop_time,
        })
    }

    fn wind_speed(
        &self,
        serial: &str,
        location: &InstrumentLocation,
        instrument: InstrumentType,
        pair: &BeamPair,
        plume_heights: &PlumeHeightDataBase,
    ) -> ProcessingResult<WindSpeedResult> {
        let plume = plume_heights
            .plume_height(pair.start_time)
            .ok_or(ProcessingError::NoPlumeHeight(pair.start_time))?;
        let height = plume.altitude - location.altitude;
        if height <= 0.0 {
            return Err(ProcessingError::DegenerateGeometry(format!(
                "plume at {:.0} m is not above the instrument at {:.0} m",
                plume.altitude, location.altitude
            )));
        }
        let distance = beam_distance(
            &location.geometry(instrument),
            height,
            location.beam_separation,
            pair.first_angle,
            pair.second_angle,
        )?;

        let lag = estimate_lag(&pair.first, &pair.second, self.settings)?;
        let speed = speed_from_lag(distance, distance * plume.altitude_error / height, &lag);
        if speed.relative_error() > self.settings.max_wind_speed_error {
            return Err(ProcessingError::InsufficientData(format!(
                "relative wind speed error {:.2} above {:.2}",
                speed.relative_error(),
                self.settings.max_wind_speed_error
            )));
        }

        let half = self.settings.valid_time_s;
        Ok(WindSpeedResult {
            serial: serial.to_string(),
            start_time: pair.start_time,
            stop_time: pair.stop_time,
            plume_altitude: Estimate::new(plume.altitude, plume.altitude_error),
            beam_distance: distance,
            lag,
            speed,
            valid: TimeInterval::new(
                pair.start_time - seconds(half),
                pair.stop_time + seconds(half),
            ),
        })
    }
}

/// `distance / lag`, with error `|d_err / lag| + |d * lag_std / lag^2|`.
pub fn speed_from_lag(distance: f64, distance_error: f64, lag: &LagEstimate) -> Estimate {
    let mean = lag.mean_lag;
    Estimate::new(
        distance / mean,
        (distance_error / mean).abs() + (distance * lag.lag_std / (mean * mean)).abs(),
    )
}

/// Horizontal separation of the two beams at `height` metres above the instrument.
///
/// Flat scanners use `h tan(separation) / cos(scan angle)`: a beam tilted by
/// the scan angle travels `h / cos(scan angle)` before reaching the plume layer.
/// Conical scanners take the difference of the tangents of both beams' zenith
/// angles around the cone axis `90 - cone - tilt`; the scan angle is not used.
/// Two-axis scanners take the difference of the tangents of the two zenith angles.
pub fn beam_distance(
    geometry: &ScannerGeometry,
    height: f64,
    separation: Option<f64>,
    first_angle: f64,
    second_angle: f64,
) -> ProcessingResult<f64> {
    let separation = || {
        separation.ok_or_else(|| {
            ProcessingError::UnsupportedGeometry("beam separation not configured".into())
        })
    };
    let distance = match *geometry {
        ScannerGeometry::Flat { .. } => {
            height * separation()?.to_radians().tan() / first_angle.to_radians().cos()
        }
        ScannerGeometry::Conical {
            cone_angle, tilt, ..
        } => {
            let zenith = (90.0 - cone_angle - tilt).to_radians();
            let sep = separation()?.to_radians();
            height * ((zenith + sep).tan() - zenith.tan()).abs()
        }
        ScannerGeometry::Heidelberg => {
            height * (first_angle.to_radians().tan() - second_angle.to_radians().tan()).abs()
        }
    };
    if !distance.is_finite() || distance <= 0.0 {
        return Err(ProcessingError::DegenerateGeometry(format!(
            "beam distance {:.1} m",
            distance
        )));
    }
    Ok(distance)
}

fn find_slave<'s>(scans: &[&'s AcceptedScan], master: &AcceptedScan) -> Option<&'s ScanResult> {
    scans
        .iter()
        .copied()
        .filter(|s| s.serial == master.serial && s.start_time == master.start_time)
        .filter_map(|s| s.main_result())
        .find(|r| r.channel == 1)
}

fn scan_times(result: &ScanResult) -> ProcessingResult<(DateTime<Utc>, DateTime<Utc>)> {
    match (result.start_time(), result.stop_time()) {
        (Some(start), Some(stop)) => Ok((start, stop)),
        _ => Err(ProcessingError::InsufficientData("scan holds no spectra".into())),
    }
}

fn seconds(s: f64) -> Duration {
    Duration::milliseconds((s * 1000.0).round() as i64)
}
