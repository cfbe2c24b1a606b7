use crate::config::settings::GeometrySettings;
use crate::config::setup::{InstrumentLocation, NetworkSetup, ScannerGeometry};
use crate::geometry::calculator::{bearing_at_height, triangulate, PlumeSolution, Sighting};
use crate::math::geo::{angle_difference, GeoPoint};
use crate::meteorology::plume_height::{PlumeHeight, PlumeHeightDataBase};
use crate::meteorology::source::MeteorologySource;
use crate::meteorology::wind::{WindComponent, WindDataBase};
use crate::prelude::{seconds_between, Estimate, ProcessingError, ProcessingResult, TimeInterval};
use crate::processing::dispatcher::AcceptedScan;
use crate::scan::mode::MeasurementMode;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Largest altitude error accepted, as a fraction of the altitude itself.
const MAX_RELATIVE_ALTITUDE_ERROR: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeometryCalculationKind {
    TwoInstrumentTriangulation,
    SingleInstrumentWindDirectionOnly,
}

/// Plume centre as seen by one contributing scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentreObservation {
    pub serial: String,
    pub start_time: DateTime<Utc>,
    pub centre: f64,
    pub centre_error: f64,
    pub centre2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryResult {
    pub kind: GeometryCalculationKind,
    pub average_start_time: DateTime<Utc>,
    pub start_time_difference_s: f64,
    pub observations: Vec<CentreObservation>,
    /// Derived plume altitude above sea level; `None` when the height was an input.
    pub plume_altitude: Option<Estimate>,
    /// Degrees, the direction the wind blows from.
    pub wind_direction: Estimate,
    pub location: GeoPoint,
}

impl GeometryResult {
    pub fn valid(&self, valid_time_s: f64) -> TimeInterval {
        TimeInterval::around(self.average_start_time, valid_time_s)
    }

    fn direction_source(&self) -> MeteorologySource {
        match self.kind {
            GeometryCalculationKind::TwoInstrumentTriangulation => {
                MeteorologySource::GeometryCalculation
            }
            GeometryCalculationKind::SingleInstrumentWindDirectionOnly => {
                MeteorologySource::GeometryCalculationSingleInstrument
            }
        }
    }
}

/// A scan that may take part in a geometry calculation.
struct Candidate<'s> {
    scan: &'s AcceptedScan,
    location: &'s InstrumentLocation,
    geometry: ScannerGeometry,
}

impl Candidate<'_> {
    fn observation(&self) -> CentreObservation {
        CentreObservation {
            serial: self.scan.serial.clone(),
            start_time: self.scan.start_time,
            centre: self.scan.property.centre,
            centre_error: self.scan.property.centre_error,
            centre2: self.scan.property.centre2,
        }
    }
}

/// Combines plume centres of time-sorted flux scans into plume altitudes and wind directions.
pub struct GeometryTriangulator<'a> {
    setup: &'a NetworkSetup,
    settings: &'a GeometrySettings,
}

impl<'a> GeometryTriangulator<'a> {
    pub fn new(setup: &'a NetworkSetup, settings: &'a GeometrySettings) -> Self {
        Self { setup, settings }
    }

    /// Pairs every eligible scan with the later scans in reach, falling back to
    /// a single-instrument direction for scans no partner was found for.
    ///
    /// `scans` must be sorted by start time. Accepted results are written into
    /// both stores once all scans are processed.
    pub fn triangulate(
        &self,
        scans: &[AcceptedScan],
        plume_heights: &mut PlumeHeightDataBase,
        winds: &mut WindDataBase,
    ) -> ProcessingResult<Vec<GeometryResult>> {
        if scans.windows(2).any(|w| w[0].start_time > w[1].start_time) {
            return Err(ProcessingError::InvalidInput(
                "scans must be sorted by start time before triangulation".into(),
            ));
        }

        let candidates: Vec<Candidate<'_>> =
            scans.iter().filter_map(|scan| self.candidate(scan)).collect();
        let mut combined = vec![false; candidates.len()];
        let mut results = Vec::new();
        let max_gap = Duration::milliseconds((self.settings.max_time_difference_s * 1000.0) as i64);

        for (i, first) in candidates.iter().enumerate() {
            for (j, second) in candidates.iter().enumerate().skip(i + 1) {
                if second.scan.start_time - first.scan.start_time > max_gap {
                    break;
                }
                if !self.pairable(first, second) {
                    continue;
                }
                match self.combine(first, second) {
                    Ok(result) => {
                        combined[i] = true;
                        combined[j] = true;
                        results.push(result);
                    }
                    Err(err) => LogManager::for_scan(&first.scan.path, Some(&first.scan.serial))
                        .record(&format!("not combined with {}: {}", second.scan.serial, err)),
                }
            }

            if !combined[i] {
                let log = LogManager::for_scan(&first.scan.path, Some(&first.scan.serial));
                match self.best_height(first.scan.start_time, plume_heights, &results) {
                    Some(height) => match self.single(first, &height) {
                        Ok(result) => results.push(result),
                        Err(err) => log.record(&format!("no single-instrument direction: {}", err)),
                    },
                    None => log.warn("no plume height known for single-instrument direction"),
                }
            }
        }

        self.publish(&results, plume_heights, winds);
        log::info!(
            "geometry: {} results from {} eligible scans",
            results.len(),
            candidates.len()
        );
        Ok(results)
    }

    /// Whether two scans satisfy every pairing bound. Symmetric in its arguments.
    pub fn can_combine(&self, a: &AcceptedScan, b: &AcceptedScan) -> bool {
        match (self.candidate(a), self.candidate(b)) {
            (Some(a), Some(b)) => {
                let gap = seconds_between(a.scan.start_time, b.scan.start_time).abs();
                gap <= self.settings.max_time_difference_s && self.pairable(&a, &b)
            }
            _ => false,
        }
    }

    fn candidate<'s>(&'s self, scan: &'s AcceptedScan) -> Option<Candidate<'s>> {
        let property = &scan.property;
        if scan.mode != MeasurementMode::Flux
            || !property.visible
            || property.completeness < self.settings.completeness_limit
        {
            return None;
        }
        match self.setup.locate(&scan.serial, scan.start_time) {
            Ok((instrument, location)) => Some(Candidate {
                scan,
                location,
                geometry: location.geometry(instrument.instrument_type),
            }),
            Err(err) => {
                LogManager::for_scan(&scan.path, Some(&scan.serial)).warn(&err.to_string());
                None
            }
        }
    }

    fn pairable(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> bool {
        if a.scan.serial == b.scan.serial {
            return false;
        }
        let distance = a.location.position().distance_to(&b.location.position());
        distance >= self.settings.min_distance_m && distance <= self.settings.max_distance_m
    }

    fn sighting(&self, candidate: &Candidate<'_>, angle_offset: f64) -> Sighting {
        let origin = candidate
            .location
            .position()
            .to_local(&self.setup.volcano.position());
        let property = &candidate.scan.property;
        let direction = candidate
            .geometry
            .viewing_direction(property.centre + angle_offset, property.centre2);
        Sighting::new(origin, direction)
    }

    fn combine(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> ProcessingResult<GeometryResult> {
        let degenerate = || ProcessingError::DegenerateGeometry("rays do not meet one plume line".into());
        let base = triangulate(&self.sighting(a, 0.0), &self.sighting(b, 0.0)).ok_or_else(degenerate)?;

        let (err_a, err_b) = (a.scan.property.centre_error, b.scan.property.centre_error);
        let mut altitude_error: f64 = 0.0;
        let mut direction_error: f64 = 0.0;
        for (sign_a, sign_b) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
            let perturbed = triangulate(
                &self.sighting(a, sign_a * err_a),
                &self.sighting(b, sign_b * err_b),
            )
            .ok_or_else(degenerate)?;
            altitude_error = altitude_error.max((perturbed.height - base.height).abs());
            direction_error = direction_error.max(bearing_deviation(&perturbed, &base));
        }

        let altitude = base.height + self.setup.volcano.altitude;
        if altitude_error > self.settings.max_altitude_error_m
            || altitude_error > MAX_RELATIVE_ALTITUDE_ERROR * altitude
        {
            return Err(ProcessingError::DegenerateGeometry(format!(
                "altitude {:.0} m with error {:.0} m",
                altitude, altitude_error
            )));
        }
        self.check_direction_error(direction_error)?;

        let (earlier, later) = if a.scan.start_time <= b.scan.start_time {
            (a, b)
        } else {
            (b, a)
        };
        let difference = seconds_between(earlier.scan.start_time, later.scan.start_time);
        let (pa, pb) = (a.location.position(), b.location.position());
        Ok(GeometryResult {
            kind: GeometryCalculationKind::TwoInstrumentTriangulation,
            average_start_time: earlier.scan.start_time
                + Duration::milliseconds((difference * 500.0) as i64),
            start_time_difference_s: difference,
            observations: vec![a.observation(), b.observation()],
            plume_altitude: Some(Estimate::new(altitude, altitude_error)),
            wind_direction: Estimate::new(base.wind_direction(), direction_error),
            location: GeoPoint::new(
                0.5 * (pa.latitude + pb.latitude),
                0.5 * (pa.longitude + pb.longitude),
                0.5 * (pa.altitude + pb.altitude),
            ),
        })
    }

    fn single(&self, a: &Candidate<'_>, height: &PlumeHeight) -> ProcessingResult<GeometryResult> {
        let relative = height.altitude - self.setup.volcano.altitude;
        let base = bearing_at_height(&self.sighting(a, 0.0), relative).ok_or_else(|| {
            ProcessingError::DegenerateGeometry(format!(
                "centre ray does not reach plume altitude {:.0} m",
                height.altitude
            ))
        })?;

        let centre_error = a.scan.property.centre_error;
        let mut direction_error: f64 = 0.0;
        for (sign_angle, sign_height) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
            let sighting = self.sighting(a, sign_angle * centre_error);
            let perturbed_height = relative + sign_height * height.altitude_error;
            if let Some(perturbed) = bearing_at_height(&sighting, perturbed_height) {
                direction_error = direction_error.max(bearing_deviation(&perturbed, &base));
            }
        }
        self.check_direction_error(direction_error)?;

        Ok(GeometryResult {
            kind: GeometryCalculationKind::SingleInstrumentWindDirectionOnly,
            average_start_time: a.scan.start_time,
            start_time_difference_s: 0.0,
            observations: vec![a.observation()],
            plume_altitude: None,
            wind_direction: Estimate::new(base.wind_direction(), direction_error),
            location: a.location.position(),
        })
    }

    fn check_direction_error(&self, error: f64) -> ProcessingResult<()> {
        if error > self.settings.max_wind_direction_error_deg {
            return Err(ProcessingError::DegenerateGeometry(format!(
                "wind direction error {:.1} deg",
                error
            )));
        }
        Ok(())
    }

    /// Stored plume height at `time`, replaced by a fresh triangulation nearby
    /// when that one has the smaller altitude error.
    fn best_height(
        &self,
        time: DateTime<Utc>,
        plume_heights: &PlumeHeightDataBase,
        fresh: &[GeometryResult],
    ) -> Option<PlumeHeight> {
        let mut best = plume_heights.plume_height(time);
        for result in fresh {
            let Some(altitude) = result.plume_altitude else {
                continue;
            };
            let valid = result.valid(self.settings.valid_time_s);
            let better = best
                .as_ref()
                .map_or(true, |b| altitude.error < b.altitude_error);
            if valid.contains(time) && better {
                best = Some(PlumeHeight {
                    altitude: altitude.value,
                    altitude_error: altitude.error,
                    source: MeteorologySource::GeometryCalculation,
                    valid,
                });
            }
        }
        best
    }

    fn publish(
        &self,
        results: &[GeometryResult],
        plume_heights: &mut PlumeHeightDataBase,
        winds: &mut WindDataBase,
    ) {
        for result in results {
            let valid = result.valid(self.settings.valid_time_s);
            if let Some(altitude) = result.plume_altitude.filter(|a| a.value > 0.0) {
                plume_heights.insert(PlumeHeight {
                    altitude: altitude.value,
                    altitude_error: altitude.error,
                    source: MeteorologySource::GeometryCalculation,
                    valid,
                });
            }
            if result.wind_direction.value.is_finite() {
                winds.insert_direction(WindComponent {
                    value: result.wind_direction.value,
                    error: result.wind_direction.error,
                    source: result.direction_source(),
                    valid,
                    location: Some(result.location),
                });
            }
        }
    }
}

fn bearing_deviation(perturbed: &PlumeSolution, base: &PlumeSolution) -> f64 {
    angle_difference(perturbed.bearing, base.bearing).abs()
}
