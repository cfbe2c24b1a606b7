use crate::math::geo::GeoPoint;
use crate::prelude::{ConfigurationError, ProcessingError, ProcessingResult, TimeInterval};
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Hardware family of a scanning instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Single-axis (flat or conical) scanner with master/slave channels.
    Gothenburg,
    /// Two-axis scanner reporting zenith angle and azimuth.
    Heidelberg,
}

/// Viewing geometry of a scanner, fixed once per instrument location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScannerGeometry {
    /// Scan plane perpendicular to `compass`.
    Flat { compass: f64, tilt: f64 },
    /// Viewing directions on a cone of half-angle `cone_angle` around an axis
    /// pointing along `compass`; `tilt` raises the axis above the horizon.
    Conical {
        compass: f64,
        cone_angle: f64,
        tilt: f64,
    },
    /// First angle is the zenith angle, second the azimuth from north.
    Heidelberg,
}

impl ScannerGeometry {
    /// Unit viewing direction in east/north/up for the given scan angles (degrees).
    pub fn viewing_direction(&self, angle: f64, angle2: f64) -> Vector3<f64> {
        match *self {
            ScannerGeometry::Flat { compass, tilt } => cone_direction(compass, 90.0, tilt, angle),
            ScannerGeometry::Conical {
                compass,
                cone_angle,
                tilt,
            } => cone_direction(compass, cone_angle, tilt, angle),
            ScannerGeometry::Heidelberg => {
                let zenith = angle.to_radians();
                let azimuth = angle2.to_radians();
                Vector3::new(
                    zenith.sin() * azimuth.sin(),
                    zenith.sin() * azimuth.cos(),
                    zenith.cos(),
                )
            }
        }
    }

    pub fn compass(&self) -> Option<f64> {
        match *self {
            ScannerGeometry::Flat { compass, .. } | ScannerGeometry::Conical { compass, .. } => {
                Some(compass)
            }
            ScannerGeometry::Heidelberg => None,
        }
    }
}

fn cone_direction(compass: f64, cone_angle: f64, tilt: f64, angle: f64) -> Vector3<f64> {
    let (sc, cc) = cone_angle.to_radians().sin_cos();
    let (st, ct) = tilt.to_radians().sin_cos();
    let (sa, ca) = angle.to_radians().sin_cos();
    let local_x = cc * ct - sc * ca * st;
    let local_y = sc * sa;
    let local_z = cc * st + sc * ca * ct;

    let (sb, cb) = compass.to_radians().sin_cos();
    let axis = Vector3::new(sb, cb, 0.0);
    let side = Vector3::new(cb, -sb, 0.0);
    let up = Vector3::new(0.0, 0.0, 1.0);
    axis * local_x + side * local_y + up * local_z
}

/// Where an instrument stood, and how it was mounted, during `valid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub compass: f64,
    #[serde(default = "right_angle")]
    pub cone_angle: f64,
    #[serde(default)]
    pub tilt: f64,
    /// Angle between the two beams of a dual-beam instrument, degrees.
    #[serde(default)]
    pub beam_separation: Option<f64>,
    #[serde(default, skip_serializing_if = "TimeInterval::is_unbounded")]
    pub valid: TimeInterval,
}

fn right_angle() -> f64 {
    90.0
}

impl InstrumentLocation {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude, self.altitude)
    }

    pub fn geometry(&self, instrument: InstrumentType) -> ScannerGeometry {
        match instrument {
            InstrumentType::Heidelberg => ScannerGeometry::Heidelberg,
            InstrumentType::Gothenburg if (self.cone_angle - 90.0).abs() < 1.0 => {
                ScannerGeometry::Flat {
                    compass: self.compass,
                    tilt: self.tilt,
                }
            }
            InstrumentType::Gothenburg => ScannerGeometry::Conical {
                compass: self.compass,
                cone_angle: self.cone_angle,
                tilt: self.tilt,
            },
        }
    }
}

/// Spectral fit window configured for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitWindow {
    pub name: String,
    pub fit_low: usize,
    pub fit_high: usize,
    #[serde(default)]
    pub channel: u8,
    #[serde(default, skip_serializing_if = "TimeInterval::is_unbounded")]
    pub valid: TimeInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSetup {
    pub serial: String,
    pub instrument_type: InstrumentType,
    pub locations: Vec<InstrumentLocation>,
    #[serde(default)]
    pub fit_windows: Vec<FitWindow>,
}

impl InstrumentSetup {
    pub fn location_at(&self, time: DateTime<Utc>) -> Option<&InstrumentLocation> {
        self.locations.iter().find(|l| l.valid.contains(time))
    }

    pub fn fit_window_at(&self, name: &str, time: DateTime<Utc>) -> ProcessingResult<&FitWindow> {
        self.fit_windows
            .iter()
            .find(|w| w.name == name && w.valid.contains(time))
            .ok_or_else(|| ProcessingError::NoFitWindow {
                serial: self.serial.clone(),
                window: name.to_string(),
                time,
            })
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.locations.is_empty() {
            return Err(ConfigurationError::NoLocations(self.serial.clone()));
        }
        for location in &self.locations {
            if location.valid.is_inverted() {
                return Err(ConfigurationError::InvertedTimeRange {
                    serial: self.serial.clone(),
                    item: location.name.clone(),
                });
            }
        }
        for (i, first) in self.locations.iter().enumerate() {
            if let Some(second) = self.locations[i + 1..]
                .iter()
                .find(|other| other.valid.overlaps(&first.valid))
            {
                return Err(ConfigurationError::OverlappingLocations {
                    serial: self.serial.clone(),
                    first: first.name.clone(),
                    second: second.name.clone(),
                });
            }
        }
        for (i, window) in self.fit_windows.iter().enumerate() {
            if window.valid.is_inverted() {
                return Err(ConfigurationError::InvertedTimeRange {
                    serial: self.serial.clone(),
                    item: window.name.clone(),
                });
            }
            let clash = self.fit_windows[i + 1..]
                .iter()
                .any(|other| other.name == window.name && other.valid.overlaps(&window.valid));
            if clash {
                return Err(ConfigurationError::OverlappingFitWindows {
                    serial: self.serial.clone(),
                    window: window.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The plume source all triangulated directions are measured from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolcanoSource {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl VolcanoSource {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude, self.altitude)
    }
}

/// Volcano plus every instrument of the monitoring network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSetup {
    pub volcano: VolcanoSource,
    pub instruments: Vec<InstrumentSetup>,
}

impl NetworkSetup {
    /// Rejects setups that would make lookups ambiguous. Must pass before a batch starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if !seen.insert(instrument.serial.as_str()) {
                return Err(ConfigurationError::DuplicateSerial(instrument.serial.clone()));
            }
            instrument.validate()?;
        }
        Ok(())
    }

    pub fn instrument(&self, serial: &str) -> Option<&InstrumentSetup> {
        self.instruments.iter().find(|i| i.serial == serial)
    }

    pub fn locate(
        &self,
        serial: &str,
        time: DateTime<Utc>,
    ) -> ProcessingResult<(&InstrumentSetup, &InstrumentLocation)> {
        let instrument = self
            .instrument(serial)
            .ok_or_else(|| ProcessingError::InstrumentNotConfigured(serial.to_string()))?;
        let location = instrument
            .location_at(time)
            .ok_or_else(|| ProcessingError::NoLocation {
                serial: serial.to_string(),
                time,
            })?;
        Ok((instrument, location))
    }
}
