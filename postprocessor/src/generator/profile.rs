use crate::ingest::fitted::FittedScanFile;
use crate::workflow::config::{InputConfig, WorkflowConfig};
use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use doascore::config::{
    FitWindow, InstrumentLocation, InstrumentSetup, InstrumentType, NetworkSetup,
    ProcessingSettings, VolcanoSource,
};
use doascore::math::GeoPoint;
use doascore::scan::{Molecule, ReferenceFit, SkySpectrum, SpectrumFit, SpectrumInfo};
use doascore::TimeInterval;
use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const FIT_WINDOW: &str = "SO2";
const SOUTH: &str = "SOUTH01";
const NORTH: &str = "NORTH01";
const DUAL_BEAM: &str = "I2J8552";

/// Plume centre as seen from either flat scanner, degrees from zenith.
const CENTRE_ANGLE_DEG: f64 = 50.0;
/// Zenith angle of the tilted Heidelberg beam, pointing upwind.
const TILTED_BEAM_DEG: f64 = 20.0;
const FLUX_SPECTRA: usize = 81;
const WIND_SPECTRA: usize = 720;
const BACKGROUND_COLUMN: f64 = 1.0e16;
const PLUME_COLUMN: f64 = 4.0e17;
const COLUMN_ERROR: f64 = 1.0e16;

/// Configuration for generating a synthetic monitoring network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Number of south/north flux scan pairs, ten minutes apart.
    pub scan_pairs: usize,
    /// Plume altitude above sea level, metres.
    pub plume_altitude: f64,
    /// Speed of the eastbound plume, m/s.
    pub wind_speed: f64,
    /// Uniform column noise as a fraction of the plume column.
    pub noise: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            scan_pairs: 3,
            plume_altitude: 5500.0,
            wind_speed: 8.0,
            noise: 0.01,
        }
    }
}

/// Files written by [`generate`].
#[derive(Debug, Clone)]
pub struct GeneratedNetwork {
    pub workflow: PathBuf,
    pub scans: Vec<PathBuf>,
}

/// Layout of the synthetic network in metres east/north of the volcano.
struct Layout {
    volcano: VolcanoSource,
    instrument_altitude: f64,
    /// Plume height above the instruments.
    height: f64,
    lateral_offset: f64,
}

impl Layout {
    fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let instrument_altitude = 3500.0;
        let height = config.plume_altitude - instrument_altitude;
        if height <= 0.0 {
            anyhow::bail!(
                "plume altitude {} m must be above the instruments at {} m",
                config.plume_altitude,
                instrument_altitude
            );
        }
        if config.wind_speed <= 0.0 {
            anyhow::bail!("wind speed {} m/s must be positive", config.wind_speed);
        }
        Ok(Self {
            volcano: VolcanoSource {
                name: "Tungurahua".into(),
                latitude: -1.467,
                longitude: -78.442,
                altitude: 5023.0,
            },
            instrument_altitude,
            height,
            lateral_offset: height * CENTRE_ANGLE_DEG.to_radians().tan(),
        })
    }

    fn site(&self, east: f64, north: f64) -> GeoPoint {
        let up = self.instrument_altitude - self.volcano.altitude;
        GeoPoint::from_local(&self.volcano.position(), &Vector3::new(east, north, up))
    }

    fn instrument(&self, serial: &str, kind: InstrumentType, east: f64, north: f64) -> InstrumentSetup {
        let site = self.site(east, north);
        InstrumentSetup {
            serial: serial.into(),
            instrument_type: kind,
            locations: vec![InstrumentLocation {
                name: format!("{} site", serial),
                latitude: site.latitude,
                longitude: site.longitude,
                altitude: site.altitude,
                compass: 90.0,
                cone_angle: 90.0,
                tilt: 0.0,
                beam_separation: None,
                valid: TimeInterval::unbounded(),
            }],
            fit_windows: vec![FitWindow {
                name: FIT_WINDOW.into(),
                fit_low: 10,
                fit_high: 40,
                channel: 0,
                valid: TimeInterval::unbounded(),
            }],
        }
    }

    /// Two flat scanners either side of the plume axis, a dual-beam instrument beneath it.
    fn network(&self) -> NetworkSetup {
        NetworkSetup {
            volcano: self.volcano.clone(),
            instruments: vec![
                self.instrument(SOUTH, InstrumentType::Gothenburg, 8000.0, -self.lateral_offset),
                self.instrument(NORTH, InstrumentType::Gothenburg, 8000.0, self.lateral_offset),
                self.instrument(DUAL_BEAM, InstrumentType::Heidelberg, 4000.0, 0.0),
            ],
        }
    }

    /// Horizontal distance between the vertical and the tilted beam at plume height.
    fn beam_distance(&self) -> f64 {
        self.height * TILTED_BEAM_DEG.to_radians().tan()
    }
}

fn jitter(rng: &mut StdRng, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..amplitude)
    } else {
        0.0
    }
}

fn sky(start: DateTime<Utc>) -> SkySpectrum {
    SkySpectrum {
        start_time: start,
        exposure_time_ms: 300,
        num_spectra: 10,
        dynamic_range: 4095.0,
        pixels: vec![20_000.0; 64],
    }
}

fn spectrum(
    name: &str,
    angle: f64,
    angle2: f64,
    start: DateTime<Utc>,
    seconds: i64,
    column: f64,
) -> SpectrumFit {
    SpectrumFit {
        info: SpectrumInfo {
            name: name.into(),
            scan_angle: angle,
            scan_angle2: angle2,
            start_time: start,
            stop_time: start + Duration::seconds(seconds),
            exposure_time_ms: 300,
            num_spectra: 10,
            channel: 0,
            peak_intensity: 0.6,
            fit_intensity: 0.4,
        },
        references: vec![ReferenceFit {
            molecule: Molecule::So2,
            column,
            column_error: COLUMN_ERROR,
            shift: 0.0,
            shift_error: 0.0,
            squeeze: 1.0,
            squeeze_error: 0.0,
        }],
        chi_square: 0.05,
        delta: 0.01,
        bad: false,
        deleted: false,
    }
}

/// Gaussian plume centred on `centre`, sampled every 2 degrees from -80 to 80.
fn flux_scan(
    serial: &str,
    start: DateTime<Utc>,
    centre: f64,
    noise: f64,
    rng: &mut StdRng,
) -> FittedScanFile {
    let spectra = (0..FLUX_SPECTRA)
        .map(|i| {
            let angle = -80.0 + 2.0 * i as f64;
            let d = angle - centre;
            let column = BACKGROUND_COLUMN
                + PLUME_COLUMN * (-d * d / 128.0).exp()
                + jitter(rng, noise * PLUME_COLUMN);
            spectrum("scan", angle, 0.0, start + Duration::seconds(2 * i as i64), 2, column)
        })
        .collect();
    FittedScanFile {
        serial: serial.into(),
        channel: 0,
        start_time: start,
        sky: sky(start),
        windows: BTreeMap::from([(FIT_WINDOW.to_string(), spectra)]),
    }
}

/// Column drifting over a fixed point, `t` seconds into the measurement.
fn drifting_column(t: f64) -> f64 {
    3.0e17
        + 1.0e17 * (0.105 * t).sin()
        + 0.6e17 * (0.0385 * t + 1.0).sin()
        + 0.3e17 * (0.265 * t + 2.0).sin()
}

/// Alternates one-second spectra between the zenith and the tilted upwind beam.
///
/// The zenith beam sees what the tilted beam saw `beam_distance / wind_speed` earlier.
fn wind_scan(
    layout: &Layout,
    start: DateTime<Utc>,
    config: &GeneratorConfig,
    rng: &mut StdRng,
) -> FittedScanFile {
    let delay = layout.beam_distance() / config.wind_speed;
    let spectra = (0..WIND_SPECTRA)
        .map(|i| {
            let t = i as f64;
            let (zenith, seen_at) = if i % 2 == 0 {
                (0.0, t - delay)
            } else {
                (TILTED_BEAM_DEG, t)
            };
            let column = drifting_column(seen_at) + jitter(rng, config.noise * PLUME_COLUMN);
            spectrum("wind", zenith, 270.0, start + Duration::seconds(i as i64), 1, column)
        })
        .collect();
    FittedScanFile {
        serial: DUAL_BEAM.into(),
        channel: 0,
        start_time: start,
        sky: sky(start),
        windows: BTreeMap::from([(FIT_WINDOW.to_string(), spectra)]),
    }
}

fn write_scan(directory: &Path, scan: &FittedScanFile) -> anyhow::Result<PathBuf> {
    let path = directory.join(format!(
        "{}_{}.json",
        scan.serial,
        scan.start_time.format("%H%M")
    ));
    scan.write(&path)?;
    Ok(path)
}

/// Writes a workflow file and one morning of fitted scans under `directory`.
///
/// Flux scans alternate between the south and the north scanner; one
/// dual-beam scan is recorded five minutes after the first pair started.
pub fn generate(directory: &Path, config: &GeneratorConfig) -> anyhow::Result<GeneratedNetwork> {
    let layout = Layout::new(config)?;
    let scan_directory = directory.join("scans");
    let mut rng = StdRng::seed_from_u64(config.seed);
    let first = Utc
        .with_ymd_and_hms(2024, 3, 1, 14, 0, 0)
        .single()
        .context("generator start time")?;

    let mut scans = Vec::new();
    for pair in 0..config.scan_pairs {
        let south_start = first + Duration::minutes(10 * pair as i64);
        let south = flux_scan(SOUTH, south_start, -CENTRE_ANGLE_DEG, config.noise, &mut rng);
        scans.push(write_scan(&scan_directory, &south)?);
        let north_start = south_start + Duration::minutes(3);
        let north = flux_scan(NORTH, north_start, CENTRE_ANGLE_DEG, config.noise, &mut rng);
        scans.push(write_scan(&scan_directory, &north)?);
    }
    let wind = wind_scan(&layout, first + Duration::minutes(5), config, &mut rng);
    scans.push(write_scan(&scan_directory, &wind)?);
    scans.sort();

    let mut settings = ProcessingSettings {
        max_threads: 2,
        output_directory: directory.join("output"),
        ..ProcessingSettings::default()
    };
    settings.dual_beam.shift_max_s = 120.0;
    settings.dual_beam.test_length_s = 300.0;
    settings.dual_beam.low_pass_order = 20;

    let workflow = WorkflowConfig {
        setup: layout.network(),
        settings,
        default_wind: Default::default(),
        default_plume_height: Default::default(),
        wind_fields: Vec::new(),
        input: InputConfig {
            directories: vec![scan_directory],
            extension: "json".into(),
        },
    };
    let workflow_path = directory.join("workflow.yaml");
    workflow.save(&workflow_path)?;
    log::info!(
        "generated {} scans and {}",
        scans.len(),
        workflow_path.display()
    );

    Ok(GeneratedNetwork {
        workflow: workflow_path,
        scans,
    })
}
