use anyhow::Context;
use doascore::config::{NetworkSetup, ProcessingSettings};
use doascore::math::GeoPoint;
use doascore::meteorology::{
    MeteorologySource, PlumeHeight, PlumeHeightDataBase, WindComponent, WindDataBase,
};
use doascore::TimeInterval;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Wind used wherever nothing better is known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultWind {
    pub speed: f64,
    pub speed_error: f64,
    pub direction: f64,
    pub direction_error: f64,
}

impl Default for DefaultWind {
    fn default() -> Self {
        Self {
            speed: 10.0,
            speed_error: 5.0,
            direction: 0.0,
            direction_error: 90.0,
        }
    }
}

/// Plume altitude above sea level used wherever nothing better is known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultPlumeHeight {
    pub altitude: f64,
    pub altitude_error: f64,
}

impl Default for DefaultPlumeHeight {
    fn default() -> Self {
        Self {
            altitude: 5000.0,
            altitude_error: 2000.0,
        }
    }
}

/// A wind from a model run or typed in by the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindFieldRecord {
    pub speed: f64,
    pub speed_error: f64,
    pub direction: f64,
    pub direction_error: f64,
    pub source: MeteorologySource,
    pub valid: TimeInterval,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub directories: Vec<PathBuf>,
    /// Extension of scan files, without the dot. Empty accepts every file.
    pub extension: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub setup: NetworkSetup,
    #[serde(default)]
    pub settings: ProcessingSettings,
    #[serde(default)]
    pub default_wind: DefaultWind,
    #[serde(default)]
    pub default_plume_height: DefaultPlumeHeight,
    #[serde(default)]
    pub wind_fields: Vec<WindFieldRecord>,
    #[serde(default)]
    pub input: InputConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path_ref = path.as_ref();
        let contents = serde_yaml::to_string(self).context("serializing workflow config")?;
        fs::write(path_ref, contents)
            .with_context(|| format!("writing workflow config {}", path_ref.display()))
    }

    /// Problems that must stop the run before any scan is read.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.setup.validate()?;
        if self.settings.fit_windows.is_empty() {
            anyhow::bail!("no fit windows configured");
        }
        if self.default_plume_height.altitude <= 0.0 {
            anyhow::bail!(
                "default plume altitude {} m must be positive",
                self.default_plume_height.altitude
            );
        }
        Ok(())
    }

    /// Wind store seeded with the default wind and every configured wind field.
    pub fn wind_database(&self) -> WindDataBase {
        let mut winds = WindDataBase::new(self.settings.wind_lookup_radius_m);
        winds.insert_speed(WindComponent {
            value: self.default_wind.speed,
            error: self.default_wind.speed_error,
            source: MeteorologySource::Default,
            valid: TimeInterval::unbounded(),
            location: None,
        });
        winds.insert_direction(WindComponent {
            value: self.default_wind.direction,
            error: self.default_wind.direction_error,
            source: MeteorologySource::Default,
            valid: TimeInterval::unbounded(),
            location: None,
        });
        for record in &self.wind_fields {
            winds.insert_speed(WindComponent {
                value: record.speed,
                error: record.speed_error,
                source: record.source,
                valid: record.valid,
                location: record.location,
            });
            winds.insert_direction(WindComponent {
                value: record.direction,
                error: record.direction_error,
                source: record.source,
                valid: record.valid,
                location: record.location,
            });
        }
        winds
    }

    pub fn plume_height_database(&self) -> PlumeHeightDataBase {
        let mut heights = PlumeHeightDataBase::new();
        heights.insert(PlumeHeight {
            altitude: self.default_plume_height.altitude,
            altitude_error: self.default_plume_height.altitude_error,
            source: MeteorologySource::Default,
            valid: TimeInterval::unbounded(),
        });
        heights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = "\
setup:
  volcano:
    name: Tungurahua
    latitude: -1.467
    longitude: -78.442
    altitude: 5023
  instruments:
    - serial: D2J2124
      instrument_type: Gothenburg
      locations:
        - name: Bilbao
          latitude: -1.41
          longitude: -78.51
          altitude: 2500
          compass: 45
      fit_windows:
        - name: SO2
          fit_low: 320
          fit_high: 460
settings:
  max_threads: 4
wind_fields:
  - speed: 7.5
    speed_error: 1.5
    direction: 260
    direction_error: 15
    source: EcmwfAnalysis
    valid:
      from: 2024-03-01T00:00:00Z
      to: 2024-03-02T00:00:00Z
";

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(MINIMAL.as_bytes()).unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();

        assert_eq!(cfg.settings.max_threads, 4);
        assert_eq!(cfg.settings.fit_windows, vec!["SO2".to_string()]);
        let location = &cfg.setup.instruments[0].locations[0];
        assert_eq!(location.cone_angle, 90.0);
        assert!(location.valid.is_unbounded());
        assert_eq!(cfg.default_wind, DefaultWind::default());
    }

    #[test]
    fn configured_wind_fields_beat_the_default() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(MINIMAL.as_bytes()).unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        let winds = cfg.wind_database();

        let inside = "2024-03-01T12:00:00Z".parse().unwrap();
        let field = winds.wind_field(inside, None).unwrap();
        assert_eq!(field.speed, 7.5);
        assert_eq!(field.direction_source, MeteorologySource::EcmwfAnalysis);

        let outside = "2024-03-05T12:00:00Z".parse().unwrap();
        assert_eq!(winds.wind_field(outside, None).unwrap().speed_source, MeteorologySource::Default);
    }

    #[test]
    fn duplicate_serials_abort_loading() {
        let doubled = MINIMAL.replace(
            "settings:",
            "    - serial: D2J2124\n      instrument_type: Heidelberg\n      locations: []\nsettings:",
        );
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(doubled.as_bytes()).unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("more than once"));
    }
}
