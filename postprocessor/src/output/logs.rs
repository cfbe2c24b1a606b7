use anyhow::Context;
use doascore::dual_beam::WindSpeedResult;
use doascore::flux::FluxResult;
use doascore::geometry::GeometryResult;
use doascore::processing::status::status_line;
use doascore::processing::Rejection;
use doascore::report::{
    flux_log_line, geometry_log_line, statistics_report, wind_speed_log_line, FLUX_LOG_HEADER,
    GEOMETRY_LOG_HEADER, WIND_SPEED_LOG_HEADER,
};
use doascore::telemetry::ProcessingStatistics;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const STATUS_LOG: &str = "StatusLog.txt";
pub const STATISTICS_LOG: &str = "ProcessingStatistics.txt";
pub const GEOMETRY_LOG: &str = "GeometryLog.txt";
pub const WIND_SPEED_LOG: &str = "WindSpeedLog.txt";
pub const FLUX_LOG: &str = "FluxLog.txt";
pub const FLUX_RESULTS: &str = "FluxResults.json";

/// Text and JSON logs of one run, all in one output directory.
#[derive(Debug, Clone)]
pub struct OutputLogs {
    directory: PathBuf,
}

impl OutputLogs {
    pub fn create(directory: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(directory)
            .with_context(|| format!("creating output directory {}", directory.display()))?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn write_lines<I>(&self, name: &str, header: Option<&str>, lines: I) -> anyhow::Result<PathBuf>
    where
        I: IntoIterator<Item = String>,
    {
        let path = self.path(name);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        if let Some(header) = header {
            writeln!(writer, "{}", header)?;
        }
        for line in lines {
            writeln!(writer, "{}", line)?;
        }
        writer
            .flush()
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn write_status(&self, rejected: &[Rejection]) -> anyhow::Result<PathBuf> {
        self.write_lines(STATUS_LOG, None, rejected.iter().map(status_line))
    }

    pub fn write_statistics(&self, statistics: &ProcessingStatistics) -> anyhow::Result<PathBuf> {
        let path = self.path(STATISTICS_LOG);
        fs::write(&path, statistics_report(statistics))
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn write_geometry(&self, results: &[GeometryResult]) -> anyhow::Result<PathBuf> {
        self.write_lines(
            GEOMETRY_LOG,
            Some(GEOMETRY_LOG_HEADER),
            results.iter().map(geometry_log_line),
        )
    }

    pub fn write_wind_speeds(&self, results: &[WindSpeedResult]) -> anyhow::Result<PathBuf> {
        self.write_lines(
            WIND_SPEED_LOG,
            Some(WIND_SPEED_LOG_HEADER),
            results.iter().map(wind_speed_log_line),
        )
    }

    /// Writes the flux log and the JSON summary next to it.
    pub fn write_fluxes(&self, fluxes: &[FluxResult]) -> anyhow::Result<PathBuf> {
        let log = self.write_lines(FLUX_LOG, Some(FLUX_LOG_HEADER), fluxes.iter().map(flux_log_line))?;
        let json = self.path(FLUX_RESULTS);
        let writer = BufWriter::new(
            File::create(&json).with_context(|| format!("creating {}", json.display()))?,
        );
        serde_json::to_writer_pretty(writer, fluxes)
            .with_context(|| format!("writing {}", json.display()))?;
        Ok(log)
    }
}
