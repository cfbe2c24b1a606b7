use crate::ingest::fitted::JsonScanEvaluator;
use crate::output::logs::{OutputLogs, STATUS_LOG};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use doascore::dual_beam::{DualBeamCalculator, WindSpeedResult};
use doascore::flux::{FluxCalculator, FluxResult};
use doascore::geometry::{GeometryResult, GeometryTriangulator};
use doascore::processing::status::read_ignore_list;
use doascore::processing::{DispatchRequest, Dispatcher, JsonArchive};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// Sub-directory of the output directory holding archived evaluations.
pub const ARCHIVE_DIRECTORY: &str = "evaluations";

pub struct RunSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub geometry: Vec<GeometryResult>,
    pub wind_speeds: Vec<WindSpeedResult>,
    pub fluxes: Vec<FluxResult>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Files of the configured input directories with the configured extension, sorted.
    pub fn input_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let extension = self.config.input.extension.trim_start_matches('.');
        let mut files = Vec::new();
        for directory in &self.config.input.directories {
            let entries = fs::read_dir(directory)
                .with_context(|| format!("listing input directory {}", directory.display()))?;
            for entry in entries {
                let path = entry
                    .with_context(|| format!("listing input directory {}", directory.display()))?
                    .path();
                let matches = extension.is_empty()
                    || path.extension().is_some_and(|e| e.eq_ignore_ascii_case(extension));
                if path.is_file() && matches {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Dispatch, then geometry, dual-beam wind speeds and fluxes, then every log.
    pub fn execute(&self, files: Vec<PathBuf>) -> anyhow::Result<RunSummary> {
        let config = &self.config;
        let settings = &config.settings;
        let molecule = settings.molecule;
        let logs = OutputLogs::create(&settings.output_directory)?;

        let ignore_list = if settings.continuation {
            let path = logs.path(STATUS_LOG);
            read_ignore_list(&path)
                .with_context(|| format!("reading ignore list from {}", path.display()))?
        } else {
            HashSet::new()
        };
        if !ignore_list.is_empty() {
            log::info!("{} scans ignored from the previous run", ignore_list.len());
        }

        let archive = JsonArchive::new(settings.output_directory.join(ARCHIVE_DIRECTORY));
        let request = DispatchRequest::from_settings(settings, ignore_list);
        let dispatcher = Dispatcher::new(&config.setup, settings, &archive);
        let mut outcome = dispatcher.run(files, &request, JsonScanEvaluator::new);
        outcome.sort();

        let mut heights = config.plume_height_database();
        let mut winds = config.wind_database();

        let geometry = GeometryTriangulator::new(&config.setup, &settings.geometry)
            .triangulate(&outcome.accepted, &mut heights, &mut winds)
            .context("triangulating plume geometry")?;
        let wind_speeds = DualBeamCalculator::new(&config.setup, &settings.dual_beam, molecule)
            .calculate(&outcome.accepted, &heights, &mut winds);
        let fluxes = FluxCalculator::new(&config.setup, &settings.flux, molecule)
            .calculate_all(&mut outcome.accepted, &winds, &heights);
        log::info!(
            "{} geometry results, {} wind speeds, {} fluxes",
            geometry.len(),
            wind_speeds.len(),
            fluxes.len()
        );

        logs.write_status(&outcome.rejected)?;
        logs.write_statistics(&outcome.statistics)?;
        logs.write_geometry(&geometry)?;
        logs.write_wind_speeds(&wind_speeds)?;
        logs.write_fluxes(&fluxes)?;

        Ok(RunSummary {
            accepted: outcome.accepted.len(),
            rejected: outcome.rejected.len(),
            geometry,
            wind_speeds,
            fluxes,
        })
    }
}
