use crate::config::settings::ProcessingSettings;
use crate::config::setup::{InstrumentType, NetworkSetup};
use crate::prelude::ProcessingError;
use crate::processing::archive::EvaluationArchive;
use crate::processing::evaluator::{ScanEvaluator, ScanHeader};
use crate::processing::rejection::{Rejection, RejectionReason};
use crate::scan::mode::MeasurementMode;
use crate::scan::plume::PlumeInScanProperty;
use crate::scan::result::ScanResult;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::ProcessingStatistics;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Per-batch knobs of the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub workers: usize,
    /// Fit windows to evaluate; the first one is the main window.
    pub fit_windows: Vec<String>,
    pub continuation: bool,
    /// File names a previous run found without plume.
    pub ignore_list: HashSet<String>,
}

impl DispatchRequest {
    pub fn from_settings(settings: &ProcessingSettings, ignore_list: HashSet<String>) -> Self {
        Self {
            workers: settings.max_threads,
            fit_windows: settings.fit_windows.clone(),
            continuation: settings.continuation,
            ignore_list,
        }
    }
}

/// A scan that passed every quality gate, with one result per fit window.
#[derive(Debug, Clone)]
pub struct AcceptedScan {
    pub path: PathBuf,
    pub eval_log: PathBuf,
    pub serial: String,
    pub start_time: DateTime<Utc>,
    pub mode: MeasurementMode,
    pub property: PlumeInScanProperty,
    pub results: Vec<ScanResult>,
    /// Loaded from the archive of an earlier run rather than evaluated.
    pub reused: bool,
}

impl AcceptedScan {
    /// Result of the main fit window.
    pub fn main_result(&self) -> Option<&ScanResult> {
        self.results.first()
    }

    pub fn main_result_mut(&mut self) -> Option<&mut ScanResult> {
        self.results.first_mut()
    }
}

#[derive(Debug, Default)]
struct BatchOutput {
    accepted: Vec<AcceptedScan>,
    rejected: Vec<Rejection>,
}

/// Shared state of one batch: the queue of pending files and the collected outcomes.
///
/// Workers only ever pop a file or append an outcome, each under its own lock.
#[derive(Debug, Default)]
pub struct BatchContext {
    pending: Mutex<VecDeque<PathBuf>>,
    output: Mutex<BatchOutput>,
}

impl BatchContext {
    pub fn new(files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            pending: Mutex::new(files.into_iter().collect()),
            output: Mutex::new(BatchOutput::default()),
        }
    }

    pub fn try_pop(&self) -> Option<PathBuf> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn append(&self, outcome: Result<AcceptedScan, Rejection>) {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(scan) => output.accepted.push(scan),
            Err(rejection) => output.rejected.push(rejection),
        }
    }

    pub fn into_outcome(self) -> BatchOutcome {
        let output = self
            .output
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut statistics = ProcessingStatistics::new();
        for scan in &output.accepted {
            statistics.record_accepted(&scan.serial);
        }
        for rejection in &output.rejected {
            statistics.record_rejection(rejection.serial.as_deref(), rejection.reason);
        }
        BatchOutcome {
            accepted: output.accepted,
            rejected: output.rejected,
            statistics,
        }
    }
}

/// Everything a batch produced. Every input file lands in exactly one of the two lists.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<AcceptedScan>,
    pub rejected: Vec<Rejection>,
    pub statistics: ProcessingStatistics,
}

impl BatchOutcome {
    /// Sorts accepted scans by start time, then serial.
    pub fn sort(&mut self) {
        self.accepted.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.serial.cmp(&b.serial))
        });
        self.rejected.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Fans scan files out over a fixed set of worker threads.
pub struct Dispatcher<'a> {
    setup: &'a NetworkSetup,
    settings: &'a ProcessingSettings,
    archive: &'a dyn EvaluationArchive,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        setup: &'a NetworkSetup,
        settings: &'a ProcessingSettings,
        archive: &'a dyn EvaluationArchive,
    ) -> Self {
        Self {
            setup,
            settings,
            archive,
        }
    }

    /// Processes every file with exactly `max(1, workers)` threads.
    ///
    /// Each thread builds its own evaluator with `make_evaluator`. A worker that
    /// panics on a file rejects that file and carries on with a fresh evaluator.
    pub fn run<E, F>(
        &self,
        files: Vec<PathBuf>,
        request: &DispatchRequest,
        make_evaluator: F,
    ) -> BatchOutcome
    where
        E: ScanEvaluator,
        F: Fn() -> E + Sync,
    {
        let workers = request.workers.max(1);
        let total = files.len();
        log::info!("dispatching {} scan files over {} workers", total, workers);

        let context = BatchContext::new(files);
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.drain(&context, request, &make_evaluator));
            }
        });

        let outcome = context.into_outcome();
        let (accepted, rejected) = outcome.statistics.snapshot();
        log::info!(
            "batch finished: {} of {} scans accepted, {} rejected",
            accepted,
            total,
            rejected
        );
        outcome
    }

    fn drain<E, F>(&self, context: &BatchContext, request: &DispatchRequest, make_evaluator: &F)
    where
        E: ScanEvaluator,
        F: Fn() -> E,
    {
        let mut evaluator = make_evaluator();
        while let Some(path) = context.try_pop() {
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                self.process_file(&path, request, &mut evaluator)
            }));
            let outcome = match attempt {
                Ok(outcome) => outcome,
                Err(payload) => {
                    evaluator = make_evaluator();
                    Err(Rejection::new(
                        &path,
                        None,
                        RejectionReason::Panicked,
                        panic_message(payload.as_ref()),
                    ))
                }
            };
            if let Err(rejection) = &outcome {
                LogManager::for_scan(&path, rejection.serial.as_deref())
                    .warn(&format!("rejected: {}", rejection.reason));
            }
            context.append(outcome);
        }
    }

    /// Runs every quality gate on a single file.
    pub fn process_file<E: ScanEvaluator>(
        &self,
        path: &Path,
        request: &DispatchRequest,
        evaluator: &mut E,
    ) -> Result<AcceptedScan, Rejection> {
        if request.continuation {
            let name = file_name(path);
            if request.ignore_list.contains(&name) {
                return Err(Rejection::new(
                    path,
                    None,
                    RejectionReason::IgnoredByPreviousRun,
                    "",
                ));
            }
            if let Some(archived) = self.archive.find(path) {
                match self.reuse(path, &archived) {
                    Ok(scan) => return Ok(scan),
                    Err(err) => LogManager::for_scan(path, None).warn(&format!(
                        "archived evaluation {} unusable, evaluating again: {}",
                        archived.display(),
                        err
                    )),
                }
            }
        }

        let header = evaluator.read_header(path).map_err(|err| {
            Rejection::new(path, None, RejectionReason::UnreadableScan, err.to_string())
        })?;
        let serial = header.serial.as_str();
        let log = LogManager::for_scan(path, Some(serial));
        let reject = |reason: RejectionReason, detail: String| {
            Rejection::new(path, Some(serial), reason, detail)
        };

        let (instrument, _) = self
            .setup
            .locate(serial, header.start_time)
            .map_err(|err| match err {
                ProcessingError::InstrumentNotConfigured(_) => {
                    reject(RejectionReason::InstrumentNotConfigured, String::new())
                }
                other => reject(RejectionReason::NoLocation, other.to_string()),
            })?;

        self.check_sky(&header, instrument.instrument_type)
            .map_err(|(reason, detail)| reject(reason, detail))?;

        if request.fit_windows.is_empty() {
            return Err(reject(
                RejectionReason::NoFitWindow,
                "no fit windows requested".into(),
            ));
        }
        let mut results = Vec::with_capacity(request.fit_windows.len());
        for name in &request.fit_windows {
            let window = instrument
                .fit_window_at(name, header.start_time)
                .map_err(|err| reject(RejectionReason::NoFitWindow, err.to_string()))?;
            if header.sky.is_saturated(
                window.fit_low,
                window.fit_high,
                self.settings.sky.saturation_limit,
            ) {
                return Err(reject(
                    RejectionReason::SkySpectrumSaturated,
                    format!("pixels {}-{}", window.fit_low, window.fit_high),
                ));
            }
            let mut result = evaluator
                .evaluate(path, &header, window)
                .map_err(|err| reject(RejectionReason::EvaluationFailed, err.to_string()))?;
            if result.is_empty() {
                return Err(reject(RejectionReason::NoSpectraEvaluated, name.clone()));
            }
            let marked = result
                .check_goodness_of_fit(&self.settings.fit_quality, self.settings.molecule);
            if marked > 0 {
                log.record(&format!("{} of {} spectra marked bad in {}", marked, result.len(), name));
            }
            results.push(result);
        }

        let main = &results[0];
        let mode = main.measurement_mode();
        let property = self
            .plume_property(main, mode)
            .map_err(|reason| reject(reason, String::new()))?;
        let start_time = main.start_time().unwrap_or(header.start_time);

        let eval_log = self
            .archive
            .store(path, mode, &results)
            .map_err(|err| reject(RejectionReason::ArchiveFailed, err.to_string()))?;
        log.record(&format!(
            "accepted as {} scan, completeness {:.2}",
            mode, property.completeness
        ));

        Ok(AcceptedScan {
            path: path.to_path_buf(),
            eval_log,
            serial: header.serial.clone(),
            start_time,
            mode,
            property,
            results,
            reused: false,
        })
    }

    /// Dark, then exposure time. Saturation depends on the fit window and is checked per window.
    fn check_sky(
        &self,
        header: &ScanHeader,
        instrument: InstrumentType,
    ) -> Result<(), (RejectionReason, String)> {
        let sky = &self.settings.sky;
        if header.sky.is_dark(sky.dark_limit) {
            return Err((RejectionReason::SkySpectrumDark, String::new()));
        }
        let limit = sky.max_exposure_time_ms(instrument);
        if header.sky.exposure_time_ms > limit {
            return Err((
                RejectionReason::SkySpectrumTooLongExposure,
                format!("{} ms > {} ms", header.sky.exposure_time_ms, limit),
            ));
        }
        Ok(())
    }

    fn plume_property(
        &self,
        main: &ScanResult,
        mode: MeasurementMode,
    ) -> Result<PlumeInScanProperty, RejectionReason> {
        let molecule = self.settings.molecule;
        match main.plume_properties(molecule) {
            Some(property) => Ok(property),
            None if mode == MeasurementMode::Flux => Err(RejectionReason::NoPlume),
            None => Ok(PlumeInScanProperty::not_visible(
                main.offset(molecule).unwrap_or(0.0),
            )),
        }
    }

    fn reuse(&self, path: &Path, archived: &Path) -> Result<AcceptedScan, String> {
        let evaluation = self.archive.load(archived).map_err(|e| e.to_string())?;
        let main = evaluation
            .results
            .first()
            .ok_or_else(|| "no results".to_string())?;
        let property = self
            .plume_property(main, evaluation.mode)
            .map_err(|reason| reason.to_string())?;
        let start_time = main
            .start_time()
            .ok_or_else(|| "no spectra".to_string())?;
        LogManager::for_scan(path, Some(&main.serial)).record("reusing archived evaluation");
        Ok(AcceptedScan {
            path: path.to_path_buf(),
            eval_log: archived.to_path_buf(),
            serial: main.serial.clone(),
            start_time,
            mode: evaluation.mode,
            property,
            results: evaluation.results,
            reused: true,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::config::setup::{
        FitWindow, InstrumentLocation, InstrumentSetup, InstrumentType, NetworkSetup,
        VolcanoSource,
    };
    use crate::prelude::TimeInterval;

    pub fn instrument(serial: &str, latitude: f64, longitude: f64) -> InstrumentSetup {
        InstrumentSetup {
            serial: serial.to_string(),
            instrument_type: InstrumentType::Gothenburg,
            locations: vec![InstrumentLocation {
                name: format!("{} site", serial),
                latitude,
                longitude,
                altitude: 1500.0,
                compass: 90.0,
                cone_angle: 90.0,
                tilt: 0.0,
                beam_separation: None,
                valid: TimeInterval::unbounded(),
            }],
            fit_windows: vec![FitWindow {
                name: "SO2".into(),
                fit_low: 10,
                fit_high: 40,
                channel: 0,
                valid: TimeInterval::unbounded(),
            }],
        }
    }

    pub fn network(instruments: Vec<InstrumentSetup>) -> NetworkSetup {
        NetworkSetup {
            volcano: VolcanoSource {
                name: "Tungurahua".into(),
                latitude: -1.467,
                longitude: -78.442,
                altitude: 0.0,
            },
            instruments,
        }
    }
}
