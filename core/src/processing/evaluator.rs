use crate::config::setup::FitWindow;
use crate::scan::result::ScanResult;
use crate::scan::spectrum::SkySpectrum;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// What the dispatcher needs to know about a scan before fitting it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHeader {
    pub serial: String,
    pub channel: u8,
    pub start_time: DateTime<Utc>,
    pub sky: SkySpectrum,
}

#[derive(thiserror::Error, Debug)]
pub enum EvaluationError {
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("fit failed in window '{window}': {reason}")]
    FitFailed { window: String, reason: String },
}

/// Boundary to the external spectral-fitting engine.
///
/// Each dispatcher worker owns its own evaluator, so implementations may keep
/// per-spectrum scratch state without locking.
pub trait ScanEvaluator {
    fn read_header(&mut self, path: &Path) -> Result<ScanHeader, EvaluationError>;

    fn evaluate(
        &mut self,
        path: &Path,
        header: &ScanHeader,
        window: &FitWindow,
    ) -> Result<ScanResult, EvaluationError>;
}
