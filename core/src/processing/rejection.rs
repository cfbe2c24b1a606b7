use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a scan file did not make it out of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectionReason {
    IgnoredByPreviousRun,
    UnreadableScan,
    InstrumentNotConfigured,
    NoLocation,
    NoFitWindow,
    SkySpectrumDark,
    SkySpectrumTooLongExposure,
    SkySpectrumSaturated,
    EvaluationFailed,
    NoSpectraEvaluated,
    NoPlume,
    ArchiveFailed,
    Panicked,
}

impl RejectionReason {
    pub fn describe(self) -> &'static str {
        match self {
            RejectionReason::IgnoredByPreviousRun => "ignored by previous run",
            RejectionReason::UnreadableScan => "scan file could not be read",
            RejectionReason::InstrumentNotConfigured => "instrument not configured",
            RejectionReason::NoLocation => "no valid instrument location",
            RejectionReason::NoFitWindow => "no valid fit window",
            RejectionReason::SkySpectrumDark => "sky spectrum is dark",
            RejectionReason::SkySpectrumTooLongExposure => "sky spectrum exposure time too long",
            RejectionReason::SkySpectrumSaturated => "sky spectrum saturated in fit region",
            RejectionReason::EvaluationFailed => "evaluation failed",
            RejectionReason::NoSpectraEvaluated => "no spectra evaluated",
            RejectionReason::NoPlume => super::status::NO_PLUME_MARKER,
            RejectionReason::ArchiveFailed => "evaluation could not be archived",
            RejectionReason::Panicked => "evaluation aborted unexpectedly",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A rejected scan file with enough context to reproduce the decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub path: PathBuf,
    pub serial: Option<String>,
    pub reason: RejectionReason,
    pub detail: String,
}

impl Rejection {
    pub fn new(
        path: &Path,
        serial: Option<&str>,
        reason: RejectionReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            serial: serial.map(str::to_string),
            reason,
            detail: detail.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
