use crate::scan::mode::MeasurementMode;
use crate::scan::result::ScanResult;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("archive i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("archived evaluation is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("archived evaluation {0} holds no results")]
    Empty(PathBuf),
}

/// Per-window results of one scan as written to the evaluation archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedEvaluation {
    pub scan: PathBuf,
    pub mode: MeasurementMode,
    pub results: Vec<ScanResult>,
}

/// Storage of evaluated scans, consulted again by continued runs.
pub trait EvaluationArchive: Sync {
    /// Location of an earlier evaluation of `scan`, if one exists.
    fn find(&self, scan: &Path) -> Option<PathBuf>;

    fn load(&self, archived: &Path) -> Result<ArchivedEvaluation, ArchiveError>;

    /// Writes the results and returns where they were stored.
    fn store(
        &self,
        scan: &Path,
        mode: MeasurementMode,
        results: &[ScanResult],
    ) -> Result<PathBuf, ArchiveError>;
}

/// JSON files laid out as `<root>/<serial>/<mode>/<scan stem>.json`.
#[derive(Debug, Clone)]
pub struct JsonArchive {
    root: PathBuf,
}

impl JsonArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_name(scan: &Path) -> String {
        let stem = scan
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan".to_string());
        format!("{}.json", stem)
    }
}

impl EvaluationArchive for JsonArchive {
    fn find(&self, scan: &Path) -> Option<PathBuf> {
        let name = Self::entry_name(scan);
        let serials = fs::read_dir(&self.root).ok()?;
        for serial in serials.flatten() {
            for mode in MeasurementMode::ALL {
                let candidate = serial.path().join(mode.directory_name()).join(&name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn load(&self, archived: &Path) -> Result<ArchivedEvaluation, ArchiveError> {
        let reader = BufReader::new(File::open(archived)?);
        let evaluation: ArchivedEvaluation = serde_json::from_reader(reader)?;
        if evaluation.results.is_empty() {
            return Err(ArchiveError::Empty(archived.to_path_buf()));
        }
        Ok(evaluation)
    }

    fn store(
        &self,
        scan: &Path,
        mode: MeasurementMode,
        results: &[ScanResult],
    ) -> Result<PathBuf, ArchiveError> {
        let serial = results
            .first()
            .map(|r| r.serial.clone())
            .ok_or_else(|| ArchiveError::Empty(scan.to_path_buf()))?;
        let directory = self.root.join(serial).join(mode.directory_name());
        fs::create_dir_all(&directory)?;
        let target = directory.join(Self::entry_name(scan));
        let partial = target.with_extension("json.partial");

        let evaluation = ArchivedEvaluation {
            scan: scan.to_path_buf(),
            mode,
            results: results.to_vec(),
        };
        let mut writer = BufWriter::new(File::create(&partial)?);
        serde_json::to_writer_pretty(&mut writer, &evaluation)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&partial, &target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::result::fixtures::{gaussian, scan_with_columns, sweep_angles};
    use chrono::{TimeZone, Utc};

    #[test]
    fn stored_evaluation_is_found_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonArchive::new(dir.path());
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let scan = scan_with_columns("D2J2124", start, &sweep_angles(-80.0, 80.0, 21), gaussian(0.0, 10.0));
        let source = Path::new("/incoming/D2J2124_240301_1000_0.pak");

        assert!(archive.find(source).is_none());
        let stored = archive
            .store(source, MeasurementMode::Flux, std::slice::from_ref(&scan))
            .unwrap();
        assert!(stored.ends_with("D2J2124/flux/D2J2124_240301_1000_0.json"));
        assert_eq!(archive.find(source), Some(stored.clone()));

        let loaded = archive.load(&stored).unwrap();
        assert_eq!(loaded.mode, MeasurementMode::Flux);
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].len(), scan.len());
    }

    #[test]
    fn storing_nothing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonArchive::new(dir.path());
        let err = archive
            .store(Path::new("/incoming/a.pak"), MeasurementMode::Flux, &[])
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Empty(_)));
    }
}
