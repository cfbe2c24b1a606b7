use anyhow::Context;
use chrono::{DateTime, Utc};
use doascore::config::FitWindow;
use doascore::processing::{EvaluationError, ScanEvaluator, ScanHeader};
use doascore::scan::{ScanResult, SkySpectrum, SpectrumFit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One scan as exported by the spectral-fitting engine: the sky spectrum plus
/// per-spectrum fit outcomes for every fit window it was evaluated in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScanFile {
    pub serial: String,
    #[serde(default)]
    pub channel: u8,
    pub start_time: DateTime<Utc>,
    pub sky: SkySpectrum,
    pub windows: BTreeMap<String, Vec<SpectrumFit>>,
}

impl FittedScanFile {
    pub fn read(path: &Path) -> Result<Self, EvaluationError> {
        let unreadable = |reason: String| EvaluationError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| unreadable(e.to_string()))
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating scan directory {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .with_context(|| format!("writing scan {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads fitted scans from disk. The file parsed for the header is kept so
/// the fit windows of the same scan are not parsed again.
#[derive(Debug, Default)]
pub struct JsonScanEvaluator {
    current: Option<(PathBuf, FittedScanFile)>,
}

impl JsonScanEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(&mut self, path: &Path) -> Result<&FittedScanFile, EvaluationError> {
        let cached = matches!(&self.current, Some((p, _)) if p == path);
        if !cached {
            let scan = FittedScanFile::read(path)?;
            self.current = Some((path.to_path_buf(), scan));
        }
        match &self.current {
            Some((_, scan)) => Ok(scan),
            None => Err(EvaluationError::Unreadable {
                path: path.to_path_buf(),
                reason: "scan not loaded".into(),
            }),
        }
    }
}

impl ScanEvaluator for JsonScanEvaluator {
    fn read_header(&mut self, path: &Path) -> Result<ScanHeader, EvaluationError> {
        let scan = self.scan(path)?;
        Ok(ScanHeader {
            serial: scan.serial.clone(),
            channel: scan.channel,
            start_time: scan.start_time,
            sky: scan.sky.clone(),
        })
    }

    fn evaluate(
        &mut self,
        path: &Path,
        header: &ScanHeader,
        window: &FitWindow,
    ) -> Result<ScanResult, EvaluationError> {
        let scan = self.scan(path)?;
        let spectra = scan
            .windows
            .get(&window.name)
            .ok_or_else(|| EvaluationError::FitFailed {
                window: window.name.clone(),
                reason: "window not present in fitted scan".into(),
            })?;
        Ok(ScanResult::new(
            header.serial.clone(),
            window.name.clone(),
            header.channel,
            Some(header.sky.clone()),
            spectra.clone(),
        ))
    }
}
