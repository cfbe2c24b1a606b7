use crate::processing::rejection::RejectionReason;
use serde::Serialize;
use std::collections::BTreeMap;

/// Accepted and rejected scan counts of one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentStatistics {
    pub accepted: usize,
    pub rejected: BTreeMap<RejectionReason, usize>,
}

impl InstrumentStatistics {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Per-instrument tallies of a batch, keyed by serial.
///
/// Scans whose serial could not be read are counted under `"unknown"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStatistics {
    instruments: BTreeMap<String, InstrumentStatistics>,
}

pub const UNKNOWN_SERIAL: &str = "unknown";

impl ProcessingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&mut self, serial: &str) {
        self.instruments.entry(serial.to_string()).or_default().accepted += 1;
    }

    pub fn record_rejection(&mut self, serial: Option<&str>, reason: RejectionReason) {
        let serial = serial.unwrap_or(UNKNOWN_SERIAL);
        *self
            .instruments
            .entry(serial.to_string())
            .or_default()
            .rejected
            .entry(reason)
            .or_insert(0) += 1;
    }

    pub fn instrument(&self, serial: &str) -> Option<&InstrumentStatistics> {
        self.instruments.get(serial)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InstrumentStatistics)> {
        self.instruments.iter()
    }

    /// `(accepted, rejected)` over all instruments.
    pub fn snapshot(&self) -> (usize, usize) {
        self.instruments.values().fold((0, 0), |(a, r), s| {
            (a + s.accepted, r + s.rejected_total())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_are_kept_per_serial_and_reason() {
        let mut stats = ProcessingStatistics::new();
        stats.record_accepted("D2J2124");
        stats.record_accepted("D2J2124");
        stats.record_rejection(Some("D2J2124"), RejectionReason::SkySpectrumDark);
        stats.record_rejection(Some("I2J8552"), RejectionReason::SkySpectrumSaturated);
        stats.record_rejection(None, RejectionReason::EvaluationFailed);

        let d2j = stats.instrument("D2J2124").unwrap();
        assert_eq!(d2j.accepted, 2);
        assert_eq!(d2j.rejected[&RejectionReason::SkySpectrumDark], 1);
        assert_eq!(stats.instrument(UNKNOWN_SERIAL).unwrap().rejected_total(), 1);
        assert_eq!(stats.snapshot(), (2, 3));
    }
}
