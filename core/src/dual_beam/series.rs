use crate::math::stats::StatsHelper;
use crate::prelude::{seconds_between, ProcessingError, ProcessingResult};
use crate::scan::result::ScanResult;
use crate::scan::spectrum::Molecule;
use ndarray::{s, Array1, ArrayView1};

/// Column densities against seconds since the start of the scan, for one viewing direction.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    time: Array1<f64>,
    column: Array1<f64>,
}

impl MeasurementSeries {
    pub fn new(time: Array1<f64>, column: Array1<f64>) -> ProcessingResult<Self> {
        if time.len() != column.len() {
            return Err(ProcessingError::InvalidInput(format!(
                "{} time stamps for {} columns",
                time.len(),
                column.len()
            )));
        }
        Ok(Self { time, column })
    }

    pub fn from_samples(samples: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (time, column): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
        Self {
            time: Array1::from(time),
            column: Array1::from(column),
        }
    }

    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    pub fn column(&self) -> ArrayView1<'_, f64> {
        self.column.view()
    }

    /// Mean spacing between consecutive samples.
    pub fn sample_interval(&self) -> Option<f64> {
        let n = self.len();
        if n < 2 {
            return None;
        }
        Some((self.time[n - 1] - self.time[0]) / (n - 1) as f64)
    }

    /// Keeps the first `len` samples.
    pub fn truncate(&self, len: usize) -> MeasurementSeries {
        let len = len.min(self.len());
        Self {
            time: self.time.slice(s![..len]).to_owned(),
            column: self.column.slice(s![..len]).to_owned(),
        }
    }

    /// Binomially weighted moving average over `order` samples.
    ///
    /// Weights are `C(order - 1, k)` for `k = 0..order`, normalised to one; the
    /// output is `order` samples shorter than the input and each value is
    /// stamped with the time of the middle of its window. Order zero copies.
    pub fn low_pass(&self, order: usize) -> MeasurementSeries {
        if order == 0 {
            return self.clone();
        }
        let n = self.len();
        if n <= order {
            return Self::from_samples(std::iter::empty());
        }
        let weights: Vec<f64> = (0..order)
            .map(|k| StatsHelper::binomial(order - 1, k))
            .collect();
        let total: f64 = weights.iter().sum();

        let out = n - order;
        let column = Array1::from_shape_fn(out, |i| {
            weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * self.column[i + k])
                .sum::<f64>()
                / total
        });
        let time = Array1::from_shape_fn(out, |i| self.time[i + order / 2]);
        Self { time, column }
    }
}

/// Good, non direct-sun spectra of `result` split by viewing position, in order of first use.
///
/// Times are relative to the start of the scan.
pub fn series_by_position(result: &ScanResult, molecule: Molecule) -> Vec<((f64, f64), MeasurementSeries)> {
    let Some(origin) = result.start_time() else {
        return Vec::new();
    };
    let mut groups: Vec<((i64, i64), (f64, f64), Vec<(f64, f64)>)> = Vec::new();
    for spectrum in result.good_spectra().filter(|s| !s.info.is_direct_sun()) {
        let Some(reference) = spectrum.reference(molecule) else {
            continue;
        };
        let angles = (spectrum.info.scan_angle, spectrum.info.scan_angle2);
        let key = (
            (angles.0 * 10.0).round() as i64,
            (angles.1 * 10.0).round() as i64,
        );
        let sample = (seconds_between(origin, spectrum.info.start_time), reference.column);
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, samples)) => samples.push(sample),
            None => groups.push((key, angles, vec![sample])),
        }
    }
    groups
        .into_iter()
        .map(|(_, angles, samples)| (angles, MeasurementSeries::from_samples(samples)))
        .collect()
}

/// All good spectra of `result` as one series, with the mean scan angle.
pub fn series_of(result: &ScanResult, molecule: Molecule) -> Option<(f64, MeasurementSeries)> {
    let origin = result.start_time()?;
    let samples: Vec<(f64, f64, f64)> = result
        .good_spectra()
        .filter(|s| !s.info.is_direct_sun())
        .filter_map(|s| {
            s.reference(molecule).map(|r| {
                (
                    seconds_between(origin, s.info.start_time),
                    r.column,
                    s.info.scan_angle,
                )
            })
        })
        .collect();
    let angles: Vec<f64> = samples.iter().map(|s| s.2).collect();
    let angle = StatsHelper::mean(&angles)?;
    Some((
        angle,
        MeasurementSeries::from_samples(samples.into_iter().map(|(t, c, _)| (t, c))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> MeasurementSeries {
        MeasurementSeries::from_samples((0..n).map(|i| (i as f64, (i * i) as f64)))
    }

    #[test]
    fn order_zero_is_identity() {
        let series = ramp(12);
        assert_eq!(series.low_pass(0), series);
    }

    #[test]
    fn filtered_series_is_order_samples_shorter() {
        let series = ramp(40);
        for order in [1, 2, 5, 20] {
            assert_eq!(series.low_pass(order).len(), 40 - order);
        }
        assert!(ramp(5).low_pass(5).is_empty());
    }

    #[test]
    fn binomial_weights_are_normalised() {
        let flat = MeasurementSeries::from_samples((0..10).map(|i| (i as f64, 7.0)));
        let filtered = flat.low_pass(4);
        assert!(filtered.column().iter().all(|&c| (c - 7.0).abs() < 1e-12));
        // Weights 1,2,1 over a linear ramp reproduce the middle sample.
        let line = MeasurementSeries::from_samples((0..10).map(|i| (i as f64, 3.0 * i as f64)));
        let smoothed = line.low_pass(3);
        assert_relative_eq!(smoothed.column()[0], 3.0);
        assert_relative_eq!(smoothed.time()[0], 1.0);
    }

    #[test]
    fn sample_interval_is_mean_spacing() {
        let series = MeasurementSeries::from_samples([(0.0, 1.0), (1.0, 1.0), (4.0, 1.0)]);
        assert_relative_eq!(series.sample_interval().unwrap(), 2.0);
        assert!(MeasurementSeries::from_samples([(0.0, 1.0)]).sample_interval().is_none());
    }

    #[test]
    fn mismatched_arrays_are_rejected() {
        let err = MeasurementSeries::new(Array1::zeros(3), Array1::zeros(4)).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidInput(_)));
    }
}
