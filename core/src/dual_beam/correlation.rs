use crate::config::settings::DualBeamSettings;
use crate::dual_beam::series::MeasurementSeries;
use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use ndarray::s;
use serde::Serialize;

/// Best shift found for one comparison window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationPoint {
    /// Time of the middle of the window, seconds since scan start.
    pub time: f64,
    pub lag: f64,
    pub correlation: f64,
    pub shift: usize,
}

/// Which of the two input series turned out to be upwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    FirstUpwind,
    SecondUpwind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagEstimate {
    pub orientation: Orientation,
    pub mean_lag: f64,
    pub lag_std: f64,
    pub mean_correlation: f64,
    pub good_points: usize,
    pub points: Vec<CorrelationPoint>,
}

/// Slides a comparison window over `upwind` and finds, per window, the shift
/// of `downwind` correlating best with it.
///
/// Windows in which the mean upwind column stays below `column_min` are
/// skipped. Both series must already be filtered and of equal length.
pub fn correlate(
    upwind: &MeasurementSeries,
    downwind: &MeasurementSeries,
    settings: &DualBeamSettings,
) -> ProcessingResult<Vec<CorrelationPoint>> {
    let n = upwind.len();
    if downwind.len() != n {
        return Err(ProcessingError::InvalidInput(format!(
            "series lengths differ: {} and {}",
            n,
            downwind.len()
        )));
    }
    let interval = upwind
        .sample_interval()
        .filter(|dt| *dt > 0.0)
        .ok_or_else(|| ProcessingError::InsufficientData("series too short to sample".into()))?;

    let max_shift = (settings.shift_max_s / interval).round() as usize;
    let length = if settings.use_max_test_length {
        n.saturating_sub(max_shift)
    } else {
        (settings.test_length_s / interval).round() as usize
    };
    if length < 2 || length + max_shift > n {
        return Err(ProcessingError::InsufficientData(format!(
            "{} samples cannot hold a {}-sample window shifted by up to {}",
            n, length, max_shift
        )));
    }

    let up = upwind.column();
    let down = downwind.column();
    let time = upwind.time();
    let mut points = Vec::new();
    for offset in 0..=(n - length - max_shift) {
        let window = up.slice(s![offset..offset + length]);
        if window.mean().unwrap_or(0.0) < settings.column_min {
            continue;
        }
        let best = (0..max_shift)
            .filter_map(|shift| {
                let candidate = down.slice(s![offset + shift..offset + shift + length]);
                StatsHelper::correlation(window, candidate).map(|c| (shift, c))
            })
            .fold(None::<(usize, f64)>, |best, (shift, c)| match best {
                Some((_, b)) if b >= c => best,
                _ => Some((shift, c)),
            });
        if let Some((shift, correlation)) = best {
            points.push(CorrelationPoint {
                time: time[offset + length / 2],
                lag: shift as f64 * interval,
                correlation,
                shift,
            });
        }
    }
    Ok(points)
}

/// Filters both series, correlates them in both orientations and keeps the one
/// with the higher mean correlation over its well-correlated points.
pub fn estimate_lag(
    first: &MeasurementSeries,
    second: &MeasurementSeries,
    settings: &DualBeamSettings,
) -> ProcessingResult<LagEstimate> {
    if first.len() != second.len() {
        return Err(ProcessingError::InvalidInput(format!(
            "series lengths differ: {} and {}",
            first.len(),
            second.len()
        )));
    }
    let a = first.low_pass(settings.low_pass_order);
    let b = second.low_pass(settings.low_pass_order);

    let forward = summarize(Orientation::FirstUpwind, correlate(&a, &b, settings)?, settings);
    let backward = summarize(Orientation::SecondUpwind, correlate(&b, &a, settings)?, settings);
    let chosen = match (forward, backward) {
        (Some(f), Some(b)) if b.mean_correlation > f.mean_correlation => b,
        (Some(f), _) => f,
        (None, Some(b)) => b,
        (None, None) => {
            return Err(ProcessingError::InsufficientData(
                "no window correlates above the threshold".into(),
            ))
        }
    };

    if chosen.good_points < settings.min_good_points {
        return Err(ProcessingError::InsufficientData(format!(
            "{} well-correlated points, {} required",
            chosen.good_points, settings.min_good_points
        )));
    }
    if chosen.mean_lag <= 0.0 {
        return Err(ProcessingError::InsufficientData("mean lag is zero".into()));
    }
    Ok(chosen)
}

fn summarize(
    orientation: Orientation,
    points: Vec<CorrelationPoint>,
    settings: &DualBeamSettings,
) -> Option<LagEstimate> {
    let good: Vec<&CorrelationPoint> = points
        .iter()
        .filter(|p| p.correlation > settings.correlation_threshold)
        .collect();
    let lags: Vec<f64> = good.iter().map(|p| p.lag).collect();
    let correlations: Vec<f64> = good.iter().map(|p| p.correlation).collect();
    let mean_lag = StatsHelper::mean(&lags)?;
    let mean_correlation = StatsHelper::mean(&correlations)?;
    Some(LagEstimate {
        orientation,
        mean_lag,
        lag_std: StatsHelper::std_dev(&lags),
        mean_correlation,
        good_points: good.len(),
        points,
    })
}
