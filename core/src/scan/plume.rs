use serde::{Deserialize, Serialize};

/// Minimum width, in good spectra, of the region taken as the plume.
const MIN_REGION_WIDTH: usize = 5;
/// Number of spectra at each end of a scan averaged for the completeness estimate.
const EDGE_POINTS: usize = 5;

/// Where, and how completely, a scan sees the plume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlumeInScanProperty {
    pub offset: f64,
    pub completeness: f64,
    pub centre: f64,
    pub centre_error: f64,
    /// Centre in the second (azimuth) angle; zero for single-axis scanners.
    #[serde(default)]
    pub centre2: f64,
    #[serde(default)]
    pub centre2_error: f64,
    pub edge_low: f64,
    pub edge_high: f64,
    pub visible: bool,
}

impl PlumeInScanProperty {
    /// Property of a scan in which no plume could be found.
    pub fn not_visible(offset: f64) -> Self {
        Self {
            offset,
            completeness: 0.0,
            centre: f64::NAN,
            centre_error: f64::NAN,
            centre2: f64::NAN,
            centre2_error: f64::NAN,
            edge_low: f64::NAN,
            edge_high: f64::NAN,
            visible: false,
        }
    }
}

/// One good spectrum as seen by the plume search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlumePoint {
    pub angle: f64,
    pub angle2: f64,
    pub column: f64,
    pub column_error: f64,
}

/// Mean of the lowest `max(3, n/5)` columns.
pub fn calculate_offset(columns: &[f64]) -> Option<f64> {
    if columns.is_empty() {
        return None;
    }
    let mut sorted = columns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let count = (sorted.len() / 5).max(3).min(sorted.len());
    Some(sorted[..count].iter().sum::<f64>() / count as f64)
}

/// Searches `points` (in scan order) for a plume.
///
/// Returns `None` when there are too few points or no region stands out
/// above the rest of the scan.
pub fn find_plume(points: &[PlumePoint]) -> Option<PlumeInScanProperty> {
    let n = points.len();
    if n < MIN_REGION_WIDTH {
        return None;
    }
    let columns: Vec<f64> = points.iter().map(|p| p.column).collect();
    let offset = calculate_offset(&columns)?;

    let mut prefix = vec![0.0; n + 1];
    for (i, c) in columns.iter().enumerate() {
        prefix[i + 1] = prefix[i] + c;
    }
    let mean_of = |lo: usize, hi: usize| (prefix[hi] - prefix[lo]) / (hi - lo) as f64;

    let mut best = (f64::NEG_INFINITY, 0, n);
    for low in 0..n {
        for high in (low + MIN_REGION_WIDTH)..=n {
            let mean = mean_of(low, high);
            if mean > best.0 {
                best = (mean, low, high);
            }
        }
    }
    let (mean_inside, low, high) = best;
    let outside = low + (n - high);
    let mean_outside = if outside > 0 {
        (prefix[low] + prefix[n] - prefix[high]) / outside as f64
    } else {
        offset
    };
    let mean_error = points.iter().map(|p| p.column_error.abs()).sum::<f64>() / n as f64;
    if mean_inside - mean_outside <= 3.0 * mean_error || mean_inside <= offset {
        return None;
    }

    let region = &points[low..high];
    let weights: Vec<f64> = region.iter().map(|p| (p.column - offset).max(0.0)).collect();
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return None;
    }
    let (centre, centre_error) = weighted_centre(region.iter().map(|p| p.angle), &weights, weight_sum);
    let (centre2, centre2_error) =
        weighted_centre(region.iter().map(|p| p.angle2), &weights, weight_sum);

    let (peak_index, peak) = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c - offset))
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    let half_peak = 0.5 * peak;
    let edge_low = (0..=peak_index)
        .rev()
        .find(|&i| columns[i] - offset < half_peak)
        .map_or(points[0].angle, |i| points[i].angle);
    let edge_high = (peak_index..n)
        .find(|&i| columns[i] - offset < half_peak)
        .map_or(points[n - 1].angle, |i| points[i].angle);

    Some(PlumeInScanProperty {
        offset,
        completeness: completeness(&columns, offset, peak),
        centre,
        centre_error,
        centre2,
        centre2_error,
        edge_low,
        edge_high,
        visible: true,
    })
}

fn weighted_centre(
    angles: impl Iterator<Item = f64> + Clone,
    weights: &[f64],
    weight_sum: f64,
) -> (f64, f64) {
    let centre = angles
        .clone()
        .zip(weights)
        .map(|(a, w)| a * w)
        .sum::<f64>()
        / weight_sum;
    let variance = angles
        .zip(weights)
        .map(|(a, w)| w * (a - centre).powi(2))
        .sum::<f64>()
        / weight_sum;
    let effective = weights.iter().filter(|&&w| w > 0.0).count().max(1) as f64;
    (centre, variance.sqrt() / effective.sqrt())
}

/// `1 - 0.5 * (left + right) / peak`, clamped to [0, 1].
fn completeness(columns: &[f64], offset: f64, peak: f64) -> f64 {
    if peak <= 0.0 {
        return 0.0;
    }
    let edge = EDGE_POINTS.min(columns.len());
    let left = columns[..edge].iter().map(|c| c - offset).sum::<f64>() / edge as f64;
    let right = columns[columns.len() - edge..]
        .iter()
        .map(|c| c - offset)
        .sum::<f64>()
        / edge as f64;
    (1.0 - 0.5 * (left.max(0.0) + right.max(0.0)) / peak).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gaussian_scan(centre: f64, width: f64, first: f64, last: f64, step: f64) -> Vec<PlumePoint> {
        let mut points = Vec::new();
        let mut angle = first;
        while angle <= last + 1e-9 {
            let column = 1.0e16 + 5.0e17 * (-(angle - centre).powi(2) / (2.0 * width * width)).exp();
            points.push(PlumePoint {
                angle,
                angle2: 0.0,
                column,
                column_error: 1.0e16,
            });
            angle += step;
        }
        points
    }

    #[test]
    fn offset_averages_lowest_fifth() {
        let columns: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_relative_eq!(calculate_offset(&columns).unwrap(), 2.5);
        assert_relative_eq!(calculate_offset(&[4.0, 1.0]).unwrap(), 2.5);
        assert!(calculate_offset(&[]).is_none());
    }

    #[test]
    fn centred_plume_is_complete() {
        let points = gaussian_scan(0.0, 10.0, -80.0, 80.0, 3.2);
        let plume = find_plume(&points).unwrap();
        assert!(plume.visible);
        assert!(plume.centre.abs() < 1.0);
        assert!(plume.completeness > 0.95);
        assert!(plume.edge_low < 0.0 && plume.edge_high > 0.0);
    }

    #[test]
    fn plume_at_scan_edge_is_incomplete() {
        let points = gaussian_scan(70.0, 15.0, -80.0, 80.0, 3.2);
        let plume = find_plume(&points).unwrap();
        assert!(plume.centre > 50.0);
        assert!(plume.completeness < 0.9);
    }

    #[test]
    fn flat_scan_has_no_plume() {
        let points: Vec<PlumePoint> = (0..30)
            .map(|i| PlumePoint {
                angle: -80.0 + 5.0 * f64::from(i),
                angle2: 0.0,
                column: 1.0e16 + if i % 2 == 0 { 1.0e15 } else { 0.0 },
                column_error: 1.0e16,
            })
            .collect();
        assert!(find_plume(&points).is_none());
    }

    #[test]
    fn too_few_points_have_no_plume() {
        let points = gaussian_scan(0.0, 10.0, -10.0, 10.0, 10.0);
        assert!(find_plume(&points).is_none());
    }
}
