use ndarray::ArrayView1;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Sample standard deviation; zero for fewer than two samples.
    pub fn std_dev(samples: &[f64]) -> f64 {
        if samples.len() < 2 {
            return 0.0;
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let sum_sq: f64 = samples.iter().map(|&v| (v - mean) * (v - mean)).sum();
        (sum_sq / (samples.len() - 1) as f64).sqrt()
    }

    /// Pearson correlation `(nΣxy − ΣxΣy) / sqrt((nΣx²−(Σx)²)(nΣy²−(Σy)²))`.
    ///
    /// A flat vector makes numerator and denominator vanish together; that case
    /// counts as perfect correlation. Slices of unequal length return `None`.
    pub fn correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
        if x.len() != y.len() || x.is_empty() {
            return None;
        }
        let n = x.len() as f64;
        let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&a, &b) in x.iter().zip(y.iter()) {
            sx += a;
            sy += b;
            sxx += a * a;
            syy += b * b;
            sxy += a * b;
        }
        let var_x = n * sxx - sx * sx;
        let var_y = n * syy - sy * sy;
        let flat_x = var_x <= FLAT_TOLERANCE * n * sxx;
        let flat_y = var_y <= FLAT_TOLERANCE * n * syy;
        if flat_x || flat_y {
            return Some(1.0);
        }
        Some((n * sxy - sx * sy) / (var_x * var_y).sqrt())
    }

    /// Binomial coefficient C(n, k) as a float.
    pub fn binomial(n: usize, k: usize) -> f64 {
        if k > n {
            return 0.0;
        }
        let k = k.min(n - k);
        (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
    }
}

const FLAT_TOLERANCE: f64 = 1e-12;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn mean_of_empty_slice_is_none() {
        assert_eq!(StatsHelper::mean(&[]), None);
        assert_eq!(StatsHelper::mean(&[2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn std_dev_handles_single_value() {
        assert_eq!(StatsHelper::std_dev(&[4.0]), 0.0);
        assert_relative_eq!(StatsHelper::std_dev(&[1.0, 2.0, 3.0]), 1.0);
    }

    #[test]
    fn correlation_is_symmetric() {
        let x = array![1.0, 3.0, 2.0, 5.0, 4.0];
        let y = array![2.0, 2.5, 2.0, 6.0, 3.0];
        let xy = StatsHelper::correlation(x.view(), y.view()).unwrap();
        let yx = StatsHelper::correlation(y.view(), x.view()).unwrap();
        assert_eq!(xy, yx);
        assert!(xy > 0.0 && xy < 1.0);
    }

    #[test]
    fn correlation_of_constant_equal_vectors_is_one() {
        let x = array![7.0e17, 7.0e17, 7.0e17];
        assert_eq!(StatsHelper::correlation(x.view(), x.view()), Some(1.0));
    }

    #[test]
    fn one_flat_vector_counts_as_perfect_correlation() {
        let flat = array![5.0, 5.0, 5.0];
        let rising = array![1.0, 2.0, 3.0];
        assert_eq!(StatsHelper::correlation(flat.view(), rising.view()), Some(1.0));
        assert_eq!(StatsHelper::correlation(rising.view(), flat.view()), Some(1.0));
    }

    #[test]
    fn correlation_of_scaled_copy_is_one() {
        let x = array![1.0e17, 3.0e17, 2.0e17, 4.0e17];
        let y = x.mapv(|v| 2.0 * v + 5.0e16);
        assert_relative_eq!(
            StatsHelper::correlation(x.view(), y.view()).unwrap(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn correlation_rejects_unequal_lengths() {
        let x = array![1.0, 2.0];
        let y = array![1.0, 2.0, 3.0];
        assert!(StatsHelper::correlation(x.view(), y.view()).is_none());
    }

    #[test]
    fn binomial_matches_pascal_triangle() {
        assert_eq!(StatsHelper::binomial(4, 0), 1.0);
        assert_eq!(StatsHelper::binomial(4, 2), 6.0);
        assert_eq!(StatsHelper::binomial(4, 4), 1.0);
        assert_eq!(StatsHelper::binomial(2, 3), 0.0);
    }
}
