//! Robust ensemble statistics.
//!
//! Mean and population standard deviation after discarding the single largest
//! and single smallest sample whenever at least three samples are present.
//! When one index is both the maximum and the minimum (all samples equal) only
//! that one sample is dropped.

use epi_types::error::{EpiError, EpiResult};
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewD, Ix1, Ix2};

/// Minimum sample count for extreme trimming.
pub const MIN_TRIM_SAMPLES: usize = 3;

/// Result of the rank-generic entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Scalar { mean: f64, std: f64 },
    Series { mean: Array1<f64>, std: Array1<f64> },
}

fn first_extreme_indices(samples: ArrayView1<'_, f64>) -> (usize, usize) {
    let mut max_idx = 0usize;
    let mut min_idx = 0usize;
    for (idx, &v) in samples.iter().enumerate() {
        if v > samples[max_idx] {
            max_idx = idx;
        }
        if v < samples[min_idx] {
            min_idx = idx;
        }
    }
    (max_idx, min_idx)
}

fn mean_std_iter<I: Iterator<Item = f64> + Clone>(values: I) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}

/// Trimmed mean and population std of one sample set.
pub fn trimmed_mean_std(samples: ArrayView1<'_, f64>) -> (f64, f64) {
    if samples.len() < MIN_TRIM_SAMPLES {
        return mean_std_iter(samples.iter().copied());
    }
    let (max_idx, min_idx) = first_extreme_indices(samples);
    mean_std_iter(
        samples
            .iter()
            .enumerate()
            .filter(move |&(idx, _)| idx != max_idx && idx != min_idx)
            .map(|(_, &v)| v),
    )
}

/// Convenience wrapper over a slice.
pub fn trimmed_mean_std_slice(samples: &[f64]) -> (f64, f64) {
    trimmed_mean_std(ArrayView1::from(samples))
}

/// Row-wise trimmed statistics of a `[time step, run]` table.
pub fn trimmed_mean_std_rows(table: ArrayView2<'_, f64>) -> (Array1<f64>, Array1<f64>) {
    let mut mean = Array1::zeros(table.nrows());
    let mut std = Array1::zeros(table.nrows());
    for (t, row) in table.outer_iter().enumerate() {
        let (m, s) = trimmed_mean_std(row);
        mean[t] = m;
        std[t] = s;
    }
    (mean, std)
}

/// Rank-generic entry point: 1-D input yields a scalar pair, 2-D input one
/// pair per row. Any other rank is a caller bug.
pub fn aggregate(values: ArrayViewD<'_, f64>) -> EpiResult<Aggregate> {
    match values.ndim() {
        1 => {
            let view = values
                .into_dimensionality::<Ix1>()
                .map_err(|_| EpiError::DimensionError { ndim: 1 })?;
            let (mean, std) = trimmed_mean_std(view);
            Ok(Aggregate::Scalar { mean, std })
        }
        2 => {
            let view = values
                .into_dimensionality::<Ix2>()
                .map_err(|_| EpiError::DimensionError { ndim: 2 })?;
            let (mean, std) = trimmed_mean_std_rows(view);
            Ok(Aggregate::Series { mean, std })
        }
        ndim => Err(EpiError::DimensionError { ndim }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3, IxDyn};

    #[test]
    fn test_fewer_than_three_uses_all() {
        let (m, s) = trimmed_mean_std_slice(&[1.0, 3.0]);
        assert!((m - 2.0).abs() < 1e-15);
        assert!((s - 1.0).abs() < 1e-15);

        let (m, s) = trimmed_mean_std_slice(&[4.0]);
        assert_eq!(m, 4.0);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_outliers_removed() {
        let (m, s) = trimmed_mean_std_slice(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert!((m - 3.0).abs() < 1e-12);
        assert!((s - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_all_equal_drops_one() {
        // max and min share index 0, so two of three samples remain.
        let (m, s) = trimmed_mean_std_slice(&[5.0, 5.0, 5.0]);
        assert_eq!(m, 5.0);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_duplicate_extremes_drop_first_only() {
        // First max is index 1, first min is index 0: remaining [9, 1, 5].
        let (m, _) = trimmed_mean_std_slice(&[1.0, 9.0, 9.0, 1.0, 5.0]);
        assert!((m - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_nan() {
        let (m, s) = trimmed_mean_std_slice(&[]);
        assert!(m.is_nan() && s.is_nan());
    }

    #[test]
    fn test_rows_independent() {
        let table = array![[1.0, 2.0, 3.0, 4.0, 100.0], [0.0, 0.0, 0.0, 0.0, 0.0]];
        let (mean, std) = trimmed_mean_std_rows(table.view());
        assert!((mean[0] - 3.0).abs() < 1e-12);
        assert_eq!(mean[1], 0.0);
        assert_eq!(std[1], 0.0);
    }

    #[test]
    fn test_dynamic_rank() {
        let one = array![1.0, 2.0, 3.0].into_dyn();
        match aggregate(one.view()).unwrap() {
            Aggregate::Scalar { mean, .. } => assert!((mean - 2.0).abs() < 1e-15),
            other => panic!("expected scalar, got {other:?}"),
        }

        let two = array![[1.0, 2.0], [3.0, 5.0]].into_dyn();
        match aggregate(two.view()).unwrap() {
            Aggregate::Series { mean, .. } => {
                assert!((mean[0] - 1.5).abs() < 1e-15);
                assert!((mean[1] - 4.0).abs() < 1e-15);
            }
            other => panic!("expected series, got {other:?}"),
        }

        let three = Array3::<f64>::zeros((2, 2, 2)).into_dyn();
        assert!(matches!(
            aggregate(three.view()),
            Err(EpiError::DimensionError { ndim: 3 })
        ));

        let zero = ndarray::ArrayD::<f64>::zeros(IxDyn(&[]));
        assert!(matches!(
            aggregate(zero.view()),
            Err(EpiError::DimensionError { ndim: 0 })
        ));
    }
}
