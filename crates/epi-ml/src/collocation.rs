//! Training-point generation and mini-batching.

use rand::seq::SliceRandom;
use rand::Rng;

/// Residual points `exp(U(0, log1p(eval_step / tf))) - 1` on the scaled time
/// axis, denser near the origin.
pub fn log_uniform_points<R: Rng + ?Sized>(n: usize, eval_step: usize, tf: f64, rng: &mut R) -> Vec<f64> {
    let upper = (eval_step as f64 / tf).ln_1p();
    if upper <= 0.0 || !upper.is_finite() {
        return vec![0.0; n];
    }
    (0..n).map(|_| rng.gen_range(0.0..upper).exp() - 1.0).collect()
}

/// Scaled data times `j / tf` for `j = 0..=eval_step`.
pub fn data_points(eval_step: usize, tf: f64) -> Vec<f64> {
    (0..=eval_step).map(|j| j as f64 / tf).collect()
}

/// Data points followed by collocation points. Indices below `n_data` carry
/// observations.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub taus: Vec<f64>,
    pub n_data: usize,
}

impl TrainingSet {
    pub fn new<R: Rng + ?Sized>(eval_step: usize, tf: f64, n_collocation: usize, rng: &mut R) -> Self {
        let mut taus = data_points(eval_step, tf);
        let n_data = taus.len();
        taus.extend(log_uniform_points(n_collocation, eval_step, tf, rng));
        TrainingSet { taus, n_data }
    }

    /// Data points only.
    pub fn data_only(eval_step: usize, tf: f64) -> Self {
        let taus = data_points(eval_step, tf);
        let n_data = taus.len();
        TrainingSet { taus, n_data }
    }

    pub fn len(&self) -> usize {
        self.taus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taus.is_empty()
    }
}

/// Shuffled index batches covering `0..n` once.
pub fn shuffled_batches<R: Rng + ?Sized>(n: usize, batch_size: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
