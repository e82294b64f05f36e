// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Physics-Informed Loss Terms
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Loss terms and the epoch loop shared by the joint and two-stage fits.
//!
//! On the scaled axis `tau = t / tf` with `R = 1 - S - I` the residuals are
//!
//! ```text
//! rS = S' + tf·β·I·S
//! rI = I' - tf·β·I·S + tf·(γ + u)·I
//! rR = R' - tf·(γ + u)·I
//! ```
//!
//! and every term contributes its mean squared residual to the loss.

use crate::collocation::shuffled_batches;
use epi_types::cancel::CancelToken;
use epi_types::config::EstimatorConfig;
use epi_types::error::{EpiError, EpiResult};
use ndarray::Array1;
use rand::Rng;
use std::time::{Duration, Instant};

/// Network outputs at one batch of points. Missing nets (frozen or absent)
/// are represented by precomputed values.
#[derive(Debug, Clone)]
pub struct NetEval {
    pub s: Array1<f64>,
    pub ds: Array1<f64>,
    pub i: Array1<f64>,
    pub di: Array1<f64>,
    pub u: Array1<f64>,
}

/// Loss gradients with respect to network outputs and the rate parameter.
#[derive(Debug, Clone)]
pub struct OutputGradients {
    pub s: Array1<f64>,
    pub ds: Array1<f64>,
    pub i: Array1<f64>,
    pub di: Array1<f64>,
    pub u: Array1<f64>,
    pub beta: f64,
}

impl OutputGradients {
    pub fn zeros(n: usize) -> Self {
        OutputGradients {
            s: Array1::zeros(n),
            ds: Array1::zeros(n),
            i: Array1::zeros(n),
            di: Array1::zeros(n),
            u: Array1::zeros(n),
            beta: 0.0,
        }
    }
}

/// Known coefficients of the residuals.
#[derive(Debug, Clone, Copy)]
pub struct Physics {
    pub beta: f64,
    pub gamma: f64,
    pub tf: f64,
}

/// The three residuals at one point.
pub fn sir_residuals(p: Physics, s: f64, ds: f64, i: f64, di: f64, u: f64) -> [f64; 3] {
    let infection = p.tf * p.beta * i * s;
    let removal = p.tf * (p.gamma + u) * i;
    [ds + infection, di - infection + removal, -ds - di - removal]
}

/// ODE residual terms over points `0..n`. Returns the summed per-term MSE.
pub fn ode_terms(p: Physics, eval: &NetEval, n: usize, grads: &mut OutputGradients) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let scale = 2.0 / n as f64;
    let mut loss = 0.0;
    for q in 0..n {
        let (s, i, u) = (eval.s[q], eval.i[q], eval.u[q]);
        let [rs, ri, rr] = sir_residuals(p, s, eval.ds[q], i, eval.di[q], u);
        loss += rs * rs + ri * ri + rr * rr;

        let c_inf = p.tf * p.beta;
        let c_rem = p.tf * (p.gamma + u);
        grads.ds[q] += scale * (rs - rr);
        grads.di[q] += scale * (ri - rr);
        grads.s[q] += scale * c_inf * i * (rs - ri);
        grads.i[q] += scale * (c_inf * s * (rs - ri) + c_rem * (ri - rr));
        grads.u[q] += scale * p.tf * i * (ri - rr);
        grads.beta += scale * p.tf * i * s * (rs - ri);
    }
    loss / n as f64
}

/// Which compartments the initial-condition terms pin.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryTerms {
    pub s: bool,
    pub i: bool,
    pub r: bool,
}

/// Initial-condition terms evaluated at point `at` (tau = 0).
pub fn boundary_terms(
    eval: &NetEval,
    at: usize,
    initial: [f64; 3],
    terms: BoundaryTerms,
    grads: &mut OutputGradients,
) -> f64 {
    let (s, i) = (eval.s[at], eval.i[at]);
    let mut loss = 0.0;
    if terms.s {
        let e = s - initial[0];
        loss += e * e;
        grads.s[at] += 2.0 * e;
    }
    if terms.i {
        let e = i - initial[1];
        loss += e * e;
        grads.i[at] += 2.0 * e;
    }
    if terms.r {
        let e = (1.0 - s - i) - initial[2];
        loss += e * e;
        grads.s[at] -= 2.0 * e;
        grads.i[at] -= 2.0 * e;
    }
    loss
}

/// Mean squared error of `values[q]` against `targets[j]` for each pair
/// `(q, j)`; the gradient is added to `grad[q]`.
pub fn data_term(
    values: &Array1<f64>,
    targets: &[f64],
    pairs: &[(usize, usize)],
    grad: &mut Array1<f64>,
) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let m = pairs.len() as f64;
    let mut loss = 0.0;
    for &(q, j) in pairs {
        let e = values[q] - targets[j];
        loss += e * e;
        grad[q] += 2.0 * e / m;
    }
    loss / m
}

/// Data-fit term on `R = 1 - S - I`.
pub fn recovered_data_term(
    eval: &NetEval,
    targets: &[f64],
    pairs: &[(usize, usize)],
    grads: &mut OutputGradients,
) -> f64 {
    let r = Array1::from_shape_fn(eval.s.len(), |q| 1.0 - eval.s[q] - eval.i[q]);
    let mut g_r = Array1::zeros(r.len());
    let loss = data_term(&r, targets, pairs, &mut g_r);
    grads.s -= &g_r;
    grads.i -= &g_r;
    loss
}

/// Data pairs `(batch position, data index)` for batch members that are data
/// points.
pub fn data_pairs(batch: &[usize], n_data: usize) -> Vec<(usize, usize)> {
    batch
        .iter()
        .enumerate()
        .filter(|&(_, &idx)| idx < n_data)
        .map(|(q, &idx)| (q, idx))
        .collect()
}

/// Epoch budget of one training stage.
#[derive(Debug, Clone, Copy)]
pub struct EpochBudget {
    pub epochs: usize,
    pub batch_size: usize,
    pub stop_loss: Option<f64>,
    pub deadline: Option<Instant>,
}

impl EpochBudget {
    pub fn physics(config: &EstimatorConfig, deadline: Option<Instant>) -> Self {
        EpochBudget {
            epochs: config.epochs_ode,
            batch_size: config.batch_size_ode,
            stop_loss: Some(config.stop_loss),
            deadline,
        }
    }

    pub fn data(config: &EstimatorConfig, deadline: Option<Instant>) -> Self {
        EpochBudget {
            epochs: config.epochs_data,
            batch_size: config.batch_size_data,
            stop_loss: None,
            deadline,
        }
    }
}

/// Wall-clock limit for one fit.
pub fn fit_deadline(config: &EstimatorConfig, start: Instant) -> Option<Instant> {
    config
        .max_fit_seconds
        .map(|s| start + Duration::from_secs_f64(s))
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingReport {
    /// Size-weighted mean batch loss of the last completed epoch.
    pub loss: f64,
    pub epochs: usize,
    pub stopped_early: bool,
}

/// Shuffled mini-batch epochs over `n_points`. `batch_step` performs one
/// optimiser update and returns the batch loss before it.
pub fn run_epochs<R, F>(
    n_points: usize,
    budget: EpochBudget,
    rng: &mut R,
    cancel: &CancelToken,
    mut batch_step: F,
) -> EpiResult<TrainingReport>
where
    R: Rng + ?Sized,
    F: FnMut(&[usize]) -> f64,
{
    let mut report = TrainingReport {
        loss: f64::NAN,
        epochs: 0,
        stopped_early: false,
    };
    if n_points == 0 {
        return Err(EpiError::EstimatorFailure(
            "training set is empty".to_string(),
        ));
    }

    for epoch in 0..budget.epochs {
        cancel.check()?;
        let mut weighted = 0.0;
        for batch in shuffled_batches(n_points, budget.batch_size, rng) {
            weighted += batch_step(&batch) * batch.len() as f64;
        }
        let loss = weighted / n_points as f64;
        if !loss.is_finite() {
            return Err(EpiError::EstimatorFailure(format!(
                "non-finite training loss at epoch {epoch}"
            )));
        }
        report.loss = loss;
        report.epochs = epoch + 1;

        if budget.stop_loss.is_some_and(|limit| loss < limit) {
            report.stopped_early = true;
            break;
        }
        if budget.deadline.is_some_and(|d| Instant::now() >= d) {
            report.stopped_early = true;
            break;
        }
    }
    Ok(report)
}
