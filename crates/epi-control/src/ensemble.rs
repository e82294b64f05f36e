// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Estimator Ensemble
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Independent estimator runs, freshness-window bookkeeping, and robust
//! aggregation of the run tables.
//!
//! A fit at step `k` only overwrites the newest rows of its run column:
//! states in `[max(0, k-ts+1), k]` and controls one step earlier. Rows
//! written by an earlier decision instant stay as they were.

use epi_math::stats::{aggregate, trimmed_mean_std, trimmed_mean_std_rows, Aggregate};
use epi_ml::estimator::{derive_seed, EstimationOutput, EstimationRequest, Estimator};
use epi_types::cancel::CancelToken;
use epi_types::config::ParameterFill;
use epi_types::error::{EpiError, EpiResult};
use epi_types::state::{EnsembleTables, MeanStd, SimulationState};
use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use std::ops::Range;
use tracing::info;

/// Rows of one run column that a fit overwrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSpan {
    pub state: Range<usize>,
    pub control: Range<usize>,
    pub beta: Range<usize>,
    /// Row receiving wall time and loss.
    pub stamp: usize,
}

impl WriteSpan {
    /// Span of an in-loop fit at step `k`.
    pub fn in_loop(k: usize, start_control: usize, ts: usize, fill: ParameterFill) -> Self {
        let (state, control) = if k == start_control {
            (0..k + 1, 0..k)
        } else {
            ((k + 1).saturating_sub(ts)..k + 1, k.saturating_sub(ts)..k)
        };
        let beta = match fill {
            ParameterFill::AtEstimate => k..k + 1,
            ParameterFill::Window => state.clone(),
        };
        WriteSpan {
            state,
            control,
            beta,
            stamp: k,
        }
    }

    /// Span of the post-horizon fit: everything after the last in-loop fit.
    pub fn finalize(last_training: Option<usize>, tf_int: usize) -> Self {
        let n = tf_int + 1;
        let (state, control) = match last_training {
            Some(last) => ((last + 1).min(n)..n, last.min(n)..n),
            None => (0..n, 0..n),
        };
        WriteSpan {
            beta: state.clone(),
            state,
            control,
            stamp: tf_int,
        }
    }
}

/// How one ensemble is executed.
#[derive(Debug, Clone)]
pub struct EnsemblePlan {
    pub num_runs: usize,
    pub base_seed: u64,
    pub parallel: bool,
}

/// Fit every run on the same data; results come back in run order.
pub fn run_ensemble<E: Estimator + ?Sized>(
    estimator: &E,
    template: &EstimationRequest<'_>,
    plan: &EnsemblePlan,
    cancel: &CancelToken,
) -> EpiResult<Vec<EstimationOutput>> {
    let k = template.eval_step;
    let fit_one = |run: usize| -> EpiResult<EstimationOutput> {
        let request = EstimationRequest {
            seed: derive_seed(plan.base_seed, k, run),
            ..template.clone()
        };
        let out = estimator.fit(&request, cancel)?;
        info!(
            step = k,
            run = run + 1,
            beta = out.beta,
            loss = out.loss,
            seconds = out.ode_seconds,
            "estimator run finished"
        );
        Ok(out)
    };

    if plan.parallel {
        (0..plan.num_runs).into_par_iter().map(fit_one).collect()
    } else {
        (0..plan.num_runs).map(fit_one).collect()
    }
}

fn check_lengths(out: &EstimationOutput, span: &WriteSpan) -> EpiResult<()> {
    let need_state = span.state.end.max(span.beta.end);
    let short = out.s.len() < need_state
        || out.i.len() < need_state
        || out.r.len() < need_state
        || out.u.len() < span.control.end;
    if short {
        return Err(EpiError::EstimatorFailure(format!(
            "estimator returned {} steps, span needs {}",
            out.s.len(),
            need_state.max(span.control.end)
        )));
    }
    Ok(())
}

/// Copy one run's estimates into its column of the run tables.
pub fn record_run(
    tables: &mut EnsembleTables,
    run: usize,
    out: &EstimationOutput,
    span: &WriteSpan,
) -> EpiResult<()> {
    check_lengths(out, span)?;
    for t in span.state.clone() {
        tables.s[[t, run]] = out.s[t];
        tables.i[[t, run]] = out.i[t];
        tables.r[[t, run]] = out.r[t];
    }
    for t in span.control.clone() {
        tables.u[[t, run]] = out.u[t];
    }
    for t in span.beta.clone() {
        tables.beta[[t, run]] = out.beta;
    }
    tables.time_ode[[span.stamp, run]] = out.ode_seconds;
    tables.time_data[[span.stamp, run]] = out.data_seconds.unwrap_or(0.0);
    tables.loss[[span.stamp, run]] = out.loss;
    Ok(())
}

fn assign_rows(target: &mut MeanStd, table: ArrayView2<'_, f64>) {
    let (mean, std) = trimmed_mean_std_rows(table);
    let rows = mean.len();
    target.mean.slice_mut(s![..rows]).assign(&mean);
    target.std.slice_mut(s![..rows]).assign(&std);
}

fn row_mean(table: &Array2<f64>, k: usize) -> f64 {
    trimmed_mean_std(table.row(k)).0
}

/// Aggregation after a fit at step `k`: trajectories over rows `0..=k`, the
/// rate parameter and timings from row `k` alone.
pub fn aggregate_step(state: &mut SimulationState, k: usize) -> EpiResult<()> {
    let runs = &state.runs;
    let agg = &mut state.aggregate;
    assign_rows(&mut agg.s, runs.s.slice(s![..=k, ..]));
    assign_rows(&mut agg.i, runs.i.slice(s![..=k, ..]));
    assign_rows(&mut agg.r, runs.r.slice(s![..=k, ..]));
    assign_rows(&mut agg.u, runs.u.slice(s![..=k, ..]));

    match aggregate(runs.beta.row(k).into_dyn())? {
        Aggregate::Scalar { mean, std } => {
            agg.beta.mean[k] = mean;
            agg.beta.std[k] = std;
        }
        Aggregate::Series { .. } => return Err(EpiError::DimensionError { ndim: 2 }),
    }

    agg.time_ode[k] = row_mean(&runs.time_ode, k);
    agg.time_data[k] = row_mean(&runs.time_data, k);
    agg.loss[k] = row_mean(&runs.loss, k);
    Ok(())
}

/// Recompute every aggregate series from the complete run tables.
pub fn aggregate_all(state: &mut SimulationState) {
    let runs = &state.runs;
    let agg = &mut state.aggregate;
    assign_rows(&mut agg.s, runs.s.view());
    assign_rows(&mut agg.i, runs.i.view());
    assign_rows(&mut agg.r, runs.r.view());
    assign_rows(&mut agg.u, runs.u.view());
    assign_rows(&mut agg.beta, runs.beta.view());
    agg.time_ode = trimmed_mean_std_rows(runs.time_ode.view()).0;
    agg.time_data = trimmed_mean_std_rows(runs.time_data.view()).0;
    agg.loss = trimmed_mean_std_rows(runs.loss.view()).0;
}
