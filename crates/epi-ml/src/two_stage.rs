// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Two-Stage Physics-Informed Estimator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Data regression of I and u, then a physics-informed fit of S and β.
//!
//! Stage 1 fits I to the observations and u to the applied control on the
//! data points alone. The fitted I is integrated into a recovered trajectory,
//! `R[j+1] = R[j] + (γ + u_used[j])·I[j]`, and `S = 1 - I - R`. Stage 2 trains
//! a fresh S network and β against the three ODE residuals, the S/R initial
//! conditions and the derived S and R, with the stage-1 networks frozen.

use crate::collocation::{data_points, TrainingSet};
use crate::estimator::{EstimationOutput, EstimationRequest, Estimator};
use crate::mlp::TimeMlp;
use crate::optim::Adam;
use crate::pinn::{
    boundary_terms, data_pairs, data_term, fit_deadline, ode_terms, recovered_data_term,
    run_epochs, BoundaryTerms, EpochBudget, NetEval, OutputGradients, Physics,
};
use epi_types::cancel::CancelToken;
use epi_types::config::EstimatorConfig;
use epi_types::error::EpiResult;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TwoStagePinn {
    pub config: EstimatorConfig,
}

impl TwoStagePinn {
    pub fn new(config: EstimatorConfig) -> Self {
        TwoStagePinn { config }
    }
}

/// Recovered and susceptible fractions implied by an infected trajectory
/// under the applied control.
pub fn derive_compartments(i_est: &[f64], controls: &[f64], gamma: f64, r0: f64) -> (Vec<f64>, Vec<f64>) {
    let mut r = Vec::with_capacity(i_est.len());
    if i_est.is_empty() {
        return (Vec::new(), r);
    }
    r.push(r0);
    for j in 0..i_est.len() - 1 {
        let u = controls.get(j).copied().unwrap_or(0.0);
        r.push(r[j] + (gamma + u) * i_est[j]);
    }
    let s = i_est.iter().zip(&r).map(|(i, r)| 1.0 - i - r).collect();
    (s, r)
}

fn regress_data(
    cfg: &EstimatorConfig,
    req: &EstimationRequest<'_>,
    rng: &mut StdRng,
    deadline: Option<Instant>,
    cancel: &CancelToken,
) -> EpiResult<(TimeMlp, TimeMlp, f64)> {
    let mut i_net = TimeMlp::new(cfg.hidden_layers, cfg.hidden_width, rng);
    let mut u_net = TimeMlp::new(cfg.hidden_layers, cfg.hidden_width, rng);
    let set = TrainingSet::data_only(req.eval_step, req.tf);
    let mut opt = Adam::new(cfg.learning_rate);

    let report = run_epochs(set.len(), EpochBudget::data(cfg, deadline), rng, cancel, |batch| {
        let taus: Vec<f64> = batch.iter().map(|&idx| set.taus[idx]).collect();
        let pairs = data_pairs(batch, set.n_data);
        let ti = i_net.forward(&taus);
        let tu = u_net.forward(&taus);
        let zeros = Array1::zeros(taus.len());

        let mut g_i = Array1::zeros(taus.len());
        let mut g_u = Array1::zeros(taus.len());
        let loss = data_term(&ti.value, req.observations, &pairs, &mut g_i)
            + data_term(&tu.value, req.controls, &pairs, &mut g_u);

        let mut gi = i_net.zero_gradients();
        let mut gu = u_net.zero_gradients();
        i_net.backward(&ti, &g_i, &zeros, &mut gi);
        u_net.backward(&tu, &g_u, &zeros, &mut gu);
        opt.step(
            i_net
                .params_with_grads(&gi)
                .chain(u_net.params_with_grads(&gu)),
        );
        loss
    })?;
    Ok((i_net, u_net, report.loss))
}

impl Estimator for TwoStagePinn {
    fn fit(
        &self,
        req: &EstimationRequest<'_>,
        cancel: &CancelToken,
    ) -> EpiResult<EstimationOutput> {
        req.validate()?;
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(req.seed);
        let deadline = fit_deadline(cfg, Instant::now());

        let data_start = Instant::now();
        let (i_net, u_net, data_loss) = regress_data(cfg, req, &mut rng, deadline, cancel)?;
        let data_seconds = data_start.elapsed().as_secs_f64();
        debug!(
            eval_step = req.eval_step,
            loss = data_loss,
            seconds = data_seconds,
            "data regression finished"
        );

        let grid = data_points(req.eval_step, req.tf);
        let (i_grid, _) = i_net.predict(&grid);
        let (u_grid, _) = u_net.predict(&grid);
        let i_grid = i_grid.to_vec();
        let (s_derived, r_derived) =
            derive_compartments(&i_grid, req.controls, req.gamma, req.initial.r);

        let mut s_net = TimeMlp::new(cfg.hidden_layers, cfg.hidden_width, &mut rng);
        let mut beta = cfg.beta_init;
        let set = TrainingSet::new(req.eval_step, req.tf, cfg.collocation_points, &mut rng);

        // Frozen networks evaluated once over the training set, plus tau = 0.
        let mut frozen_taus = set.taus.clone();
        frozen_taus.push(0.0);
        let (i_all, di_all) = i_net.predict(&frozen_taus);
        let (u_all, _) = u_net.predict(&frozen_taus);
        let origin = set.len();

        let mut opt = Adam::new(cfg.learning_rate);
        let ode_start = Instant::now();
        let budget = EpochBudget::physics(cfg, deadline);
        let report = run_epochs(set.len(), budget, &mut rng, cancel, |batch| {
            let mut idx: Vec<usize> = batch.to_vec();
            idx.push(origin);
            let taus: Vec<f64> = idx.iter().map(|&q| frozen_taus[q]).collect();
            let n_res = batch.len();

            let ts = s_net.forward(&taus);
            let eval = NetEval {
                s: ts.value.clone(),
                ds: ts.derivative.clone(),
                i: idx.iter().map(|&q| i_all[q]).collect(),
                di: idx.iter().map(|&q| di_all[q]).collect(),
                u: idx.iter().map(|&q| u_all[q]).collect(),
            };
            let physics = Physics {
                beta,
                gamma: req.gamma,
                tf: req.tf,
            };
            let pairs = data_pairs(batch, set.n_data);

            let mut g = OutputGradients::zeros(taus.len());
            let mut loss = ode_terms(physics, &eval, n_res, &mut g);
            loss += boundary_terms(
                &eval,
                n_res,
                req.initial.as_array(),
                BoundaryTerms {
                    s: true,
                    i: false,
                    r: true,
                },
                &mut g,
            );
            loss += data_term(&eval.s, &s_derived, &pairs, &mut g.s);
            loss += recovered_data_term(&eval, &r_derived, &pairs, &mut g);

            let mut gs = s_net.zero_gradients();
            s_net.backward(&ts, &g.s, &g.ds, &mut gs);
            opt.step(
                s_net
                    .params_with_grads(&gs)
                    .chain(std::iter::once((&mut beta, g.beta))),
            );
            beta = beta.max(0.0);
            loss
        })?;
        let ode_seconds = ode_start.elapsed().as_secs_f64();

        let (s_grid, _) = s_net.predict(&grid);
        let r: Vec<f64> = s_grid
            .iter()
            .zip(i_grid.iter())
            .map(|(s, i)| 1.0 - s - i)
            .collect();

        debug!(
            eval_step = req.eval_step,
            epochs = report.epochs,
            loss = report.loss,
            beta,
            seconds = ode_seconds,
            "two-stage fit finished"
        );

        Ok(EstimationOutput {
            s: s_grid.to_vec(),
            i: i_grid,
            r,
            u: u_grid.to_vec(),
            beta,
            loss: report.loss,
            ode_seconds,
            data_seconds: Some(data_seconds),
        })
    }

    fn has_data_stage(&self) -> bool {
        true
    }
}
