// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Joint Physics-Informed Estimator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One constrained fit of S, I, u and β.
//!
//! Loss terms: three ODE residuals, S/I/R initial conditions, data fit of I
//! to the observations and of u to the applied control.

use crate::collocation::{data_points, TrainingSet};
use crate::estimator::{EstimationOutput, EstimationRequest, Estimator};
use crate::mlp::TimeMlp;
use crate::optim::Adam;
use crate::pinn::{
    boundary_terms, data_pairs, data_term, fit_deadline, ode_terms, run_epochs, BoundaryTerms,
    EpochBudget, NetEval, OutputGradients, Physics,
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
pub struct JointPinn {
    pub config: EstimatorConfig,
}

impl JointPinn {
    pub fn new(config: EstimatorConfig) -> Self {
        JointPinn { config }
    }
}

/// Networks and the rate parameter of one joint fit.
struct JointModel {
    s: TimeMlp,
    i: TimeMlp,
    u: TimeMlp,
    beta: f64,
}

impl JointModel {
    /// Loss and one Adam update on the points `taus` (the last entry is
    /// tau = 0 for the boundary terms).
    fn train_batch(
        &mut self,
        taus: &[f64],
        pairs: &[(usize, usize)],
        req: &EstimationRequest<'_>,
        opt: &mut Adam,
    ) -> f64 {
        let n_res = taus.len() - 1;
        let ts = self.s.forward(taus);
        let ti = self.i.forward(taus);
        let tu = self.u.forward(taus);
        let eval = NetEval {
            s: ts.value.clone(),
            ds: ts.derivative.clone(),
            i: ti.value.clone(),
            di: ti.derivative.clone(),
            u: tu.value.clone(),
        };
        let physics = Physics {
            beta: self.beta,
            gamma: req.gamma,
            tf: req.tf,
        };

        let mut g = OutputGradients::zeros(taus.len());
        let mut loss = ode_terms(physics, &eval, n_res, &mut g);
        loss += boundary_terms(
            &eval,
            n_res,
            req.initial.as_array(),
            BoundaryTerms {
                s: true,
                i: true,
                r: true,
            },
            &mut g,
        );
        loss += data_term(&eval.i, req.observations, pairs, &mut g.i);
        loss += data_term(&eval.u, req.controls, pairs, &mut g.u);

        let mut gs = self.s.zero_gradients();
        let mut gi = self.i.zero_gradients();
        let mut gu = self.u.zero_gradients();
        self.s.backward(&ts, &g.s, &g.ds, &mut gs);
        self.i.backward(&ti, &g.i, &g.di, &mut gi);
        self.u.backward(&tu, &g.u, &Array1::zeros(taus.len()), &mut gu);

        opt.step(
            self.s
                .params_with_grads(&gs)
                .chain(self.i.params_with_grads(&gi))
                .chain(self.u.params_with_grads(&gu))
                .chain(std::iter::once((&mut self.beta, g.beta))),
        );
        self.beta = self.beta.max(0.0);
        loss
    }
}

impl Estimator for JointPinn {
    fn fit(
        &self,
        req: &EstimationRequest<'_>,
        cancel: &CancelToken,
    ) -> EpiResult<EstimationOutput> {
        req.validate()?;
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(req.seed);
        let mut model = JointModel {
            s: TimeMlp::new(cfg.hidden_layers, cfg.hidden_width, &mut rng),
            i: TimeMlp::new(cfg.hidden_layers, cfg.hidden_width, &mut rng),
            u: TimeMlp::new(cfg.hidden_layers, cfg.hidden_width, &mut rng),
            beta: cfg.beta_init,
        };
        let set = TrainingSet::new(req.eval_step, req.tf, cfg.collocation_points, &mut rng);
        let mut opt = Adam::new(cfg.learning_rate);

        let start = Instant::now();
        let budget = EpochBudget::physics(cfg, fit_deadline(cfg, start));
        let report = run_epochs(set.len(), budget, &mut rng, cancel, |batch| {
            let mut taus: Vec<f64> = batch.iter().map(|&idx| set.taus[idx]).collect();
            taus.push(0.0);
            let pairs = data_pairs(batch, set.n_data);
            model.train_batch(&taus, &pairs, req, &mut opt)
        })?;
        let ode_seconds = start.elapsed().as_secs_f64();

        let grid = data_points(req.eval_step, req.tf);
        let (s, _) = model.s.predict(&grid);
        let (i, _) = model.i.predict(&grid);
        let (u, _) = model.u.predict(&grid);
        let r: Vec<f64> = s.iter().zip(i.iter()).map(|(s, i)| 1.0 - s - i).collect();

        debug!(
            eval_step = req.eval_step,
            epochs = report.epochs,
            loss = report.loss,
            beta = model.beta,
            seconds = ode_seconds,
            "joint fit finished"
        );

        Ok(EstimationOutput {
            s: s.to_vec(),
            i: i.to_vec(),
            r,
            u: u.to_vec(),
            beta: model.beta,
            loss: report.loss,
            ode_seconds,
            data_seconds: None,
        })
    }
}
