// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Estimation-Control Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Time-stepped closed loop.
//!
//! Phases by step `k`:
//! - `Warmup`   k < start_control, open loop with zero control
//! - `Active`   start_control <= k <= end_control, refit and replan every
//!   `ts` steps
//! - `Hold`     end_control < k < tf, last control persists
//! - `Finalize` after the loop, one more ensemble over the whole horizon
//!
//! A solver failure ends the loop before the truth advances past the failing
//! step; the post-horizon fit and the final aggregation still run.

use crate::ensemble::{aggregate_all, aggregate_step, record_run, run_ensemble, EnsemblePlan, WriteSpan};
use crate::mpc::{MpcController, MpcSeed};
use epi_core::truth::GroundTruth;
use epi_math::nlp::NlpSolve;
use epi_ml::estimator::{EstimationRequest, Estimator};
use epi_types::cancel::CancelToken;
use epi_types::config::{ControlParams, ExperimentConfig};
use epi_types::error::EpiResult;
use epi_types::state::{SimulationState, SirState};
use ndarray::s;
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Active,
    Hold,
    Finalize,
}

/// Phase of step `k` on a horizon of `tf_int` steps.
pub fn phase_at(k: usize, control: &ControlParams, tf_int: usize) -> Phase {
    if k >= tf_int {
        Phase::Finalize
    } else if k < control.start_control {
        Phase::Warmup
    } else if k <= control.end_control {
        Phase::Active
    } else {
        Phase::Hold
    }
}

/// True when the ensemble is refit and the plan recomputed at step `k`.
pub fn is_decision_instant(k: usize, control: &ControlParams, tf_int: usize) -> bool {
    phase_at(k, control, tf_int) == Phase::Active
        && (k - control.start_control) % control.ts.max(1) == 0
}

/// Step log entry.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Open-loop history generated for steps `0..=steps`.
    WarmedUp { steps: usize },
    Step { k: usize, phase: Phase },
    Estimated {
        k: usize,
        s_mean: f64,
        i_mean: f64,
        beta_mean: f64,
    },
    /// `u` written to `u_used[k..until]`.
    ControlApplied { k: usize, u: f64, until: usize },
    SolverFailed { k: usize, message: String },
    Finalized { last_training: Option<usize> },
}

/// Everything one closed-loop experiment produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: SimulationState,
    pub events: Vec<DriverEvent>,
    /// True when a solver failure ended the loop early.
    pub aborted: bool,
    pub wall_seconds: f64,
}

impl RunReport {
    /// Steps at which the ensemble was refit inside the loop.
    pub fn estimation_instants(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Estimated { k, .. } => Some(*k),
                _ => None,
            })
            .collect()
    }

    pub fn finalize_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DriverEvent::Finalized { .. }))
            .count()
    }

    pub fn last_training(&self) -> Option<usize> {
        self.estimation_instants().last().copied()
    }
}

/// Closed-loop experiment runner.
pub struct Driver<E: Estimator, S: NlpSolve> {
    pub config: ExperimentConfig,
    pub estimator: E,
    pub controller: MpcController<S>,
    cancel: CancelToken,
}

impl<E: Estimator, S: NlpSolve> Driver<E, S> {
    pub fn new(config: ExperimentConfig, estimator: E, solver: S) -> EpiResult<Self> {
        config.validate()?;
        let controller = MpcController::new(config.control.clone(), config.epidemic.gamma, solver);
        Ok(Driver {
            config,
            estimator,
            controller,
            cancel: CancelToken::new(),
        })
    }

    /// Share a cancellation token with the estimator fits.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn plan(&self) -> EnsemblePlan {
        EnsemblePlan {
            num_runs: self.config.runs.num_runs,
            base_seed: self.config.runs.estimator_seed,
            parallel: self.config.runs.parallel,
        }
    }

    fn initial_state(&self) -> SirState {
        let p = &self.config.epidemic;
        SirState::new(p.s0, p.i0, p.r0)
    }

    /// Fit the ensemble on steps `0..=eval_step` and record each run.
    fn estimate(&self, state: &mut SimulationState, eval_step: usize, span: &WriteSpan) -> EpiResult<()> {
        let observations = state.i_observation.slice(s![..=eval_step]).to_vec();
        let controls = state.u_used.slice(s![..=eval_step]).to_vec();
        let request = EstimationRequest {
            observations: &observations,
            controls: &controls,
            initial: self.initial_state(),
            gamma: self.config.epidemic.gamma,
            tf: self.config.epidemic.tf,
            eval_step,
            seed: self.config.runs.estimator_seed,
        };
        let outputs = run_ensemble(&self.estimator, &request, &self.plan(), &self.cancel)?;
        for (run, out) in outputs.iter().enumerate() {
            record_run(&mut state.runs, run, out, span)?;
        }
        Ok(())
    }

    pub fn run(&self) -> EpiResult<RunReport> {
        let t_start = Instant::now();
        let cfg = &self.config;
        let control = &cfg.control;
        let tf_int = cfg.epidemic.tf_int();
        let n_steps = tf_int + 1;
        let mut state = SimulationState::new(tf_int, cfg.runs.num_runs);
        let mut events = Vec::new();

        let mut truth = GroundTruth::from_config(&cfg.epidemic, cfg.runs.observation_seed)?;
        let (history, observations) = truth.warmup(self.initial_state(), control.start_control);
        for (k, (x, obs)) in history.iter().zip(&observations).enumerate() {
            state.set_true_state(k, *x);
            state.i_observation[k] = *obs;
        }
        events.push(DriverEvent::WarmedUp {
            steps: control.start_control,
        });
        info!(
            steps = control.start_control,
            infected = state.i_true[control.start_control],
            "warm-up complete"
        );

        let mut last_training = None;
        let mut aborted = false;

        for k in control.start_control..tf_int {
            self.cancel.check()?;
            let phase = phase_at(k, control, tf_int);
            events.push(DriverEvent::Step { k, phase });

            if is_decision_instant(k, control, tf_int) {
                last_training = Some(k);
                let span = WriteSpan::in_loop(k, control.start_control, control.ts, cfg.runs.parameter_fill);
                self.estimate(&mut state, k, &span)?;
                aggregate_step(&mut state, k)?;

                let agg = &state.aggregate;
                let seed = MpcSeed {
                    s: agg.s.mean[k],
                    i: agg.i.mean[k],
                    beta: agg.beta.mean[k],
                };
                events.push(DriverEvent::Estimated {
                    k,
                    s_mean: seed.s,
                    i_mean: seed.i,
                    beta_mean: seed.beta,
                });
                info!(
                    step = k,
                    s_mean = seed.s,
                    i_mean = seed.i,
                    beta_mean = seed.beta,
                    beta_std = agg.beta.std[k],
                    s_true = state.s_true[k],
                    i_true = state.i_true[k],
                    "ensemble estimate"
                );

                match self.controller.plan(k, seed) {
                    Ok(decision) => {
                        let until = (k + control.ts).min(n_steps).min(control.end_control + 1);
                        state.u_used.slice_mut(s![k..until]).fill(decision.u);
                        events.push(DriverEvent::ControlApplied {
                            k,
                            u: decision.u,
                            until,
                        });
                        info!(step = k, u = decision.u, until, "control applied");
                    }
                    Err(e) if e.is_solver_failure() => {
                        error!(step = k, error = %e, "MPC optimization failed; stopping loop");
                        events.push(DriverEvent::SolverFailed {
                            k,
                            message: e.to_string(),
                        });
                        aborted = true;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let next = truth.step(state.true_state(k), state.u_used[k]);
            state.set_true_state(k + 1, next);
            state.i_observation[k + 1] = truth.observe(&next);
        }

        let span = WriteSpan::finalize(last_training, tf_int);
        self.estimate(&mut state, tf_int, &span)?;
        events.push(DriverEvent::Finalized { last_training });
        aggregate_all(&mut state);

        let wall_seconds = t_start.elapsed().as_secs_f64();
        info!(
            instants = events
                .iter()
                .filter(|e| matches!(e, DriverEvent::Estimated { .. }))
                .count(),
            aborted,
            wall_seconds,
            "closed-loop run finished"
        );

        Ok(RunReport {
            state,
            events,
            aborted,
            wall_seconds,
        })
    }
}
