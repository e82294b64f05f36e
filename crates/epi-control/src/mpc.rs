// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — MPC
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Receding-horizon controller for the SIR outbreak.
//!
//! Prediction model: forward Euler with unit step on (S, I) over `n_pri`
//! steps, seeded from the aggregated estimate. Decision: `ceil(n_pri / ts)`
//! piecewise-constant control blocks in `[0, u_max]`; step `i` uses block
//! `i / ts`.
//!
//! ```text
//! min  Σ_i α1·(S_{i+1} - S_target)² + α2·u_{b(i)}²
//! s.t. I_{i+1} - I_max <= 0
//! ```

use epi_core::sir::SirParams;
use epi_math::nlp::{NlpProblem, NlpSolution, NlpSolve};
use epi_types::config::ControlParams;
use epi_types::error::{EpiError, EpiResult};
use tracing::{debug, warn};

/// Aggregated estimate the plan starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MpcSeed {
    pub s: f64,
    pub i: f64,
    pub beta: f64,
}

/// Optimal-control problem over one prediction horizon.
#[derive(Debug, Clone)]
pub struct SirMpcProblem {
    pub seed: MpcSeed,
    pub gamma: f64,
    pub horizon: usize,
    pub ts: usize,
    pub blocks: usize,
    pub alpha1: f64,
    pub alpha2: f64,
    pub i_max: f64,
    pub u_max: f64,
    pub s_target: f64,
}

/// Predicted states `1..=horizon` with their block sensitivities.
struct Rollout {
    s: Vec<f64>,
    i: Vec<f64>,
    ds: Vec<Vec<f64>>,
    di: Vec<Vec<f64>>,
}

impl SirMpcProblem {
    pub fn new(control: &ControlParams, gamma: f64, seed: MpcSeed) -> Self {
        let ts = control.ts.max(1);
        SirMpcProblem {
            seed,
            gamma,
            horizon: control.n_pri,
            ts,
            blocks: control.control_blocks(),
            alpha1: control.alpha1,
            alpha2: control.alpha2,
            i_max: control.i_max,
            u_max: control.u_max,
            s_target: control.s_target,
        }
    }

    fn block(&self, step: usize) -> usize {
        (step / self.ts).min(self.blocks.saturating_sub(1))
    }

    fn rollout(&self, x: &[f64], sensitivities: bool) -> Rollout {
        let model = SirParams::new(self.seed.beta, self.gamma);
        let n = self.blocks;
        let mut out = Rollout {
            s: Vec::with_capacity(self.horizon),
            i: Vec::with_capacity(self.horizon),
            ds: Vec::new(),
            di: Vec::new(),
        };
        let (mut s, mut i) = (self.seed.s, self.seed.i);
        let mut ds = vec![0.0; n];
        let mut di = vec![0.0; n];

        for step in 0..self.horizon {
            let b = self.block(step);
            let u = x[b];
            if sensitivities {
                let beta = model.beta;
                let mut next_ds = vec![0.0; n];
                let mut next_di = vec![0.0; n];
                for j in 0..n {
                    let d_inf = beta * (ds[j] * i + s * di[j]);
                    next_ds[j] = ds[j] - d_inf;
                    next_di[j] = di[j] + d_inf - (model.gamma + u) * di[j];
                }
                next_di[b] -= i;
                ds = next_ds;
                di = next_di;
                out.ds.push(ds.clone());
                out.di.push(di.clone());
            }
            (s, i) = model.euler_step(s, i, u);
            out.s.push(s);
            out.i.push(i);
        }
        out
    }
}

impl NlpProblem for SirMpcProblem {
    fn dim(&self) -> usize {
        self.blocks
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; self.blocks], vec![self.u_max; self.blocks])
    }

    fn objective(&self, x: &[f64]) -> f64 {
        let roll = self.rollout(x, false);
        (0..self.horizon)
            .map(|step| {
                let e = roll.s[step] - self.s_target;
                let u = x[self.block(step)];
                self.alpha1 * e * e + self.alpha2 * u * u
            })
            .sum()
    }

    fn constraints(&self, x: &[f64]) -> Vec<f64> {
        self.rollout(x, false)
            .i
            .into_iter()
            .map(|i| i - self.i_max)
            .collect()
    }

    fn gradient(&self, x: &[f64], _fd_step: f64) -> Vec<f64> {
        let roll = self.rollout(x, true);
        let mut grad = vec![0.0; self.blocks];
        for step in 0..self.horizon {
            let e = roll.s[step] - self.s_target;
            for (g, d) in grad.iter_mut().zip(&roll.ds[step]) {
                *g += 2.0 * self.alpha1 * e * d;
            }
            let b = self.block(step);
            grad[b] += 2.0 * self.alpha2 * x[b];
        }
        grad
    }

    fn constraint_jacobian(&self, x: &[f64], _fd_step: f64) -> Vec<Vec<f64>> {
        self.rollout(x, true).di
    }
}

/// Outcome of one planning call.
#[derive(Debug, Clone)]
pub struct MpcDecision {
    /// Value of the first control block, clamped to `[0, u_max]`.
    pub u: f64,
    pub solution: NlpSolution,
}

/// Receding-horizon controller around an NLP solver.
#[derive(Debug, Clone)]
pub struct MpcController<S: NlpSolve> {
    pub params: ControlParams,
    pub gamma: f64,
    pub solver: S,
}

impl<S: NlpSolve> MpcController<S> {
    pub fn new(params: ControlParams, gamma: f64, solver: S) -> Self {
        MpcController {
            params,
            gamma,
            solver,
        }
    }

    /// Solve the horizon problem from `seed` at step `k`.
    pub fn plan(&self, k: usize, seed: MpcSeed) -> EpiResult<MpcDecision> {
        for (name, v) in [("S", seed.s), ("I", seed.i), ("beta", seed.beta)] {
            if !v.is_finite() {
                return Err(EpiError::SolverFailure {
                    step: k,
                    message: format!("non-finite {name} estimate {v}"),
                });
            }
        }
        let problem = SirMpcProblem::new(&self.params, self.gamma, seed);
        let solution = self
            .solver
            .solve(&problem)
            .map_err(|e| EpiError::SolverFailure {
                step: k,
                message: e.to_string(),
            })?;
        let first = solution.x.first().copied().ok_or_else(|| EpiError::SolverFailure {
            step: k,
            message: "empty decision vector".to_string(),
        })?;
        if !solution.converged {
            warn!(
                step = k,
                violation = solution.max_violation,
                "MPC solve did not converge; applying best iterate"
            );
        }
        let u = first.clamp(0.0, self.params.u_max);
        debug!(step = k, u, objective = solution.objective, "MPC plan");
        Ok(MpcDecision { u, solution })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epi_math::nlp::{AugmentedLagrangian, NlpFailure};
    use epi_types::config::SolverConfig;

    fn problem(seed: MpcSeed) -> SirMpcProblem {
        SirMpcProblem::new(&ControlParams::default(), 0.2, seed)
    }

    fn fd_gradient(p: &SirMpcProblem, x: &[f64]) -> Vec<f64> {
        let h = 1e-6;
        (0..x.len())
            .map(|j| {
                let mut a = x.to_vec();
                let mut b = x.to_vec();
                a[j] += h;
                b[j] -= h;
                (p.objective(&a) - p.objective(&b)) / (2.0 * h)
            })
            .collect()
    }

    #[test]
    fn test_block_layout() {
        let p = problem(MpcSeed {
            s: 0.9,
            i: 0.05,
            beta: 0.6,
        });
        assert_eq!(p.dim(), 3);
        assert_eq!(p.block(0), 0);
        assert_eq!(p.block(4), 0);
        assert_eq!(p.block(5), 1);
        assert_eq!(p.block(13), 2);
        assert_eq!(p.constraints(&[0.0; 3]).len(), 14);
    }

    #[test]
    fn test_zero_control_matches_euler() {
        let seed = MpcSeed {
            s: 0.9,
            i: 0.05,
            beta: 0.6,
        };
        let p = problem(seed);
        let model = SirParams::new(0.6, 0.2);
        let (s1, i1) = model.euler_step(0.9, 0.05, 0.0);
        let g = p.constraints(&[0.0; 3]);
        assert!((g[0] - (i1 - 0.1)).abs() < 1e-15);
        let expected_first = 1e3 * (s1 - 1.0 / 3.0).powi(2);
        assert!(p.objective(&[0.0; 3]) > expected_first);
    }

    #[test]
    fn test_analytic_gradient_matches_fd() {
        let p = problem(MpcSeed {
            s: 0.8,
            i: 0.08,
            beta: 0.55,
        });
        let x = [0.1, 0.25, 0.05];
        let analytic = p.gradient(&x, 1e-7);
        let numeric = fd_gradient(&p, &x);
        for (a, n) in analytic.iter().zip(&numeric) {
            assert!((a - n).abs() < 1e-4 * (1.0 + n.abs()), "{a} vs {n}");
        }
    }

    #[test]
    fn test_analytic_jacobian_matches_fd() {
        let p = problem(MpcSeed {
            s: 0.8,
            i: 0.08,
            beta: 0.55,
        });
        let x = [0.3, 0.1, 0.2];
        let jac = p.constraint_jacobian(&x, 1e-7);
        let h = 1e-6;
        for j in 0..3 {
            let mut a = x.to_vec();
            let mut b = x.to_vec();
            a[j] += h;
            b[j] -= h;
            let ga = p.constraints(&a);
            let gb = p.constraints(&b);
            for row in 0..ga.len() {
                let fd = (ga[row] - gb[row]) / (2.0 * h);
                assert!((jac[row][j] - fd).abs() < 1e-6, "row {row} col {j}");
            }
        }
    }

    #[test]
    fn test_plan_within_bounds_and_respects_cap() {
        let ctl = MpcController::new(
            ControlParams::default(),
            0.2,
            AugmentedLagrangian::new(SolverConfig::default()),
        );
        let decision = ctl
            .plan(
                10,
                MpcSeed {
                    s: 0.95,
                    i: 0.03,
                    beta: 0.6,
                },
            )
            .unwrap();
        assert!((0.0..=0.4).contains(&decision.u));
        // An unchecked outbreak from here overshoots the cap, so control is needed.
        assert!(decision.u > 0.0);
    }

    struct Failing;

    impl NlpSolve for Failing {
        fn solve(&self, _problem: &dyn NlpProblem) -> Result<NlpSolution, NlpFailure> {
            Err(NlpFailure("restoration failed".to_string()))
        }
    }

    #[test]
    fn test_solver_failure_carries_step() {
        let ctl = MpcController::new(ControlParams::default(), 0.2, Failing);
        let seed = MpcSeed {
            s: 0.9,
            i: 0.05,
            beta: 0.6,
        };
        match ctl.plan(25, seed) {
            Err(EpiError::SolverFailure { step, message }) => {
                assert_eq!(step, 25);
                assert!(message.contains("restoration"));
            }
            other => panic!("expected solver failure, got {other:?}"),
        }
        let nan_seed = MpcSeed { beta: f64::NAN, ..seed };
        assert!(ctl.plan(25, nan_seed).unwrap_err().is_solver_failure());
    }
}
