//! Box- and inequality-constrained nonlinear programming.
//!
//! Problems are `min f(x)` subject to `g(x) <= 0` and `lb <= x <= ub`.
//! [`AugmentedLagrangian`] handles the inequalities with a PHR augmented
//! Lagrangian and solves each subproblem with a spectral projected gradient
//! method (Barzilai-Borwein step, Armijo backtracking along the projected arc).

use epi_types::config::SolverConfig;
use thiserror::Error;
use tracing::{debug, warn};

/// Armijo sufficient-decrease constant.
const ARMIJO_C: f64 = 1e-4;

/// Maximum step halvings per line search.
const MAX_BACKTRACK: usize = 60;

/// Spectral step safeguards.
const ALPHA_MIN: f64 = 1e-12;
const ALPHA_MAX: f64 = 1e12;

/// Why a solve could not produce a decision vector.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct NlpFailure(pub String);

/// A constrained nonlinear program.
pub trait NlpProblem {
    fn dim(&self) -> usize;

    /// Lower and upper bounds, each of length `dim()`.
    fn bounds(&self) -> (Vec<f64>, Vec<f64>);

    fn objective(&self, x: &[f64]) -> f64;

    /// Inequality constraints, feasible when every entry is `<= 0`.
    fn constraints(&self, x: &[f64]) -> Vec<f64>;

    /// Objective gradient. Central finite differences unless overridden.
    fn gradient(&self, x: &[f64], fd_step: f64) -> Vec<f64> {
        let mut probe = x.to_vec();
        (0..x.len())
            .map(|i| {
                let orig = probe[i];
                probe[i] = orig + fd_step;
                let plus = self.objective(&probe);
                probe[i] = orig - fd_step;
                let minus = self.objective(&probe);
                probe[i] = orig;
                (plus - minus) / (2.0 * fd_step)
            })
            .collect()
    }

    /// Constraint Jacobian as one row per constraint. Central finite
    /// differences unless overridden.
    fn constraint_jacobian(&self, x: &[f64], fd_step: f64) -> Vec<Vec<f64>> {
        let n = x.len();
        let m = self.constraints(x).len();
        let mut jac = vec![vec![0.0; n]; m];
        let mut probe = x.to_vec();
        for i in 0..n {
            let orig = probe[i];
            probe[i] = orig + fd_step;
            let plus = self.constraints(&probe);
            probe[i] = orig - fd_step;
            let minus = self.constraints(&probe);
            probe[i] = orig;
            for j in 0..m {
                jac[j][i] = (plus[j] - minus[j]) / (2.0 * fd_step);
            }
        }
        jac
    }

    /// Starting point before projection onto the bounds.
    fn initial_guess(&self) -> Vec<f64> {
        vec![0.0; self.dim()]
    }
}

/// Outcome of a solve that produced a decision vector.
#[derive(Debug, Clone)]
pub struct NlpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    /// `max(0, max_j g_j(x))`.
    pub max_violation: f64,
    /// Total inner iterations.
    pub iterations: usize,
    /// Feasible within tolerance and stationary.
    pub converged: bool,
}

/// Anything that can solve an [`NlpProblem`].
pub trait NlpSolve: Send + Sync {
    fn solve(&self, problem: &dyn NlpProblem) -> Result<NlpSolution, NlpFailure>;
}

/// PHR augmented-Lagrangian solver.
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangian {
    pub config: SolverConfig,
}

impl AugmentedLagrangian {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

fn project(x: &mut [f64], lb: &[f64], ub: &[f64]) {
    for ((v, &lo), &hi) in x.iter_mut().zip(lb).zip(ub) {
        *v = v.clamp(lo, hi);
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn max_violation(g: &[f64]) -> f64 {
    g.iter().fold(0.0f64, |acc, &v| acc.max(v))
}

/// Infinity norm of the projected-gradient step `P(x - grad) - x`.
fn projected_gradient_norm(x: &[f64], grad: &[f64], lb: &[f64], ub: &[f64]) -> f64 {
    x.iter()
        .zip(grad)
        .zip(lb.iter().zip(ub))
        .map(|((&xi, &gi), (&lo, &hi))| ((xi - gi).clamp(lo, hi) - xi).abs())
        .fold(0.0, f64::max)
}

struct Lagrangian<'a> {
    problem: &'a dyn NlpProblem,
    lambda: &'a [f64],
    mu: f64,
    fd_step: f64,
}

impl Lagrangian<'_> {
    fn value(&self, x: &[f64]) -> Result<f64, NlpFailure> {
        let f = self.problem.objective(x);
        let g = self.problem.constraints(x);
        if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
            return Err(NlpFailure(format!(
                "non-finite objective or constraint at x = {x:?}"
            )));
        }
        let penalty: f64 = g
            .iter()
            .zip(self.lambda)
            .map(|(&gj, &lj)| {
                let shifted = (lj + self.mu * gj).max(0.0);
                shifted * shifted - lj * lj
            })
            .sum();
        Ok(f + penalty / (2.0 * self.mu))
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, NlpFailure> {
        let mut grad = self.problem.gradient(x, self.fd_step);
        let g = self.problem.constraints(x);
        let jac = self.problem.constraint_jacobian(x, self.fd_step);
        for ((&gj, &lj), row) in g.iter().zip(self.lambda).zip(&jac) {
            let weight = (lj + self.mu * gj).max(0.0);
            if weight > 0.0 {
                for (gi, &dj) in grad.iter_mut().zip(row) {
                    *gi += weight * dj;
                }
            }
        }
        if grad.iter().any(|v| !v.is_finite()) {
            return Err(NlpFailure(format!("non-finite gradient at x = {x:?}")));
        }
        Ok(grad)
    }
}

impl AugmentedLagrangian {
    /// Spectral projected gradient on the augmented Lagrangian.
    /// Returns the inner iteration count and the final stationarity measure.
    fn minimize_subproblem(
        &self,
        lag: &Lagrangian<'_>,
        x: &mut Vec<f64>,
        lb: &[f64],
        ub: &[f64],
    ) -> Result<(usize, f64), NlpFailure> {
        let tol = self.config.tolerance;
        let mut value = lag.value(x)?;
        let mut grad = lag.gradient(x)?;
        let mut stationarity = projected_gradient_norm(x, &grad, lb, ub);
        let g_inf = grad.iter().fold(0.0f64, |a, &v| a.max(v.abs()));
        let mut alpha = if g_inf > 0.0 {
            (1.0 / g_inf).clamp(ALPHA_MIN, ALPHA_MAX)
        } else {
            1.0
        };

        let mut iterations = 0;
        while iterations < self.config.max_inner && stationarity > tol {
            iterations += 1;

            let mut trial: Vec<f64> = x.iter().zip(&grad).map(|(xi, gi)| xi - alpha * gi).collect();
            project(&mut trial, lb, ub);
            let direction: Vec<f64> = trial.iter().zip(x.iter()).map(|(t, xi)| t - xi).collect();
            let slope = dot(&grad, &direction);
            if slope >= 0.0 {
                break;
            }

            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACK {
                let candidate: Vec<f64> = x
                    .iter()
                    .zip(&direction)
                    .map(|(xi, di)| xi + step * di)
                    .collect();
                let cand_value = lag.value(&candidate)?;
                if cand_value <= value + ARMIJO_C * step * slope {
                    accepted = Some((candidate, cand_value));
                    break;
                }
                step *= 0.5;
            }
            let Some((x_new, value_new)) = accepted else {
                break;
            };

            let grad_new = lag.gradient(&x_new)?;
            let s: Vec<f64> = x_new.iter().zip(x.iter()).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = grad_new.iter().zip(&grad).map(|(a, b)| a - b).collect();
            let sy = dot(&s, &y);
            alpha = if sy > 0.0 {
                (dot(&s, &s) / sy).clamp(ALPHA_MIN, ALPHA_MAX)
            } else {
                ALPHA_MAX
            };

            let decrease = value - value_new;
            *x = x_new;
            grad = grad_new;
            value = value_new;
            stationarity = projected_gradient_norm(x, &grad, lb, ub);
            if decrease.abs() <= f64::EPSILON * (1.0 + value.abs()) {
                break;
            }
        }
        Ok((iterations, stationarity))
    }
}

impl NlpSolve for AugmentedLagrangian {
    fn solve(&self, problem: &dyn NlpProblem) -> Result<NlpSolution, NlpFailure> {
        let n = problem.dim();
        let (lb, ub) = problem.bounds();
        if lb.len() != n || ub.len() != n {
            return Err(NlpFailure(format!(
                "bounds length mismatch: dim {n}, lb {}, ub {}",
                lb.len(),
                ub.len()
            )));
        }
        if lb.iter().zip(&ub).any(|(lo, hi)| !(lo <= hi)) {
            return Err(NlpFailure(format!(
                "inconsistent bounds lb = {lb:?}, ub = {ub:?}"
            )));
        }

        let mut x = problem.initial_guess();
        if x.len() != n {
            return Err(NlpFailure(format!(
                "initial guess has length {}, expected {n}",
                x.len()
            )));
        }
        project(&mut x, &lb, &ub);

        let m = problem.constraints(&x).len();
        let mut lambda = vec![0.0; m];
        let mut mu = self.config.penalty_init;
        let mut prev_violation = f64::INFINITY;
        let mut total_iterations = 0;
        let mut converged = false;

        for outer in 0..self.config.max_outer {
            let lag = Lagrangian {
                problem,
                lambda: &lambda,
                mu,
                fd_step: self.config.fd_step,
            };
            let (inner, stationarity) = self.minimize_subproblem(&lag, &mut x, &lb, &ub)?;
            total_iterations += inner;

            let g = problem.constraints(&x);
            if g.iter().any(|v| !v.is_finite()) {
                return Err(NlpFailure(format!("non-finite constraints at x = {x:?}")));
            }
            let violation = max_violation(&g);
            let complementarity = g
                .iter()
                .zip(&lambda)
                .map(|(&gj, &lj)| (-gj).min(lj).abs())
                .fold(0.0, f64::max);

            for (lj, &gj) in lambda.iter_mut().zip(&g) {
                *lj = (*lj + mu * gj).max(0.0);
            }

            debug!(
                outer,
                inner, violation, complementarity, stationarity, mu, "augmented Lagrangian iterate"
            );

            if violation <= self.config.constraint_tolerance
                && complementarity <= self.config.constraint_tolerance
                && stationarity <= self.config.tolerance.sqrt()
            {
                converged = true;
                break;
            }

            if violation > 0.25 * prev_violation {
                mu = (mu * self.config.penalty_growth).min(self.config.penalty_max);
            }
            prev_violation = violation;
        }

        let objective = problem.objective(&x);
        if !objective.is_finite() {
            return Err(NlpFailure(format!("non-finite objective at x = {x:?}")));
        }
        let violation = max_violation(&problem.constraints(&x));
        if violation > self.config.constraint_tolerance {
            if self.config.fail_on_infeasible {
                return Err(NlpFailure(format!(
                    "infeasible end point, max violation {violation:.3e}"
                )));
            }
            warn!(violation, "NLP ended at an infeasible point");
        } else if !converged {
            debug!(violation, "NLP hit the iteration limit at a feasible point");
        }

        Ok(NlpSolution {
            x,
            objective,
            max_violation: violation,
            iterations: total_iterations,
            converged,
        })
    }
}
