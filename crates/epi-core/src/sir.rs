// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — SIR Dynamics
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! SIR model with the control input added to the removal rate.
//!
//! dS/dt = -β·I·S
//! dI/dt =  β·I·S - (γ + u)·I
//! dR/dt =  (γ + u)·I

use epi_types::state::SirState;

/// Transmission and recovery rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SirParams {
    pub beta: f64,
    pub gamma: f64,
}

impl SirParams {
    pub fn new(beta: f64, gamma: f64) -> Self {
        Self { beta, gamma }
    }

    /// Continuous-time right-hand side.
    pub fn derivatives(&self, x: &[f64; 3], u: f64) -> [f64; 3] {
        let infection = self.beta * x[0] * x[1];
        let removal = (self.gamma + u) * x[1];
        [-infection, infection - removal, removal]
    }

    /// One forward-Euler step of unit length on (S, I).
    /// This is the prediction model of the receding-horizon controller.
    pub fn euler_step(&self, s: f64, i: f64, u: f64) -> (f64, f64) {
        let infection = self.beta * s * i;
        (s - infection, i + infection - (self.gamma + u) * i)
    }

    /// Basic reproduction number under a constant control.
    pub fn reproduction_number(&self, u: f64) -> f64 {
        self.beta / (self.gamma + u)
    }
}

/// Convenience wrapper returning the derivative as a state value.
pub fn sir_rates(params: &SirParams, state: &SirState, u: f64) -> SirState {
    SirState::from_array(params.derivatives(&state.as_array(), u))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivatives_sum_to_zero() {
        let p = SirParams::new(0.6, 0.2);
        let d = p.derivatives(&[0.7, 0.2, 0.1], 0.3);
        assert!((d[0] + d[1] + d[2]).abs() < 1e-15);
        assert!((d[0] + 0.6 * 0.7 * 0.2).abs() < 1e-15);
        assert!((d[2] - 0.5 * 0.2).abs() < 1e-15);
    }

    #[test]
    fn test_euler_step_matches_derivatives() {
        let p = SirParams::new(0.6, 0.2);
        let (s, i) = p.euler_step(0.9, 0.05, 0.1);
        let d = p.derivatives(&[0.9, 0.05, 0.05], 0.1);
        assert!((s - (0.9 + d[0])).abs() < 1e-15);
        assert!((i - (0.05 + d[1])).abs() < 1e-15);
    }

    #[test]
    fn test_control_lowers_reproduction_number() {
        let p = SirParams::new(0.6, 0.2);
        assert!((p.reproduction_number(0.0) - 3.0).abs() < 1e-12);
        assert!(p.reproduction_number(0.4) < 1.0 + 1e-12);
    }

    #[test]
    fn test_sir_rates_wrapper() {
        let p = SirParams::new(0.5, 0.1);
        let rates = sir_rates(&p, &SirState::new(0.8, 0.1, 0.1), 0.0);
        assert!((rates.total()).abs() < 1e-15);
        assert!(rates.s < 0.0 && rates.r > 0.0);
    }
}
