// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Ground Truth
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Simulated outbreak and its noisy surveillance signal.
//!
//! The true state advances over unit intervals with fixed-step RK4 under the
//! currently applied control. Observations are Poisson counts with mean
//! `I·kappa·N`, normalised by `kappa·N` and clipped to [0, 1].

use crate::sir::SirParams;
use epi_math::ode::integrate_interval;
use epi_types::config::EpidemicParams;
use epi_types::error::{EpiError, EpiResult};
use epi_types::state::SirState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use tracing::debug;

/// Ground-truth plant with its own observation noise stream.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    pub params: SirParams,
    /// RK4 substeps per unit interval.
    pub substeps: usize,
    /// kappa·N, the observation scale.
    pub scale: f64,
    rng: StdRng,
}

impl GroundTruth {
    pub fn new(params: SirParams, substeps: usize, population: f64, kappa: f64, seed: u64) -> Self {
        GroundTruth {
            params,
            substeps: substeps.max(1),
            scale: kappa * population,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build the plant described by an epidemic configuration.
    pub fn from_config(p: &EpidemicParams, seed: u64) -> EpiResult<Self> {
        let scale = p.kappa * p.population;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EpiError::ConfigError(format!(
                "observation scale kappa*N must be finite and > 0, got {scale}"
            )));
        }
        Ok(Self::new(
            SirParams::new(p.beta(), p.gamma),
            p.truth_substeps,
            p.population,
            p.kappa,
            seed,
        ))
    }

    /// Advance the true state over one unit interval under control `u`.
    pub fn step(&self, state: SirState, u: f64) -> SirState {
        let params = self.params;
        let rhs = move |_t: f64, x: &[f64; 3]| params.derivatives(x, u);
        SirState::from_array(integrate_interval(
            state.as_array(),
            0.0,
            1.0,
            self.substeps,
            &rhs,
        ))
    }

    /// Draw one normalised noisy infection observation.
    pub fn observe(&mut self, state: &SirState) -> f64 {
        let mean = (state.i * self.scale).max(0.0);
        let count = if mean > 0.0 && mean.is_finite() {
            match Poisson::new(mean) {
                Ok(dist) => dist.sample(&mut self.rng),
                Err(_) => 0.0,
            }
        } else {
            0.0
        };
        (count.max(0.0) / self.scale).clamp(0.0, 1.0)
    }

    /// Open-loop trajectory with zero control for times `0..=steps`, with one
    /// observation per state drawn in time order.
    pub fn warmup(&mut self, initial: SirState, steps: usize) -> (Vec<SirState>, Vec<f64>) {
        let mut states = Vec::with_capacity(steps + 1);
        let mut state = initial;
        states.push(state);
        for _ in 0..steps {
            state = self.step(state, 0.0);
            states.push(state);
        }
        let observations: Vec<f64> = states.iter().map(|s| self.observe(s)).collect();
        debug!(steps, final_i = state.i, "open-loop warm-up generated");
        (states, observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epi_types::constants::CONSERVATION_TOL;

    fn default_plant() -> GroundTruth {
        GroundTruth::from_config(&EpidemicParams::default(), 3407).unwrap()
    }

    #[test]
    fn test_step_conserves_population() {
        let plant = default_plant();
        let mut state = SirState::new(0.999, 0.001, 0.0);
        for k in 0..50 {
            state = plant.step(state, if k % 2 == 0 { 0.4 } else { 0.0 });
            assert!((state.total() - 1.0).abs() < CONSERVATION_TOL);
        }
    }

    #[test]
    fn test_step_is_deterministic() {
        let plant = default_plant();
        let a = plant.step(SirState::new(0.8, 0.15, 0.05), 0.2);
        let b = plant.step(SirState::new(0.8, 0.15, 0.05), 0.2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_control_slows_outbreak() {
        let plant = default_plant();
        let start = SirState::new(0.9, 0.05, 0.05);
        let free = plant.step(start, 0.0);
        let controlled = plant.step(start, 0.4);
        assert!(controlled.i < free.i);
        assert!(controlled.r > free.r);
    }

    #[test]
    fn test_observation_clipped_and_scaled() {
        let mut plant = default_plant();
        for i in [0.0, 0.001, 0.05, 0.3, 1.0] {
            let obs = plant.observe(&SirState::new(1.0 - i, i, 0.0));
            assert!((0.0..=1.0).contains(&obs));
            // Normalised counts are multiples of 1/(kappa·N).
            let count = obs * plant.scale;
            assert!((count - count.round()).abs() < 1e-6);
        }
        assert_eq!(plant.observe(&SirState::new(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_observation_unbiased() {
        let mut plant = default_plant();
        let state = SirState::new(0.8, 0.2, 0.0);
        let n = 2000;
        let mean: f64 = (0..n).map(|_| plant.observe(&state)).sum::<f64>() / n as f64;
        // Poisson(2000)/10000 has std ~0.0045 per draw; the sample mean is much tighter.
        assert!((mean - 0.2).abs() < 1e-3, "mean {mean}");
    }

    #[test]
    fn test_warmup_lengths_and_seed_repeatability() {
        let mut a = default_plant();
        let mut b = default_plant();
        let (states_a, obs_a) = a.warmup(SirState::new(0.999, 0.001, 0.0), 10);
        let (_, obs_b) = b.warmup(SirState::new(0.999, 0.001, 0.0), 10);
        assert_eq!(states_a.len(), 11);
        assert_eq!(obs_a.len(), 11);
        assert_eq!(obs_a, obs_b);
        assert!(states_a[10].i > states_a[0].i);
    }
}
