// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Estimator Contract
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Input/output contract shared by every state and parameter estimator.

use crate::joint::JointPinn;
use crate::two_stage::TwoStagePinn;
use epi_types::cancel::CancelToken;
use epi_types::config::{EstimatorConfig, EstimatorVariant};
use epi_types::error::{EpiError, EpiResult};
use epi_types::state::SirState;

/// Data and constraints of one fit over time steps `0..=eval_step`.
#[derive(Debug, Clone)]
pub struct EstimationRequest<'a> {
    /// Normalised noisy infection counts, one per step.
    pub observations: &'a [f64],
    /// Applied control, one per step.
    pub controls: &'a [f64],
    /// Known initial state used by the boundary terms.
    pub initial: SirState,
    pub gamma: f64,
    /// Time scale; the networks see `tau = t / tf`.
    pub tf: f64,
    pub eval_step: usize,
    pub seed: u64,
}

impl EstimationRequest<'_> {
    pub fn validate(&self) -> EpiResult<()> {
        let needed = self.eval_step + 1;
        if self.observations.len() < needed || self.controls.len() < needed {
            return Err(EpiError::EstimatorFailure(format!(
                "need {needed} observations and controls, got {} and {}",
                self.observations.len(),
                self.controls.len()
            )));
        }
        if !self.tf.is_finite() || self.tf <= 0.0 {
            return Err(EpiError::EstimatorFailure(format!(
                "time scale must be finite and > 0, got {}",
                self.tf
            )));
        }
        Ok(())
    }
}

/// Trajectories at every step `0..=eval_step` plus the parameter estimate.
#[derive(Debug, Clone)]
pub struct EstimationOutput {
    pub s: Vec<f64>,
    pub i: Vec<f64>,
    pub r: Vec<f64>,
    pub u: Vec<f64>,
    pub beta: f64,
    /// Mean batch loss of the last physics-informed epoch.
    pub loss: f64,
    pub ode_seconds: f64,
    /// Wall time of the data-regression stage, when the estimator has one.
    pub data_seconds: Option<f64>,
}

/// A trainable estimator. Each call starts from freshly initialised
/// parameters drawn from `request.seed`.
pub trait Estimator: Send + Sync {
    fn fit(&self, request: &EstimationRequest<'_>, cancel: &CancelToken)
        -> EpiResult<EstimationOutput>;

    /// Whether outputs carry `data_seconds`.
    fn has_data_stage(&self) -> bool {
        false
    }
}

impl<T: Estimator + ?Sized> Estimator for Box<T> {
    fn fit(&self, request: &EstimationRequest<'_>, cancel: &CancelToken)
        -> EpiResult<EstimationOutput> {
        (**self).fit(request, cancel)
    }

    fn has_data_stage(&self) -> bool {
        (**self).has_data_stage()
    }
}

/// Independent seed for the fit of `run` at step `k` (SplitMix64 mixing).
pub fn derive_seed(base: u64, k: usize, run: usize) -> u64 {
    let mut z = base
        .wrapping_add((k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((run as u64).wrapping_add(1).wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Estimator selected by the configured variant.
pub fn build_estimator(config: &EstimatorConfig) -> Box<dyn Estimator> {
    match config.variant {
        EstimatorVariant::Joint => Box::new(JointPinn::new(config.clone())),
        EstimatorVariant::TwoStage => Box::new(TwoStagePinn::new(config.clone())),
    }
}
