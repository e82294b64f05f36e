// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{CONSERVATION_TOL, JOINT_LABEL, OBSERVATION_SEED, TWO_STAGE_LABEL};
use crate::error::{EpiError, EpiResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level experiment configuration.
/// Every field has a default matching the baseline experiment, so a JSON
/// file only needs to list the values it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub epidemic: EpidemicParams,
    pub control: ControlParams,
    pub estimator: EstimatorConfig,
    pub solver: SolverConfig,
    pub runs: RunConfig,
}

/// Population, noise and SIR parameters of the simulated outbreak.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpidemicParams {
    /// Total population N.
    pub population: f64,
    /// Noise regulation factor; the observation is Poisson(I·kappa·N)/(kappa·N).
    pub kappa: f64,
    pub s0: f64,
    pub i0: f64,
    pub r0: f64,
    /// Recovery rate.
    pub gamma: f64,
    /// Basic reproduction number; the true transmission rate is gamma·r_max.
    pub r_max: f64,
    /// Final simulation time.
    pub tf: f64,
    /// RK4 substeps per unit time for the ground truth.
    pub truth_substeps: usize,
}

impl Default for EpidemicParams {
    fn default() -> Self {
        EpidemicParams {
            population: 1_000_000.0,
            kappa: 0.01,
            s0: 1.0 - 0.001,
            i0: 0.001,
            r0: 0.0,
            gamma: 1.0 / 5.0,
            r_max: 3.0,
            tf: 50.0,
            truth_substeps: 100,
        }
    }
}

impl EpidemicParams {
    /// True transmission rate.
    pub fn beta(&self) -> f64 {
        self.gamma * self.r_max
    }

    /// Integer horizon; arrays hold `tf_int() + 1` time steps.
    pub fn tf_int(&self) -> usize {
        self.tf as usize
    }
}

/// Receding-horizon controller parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    /// Prediction horizon length.
    pub n_pri: usize,
    /// Weight on (S - S_target)².
    pub alpha1: f64,
    /// Weight on u².
    pub alpha2: f64,
    /// Upper bound on predicted infected fraction.
    pub i_max: f64,
    /// Upper bound on the control input.
    pub u_max: f64,
    /// Sampling interval (steps per control block).
    pub ts: usize,
    pub start_control: usize,
    pub end_control: usize,
    pub s_target: f64,
}

impl Default for ControlParams {
    fn default() -> Self {
        ControlParams {
            n_pri: 14,
            alpha1: 1e3,
            alpha2: 1.0,
            i_max: 0.1,
            u_max: 0.4,
            ts: 5,
            start_control: 10,
            end_control: 39,
            s_target: 1.0 / 3.0,
        }
    }
}

impl ControlParams {
    /// Number of piecewise-constant control blocks: ceil(n_pri / ts).
    pub fn control_blocks(&self) -> usize {
        self.n_pri.div_ceil(self.ts)
    }
}

/// Which physics-informed estimator runs at each decision instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorVariant {
    /// One constrained fit of S, I, u and beta.
    #[default]
    Joint,
    /// Data regression of I and u, then physics-informed fit of S and beta.
    TwoStage,
}

impl EstimatorVariant {
    pub fn label(&self) -> &'static str {
        match self {
            EstimatorVariant::Joint => JOINT_LABEL,
            EstimatorVariant::TwoStage => TWO_STAGE_LABEL,
        }
    }
}

/// Physics-informed estimator hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub variant: EstimatorVariant,
    pub hidden_layers: usize,
    pub hidden_width: usize,
    /// Number of collocation points Nc.
    pub collocation_points: usize,
    /// Epochs of the physics-informed stage.
    pub epochs_ode: usize,
    /// Epochs of the two-stage data regression.
    pub epochs_data: usize,
    pub batch_size_ode: usize,
    pub batch_size_data: usize,
    pub learning_rate: f64,
    /// Training stops once the epoch loss drops below this value.
    pub stop_loss: f64,
    /// Initial transmission-rate parameter.
    pub beta_init: f64,
    /// Wall-clock budget per fit; training stops early when exceeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fit_seconds: Option<f64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            variant: EstimatorVariant::Joint,
            hidden_layers: 4,
            hidden_width: 50,
            collocation_points: 5000,
            epochs_ode: 5000,
            epochs_data: 4500,
            batch_size_ode: 100,
            batch_size_data: 10,
            learning_rate: 1e-3,
            stop_loss: 1e-13,
            beta_init: 1.0,
            max_fit_seconds: None,
        }
    }
}

/// Augmented-Lagrangian NLP solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_outer: usize,
    pub max_inner: usize,
    /// Projected-gradient stationarity tolerance.
    pub tolerance: f64,
    /// Maximum accepted constraint violation.
    pub constraint_tolerance: f64,
    /// Central finite-difference step.
    pub fd_step: f64,
    pub penalty_init: f64,
    pub penalty_growth: f64,
    pub penalty_max: f64,
    /// Treat an infeasible end point as a solver failure.
    pub fail_on_infeasible: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_outer: 60,
            max_inner: 400,
            tolerance: 1e-8,
            constraint_tolerance: 1e-6,
            fd_step: 1e-7,
            penalty_init: 10.0,
            penalty_growth: 10.0,
            penalty_max: 1e10,
            fail_on_infeasible: false,
        }
    }
}

/// How the per-run transmission-rate estimate is written into the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterFill {
    /// Only the cell at the estimation step.
    #[default]
    AtEstimate,
    /// Every cell of the state freshness window.
    Window,
}

/// Ensemble, seeding and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub num_runs: usize,
    pub observation_seed: u64,
    /// Base seed from which every estimator fit derives its own stream.
    pub estimator_seed: u64,
    /// Fan the runs of one decision instant out over the rayon pool.
    pub parallel: bool,
    pub parameter_fill: ParameterFill,
    pub output_root: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_runs: 10,
            observation_seed: OBSERVATION_SEED,
            estimator_seed: 0,
            parallel: false,
            parameter_fill: ParameterFill::AtEstimate,
            output_root: PathBuf::from("Plot"),
        }
    }
}

impl ExperimentConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> EpiResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Output directory for this configuration, e.g. `Plot/PINNs_kappa0.01`.
    pub fn output_dir(&self) -> PathBuf {
        self.runs.output_root.join(format!(
            "{}_kappa{}",
            self.estimator.variant.label(),
            self.epidemic.kappa
        ))
    }

    pub fn validate(&self) -> EpiResult<()> {
        validate_epidemic(&self.epidemic)?;
        validate_control(&self.control, &self.epidemic)?;
        validate_estimator(&self.estimator)?;
        validate_solver(&self.solver)?;
        if self.runs.num_runs == 0 {
            return Err(EpiError::ConfigError(
                "runs.num_runs must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive_finite(value: f64, name: &str) -> EpiResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EpiError::ConfigError(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

fn validate_epidemic(p: &EpidemicParams) -> EpiResult<()> {
    positive_finite(p.population, "epidemic.population")?;
    positive_finite(p.kappa, "epidemic.kappa")?;
    positive_finite(p.gamma, "epidemic.gamma")?;
    positive_finite(p.tf, "epidemic.tf")?;
    if !p.r_max.is_finite() || p.r_max < 0.0 {
        return Err(EpiError::ConfigError(
            "epidemic.r_max must be finite and >= 0".to_string(),
        ));
    }
    for (name, v) in [("s0", p.s0), ("i0", p.i0), ("r0", p.r0)] {
        if !v.is_finite() || !(0.0..=1.0).contains(&v) {
            return Err(EpiError::ConfigError(format!(
                "epidemic.{name} must lie in [0, 1], got {v}"
            )));
        }
    }
    let total = p.s0 + p.i0 + p.r0;
    if (total - 1.0).abs() > CONSERVATION_TOL {
        return Err(EpiError::ConfigError(format!(
            "initial state must sum to 1, got {total}"
        )));
    }
    if p.truth_substeps == 0 {
        return Err(EpiError::ConfigError(
            "epidemic.truth_substeps must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_control(c: &ControlParams, p: &EpidemicParams) -> EpiResult<()> {
    if c.ts == 0 {
        return Err(EpiError::ConfigError("control.ts must be >= 1".to_string()));
    }
    if c.n_pri == 0 {
        return Err(EpiError::ConfigError(
            "control.n_pri must be >= 1".to_string(),
        ));
    }
    if c.start_control > c.end_control {
        return Err(EpiError::ConfigError(format!(
            "control.start_control ({}) must not exceed control.end_control ({})",
            c.start_control, c.end_control
        )));
    }
    if c.start_control >= p.tf_int() {
        return Err(EpiError::ConfigError(format!(
            "control.start_control ({}) must be < tf ({})",
            c.start_control,
            p.tf_int()
        )));
    }
    if !c.u_max.is_finite() || c.u_max < 0.0 {
        return Err(EpiError::ConfigError(
            "control.u_max must be finite and >= 0".to_string(),
        ));
    }
    positive_finite(c.i_max, "control.i_max")?;
    for (name, v) in [
        ("alpha1", c.alpha1),
        ("alpha2", c.alpha2),
        ("s_target", c.s_target),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(EpiError::ConfigError(format!(
                "control.{name} must be finite and >= 0"
            )));
        }
    }
    Ok(())
}

fn validate_estimator(e: &EstimatorConfig) -> EpiResult<()> {
    if e.hidden_layers == 0 || e.hidden_width == 0 {
        return Err(EpiError::ConfigError(
            "estimator network needs at least one hidden layer of width >= 1".to_string(),
        ));
    }
    if e.batch_size_ode == 0 || e.batch_size_data == 0 {
        return Err(EpiError::ConfigError(
            "estimator batch sizes must be >= 1".to_string(),
        ));
    }
    positive_finite(e.learning_rate, "estimator.learning_rate")?;
    if !e.stop_loss.is_finite() || e.stop_loss < 0.0 {
        return Err(EpiError::ConfigError(
            "estimator.stop_loss must be finite and >= 0".to_string(),
        ));
    }
    if !e.beta_init.is_finite() || e.beta_init < 0.0 {
        return Err(EpiError::ConfigError(
            "estimator.beta_init must be finite and >= 0".to_string(),
        ));
    }
    if let Some(limit) = e.max_fit_seconds {
        positive_finite(limit, "estimator.max_fit_seconds")?;
    }
    Ok(())
}

fn validate_solver(s: &SolverConfig) -> EpiResult<()> {
    if s.max_outer == 0 || s.max_inner == 0 {
        return Err(EpiError::ConfigError(
            "solver iteration limits must be >= 1".to_string(),
        ));
    }
    positive_finite(s.tolerance, "solver.tolerance")?;
    positive_finite(s.constraint_tolerance, "solver.constraint_tolerance")?;
    positive_finite(s.fd_step, "solver.fd_step")?;
    positive_finite(s.penalty_init, "solver.penalty_init")?;
    if !s.penalty_growth.is_finite() || s.penalty_growth <= 1.0 {
        return Err(EpiError::ConfigError(
            "solver.penalty_growth must be finite and > 1".to_string(),
        ));
    }
    if !s.penalty_max.is_finite() || s.penalty_max < s.penalty_init {
        return Err(EpiError::ConfigError(
            "solver.penalty_max must be finite and >= solver.penalty_init".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(stem: &str) -> PathBuf {
        let epoch_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "{stem}_{}_{}.json",
            std::process::id(),
            epoch_ns
        ))
    }

    #[test]
    fn test_defaults_match_baseline_experiment() {
        let cfg = ExperimentConfig::default();
        assert!((cfg.epidemic.beta() - 0.6).abs() < 1e-12);
        assert_eq!(cfg.epidemic.tf_int(), 50);
        assert_eq!(cfg.control.control_blocks(), 3);
        assert_eq!(cfg.control.start_control, 10);
        assert_eq!(cfg.control.end_control, 39);
        assert_eq!(cfg.runs.num_runs, 10);
        assert_eq!(cfg.runs.observation_seed, 3407);
        assert_eq!(cfg.estimator.collocation_points, 5000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_output_dir_naming() {
        let mut cfg = ExperimentConfig::default();
        assert!(cfg.output_dir().ends_with("PINNs_kappa0.01"));
        cfg.estimator.variant = EstimatorVariant::TwoStage;
        cfg.epidemic.kappa = 1.0;
        assert!(cfg.output_dir().ends_with("SI-PINNs_kappa1"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "control": { "ts": 7 }, "estimator": { "variant": "two-stage" } }"#;
        let cfg: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.control.ts, 7);
        assert_eq!(cfg.control.n_pri, 14);
        assert_eq!(cfg.estimator.variant, EstimatorVariant::TwoStage);
        assert_eq!(cfg.estimator.hidden_width, 50);
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut cfg = ExperimentConfig::default();
        cfg.runs.num_runs = 3;
        cfg.runs.parameter_fill = ParameterFill::Window;
        let path = temp_path("epi_config");
        std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = ExperimentConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.runs.num_runs, 3);
        assert_eq!(loaded.runs.parameter_fill, ParameterFill::Window);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = ExperimentConfig::default();
        cfg.control.ts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ExperimentConfig::default();
        cfg.control.start_control = 40;
        assert!(cfg.validate().is_err());

        let mut cfg = ExperimentConfig::default();
        cfg.epidemic.s0 = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = ExperimentConfig::default();
        cfg.runs.num_runs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ExperimentConfig::default();
        cfg.solver.penalty_growth = 1.0;
        assert!(cfg.validate().is_err());
    }
}
