// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Runner
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Runs one closed-loop estimation and control experiment and writes its
//! CSV tables.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use epi_control::driver::Driver;
use epi_control::output::write_outputs;
use epi_math::nlp::AugmentedLagrangian;
use epi_ml::estimator::build_estimator;
use epi_types::config::{EstimatorVariant, ExperimentConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    Joint,
    TwoStage,
}

impl From<Variant> for EstimatorVariant {
    fn from(v: Variant) -> Self {
        match v {
            Variant::Joint => EstimatorVariant::Joint,
            Variant::TwoStage => EstimatorVariant::TwoStage,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "epi-run", about = "Closed-loop SIR estimation and receding-horizon control")]
struct Args {
    /// JSON configuration; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    variant: Option<Variant>,
    /// Number of independent estimator runs per decision instant.
    #[arg(long)]
    runs: Option<usize>,
    /// Fit the runs of one instant in parallel.
    #[arg(long)]
    parallel: bool,
    #[arg(long)]
    output_root: Option<PathBuf>,
    /// Noise regulation factor.
    #[arg(long)]
    kappa: Option<f64>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn load_config(args: &Args) -> Result<ExperimentConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let path_str = path
                .to_str()
                .with_context(|| format!("non-UTF-8 config path {}", path.display()))?;
            ExperimentConfig::from_file(path_str)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => ExperimentConfig::default(),
    };
    if let Some(variant) = args.variant {
        cfg.estimator.variant = variant.into();
    }
    if let Some(runs) = args.runs {
        cfg.runs.num_runs = runs;
    }
    if args.parallel {
        cfg.runs.parallel = true;
    }
    if let Some(root) = &args.output_root {
        cfg.runs.output_root = root.clone();
    }
    if let Some(kappa) = args.kappa {
        cfg.epidemic.kappa = kappa;
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_config(&args)?;
    let out_dir = cfg.output_dir();
    let beta_true = cfg.epidemic.beta();
    info!(
        variant = cfg.estimator.variant.label(),
        runs = cfg.runs.num_runs,
        kappa = cfg.epidemic.kappa,
        dir = %out_dir.display(),
        "starting experiment"
    );

    let estimator = build_estimator(&cfg.estimator);
    let has_data_stage = estimator.has_data_stage();
    let solver = AugmentedLagrangian::new(cfg.solver.clone());
    let driver = Driver::new(cfg, estimator, solver)?;
    let report = driver.run().context("closed-loop run failed")?;

    let written = write_outputs(&out_dir, &report.state, beta_true, has_data_stage)
        .with_context(|| format!("writing results to {}", out_dir.display()))?;

    if report.aborted {
        warn!(
            last_training = ?report.last_training(),
            "MPC solver failed; loop stopped early, results cover the truncated run"
        );
    }
    info!(
        instants = report.estimation_instants().len(),
        files = written.len(),
        wall_seconds = report.wall_seconds,
        "experiment complete"
    );
    Ok(())
}
