// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Physics-Informed Estimator Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use epi_ml::estimator::{EstimationRequest, Estimator};
use epi_ml::joint::JointPinn;
use epi_ml::mlp::TimeMlp;
use epi_types::cancel::CancelToken;
use epi_types::config::EstimatorConfig;
use epi_types::state::SirState;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

/// Forward + backward pass of the default 4x50 network over one batch.
fn bench_mlp_batch(c: &mut Criterion) {
    let net = TimeMlp::new(4, 50, &mut StdRng::seed_from_u64(0));
    let taus: Vec<f64> = (0..101).map(|j| j as f64 / 100.0).collect();
    let ones = Array1::from_elem(taus.len(), 1.0);

    c.bench_function("bench_mlp_forward_backward_101", |b| {
        b.iter(|| {
            let trace = net.forward(black_box(&taus));
            let mut grads = net.zero_gradients();
            net.backward(&trace, &ones, &ones, &mut grads);
            black_box(grads.norm())
        })
    });
}

/// A short joint fit at the first decision instant.
fn bench_joint_fit(c: &mut Criterion) {
    let est = JointPinn::new(EstimatorConfig {
        hidden_layers: 2,
        hidden_width: 20,
        collocation_points: 200,
        epochs_ode: 10,
        ..EstimatorConfig::default()
    });
    let obs: Vec<f64> = (0..=10).map(|k| 0.001 * 1.5f64.powi(k)).collect();
    let ctl = vec![0.0; 11];
    let req = EstimationRequest {
        observations: &obs,
        controls: &ctl,
        initial: SirState::new(0.999, 0.001, 0.0),
        gamma: 0.2,
        tf: 50.0,
        eval_step: 10,
        seed: 3,
    };
    let cancel = CancelToken::new();

    let mut group = c.benchmark_group("joint_fit");
    group.sample_size(10);
    group.bench_function("bench_joint_fit_10_epochs", |b| {
        b.iter(|| black_box(est.fit(&req, &cancel).map(|o| o.beta)))
    });
    group.finish();
}

criterion_group!(benches, bench_mlp_batch, bench_joint_fit);
criterion_main!(benches);
