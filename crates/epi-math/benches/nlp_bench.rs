// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Augmented Lagrangian Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use epi_math::nlp::{AugmentedLagrangian, NlpProblem, NlpSolve};
use std::hint::black_box;

/// Euler-discretised SIR tracking problem with an infection cap.
struct SirTracking {
    blocks: usize,
    horizon: usize,
    ts: usize,
}

impl SirTracking {
    fn rollout(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let (beta, gamma) = (0.6, 0.2);
        let (mut s, mut i) = (0.6, 0.08);
        let mut cost = 0.0;
        let mut g = Vec::with_capacity(self.horizon);
        for step in 0..self.horizon {
            let u = x[step / self.ts];
            let ds = -beta * s * i;
            let di = beta * s * i - (gamma + u) * i;
            s += ds;
            i += di;
            cost += 1e3 * (s - 1.0 / 3.0).powi(2) + u * u;
            g.push(i - 0.1);
        }
        (cost, g)
    }
}

impl NlpProblem for SirTracking {
    fn dim(&self) -> usize {
        self.blocks
    }
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; self.blocks], vec![0.4; self.blocks])
    }
    fn objective(&self, x: &[f64]) -> f64 {
        self.rollout(x).0
    }
    fn constraints(&self, x: &[f64]) -> Vec<f64> {
        self.rollout(x).1
    }
}

fn bench_sir_tracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("augmented_lagrangian");
    group.sample_size(20);
    let solver = AugmentedLagrangian::default();

    for (horizon, ts) in [(14usize, 5usize), (28, 5)] {
        let problem = SirTracking {
            blocks: horizon.div_ceil(ts),
            horizon,
            ts,
        };
        group.bench_function(format!("sir_tracking_h{horizon}_ts{ts}"), |b| {
            b.iter(|| black_box(solver.solve(&problem).map(|s| s.objective).ok()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sir_tracking);
criterion_main!(benches);
