//! Fixed-step Runge-Kutta integration for small autonomous-in-control systems.
//!
//! The state is a fixed-size array so that steps stay allocation free; the
//! right-hand side receives the time and the current state.

/// Perform one classical RK4 step of size `dt`.
pub fn rk4_step<const N: usize, F>(y: &mut [f64; N], t: f64, dt: f64, f: &F)
where
    F: Fn(f64, &[f64; N]) -> [f64; N],
{
    if !dt.is_finite() || dt == 0.0 {
        return;
    }

    let shifted = |base: &[f64; N], k: &[f64; N], h: f64| -> [f64; N] {
        let mut out = *base;
        for (o, ki) in out.iter_mut().zip(k.iter()) {
            *o += h * ki;
        }
        out
    };

    let k1 = f(t, y);
    let k2 = f(t + 0.5 * dt, &shifted(y, &k1, 0.5 * dt));
    let k3 = f(t + 0.5 * dt, &shifted(y, &k2, 0.5 * dt));
    let k4 = f(t + dt, &shifted(y, &k3, dt));

    for i in 0..N {
        y[i] += dt * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]) / 6.0;
    }
}

/// Integrate from `t0` to `t1` with `substeps` equal RK4 steps.
pub fn integrate_interval<const N: usize, F>(
    y0: [f64; N],
    t0: f64,
    t1: f64,
    substeps: usize,
    f: &F,
) -> [f64; N]
where
    F: Fn(f64, &[f64; N]) -> [f64; N],
{
    let n = substeps.max(1);
    let dt = (t1 - t0) / n as f64;
    let mut y = y0;
    for step in 0..n {
        rk4_step(&mut y, t0 + step as f64 * dt, dt, f);
    }
    y
}

/// Integrate over consecutive unit intervals and return the state at every
/// integer time `0..=steps` (the first entry is `y0`).
pub fn integrate_unit_grid<const N: usize, F>(
    y0: [f64; N],
    steps: usize,
    substeps: usize,
    f: &F,
) -> Vec<[f64; N]>
where
    F: Fn(f64, &[f64; N]) -> [f64; N],
{
    let mut traj = Vec::with_capacity(steps + 1);
    let mut y = y0;
    traj.push(y);
    for k in 0..steps {
        y = integrate_interval(y, k as f64, k as f64 + 1.0, substeps, f);
        traj.push(y);
    }
    traj
}
