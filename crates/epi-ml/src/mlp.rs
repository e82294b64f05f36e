// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Time MLP
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Scalar-input MLP `tau -> tanh^L -> sigmoid` evaluated together with its
//! exact derivative d/dtau.
//!
//! The forward pass carries (value, d/dtau) through every layer; the backward
//! pass takes loss gradients with respect to both outputs and returns the
//! parameter gradients.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Fully connected layer, `z = W·h + b` with `W` shaped (out, in).
#[derive(Debug, Clone)]
pub struct Dense {
    pub w: Array2<f64>,
    pub b: Array1<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero biases.
    pub fn glorot<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        Dense {
            w: Array2::from_shape_fn((fan_out, fan_in), |_| dist.sample(rng)),
            b: Array1::zeros(fan_out),
        }
    }
}

/// Parameter gradients, one entry per layer.
#[derive(Debug, Clone)]
pub struct MlpGradients {
    pub layers: Vec<Dense>,
}

impl MlpGradients {
    pub fn norm(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| l.w.iter().chain(l.b.iter()).map(|g| g * g).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }
}

/// Cached activations of one batched forward pass.
#[derive(Debug, Clone)]
pub struct ForwardTrace {
    /// Per layer: input value and input derivative, each (n, fan_in).
    inputs: Vec<(Array2<f64>, Array2<f64>)>,
    /// Per hidden layer: tanh output and pre-activation derivative.
    hidden: Vec<(Array2<f64>, Array2<f64>)>,
    /// Derivative of the output pre-activation.
    z_dot: Array1<f64>,
    pub value: Array1<f64>,
    pub derivative: Array1<f64>,
}

impl ForwardTrace {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TimeMlp {
    layers: Vec<Dense>,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl TimeMlp {
    pub fn new<R: Rng + ?Sized>(hidden_layers: usize, width: usize, rng: &mut R) -> Self {
        let hidden_layers = hidden_layers.max(1);
        let width = width.max(1);
        let mut layers = Vec::with_capacity(hidden_layers + 1);
        let mut fan_in = 1;
        for _ in 0..hidden_layers {
            layers.push(Dense::glorot(fan_in, width, rng));
            fan_in = width;
        }
        layers.push(Dense::glorot(fan_in, 1, rng));
        TimeMlp { layers }
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.w.len() + l.b.len()).sum()
    }

    pub fn zero_gradients(&self) -> MlpGradients {
        MlpGradients {
            layers: self
                .layers
                .iter()
                .map(|l| Dense {
                    w: Array2::zeros(l.w.raw_dim()),
                    b: Array1::zeros(l.b.raw_dim()),
                })
                .collect(),
        }
    }

    /// Batched forward pass over scaled times.
    pub fn forward(&self, taus: &[f64]) -> ForwardTrace {
        let n = taus.len();
        let n_layers = self.layers.len();
        let mut h = Array2::from_shape_fn((n, 1), |(p, _)| taus[p]);
        let mut h_dot = Array2::<f64>::ones((n, 1));
        let mut inputs = Vec::with_capacity(n_layers);
        let mut hidden = Vec::with_capacity(n_layers - 1);

        for layer in &self.layers[..n_layers - 1] {
            let a = h.dot(&layer.w.t()) + &layer.b;
            let a_dot = h_dot.dot(&layer.w.t());
            let act = a.mapv(f64::tanh);
            let act_dot = &act.mapv(|v| 1.0 - v * v) * &a_dot;
            inputs.push((h, h_dot));
            hidden.push((act.clone(), a_dot));
            h = act;
            h_dot = act_dot;
        }

        let out = &self.layers[n_layers - 1];
        let z = h.dot(&out.w.t()) + &out.b;
        let z_dot = h_dot.dot(&out.w.t()).column(0).to_owned();
        inputs.push((h, h_dot));

        let value = z.column(0).mapv(sigmoid);
        let derivative = Array1::from_shape_fn(n, |p| {
            let y = value[p];
            y * (1.0 - y) * z_dot[p]
        });

        ForwardTrace {
            inputs,
            hidden,
            z_dot,
            value,
            derivative,
        }
    }

    /// Value and derivative only.
    pub fn predict(&self, taus: &[f64]) -> (Array1<f64>, Array1<f64>) {
        let trace = self.forward(taus);
        (trace.value, trace.derivative)
    }

    /// Accumulate parameter gradients for loss gradients `g_value`, `g_deriv`
    /// with respect to the traced outputs.
    pub fn backward(
        &self,
        trace: &ForwardTrace,
        g_value: &Array1<f64>,
        g_deriv: &Array1<f64>,
        grads: &mut MlpGradients,
    ) {
        let n = trace.len();
        let mut gz = Array2::from_shape_fn((n, 1), |(p, _)| {
            let y = trace.value[p];
            let s = y * (1.0 - y);
            g_value[p] * s + g_deriv[p] * trace.z_dot[p] * s * (1.0 - 2.0 * y)
        });
        let mut gz_dot = Array2::from_shape_fn((n, 1), |(p, _)| {
            let y = trace.value[p];
            g_deriv[p] * y * (1.0 - y)
        });

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let (h_in, h_dot_in) = &trace.inputs[idx];
            let g = &mut grads.layers[idx];
            g.w += &gz.t().dot(h_in);
            g.w += &gz_dot.t().dot(h_dot_in);
            g.b += &gz.sum_axis(Axis(0));

            if idx == 0 {
                break;
            }
            let gh = gz.dot(&layer.w);
            let gh_dot = gz_dot.dot(&layer.w);
            let (act, a_dot) = &trace.hidden[idx - 1];
            let d = act.mapv(|v| 1.0 - v * v);
            // h' = d·a'  =>  dh'/da = -2·h·d·a'
            gz = &gh * &d + &(&gh_dot * a_dot * act * &d * -2.0);
            gz_dot = gh_dot * &d;
        }
    }

    /// Parameters paired with their gradients in a fixed traversal order.
    pub fn params_with_grads<'a>(
        &'a mut self,
        grads: &'a MlpGradients,
    ) -> impl Iterator<Item = (&'a mut f64, f64)> + 'a {
        self.layers
            .iter_mut()
            .zip(grads.layers.iter())
            .flat_map(|(Dense { w, b }, g)| {
                w.iter_mut()
                    .zip(g.w.iter().copied())
                    .chain(b.iter_mut().zip(g.b.iter().copied()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scalar_loss(net: &TimeMlp, taus: &[f64]) -> f64 {
        // L = Σ y² + 3·Σ y'
        let (y, dy) = net.predict(taus);
        y.iter().map(|v| v * v).sum::<f64>() + 3.0 * dy.sum()
    }

    #[test]
    fn test_output_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let net = TimeMlp::new(3, 16, &mut rng);
        let (y, _) = net.predict(&[0.0, 0.25, 0.5, 1.0, 3.0]);
        assert!(y.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(net.num_parameters(), (16 + 16) + 2 * (16 * 16 + 16) + (16 + 1));
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(11);
        let net = TimeMlp::new(2, 8, &mut rng);
        let h = 1e-6;
        for &t in &[0.0, 0.1, 0.4, 0.9] {
            let (y_plus, _) = net.predict(&[t + h]);
            let (y_minus, _) = net.predict(&[t - h]);
            let (_, dy) = net.predict(&[t]);
            let fd = (y_plus[0] - y_minus[0]) / (2.0 * h);
            assert!((dy[0] - fd).abs() < 1e-7, "t={t}: {} vs {fd}", dy[0]);
        }
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(42);
        let net = TimeMlp::new(2, 5, &mut rng);
        let taus = [0.0, 0.2, 0.7];

        let trace = net.forward(&taus);
        let g_value = trace.value.mapv(|v| 2.0 * v);
        let g_deriv = Array1::from_elem(taus.len(), 3.0);
        let mut grads = net.zero_gradients();
        net.backward(&trace, &g_value, &g_deriv, &mut grads);

        let analytic: Vec<f64> = {
            let mut copy = net.clone();
            copy.params_with_grads(&grads).map(|(_, g)| g).collect()
        };

        let zero = net.zero_gradients();
        let n = analytic.len();
        let h = 1e-6;
        for idx in (0..n).step_by(3) {
            let mut plus = net.clone();
            if let Some((p, _)) = plus.params_with_grads(&zero).nth(idx) {
                *p += h;
            }
            let mut minus = net.clone();
            if let Some((p, _)) = minus.params_with_grads(&zero).nth(idx) {
                *p -= h;
            }
            let fd = (scalar_loss(&plus, &taus) - scalar_loss(&minus, &taus)) / (2.0 * h);
            assert!(
                (analytic[idx] - fd).abs() < 1e-5 * (1.0 + fd.abs()),
                "param {idx}: analytic {} vs fd {fd}",
                analytic[idx]
            );
        }
    }

    #[test]
    fn test_same_seed_same_network() {
        let a = TimeMlp::new(4, 10, &mut StdRng::seed_from_u64(3));
        let b = TimeMlp::new(4, 10, &mut StdRng::seed_from_u64(3));
        assert_eq!(a.predict(&[0.3]).0, b.predict(&[0.3]).0);
    }
}
