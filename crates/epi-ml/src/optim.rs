// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Adam
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
use epi_types::constants::{ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON};

/// Adam over a flat parameter stream.
///
/// Moments are indexed by position in the stream passed to [`Adam::step`], so
/// callers must present parameters in the same order on every step.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam {
            learning_rate,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            epsilon: ADAM_EPSILON,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn steps_taken(&self) -> i32 {
        self.t
    }

    /// One update of every `(parameter, gradient)` pair.
    pub fn step<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a mut f64, f64)>,
    {
        self.t = self.t.saturating_add(1);
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);
        let lr_t = self.learning_rate * bias2.sqrt() / bias1;

        for (idx, (param, grad)) in pairs.into_iter().enumerate() {
            if idx >= self.m.len() {
                self.m.push(0.0);
                self.v.push(0.0);
            }
            let m = &mut self.m[idx];
            let v = &mut self.v[idx];
            *m = self.beta1 * *m + (1.0 - self.beta1) * grad;
            *v = self.beta2 * *v + (1.0 - self.beta2) * grad * grad;
            *param -= lr_t * *m / (v.sqrt() + self.epsilon);
        }
    }
}
