// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::{Array1, Array2};

/// Compartment fractions of the population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SirState {
    pub s: f64,
    pub i: f64,
    pub r: f64,
}

impl SirState {
    pub fn new(s: f64, i: f64, r: f64) -> Self {
        SirState { s, i, r }
    }

    pub fn total(&self) -> f64 {
        self.s + self.i + self.r
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.s, self.i, self.r]
    }

    pub fn from_array(x: [f64; 3]) -> Self {
        SirState {
            s: x[0],
            i: x[1],
            r: x[2],
        }
    }
}

/// Per-run estimates, indexed `[time step, run]`.
/// Cells outside every freshness window a run was responsible for stay zero.
#[derive(Debug, Clone)]
pub struct EnsembleTables {
    pub s: Array2<f64>,
    pub i: Array2<f64>,
    pub r: Array2<f64>,
    pub u: Array2<f64>,
    pub beta: Array2<f64>,
    /// Wall time of the physics-informed stage [s].
    pub time_ode: Array2<f64>,
    /// Wall time of the data-regression stage [s]; zero for the joint variant.
    pub time_data: Array2<f64>,
    /// Final training loss.
    pub loss: Array2<f64>,
}

impl EnsembleTables {
    pub fn new(n_steps: usize, num_runs: usize) -> Self {
        let z = || Array2::zeros((n_steps, num_runs));
        EnsembleTables {
            s: z(),
            i: z(),
            r: z(),
            u: z(),
            beta: z(),
            time_ode: z(),
            time_data: z(),
            loss: z(),
        }
    }

    pub fn num_runs(&self) -> usize {
        self.s.ncols()
    }
}

/// Mean and spread of one quantity per time step.
#[derive(Debug, Clone)]
pub struct MeanStd {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl MeanStd {
    pub fn zeros(n_steps: usize) -> Self {
        MeanStd {
            mean: Array1::zeros(n_steps),
            std: Array1::zeros(n_steps),
        }
    }
}

/// Aggregated estimates consumed by the controller and written to disk.
#[derive(Debug, Clone)]
pub struct AggregateSeries {
    pub s: MeanStd,
    pub i: MeanStd,
    pub r: MeanStd,
    pub u: MeanStd,
    pub beta: MeanStd,
    pub time_ode: Array1<f64>,
    pub time_data: Array1<f64>,
    pub loss: Array1<f64>,
}

impl AggregateSeries {
    pub fn new(n_steps: usize) -> Self {
        AggregateSeries {
            s: MeanStd::zeros(n_steps),
            i: MeanStd::zeros(n_steps),
            r: MeanStd::zeros(n_steps),
            u: MeanStd::zeros(n_steps),
            beta: MeanStd::zeros(n_steps),
            time_ode: Array1::zeros(n_steps),
            time_data: Array1::zeros(n_steps),
            loss: Array1::zeros(n_steps),
        }
    }
}

/// Complete history of one closed-loop experiment.
/// Allocated once for the whole horizon; entries are only ever overwritten.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub s_true: Array1<f64>,
    pub i_true: Array1<f64>,
    pub r_true: Array1<f64>,
    /// Normalised noisy infection counts.
    pub i_observation: Array1<f64>,
    /// Applied control, piecewise constant over blocks of `ts` steps.
    pub u_used: Array1<f64>,
    pub runs: EnsembleTables,
    pub aggregate: AggregateSeries,
}

impl SimulationState {
    /// Zeroed state for time steps `0..=tf_int`.
    pub fn new(tf_int: usize, num_runs: usize) -> Self {
        let n_steps = tf_int + 1;
        SimulationState {
            s_true: Array1::zeros(n_steps),
            i_true: Array1::zeros(n_steps),
            r_true: Array1::zeros(n_steps),
            i_observation: Array1::zeros(n_steps),
            u_used: Array1::zeros(n_steps),
            runs: EnsembleTables::new(n_steps, num_runs),
            aggregate: AggregateSeries::new(n_steps),
        }
    }

    pub fn n_steps(&self) -> usize {
        self.s_true.len()
    }

    pub fn true_state(&self, k: usize) -> SirState {
        SirState::new(self.s_true[k], self.i_true[k], self.r_true[k])
    }

    pub fn set_true_state(&mut self, k: usize, state: SirState) {
        self.s_true[k] = state.s;
        self.i_true[k] = state.i;
        self.r_true[k] = state.r;
    }
}
