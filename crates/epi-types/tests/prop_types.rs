// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Property-Based Tests (proptest) for epi-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for epi-types using proptest.
//!
//! Covers: SimulationState allocation, control block count,
//! configuration serialization roundtrip.

use epi_types::config::{ControlParams, ExperimentConfig};
use epi_types::state::SimulationState;
use proptest::prelude::*;

proptest! {
    /// Every table spans the full horizon and the configured number of runs.
    #[test]
    fn simulation_state_dimensions(tf in 1usize..200, runs in 1usize..16) {
        let state = SimulationState::new(tf, runs);
        prop_assert_eq!(state.n_steps(), tf + 1);
        prop_assert_eq!(state.runs.s.dim(), (tf + 1, runs));
        prop_assert_eq!(state.runs.u.dim(), (tf + 1, runs));
        prop_assert_eq!(state.aggregate.s.mean.len(), tf + 1);
        prop_assert!(state.i_observation.iter().all(|&v| v == 0.0));
    }

    /// Control blocks cover the whole prediction horizon with no spare block.
    #[test]
    fn control_blocks_cover_horizon(n_pri in 1usize..100, ts in 1usize..20) {
        let params = ControlParams { n_pri, ts, ..ControlParams::default() };
        let blocks = params.control_blocks();
        prop_assert!(blocks * ts >= n_pri);
        prop_assert!((blocks - 1) * ts < n_pri);
    }

    /// JSON roundtrip preserves the fields the driver depends on.
    #[test]
    fn config_json_roundtrip(ts in 1usize..10, start in 0usize..20, span in 0usize..20, runs in 1usize..12) {
        let mut cfg = ExperimentConfig::default();
        cfg.control.ts = ts;
        cfg.control.start_control = start;
        cfg.control.end_control = start + span;
        cfg.runs.num_runs = runs;

        let json = serde_json::to_string(&cfg).unwrap();
        let back: ExperimentConfig = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.control.ts, ts);
        prop_assert_eq!(back.control.start_control, start);
        prop_assert_eq!(back.control.end_control, start + span);
        prop_assert_eq!(back.runs.num_runs, runs);
        prop_assert!(back.validate().is_ok());
    }
}
