// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Epi Control
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Closed-loop estimation and control.
//!
//! The driver advances the simulated outbreak, periodically refits the
//! estimator ensemble, and applies the first block of the receding-horizon
//! plan computed from the aggregated estimate.

pub mod driver;
pub mod ensemble;
pub mod mpc;
pub mod output;
