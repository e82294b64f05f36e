// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Epi Ml
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Physics-informed estimators of the SIR state and transmission rate.
//!
//! Every fit constructs fresh networks from its own seed; nothing is shared
//! between fits.

pub mod collocation;
pub mod estimator;
pub mod joint;
pub mod mlp;
pub mod optim;
pub mod pinn;
pub mod two_stage;
