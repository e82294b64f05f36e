// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Tolerance for S + I + R = 1.
pub const CONSERVATION_TOL: f64 = 1e-9;

/// Seed of the observation noise stream.
pub const OBSERVATION_SEED: u64 = 3407;

/// Adam first-moment decay (Keras default).
pub const ADAM_BETA1: f64 = 0.9;

/// Adam second-moment decay (Keras default).
pub const ADAM_BETA2: f64 = 0.999;

/// Adam denominator epsilon (Keras default).
pub const ADAM_EPSILON: f64 = 1e-7;

/// Label of the joint physics-informed estimator in output paths.
pub const JOINT_LABEL: &str = "PINNs";

/// Label of the two-stage estimator in output paths.
pub const TWO_STAGE_LABEL: &str = "SI-PINNs";
