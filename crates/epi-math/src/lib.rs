//! Mathematical primitives for the epidemic estimation-control loop.

pub mod nlp;
pub mod ode;
pub mod stats;
