// aperture_core/src/safety/mod.rs

//! The per-step safety filter: barrier rows from the camera geometry, a small dense
//! QP solver, and the filter that ties the two together.

pub mod barrier;
pub mod filter;
pub mod qp;
