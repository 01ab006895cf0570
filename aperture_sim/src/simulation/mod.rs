// aperture_sim/src/simulation/mod.rs

pub mod config;
pub mod core;
pub mod history;
pub mod runner;
pub mod sweep;
