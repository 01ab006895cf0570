// aperture_core/src/lib.rs

// This file defines the public modules of the library. Nothing in here knows
// about configuration files, the run loop or the CLI; that lives in `aperture_sim`.
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod kinematics;
pub mod models;
pub mod prelude;
pub mod safety;
pub mod types;
pub mod utils;
