// aperture_core/src/models/mod.rs

pub mod camera;
pub mod dynamics;
pub mod feature;
