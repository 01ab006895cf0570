// aperture_core/src/kinematics/mod.rs

pub mod rotation;

pub use rotation::{
    angles_to_matrix, integrate_attitude, matrix_to_angles, reorthonormalize, EulerAngles,
    EulerDecomposition, EulerSequence,
};
