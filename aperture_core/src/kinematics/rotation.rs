// aperture_core/src/kinematics/rotation.rs

//! Euler angles, rotation matrices and attitude propagation.
//!
//! Every rotation here maps body-frame vectors into the world frame. The Euler
//! sequence is always spelled out as a typed value; the free functions
//! [`angles_to_matrix`] / [`matrix_to_angles`] use the default
//! [`EulerSequence::Zxy`], i.e. `R = Rz(yaw) * Rx(roll) * Ry(pitch)`.

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::KinematicsError;

/// Below this value of |cos(middle angle)| the decomposition takes the singular branch.
pub const GIMBAL_LOCK_THRESHOLD: f64 = 1e-9;

/// How far `RᵀR` may drift from identity before re-projection is refused.
pub const ATTITUDE_DRIFT_TOLERANCE: f64 = 1e-6;

/// Roll (about x), pitch (about y) and yaw (about z), in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// The order in which the three elementary rotations are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EulerSequence {
    /// `R = Rz(yaw) * Rx(roll) * Ry(pitch)`. Singular at roll = ±π/2.
    #[default]
    Zxy,
    /// Aerospace yaw-pitch-roll, `R = Rz(yaw) * Ry(pitch) * Rx(roll)`. Singular at pitch = ±π/2.
    Zyx,
}

/// The result of decomposing a rotation into Euler angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerDecomposition {
    pub angles: EulerAngles,
    /// True when the middle angle was at ±π/2 and the limit convention was applied:
    /// the last-applied angle is reported as zero and its share is folded into yaw.
    pub gimbal_locked: bool,
}

impl EulerSequence {
    /// Builds the body-to-world rotation for `angles` in this sequence.
    pub fn to_rotation(self, angles: &EulerAngles) -> Rotation3<f64> {
        let rx = x_axis_rotation(angles.roll);
        let ry = y_axis_rotation(angles.pitch);
        let rz = z_axis_rotation(angles.yaw);
        let m = match self {
            EulerSequence::Zxy => rz * rx * ry,
            EulerSequence::Zyx => rz * ry * rx,
        };
        Rotation3::from_matrix_unchecked(m)
    }

    /// The angle of the middle rotation, which is where the sequence degenerates.
    pub fn middle_angle(self, angles: &EulerAngles) -> f64 {
        match self {
            EulerSequence::Zxy => angles.roll,
            EulerSequence::Zyx => angles.pitch,
        }
    }

    /// Extracts Euler angles from `rotation`.
    ///
    /// Away from the singularity every angle comes from an `atan2`, so the result is
    /// in (-π, π] for roll/yaw (Zxy) and the middle angle lies in [-π/2, π/2].
    /// At the singularity the rotation only determines the sum (or difference) of
    /// the first and last angles; the last-applied angle is fixed to zero.
    pub fn decompose(self, rotation: &Rotation3<f64>) -> EulerDecomposition {
        let m = rotation.matrix();
        match self {
            EulerSequence::Zxy => {
                // Row 2 is [-cos(roll) sin(pitch), sin(roll), cos(roll) cos(pitch)].
                let cos_roll = m[(2, 0)].hypot(m[(2, 2)]);
                let roll = m[(2, 1)].atan2(cos_roll);
                if cos_roll > GIMBAL_LOCK_THRESHOLD {
                    EulerDecomposition {
                        angles: EulerAngles {
                            roll,
                            pitch: (-m[(2, 0)]).atan2(m[(2, 2)]),
                            yaw: (-m[(0, 1)]).atan2(m[(1, 1)]),
                        },
                        gimbal_locked: false,
                    }
                } else {
                    // With pitch = 0, row 0 is [cos(yaw), 0, sin(roll) sin(yaw)].
                    let sin_roll = m[(2, 1)].signum();
                    EulerDecomposition {
                        angles: EulerAngles {
                            roll,
                            pitch: 0.0,
                            yaw: (sin_roll * m[(0, 2)]).atan2(m[(0, 0)]),
                        },
                        gimbal_locked: true,
                    }
                }
            }
            EulerSequence::Zyx => {
                // Row 2 is [-sin(pitch), cos(pitch) sin(roll), cos(pitch) cos(roll)].
                let cos_pitch = m[(0, 0)].hypot(m[(1, 0)]);
                let pitch = (-m[(2, 0)]).atan2(cos_pitch);
                if cos_pitch > GIMBAL_LOCK_THRESHOLD {
                    EulerDecomposition {
                        angles: EulerAngles {
                            roll: m[(2, 1)].atan2(m[(2, 2)]),
                            pitch,
                            yaw: m[(1, 0)].atan2(m[(0, 0)]),
                        },
                        gimbal_locked: false,
                    }
                } else {
                    // With roll = 0, column 1 is [-sin(yaw), cos(yaw), 0].
                    EulerDecomposition {
                        angles: EulerAngles {
                            roll: 0.0,
                            pitch,
                            yaw: (-m[(0, 1)]).atan2(m[(1, 1)]),
                        },
                        gimbal_locked: true,
                    }
                }
            }
        }
    }
}

// --- Elementary rotations ---

pub fn x_axis_rotation(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

pub fn y_axis_rotation(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

pub fn z_axis_rotation(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// `R = Rz(yaw) * Rx(roll) * Ry(pitch)`.
pub fn angles_to_matrix(roll: f64, pitch: f64, yaw: f64) -> Rotation3<f64> {
    EulerSequence::Zxy.to_rotation(&EulerAngles::new(roll, pitch, yaw))
}

/// Inverse of [`angles_to_matrix`]; see [`EulerSequence::decompose`] for the
/// convention used at roll = ±π/2.
pub fn matrix_to_angles(rotation: &Rotation3<f64>) -> EulerDecomposition {
    EulerSequence::Zxy.decompose(rotation)
}

/// Projects a nearly-orthonormal matrix back onto SO(3) (closest rotation in the
/// Frobenius norm, via SVD).
///
/// Fails if the input is too far from a rotation for the projection to be
/// meaningful, or if it is a reflection.
pub fn reorthonormalize(m: &Matrix3<f64>) -> Result<Rotation3<f64>, KinematicsError> {
    let orthogonality_error = (m.transpose() * m - Matrix3::identity()).norm();
    let determinant = m.determinant();
    let degenerate = KinematicsError::DegenerateAttitude {
        orthogonality_error,
        determinant,
    };

    if !orthogonality_error.is_finite()
        || orthogonality_error > ATTITUDE_DRIFT_TOLERANCE
        || determinant <= 0.0
    {
        return Err(degenerate);
    }

    let svd = m.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(degenerate);
    };
    let projected = u * v_t;
    if projected.determinant() <= 0.0 {
        return Err(degenerate);
    }
    Ok(Rotation3::from_matrix_unchecked(projected))
}

/// Advances the attitude by a constant body-frame angular velocity over `dt`
/// using the exponential map, `R <- R * exp([omega]x dt)`, then re-projects onto SO(3).
pub fn integrate_attitude(
    attitude: &Rotation3<f64>,
    omega_body: &Vector3<f64>,
    dt: f64,
) -> Result<Rotation3<f64>, KinematicsError> {
    let increment = Rotation3::new(omega_body * dt);
    reorthonormalize((attitude * increment).matrix())
}
