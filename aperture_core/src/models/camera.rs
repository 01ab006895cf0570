// aperture_core/src/models/camera.rs

use nalgebra::{Rotation3, Unit, Vector3};

use crate::error::KinematicsError;

/// A camera whose field of view is a circular cone about its boresight.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    /// Half-angle of the visibility cone, in radians. Always in (0, π/2).
    aperture: f64,
    /// Boresight direction in the body frame.
    boresight_body: Unit<Vector3<f64>>,
}

impl CameraModel {
    pub fn new(aperture: f64, boresight_body: Vector3<f64>) -> Result<Self, KinematicsError> {
        if !(aperture > 0.0 && aperture < std::f64::consts::FRAC_PI_2) {
            return Err(KinematicsError::InvalidAperture(aperture));
        }
        if !boresight_body.iter().all(|c| c.is_finite()) {
            return Err(KinematicsError::InvalidBoresight);
        }
        let boresight_body =
            Unit::try_new(boresight_body, 1e-12).ok_or(KinematicsError::InvalidBoresight)?;
        Ok(Self {
            aperture,
            boresight_body,
        })
    }

    pub fn aperture(&self) -> f64 {
        self.aperture
    }

    pub fn cos_aperture(&self) -> f64 {
        self.aperture.cos()
    }

    pub fn boresight_body(&self) -> &Unit<Vector3<f64>> {
        &self.boresight_body
    }

    /// `z = R * b`, the boresight expressed in the world frame.
    pub fn boresight_world(&self, attitude: &Rotation3<f64>) -> Vector3<f64> {
        attitude * self.boresight_body.into_inner()
    }
}

impl Default for CameraModel {
    /// A 30° half-angle camera looking along body +x.
    fn default() -> Self {
        Self {
            aperture: std::f64::consts::FRAC_PI_6,
            boresight_body: Vector3::x_axis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn boresight_is_normalized() {
        let cam = CameraModel::new(0.5, Vector3::new(0.0, 3.0, 4.0)).unwrap();
        assert_abs_diff_eq!(cam.boresight_body().norm(), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(cam.boresight_body().z, 0.8, epsilon = 1e-15);
    }

    #[test]
    fn rejects_bad_apertures_and_boresights() {
        assert_eq!(
            CameraModel::new(0.0, Vector3::x()),
            Err(KinematicsError::InvalidAperture(0.0))
        );
        assert!(CameraModel::new(FRAC_PI_2, Vector3::x()).is_err());
        assert!(CameraModel::new(f64::NAN, Vector3::x()).is_err());
        assert_eq!(
            CameraModel::new(0.3, Vector3::zeros()),
            Err(KinematicsError::InvalidBoresight)
        );
    }

    #[test]
    fn boresight_world_follows_attitude() {
        let cam = CameraModel::default();
        let yaw_90 = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        assert_abs_diff_eq!(cam.boresight_world(&yaw_90), Vector3::y(), epsilon = 1e-15);
    }
}
