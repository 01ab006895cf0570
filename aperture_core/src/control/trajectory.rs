// aperture_core/src/control/trajectory.rs

//! Closed-form desired paths made of sums of sinusoids.
//!
//! Each axis is `offset + sum_k amplitude_k * sin(frequency_k * t + phase_k)` with
//! `frequency` in rad/s. Velocities are the analytic derivative, so the PD law never
//! needs to difference positions.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinusoidTerm {
    pub amplitude: f64,
    /// Angular frequency in rad/s.
    pub frequency: f64,
    #[serde(default)]
    pub phase: f64,
}

impl SinusoidTerm {
    pub fn new(amplitude: f64, frequency: f64, phase: f64) -> Self {
        Self {
            amplitude,
            frequency,
            phase,
        }
    }

    pub fn value(&self, t: f64) -> f64 {
        self.amplitude * (self.frequency * t + self.phase).sin()
    }

    pub fn rate(&self, t: f64) -> f64 {
        self.amplitude * self.frequency * (self.frequency * t + self.phase).cos()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisTrajectory {
    pub offset: f64,
    pub terms: Vec<SinusoidTerm>,
}

impl AxisTrajectory {
    pub fn constant(offset: f64) -> Self {
        Self {
            offset,
            terms: Vec::new(),
        }
    }

    pub fn single(term: SinusoidTerm) -> Self {
        Self {
            offset: 0.0,
            terms: vec![term],
        }
    }

    pub fn position(&self, t: f64) -> f64 {
        self.offset + self.terms.iter().map(|term| term.value(t)).sum::<f64>()
    }

    pub fn velocity(&self, t: f64) -> f64 {
        self.terms.iter().map(|term| term.rate(t)).sum()
    }
}

/// Independent sinusoid sums on the world x, y and z axes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinusoidalTrajectory {
    pub x: AxisTrajectory,
    pub y: AxisTrajectory,
    pub z: AxisTrajectory,
}

impl SinusoidalTrajectory {
    pub fn position(&self, t: f64) -> Vector3<f64> {
        Vector3::new(self.x.position(t), self.y.position(t), self.z.position(t))
    }

    pub fn velocity(&self, t: f64) -> Vector3<f64> {
        Vector3::new(self.x.velocity(t), self.y.velocity(t), self.z.velocity(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn lissajous() -> SinusoidalTrajectory {
        SinusoidalTrajectory {
            x: AxisTrajectory {
                offset: 1.0,
                terms: vec![SinusoidTerm::new(2.0, 1.0, 0.0)],
            },
            y: AxisTrajectory {
                offset: 0.0,
                terms: vec![
                    SinusoidTerm::new(1.0, 2.0, PI / 2.0),
                    SinusoidTerm::new(0.5, 3.0, 0.0),
                ],
            },
            z: AxisTrajectory::constant(-3.0),
        }
    }

    #[test]
    fn position_at_zero_is_offset_plus_phase_terms() {
        let p = lissajous().position(0.0);
        assert_abs_diff_eq!(p, Vector3::new(1.0, 1.0, -3.0), epsilon = 1e-12);
    }

    #[test]
    fn velocity_is_the_derivative_of_position() {
        let traj = lissajous();
        let h = 1e-6;
        for &t in &[0.0, 0.3, 1.7, 4.2] {
            let fd = (traj.position(t + h) - traj.position(t - h)) / (2.0 * h);
            assert_abs_diff_eq!(traj.velocity(t), fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn empty_axis_is_stationary() {
        let axis = AxisTrajectory::default();
        assert_eq!(axis.position(10.0), 0.0);
        assert_eq!(axis.velocity(10.0), 0.0);
    }
}
