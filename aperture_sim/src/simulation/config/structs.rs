// aperture_sim/src/simulation/config/structs.rs

use aperture_core::prelude::{
    ControlMode, EulerAngles, EulerSequence, FeatureMotion, IntegratorKind, QpSettings,
    SinusoidalTrajectory,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::simulation::config::serde_helpers;

// =========================================================================
// == Top-Level Scenario Configuration ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a scenario TOML file. Every section has
/// defaults, so an empty file is a valid scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: SimulationSection,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    // The TOML has `[[features]]`, which becomes a Vec of FeatureConfig structs.
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in a scenario file.
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// Horizon `T` in seconds.
    pub duration: f64,
    /// Fixed step `dt` in seconds.
    pub dt: f64,
    /// Optional seed for sweeps. Single runs are deterministic without one.
    pub seed: Option<u64>,
    pub integrator: IntegratorKind,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            duration: 100.0,
            dt: 0.001,
            seed: None,
            integrator: IntegratorKind::Euler,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Initial world position.
    pub position: Vector3<f64>,
    /// Initial attitude as `[roll, pitch, yaw]` in degrees, composed in `euler_sequence`.
    #[serde(with = "serde_helpers::euler_deg")]
    pub attitude: EulerAngles,
    pub euler_sequence: EulerSequence,
    /// Body-frame angular velocity in rad/s. Held constant in translational mode.
    pub angular_velocity: Vector3<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// Half-angle of the visibility cone, in degrees in the file.
    #[serde(with = "serde_helpers::degrees")]
    pub aperture: f64,
    /// Boresight direction in the body frame. Normalized on load.
    pub boresight: Vector3<f64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            aperture: std::f64::consts::FRAC_PI_6,
            boresight: Vector3::x(),
        }
    }
}

/// A diagonal gain written either as one number or as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gain {
    Scalar(f64),
    PerAxis([f64; 3]),
}

impl Gain {
    pub fn to_vector(self) -> Vector3<f64> {
        match self {
            Gain::Scalar(k) => Vector3::repeat(k),
            Gain::PerAxis([x, y, z]) => Vector3::new(x, y, z),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub kp: Gain,
    pub kd: Gain,
    pub trajectory: SinusoidalTrajectory,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: Gain::Scalar(1.0),
            kd: Gain::Scalar(0.1),
            trajectory: SinusoidalTrajectory::default(),
        }
    }
}

/// What to apply when the safety filter cannot produce a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Re-apply the previous step's command.
    #[default]
    HoldLast,
    /// Apply the zero command (clamped into the actuator bounds).
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub enabled: bool,
    pub mode: ControlMode,
    /// Class-K gain `alpha` in `h_dot + alpha h >= 0`.
    pub alpha: f64,
    /// Symmetric bound on every linear velocity component. Unbounded when absent.
    pub linear_limit: Option<f64>,
    /// Symmetric bound on every body rate component (full mode only).
    pub angular_limit: Option<f64>,
    /// Features closer than this are dropped for the step.
    pub min_feature_range: f64,
    pub fallback: FallbackPolicy,
    /// A run fails once more than this many steps in a row needed the fallback.
    pub max_consecutive_failures: usize,
    pub solver: QpSettings,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ControlMode::Translational,
            alpha: 1.0,
            linear_limit: None,
            angular_limit: None,
            min_feature_range: 1e-6,
            fallback: FallbackPolicy::HoldLast,
            max_consecutive_failures: 10,
            solver: QpSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    #[serde(default)]
    pub name: String,
    /// World position at `t = 0` (the oscillation centre for sinusoidal motion).
    pub position: Vector3<f64>,
    #[serde(default)]
    pub motion: FeatureMotion,
}
