// aperture_sim/src/simulation/config/mod.rs

//! This module handles loading and validating scenario configuration from disk.
//!
//! A scenario is a TOML file merged with `APERTURE_`-prefixed environment variables
//! (nested keys separated by `__`, e.g. `APERTURE_FILTER__ALPHA=5`).

mod serde_helpers;
pub mod structs;

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::{debug, info};

use crate::error::ConfigError;
pub use structs::{FeatureConfig, ScenarioConfig};

/// Loads, overrides and validates the scenario at `path`.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, ConfigError> {
    info!("Loading scenario from: {}", path.display());
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let config: ScenarioConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("APERTURE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::Parse {
            origin: path.display().to_string(),
            source: Box::new(e),
        })?;

    config.validate()?;
    debug!(features = config.features.len(), "scenario loaded");
    Ok(config)
}

/// Parses and validates a scenario from TOML text. No environment overrides apply.
pub fn load_scenario_str(text: &str) -> Result<ScenarioConfig, ConfigError> {
    let config: ScenarioConfig = Figment::new()
        .merge(Toml::string(text))
        .extract()
        .map_err(|e| ConfigError::Parse {
            origin: "<string>".to_string(),
            source: Box::new(e),
        })?;
    config.validate()?;
    Ok(config)
}

impl ScenarioConfig {
    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(sim.dt.is_finite() && sim.dt > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "simulation.dt must be positive, got {}",
                sim.dt
            )));
        }
        if !(sim.duration.is_finite() && sim.duration >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "simulation.duration must be non-negative, got {}",
                sim.duration
            )));
        }

        let filter = &self.filter;
        if !(filter.alpha.is_finite() && filter.alpha > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "filter.alpha must be positive, got {}",
                filter.alpha
            )));
        }
        // The continuous-time row only guarantees `h_next >= 0` under forward Euler
        // when `1 - alpha * dt` stays positive.
        if filter.alpha * sim.dt >= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "filter.alpha * simulation.dt must be below 1, got {} * {} = {}",
                filter.alpha,
                sim.dt,
                filter.alpha * sim.dt
            )));
        }
        for (name, limit) in [
            ("linear_limit", filter.linear_limit),
            ("angular_limit", filter.angular_limit),
        ] {
            if let Some(limit) = limit {
                if !(limit > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "filter.{name} must be positive, got {limit}"
                    )));
                }
            }
        }
        if !(filter.min_feature_range >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "filter.min_feature_range must be non-negative, got {}",
                filter.min_feature_range
            )));
        }
        if filter.solver.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "filter.solver.max_iterations must be at least 1".to_string(),
            ));
        }

        let controller = &self.controller;
        let (kp, kd) = (controller.kp.to_vector(), controller.kd.to_vector());
        if !kp.iter().chain(kd.iter()).all(|k| k.is_finite()) {
            return Err(ConfigError::Invalid("controller gains must be finite".to_string()));
        }

        for (i, feature) in self.features.iter().enumerate() {
            if !feature.position.iter().all(|c| c.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "feature {i} ('{}') has a non-finite position",
                    feature.name
                )));
            }
        }
        Ok(())
    }

    /// Number of fixed steps in the horizon, `round(T / dt)`.
    pub fn step_count(&self) -> usize {
        (self.simulation.duration / self.simulation.dt).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::prelude::{ControlMode, EulerSequence, IntegratorKind};
    use nalgebra::Vector3;

    #[test]
    fn empty_scenario_uses_defaults() {
        let config = load_scenario_str("").unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.simulation.duration, 100.0);
        assert_eq!(config.simulation.dt, 0.001);
        assert_eq!(config.step_count(), 100_000);
        assert_eq!(config.camera.boresight, Vector3::x());
        assert_eq!(config.agent.euler_sequence, EulerSequence::Zxy);
        assert_eq!(config.filter.mode, ControlMode::Translational);
        assert_eq!(config.simulation.integrator, IntegratorKind::Euler);
        assert!(config.features.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            load_scenario_str("[simulation]\ndt = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            load_scenario_str("[filter]\nalpha = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            load_scenario_str("[filter]\nlinear_limit = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            load_scenario_str("[camera]\nfov = 30"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn barrier_rate_must_fit_inside_one_step() {
        let err = load_scenario_str("[simulation]\ndt = 0.01\n[filter]\nalpha = 250.0").unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("alpha * simulation.dt")),
            other => panic!("expected an invalid config, got {other:?}"),
        }
        assert!(load_scenario_str("[simulation]\ndt = 0.01\n[filter]\nalpha = 150.0").is_err());
        assert!(load_scenario_str("[simulation]\ndt = 0.01\n[filter]\nalpha = 99.0").is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_scenario(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn step_count_rounds() {
        let mut config = ScenarioConfig::default();
        config.simulation.duration = 0.5;
        config.simulation.dt = 0.01;
        assert_eq!(config.step_count(), 50);
        config.simulation.duration = 0.0;
        assert_eq!(config.step_count(), 0);
    }
}
