// aperture_sim/src/simulation/runner.rs

//! The fixed-step loop.
//!
//! Each step runs, in order:
//! 1. the nominal controller at `t = step * dt`,
//! 2. the barrier model for every feature,
//! 3. the safety filter (or the fallback policy when it fails),
//! 4. integration of position, attitude and features over `dt`,
//! 5. the snapshot for the step.

use aperture_core::kinematics::integrate_attitude;
use aperture_core::prelude::*;
use nalgebra::{DVector, Vector3};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, SimulationError};
use crate::simulation::config::structs::{FallbackPolicy, ScenarioConfig};
use crate::simulation::core::app_state::RunStatus;
use crate::simulation::core::state::SimulationState;
use crate::simulation::history::{RunFailure, RunHistory, Snapshot, StepStatus};

/// The result of one successful step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: SimulationState,
    pub snapshot: Snapshot,
}

/// Everything about a run that does not change from step to step.
#[derive(Debug)]
pub struct Simulation {
    pub dt: f64,
    pub steps: usize,
    pub mode: ControlMode,
    pub filter_enabled: bool,
    pub fallback: FallbackPolicy,
    pub max_consecutive_failures: usize,
    pub euler_sequence: EulerSequence,
    pub integrator: IntegratorKind,
    controller: Box<dyn NominalController>,
    dynamics: SingleIntegrator,
    barrier: FovBarrier,
    filter: SafetyFilter,
    bounds: ActuatorBounds,
    initial_agent: AgentState,
    initial_features: Vec<Feature>,
}

impl Simulation {
    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        // --- 1. Camera & barrier ---
        let camera = CameraModel::new(config.camera.aperture, config.camera.boresight)?;
        let barrier = FovBarrier::new(camera, config.filter.alpha)
            .with_min_range(config.filter.min_feature_range);

        // --- 2. Nominal controller ---
        let controller = PdTrackingController::new(
            config.controller.trajectory.clone(),
            config.controller.kp.to_vector(),
            config.controller.kd.to_vector(),
        );

        // --- 3. Actuator bounds in the decision-vector layout ---
        let mode = config.filter.mode;
        let linear = config.filter.linear_limit.unwrap_or(f64::INFINITY);
        let angular = config.filter.angular_limit.unwrap_or(f64::INFINITY);
        let upper = match mode {
            ControlMode::Translational => DVector::from_element(3, linear),
            ControlMode::Full => DVector::from_iterator(
                6,
                std::iter::repeat(linear)
                    .take(3)
                    .chain(std::iter::repeat(angular).take(3)),
            ),
        };
        let bounds = ActuatorBounds::new(-upper.clone(), upper);

        // --- 4. Initial agent & features ---
        let agent_cfg = &config.agent;
        let mut initial_agent = AgentState::at_rest(
            agent_cfg.position,
            agent_cfg.euler_sequence.to_rotation(&agent_cfg.attitude),
        );
        initial_agent.angular_velocity = agent_cfg.angular_velocity;

        let initial_features = config
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let name = if f.name.is_empty() {
                    format!("feature_{i}")
                } else {
                    f.name.clone()
                };
                Feature::new(name, f.position, f.motion.clone())
            })
            .collect::<Vec<_>>();

        let steps = config.step_count();
        info!(
            steps,
            dt = config.simulation.dt,
            features = initial_features.len(),
            moving = initial_features.iter().filter(|f| f.is_moving()).count(),
            mode = ?mode,
            filter = config.filter.enabled,
            "Simulation configured"
        );

        Ok(Self {
            dt: config.simulation.dt,
            steps,
            mode,
            filter_enabled: config.filter.enabled,
            fallback: config.filter.fallback,
            max_consecutive_failures: config.filter.max_consecutive_failures,
            euler_sequence: agent_cfg.euler_sequence,
            integrator: config.simulation.integrator,
            controller: Box::new(controller),
            dynamics: SingleIntegrator,
            barrier,
            filter: SafetyFilter::new(config.filter.solver),
            bounds,
            initial_agent,
            initial_features,
        })
    }

    /// Replaces the nominal controller.
    pub fn with_controller(mut self, controller: Box<dyn NominalController>) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_filter_enabled(mut self, enabled: bool) -> Self {
        self.filter_enabled = enabled;
        self
    }

    pub fn barrier(&self) -> &FovBarrier {
        &self.barrier
    }

    pub fn bounds(&self) -> &ActuatorBounds {
        &self.bounds
    }

    pub fn initial_state(&self) -> SimulationState {
        SimulationState::new(
            self.initial_agent.clone(),
            self.initial_features.clone(),
            self.mode.control_dim(),
        )
    }

    /// Advances `state` by one step.
    pub fn step(&self, state: SimulationState) -> Result<StepOutcome, SimulationError> {
        if state.status.is_terminal() {
            return Err(SimulationError::Terminated(state.status));
        }

        let k = state.step;
        let t = state.time(self.dt);
        let mut diagnostics = Vec::new();

        // --- 1. Nominal command ---
        let nominal = self.controller.compute(t, &state.agent);
        let u_nom = nominal.to_control(self.mode);

        // --- 2. Barrier rows ---
        let evaluation = self
            .barrier
            .evaluate(&state.agent, &state.features, self.mode);
        diagnostics.extend(evaluation.diagnostics.iter().cloned());

        // --- 3. Safety filter ---
        let mut consecutive_failures = state.consecutive_failures;
        let (command, status) = if !self.filter_enabled {
            (u_nom.clone(), StepStatus::Unfiltered)
        } else {
            match self.filter.solve(&u_nom, &evaluation.rows, &self.bounds) {
                Ok(filtered) => {
                    consecutive_failures = 0;
                    let status = if filtered.intervened() {
                        StepStatus::Filtered {
                            active_features: filtered.active_constraints,
                            iterations: filtered.iterations,
                        }
                    } else {
                        StepStatus::Nominal
                    };
                    (filtered.command, status)
                }
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.max_consecutive_failures {
                        return Err(SimulationError::FilterExhausted {
                            step: k,
                            consecutive: consecutive_failures,
                            source: err,
                        });
                    }
                    match &err {
                        FilterError::Infeasible { constraint } => warn!(
                            step = k,
                            consecutive = consecutive_failures,
                            constraint,
                            kind = "infeasible",
                            policy = ?self.fallback,
                            "Safety filter QP is infeasible, applying fallback"
                        ),
                        FilterError::SolverFailure(failure) => warn!(
                            step = k,
                            consecutive = consecutive_failures,
                            kind = "solver_failure",
                            policy = ?self.fallback,
                            "Safety filter solver failed ({}), applying fallback",
                            failure
                        ),
                    }
                    let command = match self.fallback {
                        FallbackPolicy::HoldLast => state.last_command.clone(),
                        FallbackPolicy::Zero => self
                            .bounds
                            .clamp(&DVector::zeros(self.mode.control_dim())),
                    };
                    let status = StepStatus::Fallback {
                        reason: err.to_string(),
                        consecutive: consecutive_failures,
                    };
                    (command, status)
                }
            }
        };

        // --- 4. Integrate ---
        let linear = Vector3::new(command[0], command[1], command[2]);
        let omega = match self.mode {
            ControlMode::Translational => state.agent.angular_velocity,
            ControlMode::Full => Vector3::new(command[3], command[4], command[5]),
        };

        let x = DVector::from_column_slice(state.agent.position.as_slice());
        let x_next = self
            .dynamics
            .propagate(&x, &command, t, self.dt, self.integrator.integrator());

        // A body that is not rotating keeps its attitude exactly.
        let attitude = if omega == Vector3::zeros() {
            state.agent.attitude
        } else {
            integrate_attitude(&state.agent.attitude, &omega, self.dt)
                .map_err(|source| SimulationError::DegenerateAttitude { step: k, source })?
        };

        let next_agent = AgentState {
            position: Vector3::new(x_next[0], x_next[1], x_next[2]),
            velocity: linear,
            attitude,
            angular_velocity: omega,
        };

        let t_next = (k + 1) as f64 * self.dt;
        let mut next_features = state.features.clone();
        for feature in &mut next_features {
            feature.advance_to(t_next);
        }

        let h_next = next_features
            .iter()
            .map(|f| self.barrier.barrier_value(&next_agent, &f.position))
            .collect::<Vec<_>>();

        // --- 5. Snapshot (pre-step state, post-step barrier) ---
        let decomposition = self.euler_sequence.decompose(&state.agent.attitude);
        if decomposition.gimbal_locked {
            debug!(step = k, "Euler extraction hit the singular configuration");
            diagnostics.push(Diagnostic::KinematicSingularity {
                sequence: self.euler_sequence,
                middle_angle: self.euler_sequence.middle_angle(&decomposition.angles),
            });
        }

        let m = state.agent.attitude.matrix();
        let snapshot = Snapshot {
            step: k,
            t,
            position: state.agent.position.into(),
            velocity: state.agent.velocity.into(),
            attitude: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            attitude_angles: decomposition.angles,
            nominal_command: u_nom.iter().copied().collect(),
            filtered_command: command.iter().copied().collect(),
            desired_position: nominal.desired_position.into(),
            per_feature_h: evaluation.h_values,
            per_feature_h_next: h_next,
            status,
            diagnostics,
        };

        let next_step = k + 1;
        let next_state = SimulationState {
            step: next_step,
            agent: next_agent,
            features: next_features,
            last_command: command,
            consecutive_failures,
            status: if next_step >= self.steps {
                RunStatus::Completed
            } else {
                RunStatus::Running
            },
        };

        Ok(StepOutcome {
            state: next_state,
            snapshot,
        })
    }

    /// Runs the whole horizon from the configured initial state.
    pub fn run(&self) -> RunHistory {
        self.run_from(self.initial_state())
    }

    /// Runs until the horizon is reached or a fatal error occurs.
    pub fn run_from(&self, mut state: SimulationState) -> RunHistory {
        let mut history = RunHistory {
            dt: self.dt,
            filter_enabled: self.filter_enabled,
            feature_names: state.features.iter().map(|f| f.name.clone()).collect(),
            status: state.status,
            failure: None,
            snapshots: Vec::with_capacity(self.steps.saturating_sub(state.step)),
        };

        if state.step >= self.steps && !state.status.is_terminal() {
            state.status = RunStatus::Completed;
        }

        while !state.status.is_terminal() {
            match self.step(state) {
                Ok(outcome) => {
                    history.snapshots.push(outcome.snapshot);
                    state = outcome.state;
                }
                Err(err) => {
                    error!("Run failed: {}", err);
                    history.status = RunStatus::Failed;
                    history.failure = Some(RunFailure::from(&err));
                    return history;
                }
            }
        }

        history.status = state.status;
        info!(
            steps = history.len(),
            min_h = ?history.min_h(),
            fallbacks = history.fallback_count(),
            "Run finished with status {:?}",
            history.status
        );
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::structs::FeatureConfig;

    fn scenario() -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.simulation.duration = 0.05;
        config.simulation.dt = 0.01;
        config.features.push(FeatureConfig {
            name: String::new(),
            position: Vector3::new(5.0, 0.0, 0.0),
            motion: FeatureMotion::Static,
        });
        config
    }

    #[test]
    fn state_machine_goes_from_initialized_to_completed() {
        let sim = Simulation::from_config(&scenario()).unwrap();
        let state = sim.initial_state();
        assert_eq!(state.status, RunStatus::Initialized);

        let outcome = sim.step(state).unwrap();
        assert_eq!(outcome.state.status, RunStatus::Running);
        assert_eq!(outcome.snapshot.step, 0);
        assert_eq!(outcome.snapshot.t, 0.0);

        let history = sim.run_from(outcome.state);
        assert_eq!(history.status, RunStatus::Completed);
        assert_eq!(history.len(), 4);
        assert_eq!(history.feature_names, vec!["feature_0".to_string()]);
    }

    #[test]
    fn terminal_states_are_final() {
        let sim = Simulation::from_config(&scenario()).unwrap();
        let mut state = sim.initial_state();
        state.status = RunStatus::Completed;
        assert_eq!(
            sim.step(state).unwrap_err(),
            SimulationError::Terminated(RunStatus::Completed)
        );
    }

    #[test]
    fn zero_horizon_completes_without_steps() {
        let mut config = scenario();
        config.simulation.duration = 0.0;
        let history = Simulation::from_config(&config).unwrap().run();
        assert_eq!(history.status, RunStatus::Completed);
        assert!(history.is_empty());
    }

    #[test]
    fn step_times_are_multiples_of_dt() {
        let mut config = scenario();
        config.simulation.duration = 1.0;
        config.simulation.dt = 0.1;
        let history = Simulation::from_config(&config).unwrap().run();
        assert_eq!(history.len(), 10);
        for (k, snapshot) in history.snapshots.iter().enumerate() {
            assert_eq!(snapshot.step, k);
            assert_eq!(snapshot.t, k as f64 * 0.1);
        }
    }

    #[test]
    fn full_mode_bounds_have_six_entries() {
        let mut config = scenario();
        config.filter.mode = ControlMode::Full;
        config.filter.linear_limit = Some(2.0);
        config.filter.angular_limit = Some(0.5);
        let sim = Simulation::from_config(&config).unwrap();
        assert_eq!(sim.bounds().upper.as_slice(), &[2.0, 2.0, 2.0, 0.5, 0.5, 0.5]);
        assert_eq!(sim.initial_state().last_command.len(), 6);
    }

    #[test]
    fn invalid_camera_is_a_config_error() {
        let mut config = scenario();
        config.camera.aperture = 2.0;
        assert!(matches!(
            Simulation::from_config(&config),
            Err(ConfigError::Kinematics(KinematicsError::InvalidAperture(_)))
        ));
    }
}
