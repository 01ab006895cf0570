// aperture_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::control::NominalController;
pub use crate::models::dynamics::Dynamics;
pub use crate::utils::integrators::Integrator;

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::diagnostics::Diagnostic;
pub use crate::error::{FilterError, KinematicsError, SolverFailure};
pub use crate::kinematics::rotation::{EulerAngles, EulerDecomposition, EulerSequence};
pub use crate::models::camera::CameraModel;
pub use crate::models::feature::{Feature, FeatureMotion};
pub use crate::types::{AgentState, Control, ControlMode, State};

// --- Algorithms ---
pub use crate::control::pd::PdTrackingController;
pub use crate::control::trajectory::{AxisTrajectory, SinusoidTerm, SinusoidalTrajectory};
pub use crate::control::NominalCommand;
pub use crate::safety::barrier::{BarrierEvaluation, ConstraintRow, FovBarrier};
pub use crate::safety::filter::{ActuatorBounds, FilteredCommand, SafetyFilter};
pub use crate::safety::qp::{QpSettings, QpSolution, QuadraticProgram};

// --- Concrete Model Implementations ---
pub use crate::models::dynamics::SingleIntegrator;
pub use crate::utils::integrators::{IntegratorKind, RK1, RK4};
