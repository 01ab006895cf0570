// aperture_core/src/utils/integrators.rs

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// A one-step ODE integrator for `x_dot = f(x, t)`.
pub trait Integrator<T> {
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T>;
}

// Runge-Kutta methods

/// Forward Euler. This is the scheme the safety guarantee is stated against:
/// `p <- p + u * dt`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RK1;

impl<T> Integrator<T> for RK1
where
    T: Copy + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt: T = tf - t0;
        x0.clone() + dt * func(x0, t0)
    }
}

/// Classic fourth-order Runge-Kutta.
#[derive(Debug, Default, Clone, Copy)]
pub struct RK4;

impl<T> Integrator<T> for RK4
where
    T: Copy + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        let two = T::one() + T::one();
        let mid = t0 + dt / two;
        // x0 + scale * slope, the trial points of the four stages.
        let trial = |slope: &DVector<T>, scale: T| x0.clone() + scale * slope.clone();

        let k1 = func(x0, t0);
        let k2 = func(&trial(&k1, dt / two), mid);
        let k3 = func(&trial(&k2, dt / two), mid);
        let k4 = func(&trial(&k3, dt), tf);

        let weighted = k1 + two * k2 + two * k3 + k4;
        trial(&weighted, dt / (two + two + two))
    }
}

/// Config-facing selector for the integrators above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    #[default]
    Euler,
    Rk4,
}

impl IntegratorKind {
    pub fn integrator(self) -> &'static dyn Integrator<f64> {
        match self {
            IntegratorKind::Euler => &RK1,
            IntegratorKind::Rk4 => &RK4,
        }
    }
}
