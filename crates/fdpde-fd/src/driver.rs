//! Backward (or forward) time-stepping driver.
//!
//! [`step_back`] walks a [`Scheme`] from a start time to an end time,
//! choosing each step's `dt` from a [`StepSizeSpec`] and stopping once it
//! lands within `tolerance` of the end time. The grid is allowed to change
//! between steps — a scheme is free to return a different [`Grid`] than the
//! one it was handed, e.g. to locally refine near a discontinuity — so the
//! driver always re-reads the grid the previous step produced rather than
//! assuming it is fixed.
//!
//! Mirrors the teacher's `Fdm1dSolver::price` time loop, generalized from a
//! fixed step count and a single in-place `Array1` to a pluggable step-size
//! policy and an arbitrary-rank value tensor.
//!
//! [`Driver`] wraps the same loop with an opt-in finiteness check, off by
//! default; [`step_back`] is the zero-configuration shorthand for
//! `Driver::new().step_back(...)`.

use fdpde_core::errors::{Error, Result};
use fdpde_core::{Real, Time};
use ndarray::ArrayD;

use crate::boundary::AxisBoundary;
use crate::coefficients::Evaluators;
use crate::grid::Grid;
use crate::schemes::Scheme;
use crate::shape::Shape;

/// How the driver picks each step's `dt`.
pub enum StepSizeSpec {
    /// Divide `end_time - start_time` evenly into `n` steps.
    NumSteps(usize),
    /// Use the same `dt` every step (its sign is taken from the overall
    /// direction of travel, not from the value supplied here).
    FixedDt(Real),
    /// Compute `dt` from the current time via an arbitrary callable —
    /// e.g. a policy that shortens steps near a kink in the terminal
    /// condition.
    Callable(Box<dyn Fn(Time) -> Real>),
}

impl StepSizeSpec {
    fn magnitude(&self, t: Time, start_time: Time, end_time: Time) -> Real {
        match self {
            StepSizeSpec::NumSteps(n) => (end_time - start_time).abs() / (*n).max(1) as Real,
            StepSizeSpec::FixedDt(dt) => dt.abs(),
            StepSizeSpec::Callable(f) => f(t).abs(),
        }
    }
}

/// The outcome of a [`step_back`] run.
pub struct StepResult {
    /// The value tensor at `time`.
    pub values: ArrayD<Real>,
    /// The grid `values` is defined on (may differ from the grid the run
    /// started with, if the scheme evolved it).
    pub grid: Grid,
    /// The time the run actually stopped at (within `tolerance` of the
    /// requested end time).
    pub time: Time,
    /// Number of scheme steps actually taken.
    pub steps_taken: usize,
}

/// Step a PDE from `start_time` to `end_time` (forward or backward,
/// inferred from their relative order) under `scheme`, re-evaluating
/// coefficients and boundary conditions as the scheme requires.
///
/// Stops once the running time lands within `tolerance` of `end_time`;
/// every step is clamped so it never overshoots. Returns
/// [`Error::NoProgress`] if the step-size policy ever yields a `dt` too
/// small to advance `t` (a zero-length final step is not an error — it
/// simply never runs). Equivalent to `Driver::new().step_back(...)` with the
/// [`NumericalInstability`](Error::NumericalInstability) diagnostic off — use
/// [`Driver`] directly to turn it on.
#[allow(clippy::too_many_arguments)]
pub fn step_back(
    start_time: Time,
    end_time: Time,
    grid: Grid,
    values: ArrayD<Real>,
    step_size: StepSizeSpec,
    evaluators: &Evaluators,
    boundary_conditions: &[AxisBoundary],
    shape: &Shape,
    scheme: &dyn Scheme,
    tolerance: Real,
) -> Result<StepResult> {
    Driver::new().step_back(
        start_time,
        end_time,
        grid,
        values,
        step_size,
        evaluators,
        boundary_conditions,
        shape,
        scheme,
        tolerance,
    )
}

/// Configuration for a [`step_back`] run. The only knob today is the
/// optional [`NumericalInstability`](Error::NumericalInstability) diagnostic,
/// off by default — mirroring the teacher's `Settings` singleton pattern of
/// a flag gating a check the core does not run unconditionally.
#[derive(Debug, Default, Clone, Copy)]
pub struct Driver {
    check_finite: bool,
}

impl Driver {
    /// A driver with every diagnostic off.
    pub fn new() -> Self {
        Self::default()
    }

    /// After every step, verify `V` contains only finite values, raising
    /// [`Error::NumericalInstability`] (naming the time of the offending
    /// step) the first time it does not.
    pub fn check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }

    /// Run the backward (or forward) time march described in [`step_back`],
    /// applying this driver's configured diagnostics after every step.
    #[allow(clippy::too_many_arguments)]
    pub fn step_back(
        &self,
        start_time: Time,
        end_time: Time,
        grid: Grid,
        values: ArrayD<Real>,
        step_size: StepSizeSpec,
        evaluators: &Evaluators,
        boundary_conditions: &[AxisBoundary],
        shape: &Shape,
        scheme: &dyn Scheme,
        tolerance: Real,
    ) -> Result<StepResult> {
        let sign: Real = if end_time >= start_time { 1.0 } else { -1.0 };
        let mut t = start_time;
        let mut grid = grid;
        let mut values = values;
        let mut steps_taken = 0usize;

        while (t - end_time).abs() > tolerance {
            let raw = step_size.magnitude(t, start_time, end_time);
            let mut dt = sign * raw;
            if sign > 0.0 && t + dt > end_time {
                dt = end_time - t;
            } else if sign < 0.0 && t + dt < end_time {
                dt = end_time - t;
            }
            if dt.abs() <= tolerance.min(1e-14) {
                return Err(Error::NoProgress { t });
            }

            let (t_next, grid_next, values_next) =
                scheme.step(t, dt, &grid, &values, evaluators, boundary_conditions, shape)?;
            t = t_next;
            grid = grid_next;
            values = values_next;
            steps_taken += 1;

            if self.check_finite && !values.iter().all(|v| v.is_finite()) {
                return Err(Error::NumericalInstability { t });
            }
        }

        Ok(StepResult {
            values,
            grid,
            time: t,
            steps_taken,
        })
    }
}

/// The default tolerance [`step_back`] is usually called with: a small
/// fraction of the overall time span, floored so a zero-length span (a
/// pathological `start_time == end_time` call) still has a usable
/// tolerance.
pub fn default_tolerance(start_time: Time, end_time: Time) -> Real {
    1e-9 * (end_time - start_time).abs().max(1.0)
}
