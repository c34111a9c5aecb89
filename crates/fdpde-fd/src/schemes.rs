//! Time-marching schemes: the family of stepping operators that advance
//! `V(t) -> V(t +/- dt)` given the operator `L` and affine term `b` the
//! discretizer builds at whichever times a scheme needs them.
//!
//! Every scheme implements [`Scheme`], a single `step` method taking
//! `(t, dt, grid, V, evaluators, boundary conditions)` and returning
//! `(t', grid', V')` — the driver ([`crate::driver`]) never looks inside a
//! scheme, so a new one plugs in without touching the driver or the
//! discretizer. This generalizes the teacher's `FdmScheme` enum (a closed
//! set matched inside `Fdm1dSolver::price`'s loop) into an open trait: the
//! driver dispatches to `dyn Scheme` instead of matching a fixed enum, which
//! is what lets Douglas ADI (an N-D scheme the teacher has no analogue of)
//! sit next to the 1-D schemes without a parallel driver loop.
//!
//! Every scheme receives and returns the *full* value tensor (boundary
//! nodes included) — the interior-only representation [`discretize_1d`] and
//! [`discretize_nd`] work with is an implementation detail of this module.
//! Each step extracts the interior view of `V`, steps the interior system,
//! then reconstructs the full tensor via
//! [`crate::boundary::expand_interior`]/[`crate::boundary::expand_all`]
//! using the boundary condition at `t + dt` — the time the returned value
//! actually applies at, regardless of which time(s) the operator itself was
//! built at.
//!
//! The six 1-D schemes of this module (explicit, implicit, weighted theta,
//! Crank-Nicolson, extrapolation, oscillation-damped CN) dispatch through
//! [`discretize_1d`]; [`DouglasAdi`] is the only multidimensional scheme and
//! dispatches through [`discretize_nd`].

use std::cell::Cell;

use ndarray::{ArrayD, Axis, Slice};

use fdpde_core::ensure;
use fdpde_core::errors::Result;
use fdpde_core::{Real, Time};

use crate::boundary::{
    expand_all, expand_interior, lower_closure, upper_closure, AxisBoundary, BoundaryCondition,
    FaceClosure,
};
use crate::coefficients::Evaluators;
use crate::discretize_1d::{discretize_1d, Discretization};
use crate::discretize_nd::{discretize_nd, AxisDiscretization, MixedOperator};
use crate::grid::Grid;
use crate::shape::Shape;

/// The stable extension point of the whole crate: a one-step function
/// `(t, dt, grid, V, evaluators, BCs) -> (t', grid', V')`. The driver treats
/// every implementation as a black box.
pub trait Scheme {
    /// Advance `v` from `t` to `t + dt` (which may run backward if `dt < 0`).
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)>;
}

/// The interior slice of `v` along `full_axis` — `v` with the first and
/// last node of that axis dropped.
fn interior_1d(v: &ArrayD<Real>, full_axis: usize) -> ArrayD<Real> {
    let n = v.len_of(Axis(full_axis));
    v.slice_axis(Axis(full_axis), Slice::from(1..n - 1)).to_owned()
}

/// The interior slice of `v` along every grid axis at once, batch axes left
/// untouched — the shape [`discretize_nd`]'s operators share.
fn interior_nd(v: &ArrayD<Real>, shape: &Shape) -> ArrayD<Real> {
    let batch_len = shape.batch_shape().len();
    v.slice_each_axis(|ax| {
        let idx = ax.axis.index();
        if idx < batch_len {
            Slice::from(..)
        } else {
            let n = ax.len as isize;
            Slice::from(1..n - 1)
        }
    })
    .to_owned()
}

fn discretize1_at(
    grid: &Grid,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
    t: Time,
) -> Result<Discretization> {
    ensure!(
        shape.dim() == 1 && grid.dim() == 1 && bcs.len() == 1,
        "this scheme requires a 1-D grid/shape/boundary-condition set, got dim = {}",
        shape.dim()
    );
    let coeffs = evaluators.evaluate(t, grid)?;
    let bc = bcs[0].evaluate(t, grid)?;
    discretize_1d(grid, &coeffs, &bc, shape)
}

/// The two face closures at `(t, grid)`, without building the full
/// [`Discretization`] — used to reconstruct a boundary at a time whose
/// operator wasn't the one actually stepped with (e.g. Crank-Nicolson steps
/// with the midpoint operator but reconstructs with the `t + dt` closure).
fn closures_1d_at(
    grid: &Grid,
    bcs: &[AxisBoundary],
    shape: &Shape,
    t: Time,
) -> Result<(FaceClosure, FaceClosure)> {
    ensure!(
        shape.dim() == 1 && bcs.len() == 1,
        "this scheme requires a 1-D shape/boundary-condition set, got dim = {}",
        shape.dim()
    );
    let bc = bcs[0].evaluate(t, grid)?;
    let lo = lower_closure(&bc.lo, shape, 0, grid)?;
    let hi = upper_closure(&bc.hi, shape, 0, grid)?;
    Ok((lo, hi))
}

fn evaluate_bcs(bcs: &[AxisBoundary], grid: &Grid, t: Time) -> Result<Vec<BoundaryCondition>> {
    bcs.iter().map(|b| b.evaluate(t, grid)).collect()
}

fn discretize_nd_at(
    grid: &Grid,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
    t: Time,
) -> Result<(Vec<AxisDiscretization>, MixedOperator, Vec<BoundaryCondition>)> {
    let coeffs = evaluators.evaluate(t, grid)?;
    let bc_snapshots = evaluate_bcs(bcs, grid, t)?;
    let (discs, mixed) = discretize_nd(grid, &coeffs, &bc_snapshots, shape)?;
    Ok((discs, mixed, bc_snapshots))
}

fn explicit_step(
    t: Time,
    dt: Time,
    grid: &Grid,
    v: &ArrayD<Real>,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
) -> Result<(Time, Grid, ArrayD<Real>)> {
    let full_axis = shape.full_axis(0);
    let d0 = discretize1_at(grid, evaluators, bcs, shape, t)?;
    let v_interior = interior_1d(v, full_axis);
    let applied = d0.operator.apply(&v_interior)?;
    let out_interior = &v_interior + &(&applied * dt) + &(&d0.affine * dt);
    let t1 = t + dt;
    let (lo1, hi1) = closures_1d_at(grid, bcs, shape, t1)?;
    let out = expand_interior(&out_interior, full_axis, &lo1, &hi1);
    Ok((t1, grid.clone(), out))
}

fn implicit_step(
    t: Time,
    dt: Time,
    grid: &Grid,
    v: &ArrayD<Real>,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
) -> Result<(Time, Grid, ArrayD<Real>)> {
    let t1 = t + dt;
    let full_axis = shape.full_axis(0);
    let d1 = discretize1_at(grid, evaluators, bcs, shape, t1)?;
    let v_interior = interior_1d(v, full_axis);
    let lhs = d1.operator.scale_add_identity(-dt, 1.0);
    let rhs = &v_interior + &(&d1.affine * dt);
    let v1_interior = lhs.solve(&rhs)?;
    let out = expand_interior(&v1_interior, full_axis, &d1.lo_closure, &d1.hi_closure);
    Ok((t1, grid.clone(), out))
}

fn weighted_theta_step(
    theta: Real,
    t: Time,
    dt: Time,
    grid: &Grid,
    v: &ArrayD<Real>,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
) -> Result<(Time, Grid, ArrayD<Real>)> {
    let t1 = t + dt;
    let full_axis = shape.full_axis(0);
    let d0 = discretize1_at(grid, evaluators, bcs, shape, t)?;
    let d1 = discretize1_at(grid, evaluators, bcs, shape, t1)?;
    let v_interior = interior_1d(v, full_axis);
    let lhs = d1.operator.scale_add_identity(-(1.0 - theta) * dt, 1.0);
    let applied0 = d0.operator.apply(&v_interior)?;
    let rhs = &v_interior
        + &(&applied0 * (theta * dt))
        + &(&d0.affine * (theta * dt))
        + &(&d1.affine * ((1.0 - theta) * dt));
    let v1_interior = lhs.solve(&rhs)?;
    let out = expand_interior(&v1_interior, full_axis, &d1.lo_closure, &d1.hi_closure);
    Ok((t1, grid.clone(), out))
}

fn crank_nicolson_step(
    t: Time,
    dt: Time,
    grid: &Grid,
    v: &ArrayD<Real>,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
) -> Result<(Time, Grid, ArrayD<Real>)> {
    let t_half = t + 0.5 * dt;
    let full_axis = shape.full_axis(0);
    let d_half = discretize1_at(grid, evaluators, bcs, shape, t_half)?;
    let v_interior = interior_1d(v, full_axis);
    let lhs = d_half.operator.scale_add_identity(-0.5 * dt, 1.0);
    let applied = d_half.operator.apply(&v_interior)?;
    let rhs = &v_interior + &(&applied * (0.5 * dt)) + &(&d_half.affine * dt);
    let v1_interior = lhs.solve(&rhs)?;
    let t1 = t + dt;
    let (lo1, hi1) = closures_1d_at(grid, bcs, shape, t1)?;
    let out = expand_interior(&v1_interior, full_axis, &lo1, &hi1);
    Ok((t1, grid.clone(), out))
}

fn extrapolation_step(
    t: Time,
    dt: Time,
    grid: &Grid,
    v: &ArrayD<Real>,
    evaluators: &Evaluators,
    bcs: &[AxisBoundary],
    shape: &Shape,
) -> Result<(Time, Grid, ArrayD<Real>)> {
    let half = 0.5 * dt;
    let (t_mid, _, v_half1) = implicit_step(t, half, grid, v, evaluators, bcs, shape)?;
    let (t1, _, v_half2) = implicit_step(t_mid, half, grid, &v_half1, evaluators, bcs, shape)?;
    let (_, _, v_full) = implicit_step(t, dt, grid, v, evaluators, bcs, shape)?;
    let out = &(&v_half2 * 2.0) - &v_full;
    Ok((t1, grid.clone(), out))
}

/// Explicit Euler: `V' = (I + dt*L_t) V + dt*b_t`. One tridiagonal matmul;
/// conditionally stable, first-order in time.
pub struct Explicit;

impl Scheme for Explicit {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        explicit_step(t, dt, grid, v, evaluators, bcs, shape)
    }
}

/// Fully implicit (backward Euler): `(I - dt*L_{t+dt}) V' = V + dt*b_{t+dt}`.
/// One tridiagonal solve; unconditionally stable, first-order in time.
pub struct Implicit;

impl Scheme for Implicit {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        implicit_step(t, dt, grid, v, evaluators, bcs, shape)
    }
}

/// Weighted theta scheme: `theta = 0` recovers [`Implicit`], `theta = 1`
/// recovers [`Explicit`], `theta = 0.5` recovers (an inefficient two-point
/// form of) [`CrankNicolson`]. One matmul, one solve.
pub struct Weighted {
    /// The implicit/explicit blend, in `[0, 1]`.
    pub theta: Real,
}

impl Scheme for Weighted {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        ensure!(
            (0.0..=1.0).contains(&self.theta),
            "weighted theta scheme requires theta in [0, 1], got {}",
            self.theta
        );
        weighted_theta_step(self.theta, t, dt, grid, v, evaluators, bcs, shape)
    }
}

/// Crank-Nicolson: `L` and `b` evaluated once at the midpoint `t + dt/2`
/// rather than averaged from the two endpoints — algebraically equivalent
/// to `theta = 0.5` for a time-independent operator, and strictly cheaper
/// (one discretization instead of two) whenever the operator does vary with
/// time. Second-order accurate.
pub struct CrankNicolson;

impl Scheme for CrankNicolson {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        crank_nicolson_step(t, dt, grid, v, evaluators, bcs, shape)
    }
}

/// Lawson-Morris / Richardson extrapolation: two implicit half-steps minus
/// one implicit full step, `V' = 2*I_{dt/2}(I_{dt/2}(V)) - I_dt(V)`. Three
/// tridiagonal solves; second-order accurate with the high-wavenumber
/// damping of a fully implicit scheme, which is what makes it a useful
/// building block for [`OscillationDampedCn`].
pub struct Extrapolation;

impl Scheme for Extrapolation {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        extrapolation_step(t, dt, grid, v, evaluators, bcs, shape)
    }
}

/// Oscillation-damped Crank-Nicolson (Rannacher smoothing): runs
/// [`Extrapolation`] for the first `n_e` steps to damp the high-wavenumber
/// oscillations a nonsmooth terminal condition (e.g. a kinked payoff)
/// otherwise excites, then switches to plain [`CrankNicolson`] for every
/// step after. The switch is one-shot: once it fires it never reverts, even
/// if the scheme instance is reused across a second `step_back` run, since
/// that would silently re-apply Rannacher smoothing to an already-smooth
/// mid-run value grid.
pub struct OscillationDampedCn {
    n_e: usize,
    steps_taken: Cell<usize>,
}

impl OscillationDampedCn {
    /// Damp the first `n_e` steps with [`Extrapolation`] before switching to
    /// [`CrankNicolson`].
    pub fn new(n_e: usize) -> Self {
        Self {
            n_e,
            steps_taken: Cell::new(0),
        }
    }

    /// Choose `n_e` from an estimate of the operator's largest eigenvalue so
    /// that `(dt * lambda_max)^{-n_e}` reaches `target_damping`: the smallest
    /// `n_e` for which `n_e * -ln(dt * lambda_max) >= ln(target_damping)`.
    pub fn from_damping_target(lambda_max: Real, dt: Real, target_damping: Real) -> Self {
        let x = (dt * lambda_max).abs();
        let n_e = if x > 0.0 && x < 1.0 {
            (target_damping.max(1.0).ln() / (-x.ln())).ceil().max(0.0) as usize
        } else {
            0
        };
        Self::new(n_e)
    }
}

impl Scheme for OscillationDampedCn {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        let taken = self.steps_taken.get();
        let result = if taken < self.n_e {
            extrapolation_step(t, dt, grid, v, evaluators, bcs, shape)
        } else {
            crank_nicolson_step(t, dt, grid, v, evaluators, bcs, shape)
        };
        self.steps_taken.set(taken + 1);
        result
    }
}

/// Douglas ADI (alternating-direction implicit), the only multidimensional
/// scheme: a sequence of `dim` batched tridiagonal solves, one per axis,
/// with the mixed-derivative term applied explicitly up front. Requires
/// `theta >= 0.5` for unconditional stability; second-order accurate when
/// `theta == 0.5` and no mixed-derivative terms are present.
pub struct DouglasAdi {
    /// The implicit weight of each axis substep; must be `>= 0.5`.
    pub theta: Real,
}

impl Scheme for DouglasAdi {
    fn step(
        &self,
        t: Time,
        dt: Time,
        grid: &Grid,
        v: &ArrayD<Real>,
        evaluators: &Evaluators,
        bcs: &[AxisBoundary],
        shape: &Shape,
    ) -> Result<(Time, Grid, ArrayD<Real>)> {
        ensure!(
            shape.dim() >= 2,
            "Douglas ADI requires a multidimensional shape, got dim = {}",
            shape.dim()
        );
        ensure!(
            self.theta >= 0.5,
            "Douglas ADI requires theta >= 0.5 for unconditional stability, got {}",
            self.theta
        );

        let t1 = t + dt;
        let (discs_t, mixed_t, _bcs_t) = discretize_nd_at(grid, evaluators, bcs, shape, t)?;
        let (discs_t1, _mixed_t1, bcs_t1) = discretize_nd_at(grid, evaluators, bcs, shape, t1)?;

        let v_interior = interior_nd(v, shape);

        let mut explicit_sum = ArrayD::<Real>::zeros(v_interior.raw_dim());
        let mut affine_sum = ArrayD::<Real>::zeros(v_interior.raw_dim());
        for disc in &discs_t {
            explicit_sum = explicit_sum + disc.operator.apply(&v_interior)?;
            affine_sum = affine_sum + &disc.affine;
        }
        let mut y = &v_interior + &(&explicit_sum * dt) + &(&affine_sum * dt);
        if !mixed_t.is_empty() {
            let mixed_full = mixed_t.apply(v);
            let mixed_interior = interior_nd(&mixed_full, shape);
            y = &y + &(&mixed_interior * dt);
        }

        for (disc_t, disc_t1) in discs_t.iter().zip(discs_t1.iter()) {
            let lhs = disc_t1.operator.scale_add_identity(-self.theta * dt, 1.0);
            let l_t_v = disc_t.operator.apply(&v_interior)?;
            let rhs = &y - &(&l_t_v * (self.theta * dt)) + &(&disc_t1.affine * (self.theta * dt))
                - &(&disc_t.affine * (self.theta * dt));
            y = lhs.solve(&rhs)?;
        }

        let out = expand_all(&y, grid, shape, &bcs_t1)?;
        Ok((t1, grid.clone(), out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{dirichlet, neumann};
    use crate::coefficients::Evaluators;
    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;
    use std::f64::consts::PI;

    fn heat_setup(n: usize) -> (Grid, Shape, Evaluators, Vec<AxisBoundary>) {
        let axis: Vec<Real> = (0..n).map(|i| i as Real * PI / (n - 1) as Real).collect();
        let grid = Grid::new(vec![axis]).unwrap();
        let shape = Shape::new(vec![], vec![n]).unwrap();
        let evaluators =
            Evaluators::new(1).with_second_order(|_t, _g| {
                Ok(crate::coefficients::SecondOrderTerms::new(
                    1,
                    vec![Some(ArrayD::from_elem(IxDyn(&[]), 1.0))],
                ))
            });
        let bc = AxisBoundary::new(
            dirichlet(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
            dirichlet(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
        );
        (grid, shape, evaluators, vec![bc])
    }

    fn sine_initial(grid: &Grid) -> ArrayD<Real> {
        ArrayD::from_shape_vec(
            IxDyn(&[grid.len(0)]),
            grid.axis(0).iter().map(|&x| x.sin()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn crank_nicolson_heat_equation_matches_closed_form() {
        let (grid, shape, evaluators, bcs) = heat_setup(101);
        let mut v = sine_initial(&grid);
        let scheme = CrankNicolson;
        let dt = 0.1 / 100.0;
        let mut t = 0.0;
        for _ in 0..100 {
            let (t1, _, v1) = scheme
                .step(t, dt, &grid, &v, &evaluators, &bcs, &shape)
                .unwrap();
            t = t1;
            v = v1;
        }
        let expected: ArrayD<Real> = ArrayD::from_shape_vec(
            IxDyn(&[101]),
            grid.axis(0).iter().map(|&x| (-0.1_f64).exp() * x.sin()).collect(),
        )
        .unwrap();
        let max_err = (&v - &expected).iter().fold(0.0_f64, |m, &e| m.max(e.abs()));
        assert!(max_err < 1e-3, "max error {max_err} too large");
    }

    #[test]
    fn nonuniform_grid_refinement_moves_cn_error_ratio_toward_four() {
        // Same heat equation as `crank_nicolson_heat_equation_matches_closed_form`,
        // but on a geometrically graded (nonuniform) axis, clustered near the
        // origin. `n_t` is kept large relative to the spatial step so the
        // O(dt^2) time error stays negligible next to the O(dx^2) space error,
        // isolating the latter's convergence rate.
        fn graded_axis(n: usize) -> Vec<Real> {
            (0..n)
                .map(|i| PI * (i as Real / (n - 1) as Real).powf(1.5))
                .collect()
        }

        fn max_error(n: usize) -> Real {
            let axis = graded_axis(n);
            let grid = Grid::new(vec![axis]).unwrap();
            let shape = Shape::new(vec![], vec![n]).unwrap();
            let evaluators = Evaluators::new(1).with_second_order(|_t, _g| {
                Ok(crate::coefficients::SecondOrderTerms::new(
                    1,
                    vec![Some(ArrayD::from_elem(IxDyn(&[]), 1.0))],
                ))
            });
            let bcs = vec![AxisBoundary::new(
                dirichlet(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
                dirichlet(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
            )];
            let mut v = sine_initial(&grid);
            let scheme = CrankNicolson;
            let t_end = 0.01;
            let n_t = 200;
            let dt = t_end / n_t as Real;
            let mut t = 0.0;
            for _ in 0..n_t {
                let (t1, _, v1) = scheme.step(t, dt, &grid, &v, &evaluators, &bcs, &shape).unwrap();
                t = t1;
                v = v1;
            }
            let expected: ArrayD<Real> = ArrayD::from_shape_vec(
                IxDyn(&[n]),
                grid.axis(0).iter().map(|&x| (-t_end).exp() * x.sin()).collect(),
            )
            .unwrap();
            (&v - &expected).iter().fold(0.0_f64, |m, &e| m.max(e.abs()))
        }

        let err_coarse = max_error(51);
        let err_fine = max_error(101);
        assert!(
            err_fine < err_coarse,
            "doubling the grid must reduce the max error: {err_coarse} -> {err_fine}"
        );
        let ratio = err_coarse / err_fine;
        assert!(
            (2.5..8.0).contains(&ratio),
            "error ratio {ratio} should sit near the second-order value of 4"
        );
    }

    #[test]
    fn explicit_and_implicit_preserve_shape() {
        let (grid, shape, evaluators, bcs) = heat_setup(21);
        let v = sine_initial(&grid);
        let dt = 1e-4;
        let (_, _, v_exp) = Explicit
            .step(0.0, dt, &grid, &v, &evaluators, &bcs, &shape)
            .unwrap();
        let (_, _, v_imp) = Implicit
            .step(0.0, dt, &grid, &v, &evaluators, &bcs, &shape)
            .unwrap();
        assert_eq!(v_exp.shape(), v.shape());
        assert_eq!(v_imp.shape(), v.shape());
    }

    #[test]
    fn dirichlet_boundary_is_exact_after_a_step() {
        let axis: Vec<Real> = (0..11).map(|i| i as Real * 0.1).collect();
        let grid = Grid::new(vec![axis]).unwrap();
        let shape = Shape::new(vec![], vec![11]).unwrap();
        let evaluators = Evaluators::new(1).with_second_order(|_t, _g| {
            Ok(crate::coefficients::SecondOrderTerms::new(
                1,
                vec![Some(ArrayD::from_elem(IxDyn(&[]), 0.5))],
            ))
        });
        let bc = AxisBoundary::new(
            dirichlet(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 7.0))),
            dirichlet(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 3.0))),
        );
        let v = ArrayD::from_elem(IxDyn(&[11]), 0.0);
        let (_, _, v1) = Implicit
            .step(0.0, 0.01, &grid, &v, &evaluators, &[bc], &shape)
            .unwrap();
        assert_abs_diff_eq!(v1[[0]], 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v1[[10]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn oscillation_damped_cn_switches_from_extrapolation_to_cn() {
        let (grid, shape, evaluators, bcs) = heat_setup(21);
        let v = sine_initial(&grid);
        let scheme = OscillationDampedCn::new(2);
        assert_eq!(scheme.steps_taken.get(), 0);
        let (_, _, v1) = scheme
            .step(0.0, 1e-3, &grid, &v, &evaluators, &bcs, &shape)
            .unwrap();
        assert_eq!(scheme.steps_taken.get(), 1);
        let (_, _, _v2) = scheme
            .step(1e-3, 1e-3, &grid, &v1, &evaluators, &bcs, &shape)
            .unwrap();
        assert_eq!(scheme.steps_taken.get(), 2);
        // Third step has exhausted n_e = 2 and must fall back to CN; the
        // call itself must still succeed.
        let (_, _, _v3) = scheme
            .step(2e-3, 1e-3, &grid, &v1, &evaluators, &bcs, &shape)
            .unwrap();
        assert_eq!(scheme.steps_taken.get(), 3);
    }

    #[test]
    fn douglas_adi_preserves_shape_on_2d_grid() {
        let axis = Grid::uniform(0.0, 1.0, 11).unwrap();
        let grid = Grid::new(vec![axis.clone(), axis]).unwrap();
        let shape = Shape::new(vec![], vec![11, 11]).unwrap();
        let evaluators = Evaluators::new(2).with_second_order(|_t, _g| {
            Ok(crate::coefficients::SecondOrderTerms::new(
                2,
                vec![
                    Some(ArrayD::from_elem(IxDyn(&[]), 1.0)),
                    None,
                    None,
                    Some(ArrayD::from_elem(IxDyn(&[]), 0.25)),
                ],
            ))
        });
        let bc = AxisBoundary::new(
            neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
            neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
        );
        let bcs = vec![
            AxisBoundary::new(
                neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
                neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
            ),
            bc,
        ];
        let mut v = ArrayD::zeros(IxDyn(&[11, 11]));
        let xs = grid.axis(0).to_vec();
        let ys = grid.axis(1).to_vec();
        for i in 0..11 {
            for j in 0..11 {
                let dx = xs[i] - 0.5;
                let dy = ys[j] - 0.5;
                v[[i, j]] = (-(dx * dx + dy * dy) / 0.05).exp();
            }
        }
        let scheme = DouglasAdi { theta: 0.5 };
        let (t1, _, v1) = scheme
            .step(0.0, 1e-3, &grid, &v, &evaluators, &bcs, &shape)
            .unwrap();
        assert_abs_diff_eq!(t1, 1e-3, epsilon = 1e-12);
        assert_eq!(v1.shape(), v.shape());
    }

    #[test]
    fn douglas_adi_rejects_theta_below_half() {
        let axis = Grid::uniform(0.0, 1.0, 5).unwrap();
        let grid = Grid::new(vec![axis.clone(), axis]).unwrap();
        let shape = Shape::new(vec![], vec![5, 5]).unwrap();
        let evaluators = Evaluators::new(2);
        let bc = AxisBoundary::new(
            neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
            neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
        );
        let bcs = vec![
            AxisBoundary::new(
                neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
                neumann(|_t, _g| Ok(ArrayD::from_elem(IxDyn(&[]), 0.0))),
            ),
            bc,
        ];
        let v = ArrayD::zeros(IxDyn(&[5, 5]));
        let scheme = DouglasAdi { theta: 0.2 };
        let err = scheme
            .step(0.0, 1e-3, &grid, &v, &evaluators, &bcs, &shape)
            .unwrap_err();
        assert!(matches!(err, fdpde_core::errors::Error::Precondition(_)));
    }
}
