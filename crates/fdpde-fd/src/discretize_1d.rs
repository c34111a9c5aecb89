//! Nonuniform 1-D spatial discretization.
//!
//! Builds the tridiagonal [`SpatialOperator`] for
//! `L v = D*v_xx + mu*v_x + r*v` on a single (possibly nonuniform) axis.
//! The two boundary nodes are never carried as unknowns of the linear
//! system: [`crate::boundary::fold_lower`]/[`crate::boundary::fold_upper`]
//! substitute the boundary closure into the first and last interior rows,
//! so the operator this function returns has shape
//! `batch_shape ++ (n - 2,)` — strictly the interior of the grid.
//!
//! Boundary rows also produce a forcing contribution, returned alongside
//! the operator as `affine`: the full per-term operator the rest of the
//! crate works with is `L v + affine`. The returned [`Discretization`] also
//! carries the two boundary [`FaceClosure`]s, so a scheme can reconstruct
//! the full value tensor (boundary nodes included) once the interior system
//! has been solved.

use ndarray::{ArrayD, Axis};

use crate::boundary::{fold_lower, fold_upper, lower_closure, upper_closure, BoundaryCondition, FaceClosure};
use crate::coefficients::Coefficients;
use crate::grid::Grid;
use crate::operator::SpatialOperator;
use crate::shape::Shape;
use crate::stencil::operator_weights;
use fdpde_core::errors::{Error, Result};

/// The discretized operator for one axis: a tridiagonal [`SpatialOperator`]
/// over the grid's interior, the affine forcing term its folded boundary
/// rows introduce, and the two face closures needed to reconstruct the
/// boundary values after solving.
pub struct Discretization {
    /// The tridiagonal spatial operator, interior-shaped
    /// (`batch_shape ++ (n - 2,)` along this axis).
    pub operator: SpatialOperator,
    /// The affine forcing term `L v + affine`; nonzero only at the two
    /// rows adjacent to a boundary (zero on every other interior node).
    pub affine: ArrayD<f64>,
    /// The lower-face closure, for reconstructing `V[0]` after solving.
    pub lo_closure: FaceClosure,
    /// The upper-face closure, for reconstructing `V[n-1]` after solving.
    pub hi_closure: FaceClosure,
}

/// Discretize a 1-D (possibly nonuniform) linear parabolic operator.
///
/// `grid` must have exactly one axis; `coeffs` must have been built for
/// `dim() == 1`. Returns an operator over the grid's interior only (see
/// [`Discretization`]).
pub fn discretize_1d(
    grid: &Grid,
    coeffs: &Coefficients,
    bc: &BoundaryCondition,
    shape: &Shape,
) -> Result<Discretization> {
    if grid.dim() != 1 {
        return Err(Error::InvalidArgument(format!(
            "discretize_1d requires a 1-D grid, got dim = {}",
            grid.dim()
        )));
    }
    if shape.dim() != 1 {
        return Err(Error::InvalidArgument(format!(
            "discretize_1d requires a 1-D shape, got dim = {}",
            shape.dim()
        )));
    }

    let axis = 0;
    let full_axis = shape.full_axis(axis);
    let n = grid.len(axis);
    let m = n - 2;

    let diffusion = coeffs.diffusion(shape, axis)?.to_owned();
    let drift = coeffs.drift(shape, axis)?.to_owned();
    let reaction = coeffs.reaction(shape)?.to_owned();

    let mut interior_shape = diffusion.shape().to_vec();
    interior_shape[full_axis] = m;
    let mut lower = ArrayD::zeros(interior_shape.clone());
    let mut diag = ArrayD::zeros(interior_shape.clone());
    let mut upper = ArrayD::zeros(interior_shape.clone());
    let mut affine = ArrayD::zeros(interior_shape);

    for (((((mut lo, mut di), mut up), d_lane), mu_lane), r_lane) in lower
        .lanes_mut(Axis(full_axis))
        .into_iter()
        .zip(diag.lanes_mut(Axis(full_axis)))
        .zip(upper.lanes_mut(Axis(full_axis)))
        .zip(diffusion.lanes(Axis(full_axis)))
        .zip(drift.lanes(Axis(full_axis)))
        .zip(reaction.lanes(Axis(full_axis)))
    {
        for local in 0..m {
            let i = local + 1;
            let (hm, hp) = grid.spacings(axis, i);
            let (a, b, c) = operator_weights(d_lane[i], mu_lane[i], r_lane[i], hm, hp);
            lo[local] = a;
            di[local] = b;
            up[local] = c;
        }
    }

    let lo_closure = lower_closure(&bc.lo, shape, axis, grid)?;
    let hi_closure = upper_closure(&bc.hi, shape, axis, grid)?;

    if m == 1 && (!lo_closure.is_dirichlet_xi2() || !hi_closure.is_dirichlet_xi2()) {
        return Err(Error::UndersizedGrid { axis, size: n });
    }

    let a0 = lower.index_axis(Axis(full_axis), 0).to_owned();
    let b0 = diag.index_axis(Axis(full_axis), 0).to_owned();
    let c0 = upper.index_axis(Axis(full_axis), 0).to_owned();
    let (diag0, upper0, affine0) = fold_lower(&a0, &b0, &c0, &lo_closure);
    lower.index_axis_mut(Axis(full_axis), 0).fill(0.0);
    diag.index_axis_mut(Axis(full_axis), 0).assign(&diag0);
    upper.index_axis_mut(Axis(full_axis), 0).assign(&upper0);
    affine.index_axis_mut(Axis(full_axis), 0).assign(&affine0);

    if m == 1 {
        // The single interior row is both the first and the last: fold the
        // upper face into the row just updated by the lower fold above.
        let a1 = lower.index_axis(Axis(full_axis), 0).to_owned();
        let b1 = diag.index_axis(Axis(full_axis), 0).to_owned();
        let c1 = upper.index_axis(Axis(full_axis), 0).to_owned();
        let (lower1, diag1, affine1) = fold_upper(&a1, &b1, &c1, &hi_closure);
        let prior_affine = affine.index_axis(Axis(full_axis), 0).to_owned();
        lower.index_axis_mut(Axis(full_axis), 0).assign(&lower1);
        diag.index_axis_mut(Axis(full_axis), 0).assign(&diag1);
        upper.index_axis_mut(Axis(full_axis), 0).fill(0.0);
        affine
            .index_axis_mut(Axis(full_axis), 0)
            .assign(&(&prior_affine + &affine1));
    } else {
        let last = m - 1;
        let an = lower.index_axis(Axis(full_axis), last).to_owned();
        let bn = diag.index_axis(Axis(full_axis), last).to_owned();
        let cn = upper.index_axis(Axis(full_axis), last).to_owned();
        let (lowern, diagn, affinen) = fold_upper(&an, &bn, &cn, &hi_closure);
        lower.index_axis_mut(Axis(full_axis), last).assign(&lowern);
        diag.index_axis_mut(Axis(full_axis), last).assign(&diagn);
        upper.index_axis_mut(Axis(full_axis), last).fill(0.0);
        affine.index_axis_mut(Axis(full_axis), last).assign(&affinen);
    }

    Ok(Discretization {
        operator: SpatialOperator::new(full_axis, lower, diag, upper),
        affine,
        lo_closure,
        hi_closure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::RobinBoundary;
    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;

    fn heat_grid_and_shape() -> (Grid, Shape) {
        let axis: Vec<f64> = (0..5).map(|i| i as f64 * 0.25).collect();
        (Grid::new(vec![axis]).unwrap(), Shape::new(vec![], vec![5]).unwrap())
    }

    fn pure_diffusion() -> Coefficients {
        Coefficients::new(
            vec![ArrayD::from_elem(IxDyn(&[]), 1.0)],
            vec![ArrayD::from_elem(IxDyn(&[]), 0.0)],
            vec![],
            ArrayD::from_elem(IxDyn(&[]), 0.0),
        )
    }

    #[test]
    fn pure_diffusion_heat_operator_matches_classic_stencil() {
        let (grid, shape) = heat_grid_and_shape();
        let coeffs = pure_diffusion();
        let bc = BoundaryCondition::new(
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let d = discretize_1d(&grid, &coeffs, &bc, &shape).unwrap();
        // n=5 -> interior m=3; the middle interior row (local index 1,
        // full index 2) is untouched by either boundary fold.
        let h = 0.25;
        assert_abs_diff_eq!(d.operator.diag[[1]], -2.0 / (h * h), epsilon = 1e-10);
        assert_abs_diff_eq!(d.operator.lower[[1]], 1.0 / (h * h), epsilon = 1e-10);
        assert_abs_diff_eq!(d.operator.upper[[1]], 1.0 / (h * h), epsilon = 1e-10);
    }

    #[test]
    fn dirichlet_boundary_produces_diagonal_only_rows_with_no_forcing() {
        let (grid, shape) = heat_grid_and_shape();
        let coeffs = pure_diffusion();
        let bc = BoundaryCondition::new(
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 7.0)),
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 3.0)),
        );
        let d = discretize_1d(&grid, &coeffs, &bc, &shape).unwrap();
        // Dirichlet: closure has xi1 = xi2 = 0, so folding adds nothing —
        // the first/last interior rows keep their plain stencil shape, and
        // no affine forcing appears because the `eta` term the fold
        // contributes (a*gamma/alpha) is carried in `affine`, not zeroed;
        // check it equals the classic Dirichlet forcing instead.
        let h = 0.25;
        assert_abs_diff_eq!(d.operator.diag[[0]], -2.0 / (h * h), epsilon = 1e-10);
        assert_abs_diff_eq!(d.operator.lower[[0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.affine[[0]], 7.0 / (h * h), epsilon = 1e-8);
        let last = d.operator.diag.len() - 1;
        assert_abs_diff_eq!(d.operator.diag[[last]], -2.0 / (h * h), epsilon = 1e-10);
        assert_abs_diff_eq!(d.operator.upper[[last]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.affine[[last]], 3.0 / (h * h), epsilon = 1e-8);
    }

    #[test]
    fn neumann_zero_flux_boundary_couples_into_interior() {
        let (grid, shape) = heat_grid_and_shape();
        let coeffs = pure_diffusion();
        let bc = BoundaryCondition::new(
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let d = discretize_1d(&grid, &coeffs, &bc, &shape).unwrap();
        // Zero-flux Neumann with uniform spacing: xi1 = 4/3, xi2 = -1/3 at
        // the lower face, folded into the first interior row's (a, b, c) =
        // (1/h^2, -2/h^2, 1/h^2).
        let h = 0.25;
        let expected_diag = -2.0 / (h * h) + (1.0 / (h * h)) * (4.0 / 3.0);
        let expected_upper = 1.0 / (h * h) + (1.0 / (h * h)) * (-1.0 / 3.0);
        assert_abs_diff_eq!(d.operator.diag[[0]], expected_diag, epsilon = 1e-8);
        assert_abs_diff_eq!(d.operator.upper[[0]], expected_upper, epsilon = 1e-8);
        assert_abs_diff_eq!(d.affine[[0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn three_point_grid_requires_dirichlet_equivalent_faces() {
        let axis = vec![0.0, 0.5, 1.0];
        let grid = Grid::new(vec![axis]).unwrap();
        let shape = Shape::new(vec![], vec![3]).unwrap();
        let coeffs = pure_diffusion();
        let bc = BoundaryCondition::new(
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 1.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let err = discretize_1d(&grid, &coeffs, &bc, &shape).unwrap_err();
        assert_eq!(err, Error::UndersizedGrid { axis: 0, size: 3 });
    }

    #[test]
    fn three_point_grid_with_both_dirichlet_faces_solves() {
        let axis = vec![0.0, 0.5, 1.0];
        let grid = Grid::new(vec![axis]).unwrap();
        let shape = Shape::new(vec![], vec![3]).unwrap();
        let coeffs = pure_diffusion();
        let bc = BoundaryCondition::new(
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 1.0)),
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 2.0)),
        );
        let d = discretize_1d(&grid, &coeffs, &bc, &shape).unwrap();
        assert_eq!(d.operator.diag.len(), 1);
        let h = 0.5;
        assert_abs_diff_eq!(d.operator.diag[[0]], -2.0 / (h * h), epsilon = 1e-8);
        assert_abs_diff_eq!(
            d.affine[[0]],
            1.0 / (h * h) + 2.0 / (h * h),
            epsilon = 1e-8
        );
    }

    #[test]
    fn mismatched_grid_dim_is_rejected() {
        let axes = vec![vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]];
        let grid = Grid::new(axes).unwrap();
        let shape = Shape::new(vec![], vec![3, 3]).unwrap();
        let coeffs = Coefficients::new(
            vec![ArrayD::from_elem(IxDyn(&[]), 1.0); 2],
            vec![ArrayD::from_elem(IxDyn(&[]), 0.0); 2],
            vec![],
            ArrayD::from_elem(IxDyn(&[]), 0.0),
        );
        let bc = BoundaryCondition::new(
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let err = discretize_1d(&grid, &coeffs, &bc, &shape).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
