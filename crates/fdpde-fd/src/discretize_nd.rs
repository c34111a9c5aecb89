//! Uniform rectangular N-D spatial discretization.
//!
//! Builds one per-axis [`SpatialOperator`] (the diagonal part of
//! `L = sum_j D_j d2/dx_j^2 + mu_j d/dx_j + r`, split evenly across axes so
//! the reaction term is counted exactly once when the per-axis operators
//! are summed), plus a [`MixedOperator`] carrying the off-diagonal
//! `sum_{j<k} M_jk d2/dx_j dx_k` cross terms — applied explicitly against a
//! fully boundary-reconstructed value tensor rather than folded into any
//! per-axis implicit solve, since a four-point stencil spanning two axes
//! has no tridiagonal structure along either one.
//!
//! As in the 1-D case, boundary nodes are never carried as unknowns: each
//! axis's operator is folded down to that axis's interior range, and —
//! because the other axes must also be restricted to their own interior
//! range before an axis's stencil coefficients are read off — every
//! returned operator lives on the shared fully-interior shape
//! `batch_shape ++ (n_1 - 2, ..., n_d - 2)`. [`crate::boundary::expand_all`]
//! reconstructs the full tensor afterward, one axis at a time.
//!
//! Every axis must be uniformly spaced (enforced by [`crate::grid::Grid`]
//! whenever `dim() > 1`); nonuniform multidimensional grids must go
//! through repeated 1-D solves instead.

use ndarray::{ArrayD, ArrayViewD, Axis, Slice, Zip};

use crate::boundary::{closure_at, fold_lower, fold_upper, BoundaryCondition};
use crate::coefficients::Coefficients;
use crate::grid::Grid;
use crate::operator::SpatialOperator;
use crate::shape::Shape;
use crate::stencil::{mixed_derivative_weight, operator_weights, MixedCorner};
use fdpde_core::errors::{Error, Result};

/// One axis's folded operator: interior-shaped along every axis (this
/// axis's boundary folded in, every other axis already restricted to its
/// own interior range).
pub struct AxisDiscretization {
    /// The tridiagonal spatial operator, interior-shaped on every axis.
    pub operator: SpatialOperator,
    /// The affine forcing term `L v + affine` this axis's folded boundary
    /// rows introduce; nonzero only at the two rows adjacent to this
    /// axis's boundary.
    pub affine: ArrayD<f64>,
}

/// Discretize an N-D (`dim() >= 2`) linear parabolic operator on a
/// rectangular, per-axis-uniform grid.
///
/// Returns one [`AxisDiscretization`] per axis — the diagonal part of `L`,
/// ready to be stepped implicitly one axis at a time (as Douglas ADI
/// does) — and a [`MixedOperator`] for the off-diagonal cross terms. Every
/// operator and the mixed term's weight tensors are evaluated on the full
/// grid; only the per-axis operators' own shapes are folded to the
/// interior, per [`AxisDiscretization`].
pub fn discretize_nd(
    grid: &Grid,
    coeffs: &Coefficients,
    bcs: &[BoundaryCondition],
    shape: &Shape,
) -> Result<(Vec<AxisDiscretization>, MixedOperator)> {
    let dim = grid.dim();
    if dim < 2 {
        return Err(Error::InvalidArgument(format!(
            "discretize_nd requires dim >= 2, got {dim}"
        )));
    }
    if shape.dim() != dim || bcs.len() != dim {
        return Err(Error::InvalidArgument(
            "discretize_nd requires matching grid/shape/boundary dimension counts".into(),
        ));
    }

    let reaction_full = coeffs.reaction(shape)?.to_owned();
    let reaction_share = reaction_full.mapv(|r| r / dim as f64);

    let mut discretizations = Vec::with_capacity(dim);
    for axis in 0..dim {
        discretizations.push(discretize_axis(grid, coeffs, &reaction_share, &bcs[axis], shape, axis)?);
    }

    let mut terms = Vec::new();
    for (j, k) in coeffs.mixed_pairs() {
        let weight = coeffs
            .mixed(shape, j, k)
            .expect("mixed_pairs only yields pairs with a stored coefficient")?
            .to_owned();
        terms.push(MixedTerm {
            full_axis_j: shape.full_axis(j),
            full_axis_k: shape.full_axis(k),
            hj: grid.uniform_step(j),
            hk: grid.uniform_step(k),
            weight,
        });
    }

    Ok((discretizations, MixedOperator { terms }))
}

/// `shape`'s face shape of `axis`, with every *other* grid axis further
/// restricted to its interior range (`n - 2`). This is the shape every
/// tensor touching axis `axis`'s boundary fold must already have: the
/// axes an N-D operator batches over are, by this point, interior-only.
fn restricted_face_shape(shape: &Shape, axis: usize) -> Vec<usize> {
    let mut s = shape.batch_shape().to_vec();
    for (j, &n) in shape.grid_shape().iter().enumerate() {
        if j != axis {
            s.push(n - 2);
        }
    }
    s
}

/// A view into `src` restricted to the interior range `1..n-1` of every
/// grid axis except `exclude_full_axis`, which is left at full length.
/// Batch axes (below `batch_len`) are always left full.
fn restrict_except<'a>(
    src: ArrayViewD<'a, f64>,
    batch_len: usize,
    exclude_full_axis: usize,
) -> ArrayViewD<'a, f64> {
    src.slice_each_axis(|ax| {
        let idx = ax.axis.index();
        if idx < batch_len || idx == exclude_full_axis {
            Slice::from(..)
        } else {
            let n = ax.len as isize;
            Slice::from(1..n - 1)
        }
    })
}

fn discretize_axis(
    grid: &Grid,
    coeffs: &Coefficients,
    reaction_share: &ArrayD<f64>,
    bc: &BoundaryCondition,
    shape: &Shape,
    axis: usize,
) -> Result<AxisDiscretization> {
    let full_axis = shape.full_axis(axis);
    let batch_len = shape.batch_shape().len();
    let n = grid.len(axis);
    let m = n - 2;
    let h = grid.uniform_step(axis);

    let diffusion_full = coeffs.diffusion(shape, axis)?.to_owned();
    let drift_full = coeffs.drift(shape, axis)?.to_owned();

    // Full length along this axis, interior length along every other axis
    // (batch axes untouched) — the shape the raw per-point stencil values
    // are read off at, before this axis's own boundary fold.
    let diffusion = restrict_except(diffusion_full.view(), batch_len, full_axis);
    let drift = restrict_except(drift_full.view(), batch_len, full_axis);
    let reaction = restrict_except(reaction_share.view(), batch_len, full_axis);

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
            let (a, b, c) = operator_weights(d_lane[i], mu_lane[i], r_lane[i], h, h);
            lo[local] = a;
            di[local] = b;
            up[local] = c;
        }
    }

    let face_shape = restricted_face_shape(shape, axis);
    let ((d0_lo, d1_lo), (d0_hi, d1_hi)) = grid.boundary_spacings(axis);
    let lo_closure = closure_at(&bc.lo, &face_shape, d0_lo, d1_lo)?;
    let hi_closure = closure_at(&bc.hi, &face_shape, d0_hi, d1_hi)?;

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
        // The single interior row is both first and last: fold the upper
        // face into the row just updated by the lower fold above. Valid
        // because the m==1 check above requires xi2 == 0 on both faces.
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

    Ok(AxisDiscretization {
        operator: SpatialOperator::new(full_axis, lower, diag, upper),
        affine,
    })
}

struct MixedTerm {
    full_axis_j: usize,
    full_axis_k: usize,
    hj: f64,
    hk: f64,
    weight: ArrayD<f64>,
}

/// The off-diagonal mixed-derivative part of an N-D operator:
/// `sum_{j<k} M_jk d2 V / dx_j dx_k`, applied explicitly to a full,
/// boundary-filled value tensor via the four-point corner stencil.
///
/// `v` must already carry the correct boundary value on every face (e.g.
/// via [`crate::boundary::expand_all`]) — the stencil reads one step in
/// from the domain's edges but never writes there, so this operator only
/// ever contributes to nodes interior on every axis a term touches.
pub struct MixedOperator {
    terms: Vec<MixedTerm>,
}

impl MixedOperator {
    /// `true` if there are no mixed-derivative terms to apply (a diagonal
    /// operator, e.g. an uncorrelated multi-factor diffusion).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Apply the mixed operator to `v`, returning a full-shape tensor that
    /// is zero everywhere except the nodes interior on every axis a term
    /// touches.
    pub fn apply(&self, v: &ArrayD<f64>) -> ArrayD<f64> {
        let mut out = ArrayD::zeros(v.raw_dim());
        let v_view = v.view();
        for term in &self.terms {
            let weight = mixed_derivative_weight(term.hj, term.hk);
            let weight_view = term.weight.view();
            let interior_weight =
                interior_slice(weight_view, term.full_axis_j, term.full_axis_k, 0, 0);
            let mut contribution = ArrayD::<f64>::zeros(interior_weight.raw_dim());
            for corner in MixedCorner::ALL {
                let (dj, dk) = corner.offsets();
                let shifted = interior_slice(v_view, term.full_axis_j, term.full_axis_k, dj, dk);
                Zip::from(&mut contribution)
                    .and(&shifted)
                    .and(&interior_weight)
                    .for_each(|c, &s, &m| *c += corner.sign() * weight * m * s);
            }
            let mut out_interior =
                interior_slice_mut(&mut out, term.full_axis_j, term.full_axis_k);
            out_interior += &contribution;
        }
        out
    }
}

/// A view into `src` restricted to the interior range `1..n-1` of both
/// `axis_j` and `axis_k`, shifted by `(offset_j, offset_k)` grid steps —
/// used to read the four corners of the mixed-derivative stencil without
/// ever materializing a ghost point: shifting the read window is
/// equivalent to shifting the stencil.
fn interior_slice<'a>(
    src: ArrayViewD<'a, f64>,
    axis_j: usize,
    axis_k: usize,
    offset_j: isize,
    offset_k: isize,
) -> ArrayViewD<'a, f64> {
    src.slice_each_axis(|ax| {
        let axis = ax.axis.index();
        let n = ax.len as isize;
        if axis == axis_j {
            Slice::from((1 + offset_j)..(n - 1 + offset_j))
        } else if axis == axis_k {
            Slice::from((1 + offset_k)..(n - 1 + offset_k))
        } else {
            Slice::from(..)
        }
    })
}

fn interior_slice_mut<'a>(
    dst: &'a mut ArrayD<f64>,
    axis_j: usize,
    axis_k: usize,
) -> ndarray::ArrayViewMutD<'a, f64> {
    dst.slice_each_axis_mut(|ax| {
        let axis = ax.axis.index();
        let n = ax.len as isize;
        if axis == axis_j || axis == axis_k {
            Slice::from(1..(n - 1))
        } else {
            Slice::from(..)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{expand_all, RobinBoundary};
    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;

    fn uniform_2d() -> (Grid, Shape) {
        let axis = Grid::uniform(0.0, 1.0, 5).unwrap();
        (
            Grid::new(vec![axis.clone(), axis]).unwrap(),
            Shape::new(vec![], vec![5, 5]).unwrap(),
        )
    }

    #[test]
    fn diagonal_axes_split_reaction_evenly() {
        let (grid, shape) = uniform_2d();
        let coeffs = Coefficients::new(
            vec![
                ArrayD::from_elem(IxDyn(&[]), 1.0),
                ArrayD::from_elem(IxDyn(&[]), 1.0),
            ],
            vec![
                ArrayD::from_elem(IxDyn(&[]), 0.0),
                ArrayD::from_elem(IxDyn(&[]), 0.0),
            ],
            vec![],
            ArrayD::from_elem(IxDyn(&[]), 2.0),
        );
        let bc = BoundaryCondition::new(
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let (discs, mixed) = discretize_nd(&grid, &coeffs, &[bc.clone(), bc], &shape).unwrap();
        assert!(mixed.is_empty());
        let h = 0.25;
        // n=5 -> interior m=3; the middle interior row (local index 1) of
        // each axis is untouched by either boundary fold.
        assert_abs_diff_eq!(
            discs[0].operator.diag[[1, 1]],
            -2.0 / (h * h) + 1.0,
            epsilon = 1e-8
        );
        assert_eq!(discs[0].operator.diag.shape(), &[3, 3]);
    }

    #[test]
    fn mixed_operator_matches_hand_computed_corner_stencil() {
        let (grid, shape) = uniform_2d();
        let coeffs = Coefficients::new(
            vec![
                ArrayD::from_elem(IxDyn(&[]), 0.0),
                ArrayD::from_elem(IxDyn(&[]), 0.0),
            ],
            vec![
                ArrayD::from_elem(IxDyn(&[]), 0.0),
                ArrayD::from_elem(IxDyn(&[]), 0.0),
            ],
            vec![((0, 1), ArrayD::from_elem(IxDyn(&[]), 1.0))],
            ArrayD::from_elem(IxDyn(&[]), 0.0),
        );
        let bc = BoundaryCondition::new(
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let (_discs, mixed) = discretize_nd(&grid, &coeffs, &[bc.clone(), bc], &shape).unwrap();

        // v(x, y) = x*y on the 5x5 uniform [0,1]^2 grid: v_xy == 1
        // everywhere, so the stencil should recover 1.0 at every interior
        // node.
        let xs = grid.axis(0).to_vec();
        let ys = grid.axis(1).to_vec();
        let mut v = ArrayD::zeros(IxDyn(&[5, 5]));
        for i in 0..5 {
            for j in 0..5 {
                v[[i, j]] = xs[i] * ys[j];
            }
        }
        let out = mixed.apply(&v);
        for i in 1..4 {
            for j in 1..4 {
                assert_abs_diff_eq!(out[[i, j]], 1.0, epsilon = 1e-8);
            }
        }
        assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn expand_all_reconstructs_2d_dirichlet_boundary() {
        let (grid, shape) = uniform_2d();
        let bc = BoundaryCondition::new(
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 1.0)),
            RobinBoundary::dirichlet(ArrayD::from_elem(IxDyn(&[]), 2.0)),
        );
        let interior = ArrayD::from_elem(IxDyn(&[3, 3]), 0.5);
        let full = expand_all(&interior, &grid, &shape, &[bc.clone(), bc]).unwrap();
        assert_eq!(full.shape(), &[5, 5]);
        assert_abs_diff_eq!(full[[0, 2]], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(full[[4, 2]], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(full[[2, 2]], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn rejects_1d_grid() {
        let axis = Grid::uniform(0.0, 1.0, 5).unwrap();
        let grid = Grid::new(vec![axis]).unwrap();
        let shape = Shape::new(vec![], vec![5]).unwrap();
        let coeffs = Coefficients::new(
            vec![ArrayD::from_elem(IxDyn(&[]), 1.0)],
            vec![ArrayD::from_elem(IxDyn(&[]), 0.0)],
            vec![],
            ArrayD::from_elem(IxDyn(&[]), 0.0),
        );
        let bc = BoundaryCondition::new(
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
            RobinBoundary::neumann(ArrayD::from_elem(IxDyn(&[]), 0.0)),
        );
        let err = discretize_nd(&grid, &coeffs, &[bc], &shape).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
