//! Robin boundary conditions and the two-neighbor boundary closure.
//!
//! Every grid face carries a Robin condition `alpha*V + beta*dV/dn = gamma`,
//! where `n` is the outward normal of that face. Dirichlet (`beta = 0`) and
//! Neumann (`alpha = 0`) are the degenerate cases; [`RobinBoundary::dirichlet`]
//! and [`RobinBoundary::neumann`] are convenience builders for them.
//!
//! The discretizer never carries boundary nodes as unknowns of the linear
//! system: a three-point one-sided formula expresses the boundary value
//! `V0` as a linear combination of its two nearest interior neighbors `V1`,
//! `V2`,
//!
//! ```text
//! V0 = xi1*V1 + xi2*V2 + eta
//! ```
//!
//! second-order accurate on nonuniform spacing. [`face_closure`] computes
//! `(xi1, xi2, eta)`; [`fold_lower`]/[`fold_upper`] substitute that relation
//! into the interior row touching the boundary, so the row becomes an
//! ordinary two-term tridiagonal equation; [`reconstruct_boundary`] applies
//! the same relation in reverse, from the newly solved interior values, to
//! restore the full value tensor after a step.

use fdpde_core::errors::{Error, Result};
use fdpde_core::{Real, Time};
use ndarray::{ArrayD, Zip};

use crate::grid::Grid;
use crate::shape::Shape;

/// A Robin boundary condition `alpha*V + beta*dV/dn = gamma` on one face,
/// with coefficients broadcastable to the face's shape (`batch_shape ++
/// grid_shape` with the boundary's own axis dropped).
#[derive(Debug, Clone)]
pub struct RobinBoundary {
    alpha: ArrayD<Real>,
    beta: ArrayD<Real>,
    gamma: ArrayD<Real>,
}

impl RobinBoundary {
    /// A general Robin condition `alpha*V + beta*dV/dn = gamma`.
    pub fn robin(alpha: ArrayD<Real>, beta: ArrayD<Real>, gamma: ArrayD<Real>) -> Self {
        Self { alpha, beta, gamma }
    }

    /// A Dirichlet condition `V = value` (`alpha = 1, beta = 0`).
    pub fn dirichlet(value: ArrayD<Real>) -> Self {
        Self {
            alpha: ArrayD::from_elem(value.raw_dim(), 1.0),
            beta: ArrayD::from_elem(value.raw_dim(), 0.0),
            gamma: value,
        }
    }

    /// A Neumann condition `dV/dn = flux` (`alpha = 0, beta = 1`).
    pub fn neumann(flux: ArrayD<Real>) -> Self {
        Self {
            alpha: ArrayD::from_elem(flux.raw_dim(), 0.0),
            beta: ArrayD::from_elem(flux.raw_dim(), 1.0),
            gamma: flux,
        }
    }

    fn broadcast<'a>(
        &'a self,
        shape: &Shape,
        axis: usize,
    ) -> Result<(
        ndarray::ArrayViewD<'a, Real>,
        ndarray::ArrayViewD<'a, Real>,
        ndarray::ArrayViewD<'a, Real>,
    )> {
        Ok((
            shape.broadcast_to_face(axis, &self.alpha)?,
            shape.broadcast_to_face(axis, &self.beta)?,
            shape.broadcast_to_face(axis, &self.gamma)?,
        ))
    }

    /// Broadcast the raw `(alpha, beta, gamma)` tensors directly to
    /// `target`, independent of any [`Shape`]'s own face-shape convention.
    fn broadcast_raw<'a>(
        &'a self,
        target: &[usize],
    ) -> Result<(
        ndarray::ArrayViewD<'a, Real>,
        ndarray::ArrayViewD<'a, Real>,
        ndarray::ArrayViewD<'a, Real>,
    )> {
        let b = |t: &'a ArrayD<Real>| -> Result<ndarray::ArrayViewD<'a, Real>> {
            t.broadcast(ndarray::IxDyn(target)).ok_or_else(|| {
                Error::ShapeMismatch(format!(
                    "cannot broadcast boundary tensor {:?} to {:?}",
                    t.shape(),
                    target
                ))
            })
        };
        Ok((b(&self.alpha)?, b(&self.beta)?, b(&self.gamma)?))
    }

    /// The raw `alpha` tensor, before broadcasting.
    pub fn alpha_ref(&self) -> &ArrayD<Real> {
        &self.alpha
    }

    /// The raw `beta` tensor, before broadcasting.
    pub fn beta_ref(&self) -> &ArrayD<Real> {
        &self.beta
    }

    /// The raw `gamma` tensor, before broadcasting.
    pub fn gamma_ref(&self) -> &ArrayD<Real> {
        &self.gamma
    }

    /// `true` if this face is a pure Dirichlet condition (`beta` is
    /// identically zero).
    pub fn is_dirichlet(&self) -> bool {
        self.beta.iter().all(|&b| b == 0.0)
    }
}

/// A boundary condition for one spatial axis: a Robin condition at each
/// of its two faces.
#[derive(Debug, Clone)]
pub struct BoundaryCondition {
    /// The condition at the low-coordinate face.
    pub lo: RobinBoundary,
    /// The condition at the high-coordinate face.
    pub hi: RobinBoundary,
}

impl BoundaryCondition {
    /// Build a boundary condition from its two faces.
    pub fn new(lo: RobinBoundary, hi: RobinBoundary) -> Self {
        Self { lo, hi }
    }
}

type FaceFn = dyn Fn(Time, &Grid) -> Result<RobinBoundary>;

/// A boundary condition for one axis whose two faces may depend on time and
/// the current grid, e.g. a discount-adjusted far-field condition on a
/// pricing PDE. The driver evaluates these once per step, at whatever time
/// the scheme needs them.
pub struct AxisBoundary {
    lo: Box<FaceFn>,
    hi: Box<FaceFn>,
}

impl AxisBoundary {
    /// Build an axis boundary from two `(t, grid) -> RobinBoundary` callables.
    pub fn new(
        lo: impl Fn(Time, &Grid) -> Result<RobinBoundary> + 'static,
        hi: impl Fn(Time, &Grid) -> Result<RobinBoundary> + 'static,
    ) -> Self {
        Self {
            lo: Box::new(lo),
            hi: Box::new(hi),
        }
    }

    /// A time-invariant axis boundary, wrapping a fixed [`BoundaryCondition`].
    pub fn constant(bc: BoundaryCondition) -> Self {
        let lo = bc.lo;
        let hi = bc.hi;
        Self::new(move |_t, _g| Ok(lo.clone()), move |_t, _g| Ok(hi.clone()))
    }

    /// Evaluate both faces at `(t, grid)`, producing a snapshot
    /// [`BoundaryCondition`] for the discretizer.
    pub fn evaluate(&self, t: Time, grid: &Grid) -> Result<BoundaryCondition> {
        Ok(BoundaryCondition::new((self.lo)(t, grid)?, (self.hi)(t, grid)?))
    }
}

/// Convenience builder for a Dirichlet face `V = f(t, grid)`, matching the
/// driver-facing contract `dirichlet(f) == f -> (1, 0, f)`.
pub fn dirichlet(
    f: impl Fn(Time, &Grid) -> Result<ArrayD<Real>> + 'static,
) -> impl Fn(Time, &Grid) -> Result<RobinBoundary> {
    move |t, grid| Ok(RobinBoundary::dirichlet(f(t, grid)?))
}

/// Convenience builder for a Neumann face `dV/dn = f(t, grid)`, matching the
/// driver-facing contract `neumann(f) == f -> (0, 1, f)`.
pub fn neumann(
    f: impl Fn(Time, &Grid) -> Result<ArrayD<Real>> + 'static,
) -> impl Fn(Time, &Grid) -> Result<RobinBoundary> {
    move |t, grid| Ok(RobinBoundary::neumann(f(t, grid)?))
}

/// The closure coefficients `(xi1, xi2, eta)` of `V0 = xi1*V1 + xi2*V2 +
/// eta`, per §4.2, where `V1` is the nearest interior neighbor of the face
/// and `V2` the next.
#[derive(Debug, Clone)]
pub struct FaceClosure {
    xi1: ArrayD<Real>,
    xi2: ArrayD<Real>,
    eta: ArrayD<Real>,
}

impl FaceClosure {
    /// `true` everywhere on the face (the common case, a uniform boundary
    /// type): the face is pure Dirichlet, i.e. `xi1 == xi2 == 0`.
    pub fn is_dirichlet(&self) -> bool {
        self.xi1.iter().all(|&v| v == 0.0) && self.xi2.iter().all(|&v| v == 0.0)
    }

    /// `true` everywhere on the face if the closure does not reach past
    /// its nearest interior neighbor (`xi2 == 0`). A three-point grid axis
    /// (a single interior row serving both faces at once) requires this on
    /// both faces, since the "second neighbor" a non-Dirichlet-equivalent
    /// closure would need is the opposite boundary node, not a real
    /// interior unknown.
    pub fn is_dirichlet_xi2(&self) -> bool {
        self.xi2.iter().all(|&v| v == 0.0)
    }
}

/// Solve the Robin relation at a face for `(xi1, xi2, eta)` in
/// `V0 = xi1*V1 + xi2*V2 + eta`, given the face tensors (already broadcast
/// to the face shape) and the two neighbor spacings `(Delta0, Delta1)`
/// (face-to-`V1`, `V1`-to-`V2`).
///
/// Implements the exact formulas of §4.2:
///
/// ```text
/// kappa = alpha*D0*D1*(D0+D1) + beta*D1*(2*D0+D1)
/// xi1   =  beta*(D0+D1)^2 / kappa
/// xi2   = -beta*D0^2 / kappa
/// eta   =  gamma*D0*D1*(D0+D1) / kappa
/// ```
///
/// Dirichlet (`beta == 0`) collapses to `xi1 = xi2 = 0, eta = gamma/alpha`.
/// Fails with [`Error::MalformedBoundary`] when `alpha == beta == 0`
/// anywhere on the face, or when `kappa == 0` (an ill-conditioned face —
/// `BoundaryIllConditioned` in the taxonomy of §7).
pub fn face_closure(
    alpha: &ndarray::ArrayViewD<Real>,
    beta: &ndarray::ArrayViewD<Real>,
    gamma: &ndarray::ArrayViewD<Real>,
    d0: Real,
    d1: Real,
) -> Result<FaceClosure> {
    let mut xi1 = ArrayD::zeros(alpha.raw_dim());
    let mut xi2 = ArrayD::zeros(alpha.raw_dim());
    let mut eta = ArrayD::zeros(alpha.raw_dim());
    let mut malformed = false;
    let mut ill_conditioned = false;
    Zip::from(&mut xi1)
        .and(&mut xi2)
        .and(&mut eta)
        .and(alpha)
        .and(beta)
        .and(gamma)
        .for_each(|xi1, xi2, eta, &a, &b, &g| {
            if a == 0.0 && b == 0.0 {
                malformed = true;
                return;
            }
            let kappa = a * d0 * d1 * (d0 + d1) + b * d1 * (2.0 * d0 + d1);
            if kappa == 0.0 {
                ill_conditioned = true;
                return;
            }
            *xi1 = b * (d0 + d1) * (d0 + d1) / kappa;
            *xi2 = -b * d0 * d0 / kappa;
            *eta = g * d0 * d1 * (d0 + d1) / kappa;
        });
    if malformed {
        return Err(Error::MalformedBoundary(
            "alpha == beta == 0 on a boundary face".into(),
        ));
    }
    if ill_conditioned {
        return Err(Error::MalformedBoundary(
            "boundary closure is ill-conditioned: kappa == 0".into(),
        ));
    }
    Ok(FaceClosure { xi1, xi2, eta })
}

/// Build the lower-face closure of axis `axis` at `(t, grid)`: broadcasts
/// `bc`'s face tensors and solves for `(xi1, xi2, eta)` using
/// `grid.boundary_spacings(axis)`'s lower pair.
pub fn lower_closure(bc: &RobinBoundary, shape: &Shape, axis: usize, grid: &Grid) -> Result<FaceClosure> {
    let (alpha, beta, gamma) = bc.broadcast(shape, axis)?;
    let ((d0, d1), _) = grid.boundary_spacings(axis);
    face_closure(&alpha, &beta, &gamma, d0, d1)
}

/// Build the upper-face closure of axis `axis` at `(t, grid)`: the mirror
/// image of [`lower_closure`], using `grid.boundary_spacings(axis)`'s upper
/// pair.
pub fn upper_closure(bc: &RobinBoundary, shape: &Shape, axis: usize, grid: &Grid) -> Result<FaceClosure> {
    let (alpha, beta, gamma) = bc.broadcast(shape, axis)?;
    let (_, (d0, d1)) = grid.boundary_spacings(axis);
    face_closure(&alpha, &beta, &gamma, d0, d1)
}

/// Build a face closure at an arbitrary target shape, broadcasting `bc`'s
/// raw (user-supplied, typically scalar or batch-only) tensors directly —
/// unlike [`lower_closure`]/[`upper_closure`], which always broadcast to a
/// [`Shape`]'s own face shape. Used where the face shape needed doesn't
/// match any single [`Shape`]: folding an N-D axis's boundary row restricts
/// every *other* grid axis to its interior range, and reconstructing one
/// axis at a time produces a shape that is a mix of already-expanded (full)
/// and not-yet-expanded (interior) axes.
pub fn closure_at(bc: &RobinBoundary, target_shape: &[usize], d0: Real, d1: Real) -> Result<FaceClosure> {
    let (alpha, beta, gamma) = bc.broadcast_raw(target_shape)?;
    face_closure(&alpha, &beta, &gamma, d0, d1)
}

/// Fold the lower-face closure into the first interior row's stencil
/// `(a, b, c)`, the coefficients the central-difference stencil assigned to
/// `(V0, V1, V2)` at the first interior point. Substituting
/// `V0 = xi1*V1 + xi2*V2 + eta` turns the row into the ordinary two-term
/// equation `diag*V1 + upper*V2 = rhs - affine`, returned as
/// `(diag, upper, affine)` in the `L v + affine` convention used
/// throughout the discretizer.
pub fn fold_lower(
    a: &ArrayD<Real>,
    b: &ArrayD<Real>,
    c: &ArrayD<Real>,
    closure: &FaceClosure,
) -> (ArrayD<Real>, ArrayD<Real>, ArrayD<Real>) {
    let diag = b + a * &closure.xi1;
    let upper = c + a * &closure.xi2;
    let affine = a * &closure.eta;
    (diag, upper, affine)
}

/// Fold the upper-face closure into the last interior row's stencil
/// `(a, b, c)`, the coefficients assigned to `(V_{n-3}, V_{n-2}, V0)` at the
/// last interior point (`V0` here is the upper boundary). See
/// [`fold_lower`]; returns `(lower, diag, affine)`.
pub fn fold_upper(
    a: &ArrayD<Real>,
    b: &ArrayD<Real>,
    c: &ArrayD<Real>,
    closure: &FaceClosure,
) -> (ArrayD<Real>, ArrayD<Real>, ArrayD<Real>) {
    let lower = a + c * &closure.xi2;
    let diag = b + c * &closure.xi1;
    let affine = c * &closure.eta;
    (lower, diag, affine)
}

/// Reconstruct a boundary face from its two nearest interior neighbors,
/// `V0 = xi1*V1 + xi2*V2 + eta`, using the just-solved interior values.
/// The same relation used to fold the boundary out of the system, run in
/// reverse.
pub fn reconstruct_boundary(
    v1: &ndarray::ArrayViewD<Real>,
    v2: &ndarray::ArrayViewD<Real>,
    closure: &FaceClosure,
) -> ArrayD<Real> {
    &closure.xi1 * v1 + &closure.xi2 * v2 + &closure.eta
}

/// Expand an interior-only tensor (length `m` along `full_axis`) back to
/// the full grid length `m + 2`, filling the two boundary faces via
/// [`reconstruct_boundary`]. `lo`/`hi` must already be broadcast to
/// `interior`'s shape with `full_axis` dropped. When `m == 1` the single
/// interior row stands in for both of its own neighbors — valid only
/// because a three-point axis is required to have `xi2 == 0` on both faces
/// (see [`FaceClosure::is_dirichlet_xi2`]), so the otherwise-nonexistent
/// second neighbor's value is never actually used.
pub fn expand_interior(
    interior: &ArrayD<Real>,
    full_axis: usize,
    lo: &FaceClosure,
    hi: &FaceClosure,
) -> ArrayD<Real> {
    use ndarray::{Axis, Slice};

    let m = interior.len_of(Axis(full_axis));
    let mut full_shape = interior.shape().to_vec();
    full_shape[full_axis] = m + 2;
    let mut out = ArrayD::zeros(ndarray::IxDyn(&full_shape));
    out.slice_axis_mut(Axis(full_axis), Slice::from(1..=m))
        .assign(interior);

    let v1 = interior.index_axis(Axis(full_axis), 0);
    let v2 = interior.index_axis(Axis(full_axis), if m >= 2 { 1 } else { 0 });
    let lo_val = reconstruct_boundary(&v1, &v2, lo);
    out.index_axis_mut(Axis(full_axis), 0).assign(&lo_val);

    let vn1 = interior.index_axis(Axis(full_axis), m - 1);
    let vn2 = interior.index_axis(Axis(full_axis), if m >= 2 { m - 2 } else { m - 1 });
    let hi_val = reconstruct_boundary(&vn1, &vn2, hi);
    out.index_axis_mut(Axis(full_axis), m + 1).assign(&hi_val);

    out
}

/// Reconstruct the full value tensor (every boundary node filled) from the
/// interior-only tensor the linear system was solved over, one axis at a
/// time. Axes are expanded in order `0..shape.dim()`: once axis `j` has
/// been expanded, later axes see it at full length, matching the mixed
/// shape [`expand_interior`] needs at each step. The per-axis closures are
/// recomputed at each stage's own current shape, since the set of
/// already-expanded axes — and hence the face shape — changes after every
/// step.
pub fn expand_all(
    interior: &ArrayD<Real>,
    grid: &Grid,
    shape: &Shape,
    bcs: &[BoundaryCondition],
) -> Result<ArrayD<Real>> {
    let mut current = interior.clone();
    for axis in 0..shape.dim() {
        let full_axis = shape.full_axis(axis);
        let face_shape: Vec<usize> = current
            .shape()
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != full_axis)
            .map(|(_, &n)| n)
            .collect();
        let ((d0_lo, d1_lo), (d0_hi, d1_hi)) = grid.boundary_spacings(axis);
        let lo_closure = closure_at(&bcs[axis].lo, &face_shape, d0_lo, d1_lo)?;
        let hi_closure = closure_at(&bcs[axis].hi, &face_shape, d0_hi, d1_hi)?;
        current = expand_interior(&current, full_axis, &lo_closure, &hi_closure);
    }
    Ok(current)
}
