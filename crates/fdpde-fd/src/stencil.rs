//! Central-difference stencil weights.
//!
//! Gives the three weights `(a, b, c)` such that, for an interior point
//! `i` on a (possibly nonuniform) axis with neighbor spacings `(h_minus,
//! h_plus)`, the per-term spatial operator
//! `L v = D * v_xx + mu * v_x + r * v`
//! is approximated by `a*v[i-1] + b*v[i] + c*v[i+1]`.
//!
//! `L` is the literal, non-negated per-term operator: the sign convention
//! is fixed by the driver, which marches `dV/dt = L V` (forward) or
//! `dV/dt = -L V` stepped backward in time (terminal value problems) —
//! never baked into the stencil itself.

use fdpde_core::Real;

/// Second-derivative weights `(a, b, c)` on neighbor spacings
/// `(h_minus, h_plus)`, exact for nonuniform grids.
///
/// `v_xx[i] ~= a*v[i-1] + b*v[i] + c*v[i+1]`.
pub fn second_derivative_weights(h_minus: Real, h_plus: Real) -> (Real, Real, Real) {
    let a = 2.0 / (h_minus * (h_minus + h_plus));
    let c = 2.0 / (h_plus * (h_minus + h_plus));
    let b = -(a + c);
    (a, b, c)
}

/// First-derivative weights `(a, b, c)` on neighbor spacings
/// `(h_minus, h_plus)`, exact for nonuniform grids.
///
/// `v_x[i] ~= a*v[i-1] + b*v[i] + c*v[i+1]`.
pub fn first_derivative_weights(h_minus: Real, h_plus: Real) -> (Real, Real, Real) {
    let a = -h_plus / (h_minus * (h_minus + h_plus));
    let c = h_minus / (h_plus * (h_minus + h_plus));
    let b = -(a + c);
    (a, b, c)
}

/// The full per-axis stencil `(a, b, c)` for `L v = D*v_xx + mu*v_x + r*v`
/// at one interior point, given the diffusion `diffusion`, drift `drift`,
/// and (axis-shared) reaction `reaction` coefficients at that point and the
/// neighbor spacings.
///
/// `reaction` should be split evenly across axes by the caller (e.g.
/// divided by `dim()`) so that summing this stencil's diagonal
/// contribution over every axis reproduces the operator's single `r*v`
/// term exactly once; see [`crate::discretize_nd`].
pub fn operator_weights(
    diffusion: Real,
    drift: Real,
    reaction: Real,
    h_minus: Real,
    h_plus: Real,
) -> (Real, Real, Real) {
    let (da, db, dc) = second_derivative_weights(h_minus, h_plus);
    let (fa, fb, fc) = first_derivative_weights(h_minus, h_plus);
    (
        diffusion * da + drift * fa,
        diffusion * db + drift * fb + reaction,
        diffusion * dc + drift * fc,
    )
}

/// Mixed second-partial weights for the four-point stencil
/// `v_xy[i,j] ~= (v[i+1,j+1] - v[i+1,j-1] - v[i-1,j+1] + v[i-1,j-1]) / (4 hx hy)`
/// on a uniform grid with steps `(hx, hy)`. Returns the shared coefficient
/// multiplying each of the four corner values (with the appropriate sign
/// already folded in by the caller via [`MixedCorner`]).
pub fn mixed_derivative_weight(hx: Real, hy: Real) -> Real {
    1.0 / (4.0 * hx * hy)
}

/// The sign and axis offsets of one corner of the mixed-derivative
/// four-point stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixedCorner {
    /// `(+1, +1)`, weight `+1`.
    PlusPlus,
    /// `(+1, -1)`, weight `-1`.
    PlusMinus,
    /// `(-1, +1)`, weight `-1`.
    MinusPlus,
    /// `(-1, -1)`, weight `+1`.
    MinusMinus,
}

impl MixedCorner {
    /// The four corners in a fixed iteration order.
    pub const ALL: [MixedCorner; 4] = [
        MixedCorner::PlusPlus,
        MixedCorner::PlusMinus,
        MixedCorner::MinusPlus,
        MixedCorner::MinusMinus,
    ];

    /// The `(di, dj)` axis offsets of this corner.
    pub fn offsets(self) -> (isize, isize) {
        match self {
            MixedCorner::PlusPlus => (1, 1),
            MixedCorner::PlusMinus => (1, -1),
            MixedCorner::MinusPlus => (-1, 1),
            MixedCorner::MinusMinus => (-1, -1),
        }
    }

    /// The sign of this corner's contribution.
    pub fn sign(self) -> Real {
        match self {
            MixedCorner::PlusPlus | MixedCorner::MinusMinus => 1.0,
            MixedCorner::PlusMinus | MixedCorner::MinusPlus => -1.0,
        }
    }
}
