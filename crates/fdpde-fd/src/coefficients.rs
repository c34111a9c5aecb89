//! Per-axis PDE coefficient bundles.
//!
//! A linear parabolic operator on a rectangular grid is built from a
//! diagonal diffusion tensor, a per-axis drift, a shared reaction term, and
//! (for `dim() > 1`) off-diagonal mixed-derivative coefficients. Each field
//! is stored as a `batch_shape ++ grid_shape`-broadcastable tensor, since
//! coefficients may be scalars, depend only on the batch, or vary over the
//! full grid.
//!
//! [`Evaluators`] is the user-facing half of this module: it holds the
//! (optional) callables the caller supplies for the second-, first-, and
//! zeroth-order terms and turns them into a [`Coefficients`] snapshot at a
//! given `(t, grid)`. A missing callable, a missing individual matrix/vector
//! entry, and an explicit zero tensor are all folded to the same thing — an
//! all-zero coefficient — before discretization ever sees them, so the
//! discretizer and schemes never branch on "is this term present."

use fdpde_core::errors::Result;
use fdpde_core::{Real, Time};
use ndarray::{ArrayD, IxDyn};

use crate::grid::Grid;
use crate::shape::Shape;

/// The coefficients of a linear parabolic operator
/// `L = sum_j D_j d2/dx_j^2 + mu_j d/dx_j + sum_{j<k} M_jk d2/dx_j dx_k + r`.
///
/// `diffusion[j]` and `drift[j]` are diagonal (one per axis); `mixed[(j, k)]`
/// holds the coefficient of the `j < k` mixed second partial and is only
/// consulted when `dim() > 1`. `reaction` is the shared zeroth-order term.
/// Every field broadcasts to `batch_shape ++ grid_shape`.
pub struct Coefficients {
    diffusion: Vec<ArrayD<f64>>,
    drift: Vec<ArrayD<f64>>,
    mixed: Vec<((usize, usize), ArrayD<f64>)>,
    reaction: ArrayD<f64>,
}

impl Coefficients {
    /// Construct a coefficient bundle for a `dim`-dimensional problem.
    ///
    /// `diffusion` and `drift` must each have `dim` entries. `mixed` lists
    /// the off-diagonal `(j, k)` pairs with `j < k` that carry a nonzero
    /// mixed-derivative coefficient; any pair not listed is treated as
    /// zero. `reaction` is the shared zeroth-order coefficient (`0` for a
    /// pure diffusion-drift operator).
    pub fn new(
        diffusion: Vec<ArrayD<f64>>,
        drift: Vec<ArrayD<f64>>,
        mixed: Vec<((usize, usize), ArrayD<f64>)>,
        reaction: ArrayD<f64>,
    ) -> Self {
        Self {
            diffusion,
            drift,
            mixed,
            reaction,
        }
    }

    /// Number of spatial axes this bundle was built for.
    pub fn dim(&self) -> usize {
        self.diffusion.len()
    }

    /// Diffusion coefficient on axis `j`, broadcast to the full tensor shape.
    pub fn diffusion(&self, shape: &Shape, j: usize) -> Result<ndarray::ArrayViewD<'_, f64>> {
        shape.broadcast_to_full(&self.diffusion[j])
    }

    /// Drift coefficient on axis `j`, broadcast to the full tensor shape.
    pub fn drift(&self, shape: &Shape, j: usize) -> Result<ndarray::ArrayViewD<'_, f64>> {
        shape.broadcast_to_full(&self.drift[j])
    }

    /// Mixed-derivative coefficient for axis pair `(j, k)` with `j < k`,
    /// broadcast to the full tensor shape, or `None` if the pair carries
    /// no mixed term.
    pub fn mixed(
        &self,
        shape: &Shape,
        j: usize,
        k: usize,
    ) -> Option<Result<ndarray::ArrayViewD<'_, f64>>> {
        debug_assert!(j < k);
        self.mixed
            .iter()
            .find(|((a, b), _)| *a == j && *b == k)
            .map(|(_, coeff)| shape.broadcast_to_full(coeff))
    }

    /// The pairs of axes that carry a nonzero mixed-derivative coefficient.
    pub fn mixed_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mixed.iter().map(|(pair, _)| *pair)
    }

    /// The shared reaction coefficient, broadcast to the full tensor shape.
    pub fn reaction(&self, shape: &Shape) -> Result<ndarray::ArrayViewD<'_, f64>> {
        shape.broadcast_to_full(&self.reaction)
    }
}

/// The `dim x dim` second-order coefficient matrix a user callable returns.
///
/// Only entries `(i, j)` with `i <= j` are consulted; the lower triangle is
/// ignored entirely, so callers may leave it unset or fill it with whatever
/// is convenient. A missing entry (`None`) means "no second-order term on
/// this axis pair" — equivalent to zero.
pub struct SecondOrderTerms {
    dim: usize,
    entries: Vec<Option<ArrayD<Real>>>,
}

impl SecondOrderTerms {
    /// Build a `dim x dim` matrix of entries, row-major, `entries[i*dim+j]`
    /// giving the `(i, j)` coefficient. Only the upper triangle (`i <= j`)
    /// is ever read back.
    pub fn new(dim: usize, entries: Vec<Option<ArrayD<Real>>>) -> Self {
        debug_assert_eq!(entries.len(), dim * dim);
        Self { dim, entries }
    }

    /// The `(i, j)` entry, reading the upper triangle regardless of
    /// argument order (`get(k, j)` and `get(j, k)` are the same lookup).
    pub fn get(&self, i: usize, j: usize) -> Option<&ArrayD<Real>> {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        self.entries[i * self.dim + j].as_ref()
    }
}

/// The length-`dim` first-order coefficient vector a user callable returns.
/// A missing entry means "no drift on this axis" — equivalent to zero.
pub struct FirstOrderTerms(Vec<Option<ArrayD<Real>>>);

impl FirstOrderTerms {
    /// Build a length-`dim` vector of entries.
    pub fn new(entries: Vec<Option<ArrayD<Real>>>) -> Self {
        Self(entries)
    }

    /// The drift entry on axis `i`.
    pub fn get(&self, i: usize) -> Option<&ArrayD<Real>> {
        self.0[i].as_ref()
    }
}

type SecondOrderFn = dyn Fn(Time, &Grid) -> Result<SecondOrderTerms>;
type FirstOrderFn = dyn Fn(Time, &Grid) -> Result<FirstOrderTerms>;
type ZerothOrderFn = dyn Fn(Time, &Grid) -> Result<Option<ArrayD<Real>>>;

/// The three (optional) user-supplied coefficient callables of a PDE: the
/// second-order (diffusion/mixed), first-order (drift), and zeroth-order
/// (reaction) terms. Evaluating at a `(t, grid)` pair produces a snapshot
/// [`Coefficients`] the discretizer consumes.
///
/// Mirrors the teacher's pattern of accepting a payoff/term-structure as a
/// boxed closure rather than a generic type parameter: the driver loop calls
/// these at several different times per step (CN at `t + dt/2`, weighted
/// schemes at both endpoints), so a trait object is the natural shape.
#[derive(Default)]
pub struct Evaluators {
    dim: usize,
    second_order: Option<Box<SecondOrderFn>>,
    first_order: Option<Box<FirstOrderFn>>,
    zeroth_order: Option<Box<ZerothOrderFn>>,
}

impl Evaluators {
    /// An evaluator bundle for a `dim`-dimensional problem with every term
    /// absent (the whole operator is the zero operator until terms are
    /// attached via the `with_*` builders).
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            second_order: None,
            first_order: None,
            zeroth_order: None,
        }
    }

    /// Attach the second-order (diffusion + mixed) callable.
    pub fn with_second_order(
        mut self,
        f: impl Fn(Time, &Grid) -> Result<SecondOrderTerms> + 'static,
    ) -> Self {
        self.second_order = Some(Box::new(f));
        self
    }

    /// Attach the first-order (drift) callable.
    pub fn with_first_order(
        mut self,
        f: impl Fn(Time, &Grid) -> Result<FirstOrderTerms> + 'static,
    ) -> Self {
        self.first_order = Some(Box::new(f));
        self
    }

    /// Attach the zeroth-order (reaction) callable.
    pub fn with_zeroth_order(
        mut self,
        f: impl Fn(Time, &Grid) -> Result<Option<ArrayD<Real>>> + 'static,
    ) -> Self {
        self.zeroth_order = Some(Box::new(f));
        self
    }

    /// Number of spatial axes this bundle was built for.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Evaluate every attached callable at `(t, grid)` and assemble a
    /// [`Coefficients`] snapshot. Every absent callable, absent entry, and
    /// entry below the diagonal of the second-order matrix collapses to a
    /// zero scalar tensor — broadcastable to any shape the discretizer asks
    /// for — so no branch downstream needs to know which case it came from.
    pub fn evaluate(&self, t: Time, grid: &Grid) -> Result<Coefficients> {
        let zero = || ArrayD::from_elem(IxDyn(&[]), 0.0);

        let second = self
            .second_order
            .as_ref()
            .map(|f| f(t, grid))
            .transpose()?;
        let first = self.first_order.as_ref().map(|f| f(t, grid)).transpose()?;
        let zeroth = self
            .zeroth_order
            .as_ref()
            .map(|f| f(t, grid))
            .transpose()?
            .flatten();

        let diffusion = (0..self.dim)
            .map(|j| {
                second
                    .as_ref()
                    .and_then(|s| s.get(j, j))
                    .cloned()
                    .unwrap_or_else(zero)
            })
            .collect();
        let drift = (0..self.dim)
            .map(|j| {
                first
                    .as_ref()
                    .and_then(|f| f.get(j))
                    .cloned()
                    .unwrap_or_else(zero)
            })
            .collect();

        let mut mixed = Vec::new();
        if let Some(s) = &second {
            for j in 0..self.dim {
                for k in (j + 1)..self.dim {
                    if let Some(m) = s.get(j, k) {
                        mixed.push(((j, k), m.clone()));
                    }
                }
            }
        }

        let reaction = zeroth.unwrap_or_else(zero);
        Ok(Coefficients::new(diffusion, drift, mixed, reaction))
    }
}
