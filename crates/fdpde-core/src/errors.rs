//! Error types for fdpde.
//!
//! Translates QuantLib's exception hierarchy (rooted in `std::exception`)
//! into a single `thiserror`-derived enum, extended with the taxonomy the
//! finite-difference core needs: malformed boundary conditions, grids that
//! fail the solver's shape/monotonicity/uniformity requirements, and a
//! step-size policy that makes no progress. The C++ macros `QL_REQUIRE`,
//! `QL_ENSURE`, and `QL_FAIL` map to the `ensure!`, `ensure_post!`, and
//! `fail!` convenience macros defined here.

use thiserror::Error;

/// The top-level error type used throughout fdpde.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error (maps to `QL_FAIL`).
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated (maps to `QL_REQUIRE`).
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Postcondition violated (maps to `QL_ENSURE`).
    #[error("postcondition not satisfied: {0}")]
    Postcondition(String),

    /// Index out of range.
    #[error("index ({index}) out of range [0, {size})")]
    IndexOutOfRange {
        /// The index that was out of range.
        index: usize,
        /// The size of the container.
        size: usize,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A coefficient or boundary tensor could not be broadcast to the shape
    /// the caller requires (`batch_shape + grid_shape`, or the
    /// per-axis-reduced variant used at a boundary face).
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A boundary condition is degenerate: `alpha == beta == 0` on some
    /// face, or the boundary closure's denominator `kappa` vanishes.
    #[error("malformed boundary condition: {0}")]
    MalformedBoundary(String),

    /// A multidimensional grid's spacing is not uniform along some axis.
    #[error("non-uniform spacing on axis {axis} of a multidimensional grid")]
    NonUniformMultidim {
        /// The offending axis.
        axis: usize,
    },

    /// A coordinate array is not strictly monotone.
    #[error("grid axis {axis} is not strictly monotone")]
    NonMonotoneGrid {
        /// The offending axis.
        axis: usize,
    },

    /// A grid axis has fewer than three points (no interior point exists).
    #[error("grid axis {axis} has {size} point(s), need at least 3")]
    UndersizedGrid {
        /// The offending axis.
        axis: usize,
        /// The axis length that was rejected.
        size: usize,
    },

    /// The step-size policy returned a zero-magnitude or sign-inconsistent
    /// `delta_t`, so the driver could not make forward progress.
    #[error("step-size policy made no progress at t = {t}")]
    NoProgress {
        /// The time at which the policy stalled.
        t: f64,
    },

    /// Non-finite values were detected in `V` after a step. Off by default;
    /// an optional diagnostic, not raised unless the caller asks for it.
    #[error("numerical instability: non-finite values after step at t = {t}")]
    NumericalInstability {
        /// The time at which the instability was detected.
        t: f64,
    },
}

/// Shorthand `Result` type used throughout fdpde.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Equivalent to C++ `QL_REQUIRE(condition, message)`.
///
/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use fdpde_core::{ensure, errors::Error};
/// fn positive(x: f64) -> fdpde_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Equivalent to C++ `QL_ENSURE(condition, message)`.
///
/// Returns `Err(Error::Postcondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use fdpde_core::{ensure_post, errors::Error};
/// fn compute(x: f64) -> fdpde_core::errors::Result<f64> {
///     let result = x * 2.0;
///     ensure_post!(result > 0.0, "result must be positive, got {result}");
///     Ok(result)
/// }
/// assert!(compute(1.0).is_ok());
/// assert!(compute(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_post {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Postcondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Equivalent to C++ `QL_FAIL(message)`.
///
/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use fdpde_core::{fail, errors::Error};
/// fn always_err() -> fdpde_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}
