//! # fdpde-fd
//!
//! Finite-difference solver core for linear parabolic second-order PDEs on
//! 1-D and rectangular N-D grids.
//!
//! Translates the tridiagonal-operator / `Fdm1dSolver` core found in
//! `ql/methods/finitedifferences/` into a discretizer that works against an
//! arbitrary [`Shape`](shape::Shape) of batched, multidimensional grids
//! instead of a single log-price axis, plus the family of time-marching
//! schemes the PDE driver can pick from.
//!
//! # Modules
//!
//! * [`shape`] — batch/grid shape bookkeeping and broadcasting
//! * [`grid`] — 1-D and rectangular N-D spatial coordinate grids
//! * [`coefficients`] — per-axis diffusion/drift/reaction coefficient bundles
//! * [`boundary`] — Robin boundary conditions and the two-neighbor
//!   boundary closure that eliminates boundary nodes from the unknowns
//! * [`stencil`] — central-difference stencil weights
//! * [`operator`] — batched tridiagonal operator (matmul + Thomas solve)
//! * [`discretize_1d`] — nonuniform 1-D spatial discretization
//! * [`discretize_nd`] — uniform rectangular N-D spatial discretization
//! * [`schemes`] — the seven time-marching schemes
//! * [`driver`] — the time-stepping driver that walks a [`driver::StepSizeSpec`]

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod boundary;
pub mod coefficients;
pub mod discretize_1d;
pub mod discretize_nd;
pub mod driver;
pub mod grid;
pub mod operator;
pub mod schemes;
pub mod shape;
pub mod stencil;

pub use boundary::{
    dirichlet, neumann, AxisBoundary, BoundaryCondition, FaceClosure, RobinBoundary,
};
pub use coefficients::{Coefficients, Evaluators, FirstOrderTerms, SecondOrderTerms};
pub use discretize_1d::{discretize_1d, Discretization};
pub use discretize_nd::{discretize_nd, AxisDiscretization, MixedOperator};
pub use driver::{default_tolerance, step_back, StepResult, StepSizeSpec};
pub use grid::Grid;
pub use operator::SpatialOperator;
pub use schemes::{
    CrankNicolson, DouglasAdi, Explicit, Extrapolation, Implicit, OscillationDampedCn, Scheme,
    Weighted,
};
pub use shape::Shape;
