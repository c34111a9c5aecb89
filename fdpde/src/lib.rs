//! # fdpde
//!
//! A finite-difference solver core for linear parabolic second-order PDEs,
//! on 1-D (possibly nonuniform) grids and rectangular, per-axis-uniform
//! N-D grids.
//!
//! This crate is a **façade** that re-exports the public items of the
//! underlying workspace crates. Application code should depend on this
//! crate rather than on `fdpde-core` / `fdpde-fd` directly.
//!
//! ## Quick start
//!
//! ```toml
//! [dependencies]
//! fdpde = "0.1"
//! ```
//!
//! ```rust
//! use fdpde::core::Real;
//!
//! let diffusion: Real = 0.5;
//! assert!((diffusion - 0.5).abs() < f64::EPSILON);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types and the error hierarchy.
pub use fdpde_core as core;

/// Discretization, time-marching schemes, and the time-stepping driver.
pub use fdpde_fd as fd;

pub use fdpde_fd::{
    default_tolerance, dirichlet, discretize_1d, discretize_nd, neumann, step_back,
    AxisBoundary, AxisDiscretization, BoundaryCondition, Coefficients, CrankNicolson,
    Discretization, DouglasAdi, Evaluators, Explicit, Extrapolation, FaceClosure,
    FirstOrderTerms, Grid, Implicit, MixedOperator, OscillationDampedCn, RobinBoundary,
    Scheme, SecondOrderTerms, Shape, SpatialOperator, StepResult, StepSizeSpec, Weighted,
};
