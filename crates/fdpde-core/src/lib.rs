//! # fdpde-core
//!
//! Core types and error definitions shared by the `fdpde` workspace.
//!
//! This crate provides the foundational building blocks used across the
//! discretizer, the time-marching schemes, and the time-stepping driver —
//! type aliases and the error hierarchy.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod errors;

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// A time measurement, signed so that backward evolution (`t_f -> t_0`)
/// is expressed directly rather than through a derived sign flag.
pub type Time = Real;
