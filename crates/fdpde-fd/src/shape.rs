//! Batch/grid shape bookkeeping.
//!
//! Every tensor the discretizer touches — the value tensor `V`, a
//! coefficient field, a boundary value — lives in one of two shapes: the
//! full tensor shape `batch_shape ++ grid_shape`, or a face-reduced variant
//! where one grid axis has been dropped (a boundary slice). [`Shape`]
//! centralizes both so the discretizer and the schemes never hand-roll
//! axis arithmetic.

use fdpde_core::ensure;
use fdpde_core::errors::{Error, Result};
use ndarray::{ArrayD, IxDyn};

/// The shape of a problem: an arbitrary batch of independent PDE instances,
/// each posed over the same rectangular grid.
///
/// `batch_shape` is the leading set of axes (e.g. a Monte Carlo scenario
/// axis, a calibration-grid axis) that the discretizer treats as pure
/// broadcasting dimensions — no derivative acts along them. `grid_shape` is
/// the trailing set of axes the PDE is actually discretized over, one per
/// spatial dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    batch_shape: Vec<usize>,
    grid_shape: Vec<usize>,
}

impl Shape {
    /// Construct a shape from a batch shape and a grid shape.
    ///
    /// `grid_shape` must be non-empty; every axis must have at least 3
    /// points (the minimum for a central-difference interior point to
    /// exist).
    pub fn new(batch_shape: Vec<usize>, grid_shape: Vec<usize>) -> Result<Self> {
        ensure!(!grid_shape.is_empty(), "grid_shape must have at least one axis");
        for (axis, &n) in grid_shape.iter().enumerate() {
            if n < 3 {
                return Err(Error::UndersizedGrid { axis, size: n });
            }
        }
        Ok(Self {
            batch_shape,
            grid_shape,
        })
    }

    /// Number of spatial (grid) dimensions.
    pub fn dim(&self) -> usize {
        self.grid_shape.len()
    }

    /// The batch shape (may be empty, i.e. a single unbatched problem).
    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// The grid shape, one length per spatial axis.
    pub fn grid_shape(&self) -> &[usize] {
        &self.grid_shape
    }

    /// `batch_shape ++ grid_shape`: the shape of the full value tensor.
    pub fn full_shape(&self) -> Vec<usize> {
        let mut s = self.batch_shape.clone();
        s.extend_from_slice(&self.grid_shape);
        s
    }

    /// `batch_shape ++ grid_shape` with axis `axis` (a grid axis, 0-indexed
    /// within the grid) dropped: the shape of a boundary face slice.
    pub fn face_shape(&self, axis: usize) -> Vec<usize> {
        let mut s = self.batch_shape.clone();
        for (j, &n) in self.grid_shape.iter().enumerate() {
            if j != axis {
                s.push(n);
            }
        }
        s
    }

    /// The index of grid axis `axis` within the full tensor's axis list.
    pub fn full_axis(&self, axis: usize) -> usize {
        self.batch_shape.len() + axis
    }

    /// `grid_shape` with every axis reduced by 2: the shape of the PDE
    /// unknowns, which never include the two boundary nodes per axis (they
    /// are eliminated via the boundary closure, see [`crate::boundary`]).
    pub fn interior_grid_shape(&self) -> Vec<usize> {
        self.grid_shape.iter().map(|&n| n - 2).collect()
    }

    /// `batch_shape ++ interior_grid_shape()`: the shape of the tensor the
    /// linear system is actually solved over.
    pub fn interior_full_shape(&self) -> Vec<usize> {
        let mut s = self.batch_shape.clone();
        s.extend(self.interior_grid_shape());
        s
    }

    /// Allocate a zero-filled full value tensor.
    pub fn zeros_full(&self) -> ArrayD<f64> {
        ArrayD::zeros(IxDyn(&self.full_shape()))
    }

    /// Allocate a zero-filled interior value tensor.
    pub fn zeros_interior(&self) -> ArrayD<f64> {
        ArrayD::zeros(IxDyn(&self.interior_full_shape()))
    }

    /// Broadcast `src` to the full tensor shape, per the spec's
    /// "broadcastable to `batch_shape ++ grid_shape`" coefficient/boundary
    /// contract. `ndarray`'s right-aligned broadcasting rules are used
    /// as-is, so a tensor whose shape only matches `batch_shape` (and omits
    /// the grid axes entirely) is rejected rather than silently
    /// broadcasting over the grid.
    pub fn broadcast_to_full<'a>(&self, src: &'a ArrayD<f64>) -> Result<ndarray::ArrayViewD<'a, f64>> {
        let target = self.full_shape();
        src.broadcast(IxDyn(&target)).ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "cannot broadcast shape {:?} to {:?}",
                src.shape(),
                target
            ))
        })
    }

    /// Broadcast `src` to the face shape of grid axis `axis` (the shape
    /// of a boundary value tensor on that face).
    pub fn broadcast_to_face<'a>(
        &self,
        axis: usize,
        src: &'a ArrayD<f64>,
    ) -> Result<ndarray::ArrayViewD<'a, f64>> {
        let target = self.face_shape(axis);
        src.broadcast(IxDyn(&target)).ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "cannot broadcast shape {:?} to face shape {:?} on axis {axis}",
                src.shape(),
                target
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_shape_concatenates_batch_and_grid() {
        let shape = Shape::new(vec![5], vec![10, 20]).unwrap();
        assert_eq!(shape.full_shape(), vec![5, 10, 20]);
        assert_eq!(shape.face_shape(0), vec![5, 20]);
        assert_eq!(shape.face_shape(1), vec![5, 10]);
        assert_eq!(shape.full_axis(1), 2);
    }

    #[test]
    fn undersized_grid_axis_is_rejected() {
        let err = Shape::new(vec![], vec![3, 2]).unwrap_err();
        assert_eq!(err, Error::UndersizedGrid { axis: 1, size: 2 });
    }

    #[test]
    fn broadcast_rejects_batch_only_shape() {
        let shape = Shape::new(vec![5], vec![10, 10]).unwrap();
        let src = ArrayD::zeros(IxDyn(&[5]));
        assert!(shape.broadcast_to_full(&src).is_err());
    }

    #[test]
    fn broadcast_accepts_scalar_and_full_shape() {
        let shape = Shape::new(vec![], vec![10, 10]).unwrap();
        let scalar = ArrayD::from_elem(IxDyn(&[]), 1.5);
        assert!(shape.broadcast_to_full(&scalar).is_ok());
        let full = shape.zeros_full();
        assert!(shape.broadcast_to_full(&full).is_ok());
    }
}
