//! The Numeric Backend: the narrow set of vector and sparse-matrix primitives the
//! eigensolver is written against.
//!
//! All algorithms in [`crate::algorithms`] are generic over [`NumericBackend`],
//! so they never touch storage details or execution resources directly. Every
//! call is synchronous from the caller's point of view: when a method returns,
//! its result is final.
//!
//! [`FaerBackend`] is the concrete host implementation. Dense columns are
//! [`faer::Col`] values updated with faer's own kernels, and the sparse
//! product walks the row structure of [`CsrMatrix`].

use crate::{
    Real,
    matrix::{CsrMatrix, Vector},
};
use faer::{MatRef, Scale, unzip, zip};

/// The primitive operations the eigensolver needs.
///
/// # Panics
///
/// Implementations are expected to panic if the operands' lengths disagree.
/// Shapes are validated once at the entry of each algorithm, so a mismatch
/// here is a programming error rather than a recoverable condition.
pub trait NumericBackend {
    /// Returns `<x, y>`.
    fn dot(&self, x: &Vector, y: &Vector) -> Real;

    /// Computes `y ← y + alpha·x`.
    fn axpy(&self, alpha: Real, x: &Vector, y: &mut Vector);

    /// Computes `x ← alpha·x`.
    fn scale(&self, alpha: Real, x: &mut Vector);

    /// Returns `Σ |x_i|`.
    fn norm1(&self, x: &Vector) -> Real;

    /// Returns the Euclidean norm of `x`.
    fn norm2(&self, x: &Vector) -> Real;

    /// Computes `y ← A·x`, overwriting `y`.
    fn spmv(&self, a: &CsrMatrix, x: &Vector, y: &mut Vector);

    /// Freezes a dense matrix into a sparse operator with a dense row layout,
    /// suitable for repeated application through [`NumericBackend::spmv`].
    fn dense_to_sparse(&self, dense: MatRef<'_, Real>) -> CsrMatrix;
}

/// Host backend built on `faer` dense columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerBackend;

impl FaerBackend {
    pub fn new() -> Self {
        Self
    }
}

#[inline]
fn check_len(expected: usize, actual: usize) {
    assert_eq!(
        expected, actual,
        "Dimension mismatch: vector lengths ({expected}) and ({actual}) differ."
    );
}

impl NumericBackend for FaerBackend {
    #[inline]
    fn dot(&self, x: &Vector, y: &Vector) -> Real {
        check_len(x.nrows(), y.nrows());
        x.as_ref().transpose() * y.as_ref()
    }

    #[inline]
    fn axpy(&self, alpha: Real, x: &Vector, y: &mut Vector) {
        check_len(x.nrows(), y.nrows());
        zip!(&mut *y, x).for_each(|unzip!(y, x)| *y += alpha * *x);
    }

    #[inline]
    fn scale(&self, alpha: Real, x: &mut Vector) {
        *x *= Scale(alpha);
    }

    #[inline]
    fn norm1(&self, x: &Vector) -> Real {
        x.as_ref().norm_l1()
    }

    #[inline]
    fn norm2(&self, x: &Vector) -> Real {
        x.norm_l2()
    }

    fn spmv(&self, a: &CsrMatrix, x: &Vector, y: &mut Vector) {
        assert_eq!(
            a.ncols(),
            x.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            a.ncols(),
            x.nrows(),
        );
        check_len(a.nrows(), y.nrows());

        let offsets = a.row_offsets();
        let cols = a.col_indices();
        match a.values() {
            Some(values) => {
                for i in 0..a.nrows() {
                    let mut sum: Real = 0.0;
                    for idx in offsets[i]..offsets[i + 1] {
                        sum += values[idx] * x[cols[idx]];
                    }
                    y[i] = sum;
                }
            }
            None => {
                for i in 0..a.nrows() {
                    y[i] = (offsets[i]..offsets[i + 1]).map(|idx| x[cols[idx]]).sum();
                }
            }
        }
    }

    fn dense_to_sparse(&self, dense: MatRef<'_, Real>) -> CsrMatrix {
        CsrMatrix::from_dense_rows(dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{Mat, mat};

    fn col(values: &[Real]) -> Vector {
        Vector::from_fn(values.len(), |i| values[i])
    }

    #[test]
    fn test_level_one_operations() {
        let backend = FaerBackend::new();
        let x = col(&[1.0, -2.0, 2.0]);
        let mut y = col(&[0.5, 0.5, 0.5]);

        assert_eq!(backend.dot(&x, &y), 0.5);
        assert_eq!(backend.norm1(&x), 5.0);
        assert!((backend.norm2(&x) - 3.0).abs() < 1e-14);

        backend.axpy(2.0, &x, &mut y);
        assert_eq!(y, col(&[2.5, -3.5, 4.5]));

        backend.scale(-2.0, &mut y);
        assert_eq!(y, col(&[-5.0, 7.0, -9.0]));
    }

    #[test]
    fn test_spmv_matches_dense_product() {
        let backend = FaerBackend::new();
        let a = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 2.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 2.0), (1, 2, -1.0), (2, 1, -1.0), (2, 2, 2.0)],
        )
        .unwrap();
        let x = col(&[1.0, 2.0, 3.0]);
        let mut y = Vector::zeros(3);

        backend.spmv(&a, &x, &mut y);

        let expected = a.to_dense().as_ref() * x.as_ref();
        assert_eq!(y, expected);
        assert_eq!(y, col(&[0.0, 0.0, 4.0]));
    }

    #[test]
    fn test_spmv_on_pattern_matrix() {
        let backend = FaerBackend::new();
        let a = CsrMatrix::from_pattern(2, 3, &[(0, 0), (0, 2), (1, 1)]).unwrap();
        let mut y = col(&[9.0, 9.0]);
        backend.spmv(&a, &col(&[1.0, 2.0, 3.0]), &mut y);
        assert_eq!(y, col(&[4.0, 2.0]));
    }

    #[test]
    fn test_dense_to_sparse_round_trip_through_spmv() {
        let backend = FaerBackend::new();
        let h: Mat<Real> = mat![[1.0, 2.0], [3.0, 4.0]];
        let op = backend.dense_to_sparse(h.as_ref());
        assert_eq!(op.row_offsets(), &[0, 2, 4]);

        let mut y = Vector::zeros(2);
        backend.spmv(&op, &col(&[1.0, 1.0]), &mut y);
        assert_eq!(y, col(&[3.0, 7.0]));
    }

    #[test]
    #[should_panic(expected = "Dimension mismatch: operator columns (2) do not match vector rows (3).")]
    fn test_spmv_dimension_mismatch_panics() {
        let backend = FaerBackend::new();
        let a = CsrMatrix::from_pattern(2, 2, &[(0, 0)]).unwrap();
        let mut y = Vector::zeros(2);
        backend.spmv(&a, &Vector::zeros(3), &mut y);
    }
}
