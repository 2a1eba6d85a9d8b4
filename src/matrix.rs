//! This module defines the storage types the eigensolver works on.
//!
//! - [`CsrMatrix`] is the immutable compressed-sparse-row matrix `A` (and, after
//!   the Arnoldi factorization, the frozen projection `H`).
//! - [`Vector`] is a dense column, backed by [`faer::Col`].
//! - [`VectorSet`] is an ordered, fixed-size batch of equal-length vectors. The
//!   Orthogonalizer processes it left to right, so the order is significant.
//!
//! None of these types perform arithmetic themselves beyond trivial accessors;
//! all vector algebra goes through a [`crate::backend::NumericBackend`].

use crate::{Real, error::EigenError};
use faer::{
    Col, Mat,
    sparse::{CreationError, Pair, SparseRowMat, SymbolicSparseRowMat, Triplet},
};
use rand::Rng;

/// A dense column vector of the working precision.
pub type Vector = Col<Real>;

/// Compressed-sparse-row matrix.
///
/// The sparsity structure is a [`faer::sparse::SymbolicSparseRowMat`]; the
/// values are kept beside it so that a pattern-only matrix, whose stored
/// entries all act as `1`, needs no value array at all.
///
/// # Layout
///
/// For a matrix with `rows` rows and `nnz` stored entries:
/// - `row_offsets` has length `rows + 1`, starts at `0` and ends at `nnz`
/// - `col_indices` has length `nnz`, strictly increasing within each row and
///   every index in `[0, cols)`
/// - `values` has length `nnz`, or is absent for a pattern-only matrix
///
/// These invariants are checked once, on construction, so that the hot
/// sparse matrix-vector product never has to.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    symbolic: SymbolicSparseRowMat<usize>,
    values: Option<Vec<Real>>,
}

impl PartialEq for CsrMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.symbolic.parts() == other.symbolic.parts() && self.values == other.values
    }
}

fn creation_error(nrows: usize, ncols: usize, err: CreationError) -> EigenError {
    match err {
        CreationError::OutOfBounds { row, col } => EigenError::input(format!(
            "entry ({row}, {col}) lies outside a {nrows}x{ncols} matrix."
        )),
        CreationError::Generic(e) => EigenError::input(format!("sparse assembly failed: {e:?}")),
    }
}

impl CsrMatrix {
    /// Builds a matrix from raw CSR arrays, validating every structural invariant.
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Option<Vec<Real>>,
    ) -> Result<Self, EigenError> {
        if row_offsets.len() != nrows + 1 {
            return Err(EigenError::mismatch(nrows + 1, row_offsets.len()));
        }
        if row_offsets[0] != 0 {
            return Err(EigenError::input("row_offsets[0] must be 0."));
        }
        if row_offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(EigenError::input("row_offsets must be non-decreasing."));
        }
        let nnz = row_offsets[nrows];
        if col_indices.len() != nnz {
            return Err(EigenError::mismatch(nnz, col_indices.len()));
        }
        if let Some(values) = &values {
            if values.len() != nnz {
                return Err(EigenError::mismatch(nnz, values.len()));
            }
        }
        if let Some(&bad) = col_indices.iter().find(|&&c| c >= ncols) {
            return Err(EigenError::input(format!(
                "column index {bad} is out of range for a matrix with {ncols} columns."
            )));
        }
        let unsorted = row_offsets
            .windows(2)
            .any(|w| col_indices[w[0]..w[1]].windows(2).any(|c| c[0] >= c[1]));
        if unsorted {
            return Err(EigenError::input(
                "column indices must be strictly increasing within each row.",
            ));
        }

        let symbolic =
            SymbolicSparseRowMat::new_checked(nrows, ncols, row_offsets, None, col_indices);
        Ok(Self { symbolic, values })
    }

    /// Builds a matrix from `(row, col, value)` triplets.
    ///
    /// Entries are sorted by `(row, col)` and duplicates are summed, the usual
    /// assembly semantics for sparse formats.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, Real)],
    ) -> Result<Self, EigenError> {
        let triplets: Vec<Triplet<usize, usize, Real>> = triplets
            .iter()
            .map(|&(row, col, val)| Triplet::new(row, col, val))
            .collect();
        let (symbolic, values) = SparseRowMat::try_new_from_triplets(nrows, ncols, &triplets)
            .map_err(|e| creation_error(nrows, ncols, e))?
            .into_parts();
        Ok(Self {
            symbolic,
            values: Some(values),
        })
    }

    /// Builds a pattern-only matrix from `(row, col)` pairs. Duplicates collapse.
    pub fn from_pattern(
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize)],
    ) -> Result<Self, EigenError> {
        let pairs: Vec<Pair<usize, usize>> =
            entries.iter().map(|&(row, col)| Pair::new(row, col)).collect();
        let (symbolic, _) = SymbolicSparseRowMat::try_new_from_indices(nrows, ncols, &pairs)
            .map_err(|e| creation_error(nrows, ncols, e))?;
        Ok(Self {
            symbolic,
            values: None,
        })
    }

    /// Copies a dense matrix into CSR form with a dense row layout: every
    /// entry is stored, so row `i` starts at offset `i * ncols`.
    pub fn from_dense_rows(dense: faer::MatRef<'_, Real>) -> Self {
        let (nrows, ncols) = (dense.nrows(), dense.ncols());
        let row_offsets = (0..=nrows).map(|i| i * ncols).collect();
        let col_indices = (0..nrows).flat_map(|_| 0..ncols).collect();
        let values = (0..nrows)
            .flat_map(|i| (0..ncols).map(move |j| dense[(i, j)]))
            .collect();

        Self {
            symbolic: SymbolicSparseRowMat::new_checked(nrows, ncols, row_offsets, None, col_indices),
            values: Some(values),
        }
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.symbolic.nrows()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.symbolic.ncols()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.symbolic.compute_nnz()
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }

    /// Returns `true` if the matrix carries no values (every entry is `1`).
    #[inline]
    pub fn is_pattern(&self) -> bool {
        self.values.is_none()
    }

    #[inline]
    pub fn row_offsets(&self) -> &[usize] {
        self.symbolic.row_ptr()
    }

    #[inline]
    pub fn col_indices(&self) -> &[usize] {
        self.symbolic.col_idx()
    }

    #[inline]
    pub fn values(&self) -> Option<&[Real]> {
        self.values.as_deref()
    }

    /// Iterates over the `(col, value)` pairs stored in row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, Real)> + '_ {
        let cols = self.col_indices();
        self.symbolic.row_range(i).map(move |idx| {
            let value = self.values.as_ref().map_or(1.0, |v| v[idx]);
            (cols[idx], value)
        })
    }

    /// Expands the matrix into a dense [`faer::Mat`]. Intended for small
    /// matrices (reference computations and diagnostics).
    pub fn to_dense(&self) -> Mat<Real> {
        let mut dense = Mat::<Real>::zeros(self.nrows(), self.ncols());
        for i in 0..self.nrows() {
            for (j, value) in self.row(i) {
                dense[(i, j)] += value;
            }
        }
        dense
    }
}

/// An ordered, fixed-size collection of equal-length vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSet {
    vectors: Vec<Vector>,
    dim: usize,
}

impl VectorSet {
    /// Creates `count` zero vectors of length `dim`.
    pub fn zeros(count: usize, dim: usize) -> Self {
        Self {
            vectors: (0..count).map(|_| Vector::zeros(dim)).collect(),
            dim,
        }
    }

    /// Creates `count` vectors of length `dim` with entries drawn uniformly
    /// from `[-0.5, 0.5)`. Independent random vectors are linearly independent
    /// with probability one, which is what the Orthogonalizer needs.
    pub fn random(count: usize, dim: usize, rng: &mut impl Rng) -> Self {
        let vectors = (0..count)
            .map(|_| Vector::from_fn(dim, |_| rng.random::<Real>() - 0.5))
            .collect();
        Self { vectors, dim }
    }

    /// Wraps existing vectors, rejecting sets whose lengths disagree.
    pub fn from_vectors(vectors: Vec<Vector>) -> Result<Self, EigenError> {
        let dim = vectors.first().map_or(0, |v| v.nrows());
        if let Some(bad) = vectors.iter().find(|v| v.nrows() != dim) {
            return Err(EigenError::mismatch(dim, bad.nrows()));
        }
        Ok(Self { vectors, dim })
    }

    /// Number of vectors in the set.
    #[inline]
    pub fn count(&self) -> usize {
        self.vectors.len()
    }

    /// Length shared by every vector of the set.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> &Vector {
        &self.vectors[i]
    }

    #[inline]
    pub fn get_mut(&mut self, i: usize) -> &mut Vector {
        &mut self.vectors[i]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vector> {
        self.vectors.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Vector> {
        self.vectors.iter_mut()
    }

    /// Splits the set at `i`: the already-processed vectors `[0, i)` and a
    /// mutable handle on vector `i`.
    pub fn split_processed(&mut self, i: usize) -> (&[Vector], &mut Vector) {
        let (done, rest) = self.vectors.split_at_mut(i);
        (done, &mut rest[0])
    }

    pub fn into_vectors(self) -> Vec<Vector> {
        self.vectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_from_triplets_sorts_and_merges() {
        let a = CsrMatrix::from_triplets(
            3,
            3,
            &[(2, 0, 1.0), (0, 1, 2.0), (0, 0, 3.0), (0, 1, 4.0), (1, 2, 5.0)],
        )
        .unwrap();

        assert_eq!(a.row_offsets(), &[0, 2, 3, 4]);
        assert_eq!(a.col_indices(), &[0, 1, 2, 0]);
        assert_eq!(a.values().unwrap(), &[3.0, 6.0, 5.0, 1.0]);
        assert_eq!(a.nnz(), 4);
    }

    #[test]
    fn test_pattern_matrix_acts_as_ones() {
        let a = CsrMatrix::from_pattern(2, 2, &[(0, 1), (1, 0), (0, 1)]).unwrap();
        assert!(a.is_pattern());
        assert_eq!(a.nnz(), 2);
        assert_eq!(a.to_dense(), mat![[0.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_try_new_rejects_broken_invariants() {
        // First offset not zero.
        assert!(CsrMatrix::try_new(1, 1, vec![1, 1], vec![], None).is_err());
        // Last offset disagrees with nnz.
        assert!(CsrMatrix::try_new(1, 1, vec![0, 2], vec![0], None).is_err());
        // Decreasing offsets.
        assert!(CsrMatrix::try_new(2, 2, vec![0, 2, 1], vec![0, 1], None).is_err());
        // Column out of range.
        assert!(CsrMatrix::try_new(1, 2, vec![0, 1], vec![2], None).is_err());
        // Value array of the wrong length.
        assert!(CsrMatrix::try_new(1, 2, vec![0, 1], vec![1], Some(vec![1.0, 2.0])).is_err());
        // Columns out of order, and a repeated column.
        assert!(CsrMatrix::try_new(1, 3, vec![0, 2], vec![2, 0], None).is_err());
        assert!(CsrMatrix::try_new(1, 3, vec![0, 2], vec![1, 1], None).is_err());
        // A valid one.
        assert!(CsrMatrix::try_new(1, 2, vec![0, 1], vec![1], Some(vec![1.0])).is_ok());
    }

    #[test]
    fn test_from_triplets_rejects_out_of_bounds() {
        let err = CsrMatrix::from_triplets(2, 2, &[(2, 0, 1.0)]).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_dense_row_layout() {
        let dense: Mat<Real> = mat![[1.0, 0.0], [3.0, 4.0], [5.0, 6.0]];
        let a = CsrMatrix::from_dense_rows(dense.as_ref());
        assert_eq!(a.row_offsets(), &[0, 2, 4, 6]);
        assert_eq!(a.col_indices(), &[0, 1, 0, 1, 0, 1]);
        assert_eq!(a.to_dense(), dense);
    }

    #[test]
    fn test_vector_set_shape_checks() {
        let ok = VectorSet::from_vectors(vec![Vector::zeros(3), Vector::zeros(3)]).unwrap();
        assert_eq!(ok.count(), 2);
        assert_eq!(ok.dim(), 3);

        let err = VectorSet::from_vectors(vec![Vector::zeros(3), Vector::zeros(2)]).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_random_sets_are_reproducible() {
        let a = VectorSet::random(3, 5, &mut StdRng::seed_from_u64(9));
        let b = VectorSet::random(3, 5, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
        assert!(a.iter().flat_map(|v| (0..5).map(move |i| v[i])).all(|x| (-0.5..0.5).contains(&x)));
    }

    #[test]
    fn test_split_processed() {
        let mut set = VectorSet::zeros(3, 2);
        let (done, current) = set.split_processed(2);
        assert_eq!(done.len(), 2);
        current[0] = 1.0;
        assert_eq!(set.get(2)[0], 1.0);
    }
}
