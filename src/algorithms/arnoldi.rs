//! Arnoldi factorization of a sparse matrix.
//!
//! Starting from a seed vector `q_0`, the builder grows an orthonormal basis
//! `{q_0, …, q_M}` of the Krylov subspace `K_{M+1}(A, q_0)` and fills the
//! `(M+1)×M` upper Hessenberg projection `H` so that
//!
//! $$ \mathbf{A}\mathbf{q}_k = \sum_{j \le k+1} H_{jk}\,\mathbf{q}_j, \qquad k < M. $$
//!
//! Every basis vector is stored, giving O(nM) memory. Once the loop finishes,
//! the leading `M×M` block of `H` is frozen into a [`CsrMatrix`] with a dense
//! row layout, which the simultaneous-iteration loop then applies hundreds of
//! times.

use super::breakdown_tolerance;
use crate::{
    Real,
    backend::NumericBackend,
    error::{EigenError, EigenErrorKind},
    matrix::{CsrMatrix, Vector, VectorSet},
};
use faer::{Mat, MatRef};

/// The output of [`arnoldi`].
#[derive(Debug, Clone)]
pub struct ArnoldiFactorization {
    basis: VectorSet,
    hessenberg: Mat<Real>,
    operator: CsrMatrix,
    invariant: bool,
}

impl ArnoldiFactorization {
    /// The Krylov dimension `M`.
    pub fn krylov_dim(&self) -> usize {
        self.hessenberg.ncols()
    }

    /// The `M+1` basis vectors `q_0, …, q_M`. When the factorization is
    /// [invariant](Self::is_invariant), `q_M` is the zero vector.
    pub fn basis(&self) -> &VectorSet {
        &self.basis
    }

    /// The full `(M+1)×M` Hessenberg projection.
    pub fn hessenberg(&self) -> MatRef<'_, Real> {
        self.hessenberg.as_ref()
    }

    /// The leading `M×M` block of `H`, frozen for repeated application.
    pub fn operator(&self) -> &CsrMatrix {
        &self.operator
    }

    /// Returns `true` when the last Arnoldi step found no new direction: the
    /// span of `q_0, …, q_{M-1}` is invariant under `A`, so the projected
    /// operator is exact.
    pub fn is_invariant(&self) -> bool {
        self.invariant
    }

    /// `H[M, M-1]`, the norm of the component of `A q_{M-1}` left outside
    /// the basis.
    pub fn residual_norm(&self) -> Real {
        let m = self.krylov_dim();
        self.hessenberg[(m, m - 1)]
    }

    pub fn into_parts(self) -> (VectorSet, Mat<Real>, CsrMatrix) {
        (self.basis, self.hessenberg, self.operator)
    }
}

/// Runs `krylov_dim` steps of the Arnoldi process on `a` from `seed`.
///
/// # Arguments
/// * `backend`: The numeric backend performing all vector algebra.
/// * `a`: A square sparse matrix of size `n`.
/// * `seed`: The starting vector. It is normalized internally and must not be zero.
/// * `krylov_dim`: The number `M` of projection columns, with `1 <= M < n`.
///
/// # Errors
/// Input errors for shape violations or a zero/non-finite seed, and a
/// degenerate error if the recurrence breaks down at a step `k < M`. A
/// breakdown at the final step `k == M` is not an error; see
/// [`ArnoldiFactorization::is_invariant`].
pub fn arnoldi<B>(
    backend: &B,
    a: &CsrMatrix,
    seed: &Vector,
    krylov_dim: usize,
) -> Result<ArnoldiFactorization, EigenError>
where
    B: NumericBackend + ?Sized,
{
    if !a.is_square() {
        return Err(EigenError::input(format!(
            "The Arnoldi process requires a square matrix, got {}x{}.",
            a.nrows(),
            a.ncols()
        )));
    }
    let n = a.nrows();
    if seed.nrows() != n {
        return Err(EigenError::mismatch(n, seed.nrows()));
    }
    if krylov_dim == 0 || krylov_dim >= n {
        return Err(EigenError::input(format!(
            "The Krylov dimension must satisfy 1 <= M < n, got M = {krylov_dim} with n = {n}."
        )));
    }
    let seed_l1 = backend.norm1(seed);
    if seed_l1 == 0.0 || !seed_l1.is_finite() {
        return Err(EigenError::input(
            "The seed vector must be finite and must not be a zero vector.",
        ));
    }

    let tolerance = breakdown_tolerance();
    let m = krylov_dim;
    let mut hessenberg = Mat::<Real>::zeros(m + 1, m);
    let mut basis = Vec::with_capacity(m + 1);
    let mut invariant = false;

    let mut q0 = seed.clone();
    let seed_norm = backend.norm2(&q0);
    backend.scale(1.0 / seed_norm, &mut q0);
    basis.push(q0);

    for k in 1..=m {
        let mut w = Vector::zeros(n);
        backend.spmv(a, &basis[k - 1], &mut w);
        let image_norm = backend.norm2(&w);

        for (j, q) in basis.iter().enumerate() {
            let h = backend.dot(q, &w);
            hessenberg[(j, k - 1)] = h;
            backend.axpy(-h, q, &mut w);
        }

        let beta = backend.norm2(&w);
        hessenberg[(k, k - 1)] = beta;
        log::trace!("Arnoldi step {k}/{m}: |A q| = {image_norm:e}, h[k, k-1] = {beta:e}");

        if !(beta.is_finite() && beta > tolerance * image_norm && beta > 0.0) {
            if k < m {
                return Err(EigenErrorKind::Breakdown { step: k }.into());
            }
            log::debug!("Arnoldi reached an invariant subspace at the final step {k}.");
            invariant = true;
            basis.push(Vector::zeros(n));
            break;
        }

        backend.scale(1.0 / beta, &mut w);
        basis.push(w);
    }

    let operator = backend.dense_to_sparse(hessenberg.as_ref().get(0..m, 0..m));
    log::debug!(
        "Arnoldi factorization complete: n = {n}, M = {m}, h[M, M-1] = {:e}",
        hessenberg[(m, m - 1)]
    );

    Ok(ArnoldiFactorization {
        basis: VectorSet::from_vectors(basis)?,
        hessenberg,
        operator,
        invariant,
    })
}
