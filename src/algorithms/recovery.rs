//! Lifts reduced candidates back into the original vector space.
//!
//! A reduced candidate `y` of length `M` represents the full-space vector
//! `x = Q_M y = Σ_i y[i] q_i`, where `Q_M` holds the first `M` Arnoldi basis
//! vectors. The trailing basis vector `q_M` only enters the Arnoldi relation
//! and is never used here.

use crate::{
    backend::NumericBackend,
    error::EigenError,
    matrix::{Vector, VectorSet},
};

/// Computes `x_k = Σ_{i<M} y_k[i]·q_i` for every reduced candidate `y_k`.
///
/// # Arguments
/// * `backend`: The numeric backend.
/// * `basis`: At least `M` basis vectors of length `n`.
/// * `reduced`: The reduced candidates, each of length `M`.
///
/// # Returns
/// One full-space vector of length `n` per reduced candidate, in the same order.
pub fn recover_eigenvectors<B>(
    backend: &B,
    basis: &VectorSet,
    reduced: &VectorSet,
) -> Result<VectorSet, EigenError>
where
    B: NumericBackend + ?Sized,
{
    let m = reduced.dim();
    if m > basis.count() {
        return Err(EigenError::input(format!(
            "Reduced vectors of length {m} need at least {m} basis vectors, got {}.",
            basis.count()
        )));
    }

    let mut recovered = Vec::with_capacity(reduced.count());
    for y in reduced.iter() {
        let mut x = Vector::zeros(basis.dim());
        for i in 0..m {
            backend.axpy(y[i], basis.get(i), &mut x);
        }
        recovered.push(x);
    }

    VectorSet::from_vectors(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Real, backend::FaerBackend};

    fn unit(n: usize, i: usize) -> Vector {
        Vector::from_fn(n, |j| if i == j { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_recovery_combines_basis_columns() {
        let backend = FaerBackend::new();
        let basis = VectorSet::from_vectors(vec![unit(4, 2), unit(4, 0), unit(4, 3)]).unwrap();
        let reduced =
            VectorSet::from_vectors(vec![Vector::from_fn(2, |i| [2.0, -1.0][i] as Real)]).unwrap();

        let x = recover_eigenvectors(&backend, &basis, &reduced).unwrap();

        assert_eq!(x.count(), 1);
        assert_eq!(x.get(0), &Vector::from_fn(4, |i| [-1.0, 0.0, 2.0, 0.0][i]));
    }

    #[test]
    fn test_recovery_rejects_short_basis() {
        let backend = FaerBackend::new();
        let basis = VectorSet::from_vectors(vec![unit(3, 0)]).unwrap();
        let reduced = VectorSet::zeros(1, 2);
        assert!(
            recover_eigenvectors(&backend, &basis, &reduced)
                .unwrap_err()
                .is_input_error()
        );
    }
}
