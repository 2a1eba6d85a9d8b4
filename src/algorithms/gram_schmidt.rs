//! Modified Gram-Schmidt orthonormalization of a [`VectorSet`], in place.
//!
//! The same kernel initializes the random candidate set of a trial and
//! re-orthonormalizes the candidates after every round of simultaneous
//! iteration. Vectors are processed left to right: vector `i` is projected
//! against the already-finished vectors `0..i` and then normalized.
//!
//! Projections are removed with individually negated coefficients,
//! `v_i ← v_i + (-<v_j, v_i>)·v_j`, and the vector itself is never negated.
//! The Arnoldi builder uses the same convention.

use super::breakdown_tolerance;
use crate::{
    Real,
    backend::NumericBackend,
    error::{EigenError, EigenErrorKind},
    matrix::VectorSet,
};

/// Orthonormalizes `set` in place.
///
/// # Returns
/// On success, the norm each vector had right before it was normalized (after
/// its projections were removed). These are the diagonal entries of the `R`
/// factor of the implicit QR factorization of the input set, which the
/// simultaneous-iteration loop uses as its convergence signal.
///
/// # Errors
/// Returns a degenerate [`EigenError`] naming the first vector whose norm
/// after projection is zero, non-finite, or negligible relative to its norm
/// before projection. The set is left partially processed in that case.
pub fn gram_schmidt<B>(backend: &B, set: &mut VectorSet) -> Result<Vec<Real>, EigenError>
where
    B: NumericBackend + ?Sized,
{
    let tolerance = breakdown_tolerance();
    let mut norms = Vec::with_capacity(set.count());

    for i in 0..set.count() {
        let (done, v) = set.split_processed(i);
        let initial_norm = backend.norm2(v);

        for q in done {
            let c = backend.dot(q, v);
            backend.axpy(-c, q, v);
        }

        let norm = backend.norm2(v);
        // The negated comparison also rejects NaN norms.
        if !(norm.is_finite() && norm > tolerance * initial_norm && norm > 0.0) {
            return Err(EigenErrorKind::ZeroNorm { index: i }.into());
        }
        backend.scale(1.0 / norm, v);
        norms.push(norm);
    }

    Ok(norms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::FaerBackend, matrix::Vector};
    use rand::{SeedableRng, rngs::StdRng};

    fn max_orthogonality_defect(backend: &FaerBackend, set: &VectorSet) -> Real {
        let mut worst: Real = 0.0;
        for i in 0..set.count() {
            for j in 0..set.count() {
                let target = if i == j { 1.0 } else { 0.0 };
                let defect = (backend.dot(set.get(i), set.get(j)) - target).abs();
                worst = worst.max(defect);
            }
        }
        worst
    }

    #[test]
    fn test_random_set_becomes_orthonormal() {
        let backend = FaerBackend::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut set = VectorSet::random(8, 50, &mut rng);

        let norms = gram_schmidt(&backend, &mut set).unwrap();

        assert_eq!(norms.len(), 8);
        assert!(norms.iter().all(|&n| n > 0.0));
        assert!(max_orthogonality_defect(&backend, &set) < 1e-12);
    }

    #[test]
    fn test_full_rank_square_set() {
        // k == n is the tightest admissible case.
        let backend = FaerBackend::new();
        let mut rng = StdRng::seed_from_u64(7);
        let mut set = VectorSet::random(6, 6, &mut rng);
        gram_schmidt(&backend, &mut set).unwrap();
        assert!(max_orthogonality_defect(&backend, &set) < 1e-10);
    }

    #[test]
    fn test_orthonormal_set_is_a_fixed_point() {
        let backend = FaerBackend::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut set = VectorSet::random(4, 20, &mut rng);
        gram_schmidt(&backend, &mut set).unwrap();
        let before = set.clone();

        let norms = gram_schmidt(&backend, &mut set).unwrap();

        assert!(norms.iter().all(|n| (n - 1.0).abs() < 1e-12));
        for (a, b) in before.iter().zip(set.iter()) {
            let mut diff = a.clone();
            backend.axpy(-1.0, b, &mut diff);
            assert!(backend.norm2(&diff) < 1e-12);
        }
    }

    #[test]
    fn test_first_vector_is_only_normalized() {
        let backend = FaerBackend::new();
        let v = Vector::from_fn(2, |i| [3.0, 4.0][i]);
        let mut set = VectorSet::from_vectors(vec![v]).unwrap();

        let norms = gram_schmidt(&backend, &mut set).unwrap();

        assert_eq!(norms.len(), 1);
        assert!((norms[0] - 5.0).abs() < 1e-14);
        assert!((set.get(0)[0] - 0.6).abs() < 1e-14);
        assert!((set.get(0)[1] - 0.8).abs() < 1e-14);
    }

    #[test]
    fn test_dependent_vectors_are_reported() {
        let backend = FaerBackend::new();
        let v = Vector::from_fn(3, |i| (i + 1) as Real);
        let mut w = v.clone();
        backend.scale(2.0, &mut w);
        let mut set = VectorSet::from_vectors(vec![v, w]).unwrap();

        let err = gram_schmidt(&backend, &mut set).unwrap_err();

        assert!(err.is_degenerate());
        assert_eq!(err, EigenError::from(EigenErrorKind::ZeroNorm { index: 1 }));
    }

    #[test]
    fn test_zero_vector_is_reported() {
        let backend = FaerBackend::new();
        let mut set = VectorSet::zeros(2, 4);
        let err = gram_schmidt(&backend, &mut set).unwrap_err();
        assert_eq!(err, EigenError::from(EigenErrorKind::ZeroNorm { index: 0 }));
    }
}
