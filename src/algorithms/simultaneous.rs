//! Simultaneous (block power) iteration on the reduced Arnoldi operator.
//!
//! Each round applies `H` to every candidate and re-orthonormalizes the batch.
//! Without the re-orthonormalization every candidate would collapse onto the
//! dominant eigenvector of `H`; with it, the batch converges to an orthonormal
//! basis of the dominant invariant subspace.
//!
//! Convergence is tracked through the norms the Orthogonalizer measures right
//! before normalizing each candidate. Those norms approach the moduli of the
//! dominant eigenvalues of `H`, and the round-to-round drift
//! `Σ_k |current_k - previous_k|` is the stopping signal.

use super::gram_schmidt::gram_schmidt;
use crate::{
    Real,
    backend::NumericBackend,
    error::EigenError,
    matrix::{CsrMatrix, Vector, VectorSet},
};

/// The state passed to an [`IterationCallback`] after every round.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport<'a> {
    /// The 1-based round that just completed.
    pub round: usize,
    /// The drift against the previous round, absent after the first round.
    pub drift: Option<Real>,
    /// The per-candidate norms recorded in this round.
    pub norms: &'a [Real],
}

/// A callback invoked after every round. Returning `false` stops the
/// iteration early, without marking it as converged.
pub type IterationCallback<'a> = dyn FnMut(&IterationReport<'_>) -> bool + 'a;

/// Two parallel norm buffers, swapped after every round.
#[derive(Debug, Clone)]
pub struct ConvergenceState {
    previous: Vec<Real>,
    current: Vec<Real>,
    rounds: usize,
}

impl ConvergenceState {
    pub fn new(candidates: usize) -> Self {
        Self {
            previous: vec![0.0; candidates],
            current: vec![0.0; candidates],
            rounds: 0,
        }
    }

    /// Stores this round's norms, returns the drift against the previous round
    /// (none on the first round), and swaps the buffers.
    pub fn record(&mut self, norms: &[Real]) -> Option<Real> {
        self.current.copy_from_slice(norms);
        let drift = (self.rounds > 0).then(|| {
            self.current
                .iter()
                .zip(&self.previous)
                .map(|(c, p)| (c - p).abs())
                .sum()
        });
        std::mem::swap(&mut self.current, &mut self.previous);
        self.rounds += 1;
        drift
    }

    /// The norms recorded most recently.
    pub fn latest(&self) -> &[Real] {
        &self.previous
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

/// Summary of a simultaneous-iteration run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimultaneousOutput {
    /// Number of rounds performed.
    pub iterations: usize,
    /// Whether the drift fell to or below the tolerance.
    pub converged: bool,
    /// The drift of the final round, if at least two rounds ran.
    pub drift: Option<Real>,
    /// The final per-candidate norms.
    pub norms: Vec<Real>,
}

/// Runs simultaneous iteration of `h` over `candidates`, in place.
///
/// # Arguments
/// * `backend`: The numeric backend.
/// * `h`: The `M×M` reduced operator from the Arnoldi factorization.
/// * `candidates`: `num <= M` vectors of length `M`. They should be orthonormal
///   on entry (see [`gram_schmidt`]) and are orthonormal on exit.
/// * `max_iterations`: The round budget.
/// * `tolerance`: The drift at or below which the iteration stops.
/// * `callback`: An optional per-round observer that can stop the loop.
///
/// # Errors
/// Input errors for shape violations, and a degenerate error if the
/// candidates become linearly dependent (for instance when `H` is singular on
/// their span).
pub fn simultaneous_iteration<B>(
    backend: &B,
    h: &CsrMatrix,
    candidates: &mut VectorSet,
    max_iterations: usize,
    tolerance: Real,
    mut callback: Option<&mut IterationCallback<'_>>,
) -> Result<SimultaneousOutput, EigenError>
where
    B: NumericBackend + ?Sized,
{
    let m = h.nrows();
    if !h.is_square() {
        return Err(EigenError::input("The reduced operator must be square."));
    }
    if candidates.dim() != m {
        return Err(EigenError::mismatch(m, candidates.dim()));
    }
    if candidates.count() == 0 || candidates.count() > m {
        return Err(EigenError::input(format!(
            "The number of candidates must satisfy 1 <= num <= M, got num = {} with M = {m}.",
            candidates.count()
        )));
    }

    let mut state = ConvergenceState::new(candidates.count());
    let mut scratch = Vector::zeros(m);
    let mut drift = None;
    let mut converged = false;

    for round in 1..=max_iterations {
        // No data flows between candidates here; only the orthonormalization
        // below couples them.
        for y in candidates.iter_mut() {
            backend.spmv(h, y, &mut scratch);
            std::mem::swap(y, &mut scratch);
        }

        let norms = gram_schmidt(backend, candidates)?;
        drift = state.record(&norms);

        match drift {
            Some(d) => log::debug!("Simultaneous iteration round {round}: drift = {d:e}"),
            None => log::debug!("Simultaneous iteration round {round}: norms = {norms:?}"),
        }

        if let Some(cb) = callback.as_deref_mut() {
            let report = IterationReport {
                round,
                drift,
                norms: &norms,
            };
            if !cb(&report) {
                log::debug!("Simultaneous iteration stopped by callback after round {round}.");
                break;
            }
        }

        if drift.is_some_and(|d| d <= tolerance) {
            converged = true;
            break;
        }
    }

    if !converged {
        log::debug!(
            "Simultaneous iteration did not reach tolerance {tolerance:e} in {} rounds.",
            state.rounds()
        );
    }

    Ok(SimultaneousOutput {
        iterations: state.rounds(),
        converged,
        drift,
        norms: state.latest().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FaerBackend;
    use rand::{SeedableRng, rngs::StdRng};

    fn diagonal(values: &[Real]) -> CsrMatrix {
        let triplets: Vec<_> = values.iter().enumerate().map(|(i, &v)| (i, i, v)).collect();
        CsrMatrix::from_triplets(values.len(), values.len(), &triplets).unwrap()
    }

    fn initial_candidates(count: usize, dim: usize, seed: u64) -> VectorSet {
        let backend = FaerBackend::new();
        let mut set = VectorSet::random(count, dim, &mut StdRng::seed_from_u64(seed));
        gram_schmidt(&backend, &mut set).unwrap();
        set
    }

    #[test]
    fn test_convergence_state_swaps_buffers() {
        let mut state = ConvergenceState::new(2);
        assert_eq!(state.record(&[1.0, 2.0]), None);
        assert_eq!(state.record(&[1.5, 1.0]), Some(1.5));
        assert_eq!(state.latest(), &[1.5, 1.0]);
        assert_eq!(state.record(&[1.5, 1.0]), Some(0.0));
        assert_eq!(state.rounds(), 3);
    }

    #[test]
    fn test_norms_converge_to_dominant_eigenvalues() {
        let backend = FaerBackend::new();
        let h = diagonal(&[1.0, -6.0, 0.5, 3.0]);
        let mut y = initial_candidates(2, 4, 21);

        let out = simultaneous_iteration(&backend, &h, &mut y, 500, 1e-12, None).unwrap();

        assert!(out.converged);
        assert!((out.norms[0] - 6.0).abs() < 1e-8, "{:?}", out.norms);
        assert!((out.norms[1] - 3.0).abs() < 1e-8, "{:?}", out.norms);
        // The first candidate aligns with e_1, the second with e_3.
        assert!((y.get(0)[1].abs() - 1.0).abs() < 1e-6);
        assert!((y.get(1)[3].abs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_budget_exhaustion_is_not_convergence() {
        let backend = FaerBackend::new();
        let h = diagonal(&[2.0, 1.9, 1.0]);
        let mut y = initial_candidates(1, 3, 4);

        let out = simultaneous_iteration(&backend, &h, &mut y, 3, 0.0, None).unwrap();

        assert_eq!(out.iterations, 3);
        assert!(!out.converged);
        assert!(out.drift.is_some());
    }

    #[test]
    fn test_zero_budget_leaves_candidates_untouched() {
        let backend = FaerBackend::new();
        let h = diagonal(&[2.0, 1.0]);
        let mut y = initial_candidates(1, 2, 4);
        let before = y.clone();

        let out = simultaneous_iteration(&backend, &h, &mut y, 0, 1e-8, None).unwrap();

        assert_eq!(out.iterations, 0);
        assert_eq!(out.drift, None);
        assert_eq!(y, before);
    }

    #[test]
    fn test_callback_sees_every_round_and_can_stop() {
        let backend = FaerBackend::new();
        let h = diagonal(&[5.0, 1.0, 0.1]);
        let mut y = initial_candidates(1, 3, 8);
        let mut drifts = Vec::new();
        let mut observe = |report: &IterationReport<'_>| {
            drifts.push(report.drift);
            report.round < 4
        };

        let callback: &mut IterationCallback<'_> = &mut observe;
        let out = simultaneous_iteration(&backend, &h, &mut y, 100, 0.0, Some(callback)).unwrap();

        assert_eq!(out.iterations, 4);
        assert!(!out.converged);
        assert_eq!(drifts.len(), 4);
        assert_eq!(drifts[0], None);
        assert!(drifts[1..].iter().all(|d| d.is_some()));
    }

    #[test]
    fn test_shape_validation() {
        let backend = FaerBackend::new();
        let h = diagonal(&[1.0, 2.0]);

        let mut too_long = VectorSet::zeros(1, 3);
        assert!(simultaneous_iteration(&backend, &h, &mut too_long, 1, 0.0, None)
            .unwrap_err()
            .is_input_error());

        let mut too_many = VectorSet::zeros(3, 2);
        assert!(simultaneous_iteration(&backend, &h, &mut too_many, 1, 0.0, None)
            .unwrap_err()
            .is_input_error());
    }

    #[test]
    fn test_singular_operator_on_candidates_is_degenerate() {
        let backend = FaerBackend::new();
        let h = diagonal(&[1.0, 0.0, 0.0]);
        let mut y = initial_candidates(2, 3, 2);

        let err = simultaneous_iteration(&backend, &h, &mut y, 10, 0.0, None).unwrap_err();
        assert!(err.is_degenerate());
    }
}
