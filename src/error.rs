//! This module defines the error types of the numerical core.
//!
//! Every failure of the Orthogonalizer, the Arnoldi builder, the reduced-system
//! iterator and the recovery/residual stages is reported through a single public
//! type, [`EigenError`], which wraps a crate-private enum of distinct kinds.
//! Callers never match on the kinds directly; they ask the error what it means
//! through predicates such as [`EigenError::is_degenerate`].
use thiserror::Error;

/// Represents all possible errors that can occur while computing eigenpairs.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct EigenError(#[from] EigenErrorKind);

/// Private enum containing the distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum EigenErrorKind {
    /// A vector collapsed to (numerically) zero norm while being orthonormalized,
    /// which means the input set was linearly dependent.
    #[error(
        "Gram-Schmidt degeneracy at vector {index}: the norm after projection is zero. The vector set is linearly dependent."
    )]
    ZeroNorm { index: usize },

    /// The Arnoldi recurrence produced a (numerically) zero vector before the
    /// requested Krylov dimension was reached.
    #[error(
        "Arnoldi breakdown at step {step}: the new Krylov direction has zero norm. The Krylov subspace is invariant."
    )]
    Breakdown { step: usize },

    /// Two objects that must agree in size do not.
    #[error("Dimension mismatch: expected {expected} but found {actual}.")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Indicates that an invalid input parameter was provided to a function.
    #[error("Invalid input parameter: {0}")]
    InputError(String),
}

impl EigenError {
    /// Returns `true` for numerical degeneracies (zero-norm vectors, Arnoldi
    /// breakdown). A trial hitting one of these can be abandoned without
    /// aborting the whole run.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self.0,
            EigenErrorKind::ZeroNorm { .. } | EigenErrorKind::Breakdown { .. }
        )
    }

    /// Returns `true` if the error was caused by invalid arguments or shapes.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.0,
            EigenErrorKind::InputError(_) | EigenErrorKind::DimensionMismatch { .. }
        )
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        EigenErrorKind::InputError(message.into()).into()
    }

    pub(crate) fn mismatch(expected: usize, actual: usize) -> Self {
        EigenErrorKind::DimensionMismatch { expected, actual }.into()
    }
}

impl PartialEq for EigenError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_norm_error_message() {
        let error = EigenError(EigenErrorKind::ZeroNorm { index: 3 });
        let expected_message = "Gram-Schmidt degeneracy at vector 3: the norm after projection is zero. The vector set is linearly dependent.";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_degenerate());
        assert!(!error.is_input_error());
    }

    #[test]
    fn test_breakdown_error_message() {
        let error = EigenError(EigenErrorKind::Breakdown { step: 7 });
        let expected_message = "Arnoldi breakdown at step 7: the new Krylov direction has zero norm. The Krylov subspace is invariant.";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_degenerate());
    }

    #[test]
    fn test_dimension_mismatch_error_message() {
        let error = EigenError::mismatch(100, 99);
        assert_eq!(
            error.to_string(),
            "Dimension mismatch: expected 100 but found 99."
        );
        assert!(error.is_input_error());
    }

    #[test]
    fn test_input_error_message() {
        let error = EigenError::input("The seed vector must not be a zero vector.");
        assert_eq!(
            error.to_string(),
            "Invalid input parameter: The seed vector must not be a zero vector."
        );
        assert!(!error.is_degenerate());
    }

    #[test]
    fn test_errors_compare_by_kind() {
        assert_eq!(
            EigenError(EigenErrorKind::Breakdown { step: 2 }),
            EigenError(EigenErrorKind::Breakdown { step: 2 })
        );
        assert_ne!(EigenError::mismatch(1, 2), EigenError::mismatch(2, 1));
    }
}
