//! The numerical core: orthonormalization, Arnoldi factorization, simultaneous
//! iteration on the reduced system, eigenvector recovery and residuals.
//!
//! ** NOTE: We recommend using the high-level entry points in [`crate::solvers`]
//! instead. These building blocks are exposed for callers that need the
//! intermediate objects (the Krylov basis, the Hessenberg projection, the
//! per-round drift).

pub mod arnoldi;
pub mod gram_schmidt;
pub mod recovery;
pub mod residual;
pub mod simultaneous;

pub use arnoldi::{ArnoldiFactorization, arnoldi};
pub use gram_schmidt::gram_schmidt;
pub use recovery::recover_eigenvectors;
pub use residual::{EigenvalueEstimator, ResidualReport, evaluate_residuals};
pub use simultaneous::{
    ConvergenceState, IterationCallback, IterationReport, SimultaneousOutput,
    simultaneous_iteration,
};

use crate::Real;

/// Relative threshold below which a freshly orthogonalized vector counts as
/// zero: half of the working precision's digits have cancelled.
#[inline]
pub fn breakdown_tolerance() -> Real {
    Real::EPSILON.sqrt()
}
