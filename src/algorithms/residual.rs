//! Per-candidate residuals and the trial-level error.
//!
//! For each recovered candidate `x_k` the evaluator forms `r = A x_k`, picks an
//! eigenvalue estimate `λ_k`, and measures `‖r − λ_k x_k‖₂`. The trial error is
//! the sum of those residuals; it is the only number the Trial Selector sees.

use crate::{
    Real,
    backend::NumericBackend,
    error::EigenError,
    matrix::{CsrMatrix, Vector, VectorSet},
};
use serde::{Deserialize, Serialize};

/// How the eigenvalue `λ_k` of a candidate is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EigenvalueEstimator {
    /// `λ = ‖x‖₂`. This is a norm, not an eigenvalue: for unit candidates it
    /// is always `1`, so residuals only vanish for eigenvalue `1`.
    #[default]
    VectorNorm,
    /// `λ = <x, Ax> / <x, x>`, the Rayleigh quotient.
    RayleighQuotient,
}

/// The outcome of [`evaluate_residuals`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualReport {
    pub eigenvalues: Vec<Real>,
    pub residuals: Vec<Real>,
    /// `Σ_k residuals[k]`.
    pub error: Real,
}

/// Evaluates every candidate in `candidates` against `a`.
pub fn evaluate_residuals<B>(
    backend: &B,
    a: &CsrMatrix,
    candidates: &VectorSet,
    estimator: EigenvalueEstimator,
) -> Result<ResidualReport, EigenError>
where
    B: NumericBackend + ?Sized,
{
    if !a.is_square() {
        return Err(EigenError::input("Residuals require a square matrix."));
    }
    if candidates.dim() != a.ncols() {
        return Err(EigenError::mismatch(a.ncols(), candidates.dim()));
    }

    let mut eigenvalues = Vec::with_capacity(candidates.count());
    let mut residuals = Vec::with_capacity(candidates.count());
    let mut error: Real = 0.0;
    let mut r = Vector::zeros(a.nrows());

    for (k, x) in candidates.iter().enumerate() {
        backend.spmv(a, x, &mut r);
        let lambda = match estimator {
            EigenvalueEstimator::VectorNorm => backend.norm2(x),
            EigenvalueEstimator::RayleighQuotient => backend.dot(x, &r) / backend.dot(x, x),
        };
        backend.axpy(-lambda, x, &mut r);
        let residual = backend.norm2(&r);
        log::debug!("Candidate {k}: lambda = {lambda:e}, residual = {residual:e}");

        eigenvalues.push(lambda);
        residuals.push(residual);
        error += residual;
    }

    Ok(ResidualReport {
        eigenvalues,
        residuals,
        error,
    })
}
