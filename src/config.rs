//! Solver configuration.
//!
//! A [`SolverConfig`] is built once (usually by the command-line front end) and
//! passed by reference to every trial. It is validated against the matrix size
//! before any numerical work starts.

use crate::{Real, algorithms::EigenvalueEstimator, error::EigenError};
use serde::{Deserialize, Serialize};

/// Default round budget of the simultaneous iteration.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;
/// Default drift tolerance of the simultaneous iteration.
pub const DEFAULT_TOLERANCE: Real = 1e-8;
/// Default base seed. Trial `r` uses `seed + r`.
pub const DEFAULT_SEED: u64 = 1;

/// Parameters of one eigensolver run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of dominant eigenpairs to approximate.
    pub num: usize,
    /// Krylov dimension `M`. `None` picks a default from `num` and `n`.
    pub krylov_dim: Option<usize>,
    pub max_iterations: usize,
    pub tolerance: Real,
    pub seed: u64,
    pub estimator: EigenvalueEstimator,
}

impl SolverConfig {
    pub fn new(num: usize) -> Self {
        Self {
            num,
            krylov_dim: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            seed: DEFAULT_SEED,
            estimator: EigenvalueEstimator::default(),
        }
    }

    pub fn with_krylov_dim(mut self, krylov_dim: usize) -> Self {
        self.krylov_dim = Some(krylov_dim);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_estimator(mut self, estimator: EigenvalueEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// The Krylov dimension used for a matrix of size `n`: the explicit value
    /// if one was given, otherwise `min(max(2·num, 10), n - 1)`.
    pub fn resolved_krylov_dim(&self, n: usize) -> usize {
        self.krylov_dim
            .unwrap_or_else(|| (2 * self.num).max(10).min(n.saturating_sub(1)))
    }

    /// The RNG seed of trial `rank`.
    pub fn trial_seed(&self, rank: usize) -> u64 {
        self.seed.wrapping_add(rank as u64)
    }

    /// Checks the configuration against a matrix of size `n`.
    pub fn validate(&self, n: usize) -> Result<(), EigenError> {
        if n < 2 {
            return Err(EigenError::input(format!(
                "The matrix must have at least 2 rows, got {n}."
            )));
        }
        let m = self.resolved_krylov_dim(n);
        if m == 0 || m >= n {
            return Err(EigenError::input(format!(
                "The Krylov dimension must satisfy 1 <= M < n, got M = {m} with n = {n}."
            )));
        }
        if self.num == 0 || self.num > m {
            return Err(EigenError::input(format!(
                "The number of eigenpairs must satisfy 1 <= num <= M, got num = {} with M = {m}.",
                self.num
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(EigenError::input(format!(
                "The tolerance must be a finite, non-negative number, got {}.",
                self.tolerance
            )));
        }
        Ok(())
    }
}
