//! Randomized Arnoldi projection with simultaneous iteration for the dominant
//! eigenpairs of large sparse matrices.
//!
//! Each trial draws a random seed vector, builds an orthonormal Krylov basis
//! `Q` and the projected Hessenberg matrix `H` of the sparse matrix `A`, then
//! runs simultaneous (block power) iteration on `H`. The reduced candidates are
//! lifted back through `Q` and scored by their residuals `‖Ax − λx‖`. Several
//! independently seeded trials can run side by side, as threads or as child
//! processes; only the trial with the smallest summed residual reports.
//!
//! ## Pipeline
//!
//! - [`algorithms::gram_schmidt`]: modified Gram-Schmidt, in place.
//! - [`algorithms::arnoldi`]: the Krylov basis and `H`, frozen into a sparse operator.
//! - [`algorithms::simultaneous_iteration`]: block power iteration on `H`, stopped by
//!   the round-to-round drift of the candidate norms.
//! - [`algorithms::recover_eigenvectors`] and [`algorithms::evaluate_residuals`].
//! - [`selection`]: the gather/argmin/broadcast exchange that picks the best trial.
//!
//! All vector algebra goes through the [`backend::NumericBackend`] trait, with
//! [`backend::FaerBackend`] as the host implementation built on [`faer`].
//!
//! ## Example Usage
//!
//! The star graph on 5 nodes has the Laplacian spectrum `{0, 1, 1, 1, 5}`. Its
//! Krylov subspaces stop growing after 3 steps, so a projection of dimension 3
//! is exact and the dominant eigenvalue is recovered to machine precision.
//!
//! ```rust
//! use simultite::{
//!     FaerBackend, SolverConfig,
//!     algorithms::EigenvalueEstimator,
//!     selection::LocalGroup,
//!     solve,
//!     utils::generators::star_laplacian,
//! };
//! use std::time::Duration;
//!
//! let a = star_laplacian(5).unwrap();
//! // The norm drift shrinks like the square of the eigenvector error, so a
//! // fixed round budget gives a tighter result than a drift tolerance.
//! let config = SolverConfig::new(1)
//!     .with_krylov_dim(3)
//!     .with_max_iterations(100)
//!     .with_tolerance(0.0)
//!     .with_estimator(EigenvalueEstimator::RayleighQuotient);
//!
//! // A group of one trial, which trivially wins the selection.
//! let mut group = LocalGroup::new(1, Duration::from_secs(10));
//! let outcome = solve(&mut group[0], &FaerBackend::new(), &a, &config)
//!     .unwrap()
//!     .expect("a single trial always wins");
//!
//! assert!((outcome.report.eigenvalues[0] - 5.0).abs() < 1e-8);
//! assert!(outcome.error() < 1e-6);
//! ```
//!
//! ## Precision
//!
//! [`Real`] is `f64` by default. Enabling the `single-precision` feature switches
//! every vector, scalar and matrix value to `f32`.

// Declare the modules that form the crate's API structure.
pub mod algorithms;
pub mod backend;
pub mod config;
pub mod error;
pub mod matrix;
pub mod process;
pub mod selection;
pub mod solvers;
pub mod utils;

/// The working floating-point precision.
#[cfg(not(feature = "single-precision"))]
pub type Real = f64;

/// The working floating-point precision.
#[cfg(feature = "single-precision")]
pub type Real = f32;

// Re-export the main API for convenient access.
pub use backend::{FaerBackend, NumericBackend};
pub use config::SolverConfig;
pub use error::EigenError;
pub use matrix::{CsrMatrix, Vector, VectorSet};
pub use solvers::{SolveError, TrialOutcome, run_trial, solve};
