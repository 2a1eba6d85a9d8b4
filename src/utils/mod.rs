//! Common utilities for loading and generating test problems.
//!
//! - **`data_loader`**: Reads and writes sparse matrices in the Matrix Market
//!   coordinate format.
//!
//! - **`generators`**: Builds graph Laplacians (path, star, grid) whose spectra
//!   are known in closed form.

pub mod data_loader;
pub mod generators;
