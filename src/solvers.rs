//! This module provides the high-level entry points: one randomized trial of
//! the full pipeline, and a multi-trial solve that keeps the best trial.

use crate::{
    Real,
    algorithms::{
        EigenvalueEstimator, ResidualReport, SimultaneousOutput, arnoldi, evaluate_residuals,
        gram_schmidt, recover_eigenvectors, simultaneous_iteration,
    },
    backend::NumericBackend,
    config::SolverConfig,
    error::EigenError,
    matrix::{CsrMatrix, Vector, VectorSet},
    selection::{Collective, CollectiveError, select_winner},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

/// Errors of a multi-trial solve.
#[derive(Error, Debug)]
pub enum SolveError {
    /// The winning trial itself failed, so there is no result to report.
    #[error("The selected trial {rank} failed: {source}")]
    TrialFailed {
        rank: usize,
        #[source]
        source: EigenError,
    },
    #[error(transparent)]
    Collective(#[from] CollectiveError),
}

/// Everything one trial produced.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub rank: usize,
    /// The RNG seed the trial ran with.
    pub seed: u64,
    pub krylov_dim: usize,
    /// Whether the Krylov subspace turned out to be invariant under `A`.
    pub invariant: bool,
    /// The recovered candidate eigenvectors, in the original space.
    pub eigenvectors: VectorSet,
    pub report: ResidualReport,
    pub iteration: SimultaneousOutput,
}

#[derive(Serialize)]
struct CandidateRow {
    index: usize,
    eigenvalue: Real,
    residual: Real,
}

impl TrialOutcome {
    /// The trial error: the sum of the candidate residuals.
    pub fn error(&self) -> Real {
        self.report.error
    }

    /// Writes one line per candidate followed by the aggregated error.
    pub fn write_report(&self, out: &mut impl Write) -> io::Result<()> {
        for (k, (lambda, residual)) in self
            .report
            .eigenvalues
            .iter()
            .zip(&self.report.residuals)
            .enumerate()
        {
            writeln!(
                out,
                "candidate {k}: eigenvalue = {lambda:.15e} residual = {residual:.15e}"
            )?;
        }
        writeln!(out, "error = {:.15e}", self.report.error)
    }

    /// Writes the candidates as CSV with an `index,eigenvalue,residual` header.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(out);
        for (index, (&eigenvalue, &residual)) in self
            .report
            .eigenvalues
            .iter()
            .zip(&self.report.residuals)
            .enumerate()
        {
            writer.serialize(CandidateRow {
                index,
                eigenvalue,
                residual,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Runs one randomized trial of the pipeline on `a`.
///
/// The trial seeds its RNG with `config.trial_seed(rank)`, draws a random
/// Arnoldi seed, builds the factorization, iterates `num` random orthonormal
/// candidates on the reduced operator, lifts them back and evaluates them.
///
/// # Returns
/// The [`TrialOutcome`], or an `EigenError` for invalid inputs and numerical
/// degeneracies.
pub fn run_trial<B>(
    backend: &B,
    a: &CsrMatrix,
    config: &SolverConfig,
    rank: usize,
) -> Result<TrialOutcome, EigenError>
where
    B: NumericBackend + ?Sized,
{
    let n = a.nrows();
    config.validate(n)?;
    let m = config.resolved_krylov_dim(n);
    let seed = config.trial_seed(rank);
    let mut rng = StdRng::seed_from_u64(seed);
    log::debug!("Trial {rank}: n = {n}, M = {m}, num = {}, seed = {seed}", config.num);

    let q0 = Vector::from_fn(n, |_| rng.random::<Real>() - 0.5);
    let factorization = arnoldi(backend, a, &q0, m)?;

    let mut candidates = VectorSet::random(config.num, m, &mut rng);
    gram_schmidt(backend, &mut candidates)?;

    let iteration = simultaneous_iteration(
        backend,
        factorization.operator(),
        &mut candidates,
        config.max_iterations,
        config.tolerance,
        None,
    )?;

    let eigenvectors = recover_eigenvectors(backend, factorization.basis(), &candidates)?;
    let report = evaluate_residuals(backend, a, &eigenvectors, config.estimator)?;
    log::info!(
        "Trial {rank} finished after {} rounds (converged: {}), error = {:e}",
        iteration.iterations,
        iteration.converged,
        report.error
    );

    Ok(TrialOutcome {
        rank,
        seed,
        krylov_dim: m,
        invariant: factorization.is_invariant(),
        eigenvectors,
        report,
        iteration,
    })
}

/// Runs this member's trial and takes part in the best-trial selection.
///
/// A failing trial still submits an error of `+∞`, so the other members are
/// never left waiting. Losers discard their results.
///
/// # Returns
/// `Some(outcome)` on the winning member only, `None` everywhere else.
pub fn solve<C, B>(
    comm: &mut C,
    backend: &B,
    a: &CsrMatrix,
    config: &SolverConfig,
) -> Result<Option<TrialOutcome>, SolveError>
where
    C: Collective + ?Sized,
    B: NumericBackend + ?Sized,
{
    let rank = comm.rank();
    if rank == 0 && config.estimator == EigenvalueEstimator::RayleighQuotient {
        log::info!("Eigenvalues are estimated with the Rayleigh quotient, not the vector norm.");
    }

    let trial = run_trial(backend, a, config, rank);
    let error = match &trial {
        Ok(outcome) => outcome.error(),
        Err(e) => {
            if e.is_degenerate() {
                log::warn!("Trial {rank} hit a numerical degeneracy: {e}");
            } else {
                log::error!("Trial {rank} failed: {e}");
            }
            Real::INFINITY
        }
    };

    let selection = select_winner(comm, error)?;
    if !selection.is_winner {
        log::debug!("Trial {rank} lost to trial {}, discarding its candidates.", selection.winner);
        return Ok(None);
    }

    trial
        .map(Some)
        .map_err(|source| SolveError::TrialFailed { rank, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::FaerBackend,
        selection::LocalGroup,
        utils::generators::{path_laplacian, star_laplacian},
    };
    use std::time::Duration;

    #[test]
    fn test_trial_is_reproducible() {
        let backend = FaerBackend::new();
        let a = path_laplacian(12).unwrap();
        let config = SolverConfig::new(2).with_krylov_dim(6);

        let first = run_trial(&backend, &a, &config, 3).unwrap();
        let second = run_trial(&backend, &a, &config, 3).unwrap();

        assert_eq!(first.seed, 4);
        assert_eq!(first.report, second.report);
        assert_eq!(first.eigenvectors, second.eigenvectors);
    }

    #[test]
    fn test_invalid_config_is_an_input_error() {
        let backend = FaerBackend::new();
        let a = star_laplacian(5).unwrap();
        let err = run_trial(&backend, &a, &SolverConfig::new(9), 0).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_report_format() {
        let backend = FaerBackend::new();
        let a = star_laplacian(5).unwrap();
        let config = SolverConfig::new(1).with_krylov_dim(3);
        let outcome = run_trial(&backend, &a, &config, 0).unwrap();

        let mut text = Vec::new();
        outcome.write_report(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("candidate 0: eigenvalue = "));
        assert!(lines[0].contains(" residual = "));
        assert!(lines[1].starts_with("error = "));

        let mut csv = Vec::new();
        outcome.write_csv(&mut csv).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert!(csv.starts_with("index,eigenvalue,residual\n0,"));
    }

    #[test]
    fn test_single_trial_solve_wins() {
        let backend = FaerBackend::new();
        let a = star_laplacian(5).unwrap();
        let config = SolverConfig::new(1).with_krylov_dim(3);
        let mut group = LocalGroup::new(1, Duration::from_secs(5));

        let outcome = solve(&mut group[0], &backend, &a, &config).unwrap();
        assert_eq!(outcome.map(|o| o.rank), Some(0));
    }

    #[test]
    fn test_failed_winner_fails_the_solve() {
        // The identity breaks the Arnoldi recurrence at the first step.
        let backend = FaerBackend::new();
        let triplets: Vec<_> = (0..6).map(|i| (i, i, 1.0)).collect();
        let a = CsrMatrix::from_triplets(6, 6, &triplets).unwrap();
        let config = SolverConfig::new(1).with_krylov_dim(3);
        let mut group = LocalGroup::new(1, Duration::from_secs(5));

        let err = solve(&mut group[0], &backend, &a, &config).unwrap_err();
        match err {
            SolveError::TrialFailed { rank, source } => {
                assert_eq!(rank, 0);
                assert!(source.is_degenerate());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
