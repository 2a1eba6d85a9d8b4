//! Command-line front end of the eigensolver.
//!
//! The same executable plays two roles. Started by a user, it is the launcher:
//! it loads and validates the matrix, then runs `--processes` trials, either as
//! threads of this process or as child copies of itself. A child started by
//! the launcher finds its rank in the `SIMULTITE_RANK` environment variable,
//! runs one trial and exchanges its error with the launcher over stdin/stdout.
//! Only the winning trial prints its eigenpairs.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use simultite::{
    CsrMatrix, FaerBackend, Real, SolverConfig, TrialOutcome,
    algorithms::EigenvalueEstimator,
    config::{DEFAULT_MAX_ITERATIONS, DEFAULT_SEED, DEFAULT_TOLERANCE},
    process::{Launcher, WorkerLink, worker_identity},
    selection::LocalGroup,
    solve,
    utils::data_loader::load_matrix_market,
};
use std::{io::Write, path::PathBuf, thread, time::Duration};

/// How the eigenvalue of a candidate is estimated.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Estimator {
    /// The Euclidean norm of the candidate.
    VectorNorm,
    /// The Rayleigh quotient <x, Ax> / <x, x>.
    RayleighQuotient,
}

impl From<Estimator> for EigenvalueEstimator {
    fn from(value: Estimator) -> Self {
        match value {
            Estimator::VectorNorm => EigenvalueEstimator::VectorNorm,
            Estimator::RayleighQuotient => EigenvalueEstimator::RayleighQuotient,
        }
    }
}

/// Where the trials run.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    /// One child process per trial.
    Processes,
    /// One thread per trial, inside this process.
    Threads,
}

/// Command-line arguments, shared by the launcher and its workers.
#[derive(Parser, Debug)]
#[clap(
    name = "simultite",
    about = "Approximates the dominant eigenpairs of a sparse Matrix Market matrix."
)]
struct Cli {
    /// Path to the input matrix in Matrix Market coordinate format.
    #[clap(short, long, value_name = "PATH")]
    infile: PathBuf,
    /// The number of dominant eigenpairs to approximate.
    #[clap(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    num: u32,
    /// The Krylov dimension M. Defaults to min(max(2*num, 10), n-1).
    #[clap(short = 'm', long)]
    krylov_dim: Option<usize>,
    /// The maximum number of simultaneous-iteration rounds.
    #[clap(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
    /// The drift below which the iteration stops.
    #[clap(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: Real,
    /// The base seed. Trial r uses seed + r.
    #[clap(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// How eigenvalues are estimated for the residuals.
    #[clap(long, value_enum, default_value_t = Estimator::VectorNorm)]
    estimator: Estimator,
    /// The number of independent trials.
    #[clap(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    processes: u32,
    /// Where the trials run.
    #[clap(long, value_enum, default_value_t = Transport::Processes)]
    transport: Transport,
    /// Upper bound, in seconds, on every wait between trials.
    #[clap(long, default_value_t = 600)]
    timeout_secs: u64,
    /// Optional CSV file receiving the winning candidates.
    #[clap(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Enables debug logging.
    #[clap(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> SolverConfig {
        let mut config = SolverConfig::new(self.num as usize)
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance)
            .with_seed(self.seed)
            .with_estimator(self.estimator.into());
        config.krylov_dim = self.krylov_dim;
        config
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Main entry point.
///
/// The logic dispatches to either the launcher or a worker based on the
/// presence of the `SIMULTITE_RANK` environment variable.
fn main() -> Result<()> {
    let identity = worker_identity().context("Invalid worker environment")?;
    let cli = Cli::parse();
    init_logger(cli.verbose, identity.map(|(rank, _)| rank))?;

    match identity {
        Some((rank, size)) => run_worker(&cli, rank, size),
        None => run_launcher(&cli),
    }
}

/// Logs to stderr, prefixing every line with the trial that emitted it: the
/// worker rank in a child process, the thread name in threads mode.
fn init_logger(verbose: bool, rank: Option<usize>) -> Result<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(move |buf, record| {
            let origin = match rank {
                Some(rank) => format!("trial-{rank}"),
                None => thread::current().name().unwrap_or("launcher").to_string(),
            };
            writeln!(buf, "[{} {origin}] {}", record.level(), record.args())
        })
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))
}

fn load(cli: &Cli) -> Result<(CsrMatrix, SolverConfig)> {
    let a = load_matrix_market(&cli.infile)
        .with_context(|| format!("Failed to load matrix from {:?}", &cli.infile))?;
    let config = cli.config();
    if !a.is_square() {
        bail!("The matrix must be square, got {}x{}.", a.nrows(), a.ncols());
    }
    config
        .validate(a.nrows())
        .context("Invalid solver configuration")?;
    Ok((a, config))
}

fn publish(cli: &Cli, outcome: &TrialOutcome) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    outcome.write_report(&mut out)?;
    out.flush()?;

    if let Some(path) = &cli.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create output file {path:?}"))?;
        outcome.write_csv(file)?;
        log::info!("Candidates written to {path:?}.");
    }
    Ok(())
}

/// Launcher logic. The matrix is checked here once, before any trial starts,
/// so a bad input yields a single diagnostic.
fn run_launcher(cli: &Cli) -> Result<()> {
    let (a, config) = load(cli)?;
    let size = cli.processes as usize;
    log::info!(
        "Running {size} trial(s) with M = {} on a {}x{} matrix.",
        config.resolved_krylov_dim(a.nrows()),
        a.nrows(),
        a.ncols()
    );

    if size == 1 || cli.transport == Transport::Threads {
        return run_threads(cli, &a, &config, size);
    }

    // The workers reload the matrix themselves.
    drop(a);
    let current_exe = std::env::current_exe()?;
    let summary = Launcher::new(current_exe, size, cli.timeout())
        .args(std::env::args_os().skip(1))
        .run(&mut std::io::stdout())
        .context("The trial group failed")?;
    log::info!(
        "Trial {} won with error {:e}.",
        summary.winner,
        summary.errors[summary.winner]
    );
    Ok(())
}

fn run_threads(cli: &Cli, a: &CsrMatrix, config: &SolverConfig, size: usize) -> Result<()> {
    let backend = FaerBackend::new();
    let endpoints = LocalGroup::new(size, cli.timeout());

    let results = thread::scope(|s| {
        let handles = endpoints
            .into_iter()
            .enumerate()
            .map(|(rank, mut endpoint)| {
                thread::Builder::new()
                    .name(format!("trial-{rank}"))
                    .spawn_scoped(s, move || solve(&mut endpoint, &backend, a, config))
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok::<_, anyhow::Error>(
            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| anyhow!("A trial thread panicked.")))
                .collect::<Vec<_>>(),
        )
    })?;

    let mut winner = None;
    for result in results {
        if let Some(outcome) = result?? {
            winner = Some(outcome);
        }
    }
    let outcome = winner.ok_or_else(|| anyhow!("No trial reported a result."))?;
    publish(cli, &outcome)
}

/// Worker logic.
///
/// This function runs in a child process. It runs one trial, submits its
/// error on stdout and waits for the verdict on stdin. The winner then prints
/// its eigenpairs to stdout, which the launcher forwards.
fn run_worker(cli: &Cli, rank: usize, size: usize) -> Result<()> {
    log::debug!("Worker {rank} of {size} started.");
    let (a, config) = load(cli)?;
    let mut link = WorkerLink::stdio(rank, size);

    match solve(&mut link, &FaerBackend::new(), &a, &config)? {
        Some(outcome) => publish(cli, &outcome),
        None => Ok(()),
    }
}
