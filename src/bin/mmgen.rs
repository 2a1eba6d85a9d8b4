//! A data generation utility for creating eigenproblem test instances.
//!
//! Writes the Laplacian of a path, star or grid graph in Matrix Market format.
//! The spectra of these matrices are known in closed form, which makes them
//! convenient inputs for checking the solver by hand.

use anyhow::{Context, Result, anyhow, ensure};
use clap::{Parser, ValueEnum};
use simultite::utils::{
    data_loader::save_matrix_market,
    generators::{grid_laplacian, path_laplacian, star_laplacian},
};
use std::path::PathBuf;

/// The graph whose Laplacian is generated.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Graph {
    /// A path on `size` nodes. All eigenvalues are distinct.
    Path,
    /// A star on `size` nodes. Eigenvalues 0, 1 and `size`.
    Star,
    /// A `size` x `cols` grid.
    Grid,
}

/// Command-line interface for the Laplacian generator.
#[derive(Parser, Debug)]
#[clap(
    name = "mmgen",
    about = "Writes a graph Laplacian test matrix in Matrix Market format."
)]
struct MmGenArgs {
    /// The graph to generate.
    #[clap(long, value_enum)]
    graph: Graph,
    /// The number of nodes (path, star) or grid rows.
    #[clap(long, value_parser = clap::value_parser!(u32).range(2..))]
    size: u32,
    /// The number of grid columns. Defaults to `size`.
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
    cols: Option<u32>,
    /// The Matrix Market file to write.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = MmGenArgs::parse();
    log::info!("Generating test matrix with parameters: {:?}", &args);
    ensure!(
        args.cols.is_none() || args.graph == Graph::Grid,
        "--cols only applies to --graph grid"
    );

    let size = args.size as usize;
    let matrix = match args.graph {
        Graph::Path => path_laplacian(size),
        Graph::Star => star_laplacian(size),
        Graph::Grid => grid_laplacian(size, args.cols.map_or(size, |c| c as usize)),
    }?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {parent:?}"))?;
    }
    save_matrix_market(&matrix, &args.output)
        .with_context(|| format!("Failed to write {:?}", &args.output))?;

    log::info!(
        "Wrote a {}x{} matrix with {} entries to {:?}.",
        matrix.nrows(),
        matrix.ncols(),
        matrix.nnz(),
        &args.output
    );
    Ok(())
}
