//! Graph Laplacians with known spectra, used as test problems.
//!
//! | graph | eigenvalues |
//! |-------|-------------|
//! | path on `n` nodes | `2 - 2cos(kπ/n)`, `k = 0..n`, all distinct |
//! | star on `n` nodes | `0`, `1` (multiplicity `n-2`), `n` |
//! | `r×c` grid | sums of the path eigenvalues of `r` and `c` |

use crate::{Real, error::EigenError, matrix::CsrMatrix};

fn laplacian(n: usize, edges: &[(usize, usize)]) -> Result<CsrMatrix, EigenError> {
    let mut degree = vec![0usize; n];
    let mut triplets = Vec::with_capacity(n + 2 * edges.len());
    for &(u, v) in edges {
        degree[u] += 1;
        degree[v] += 1;
        triplets.push((u, v, -1.0));
        triplets.push((v, u, -1.0));
    }
    triplets.extend(degree.iter().enumerate().map(|(i, &d)| (i, i, d as Real)));
    CsrMatrix::from_triplets(n, n, &triplets)
}

/// Laplacian of the path `0 - 1 - … - (n-1)`.
pub fn path_laplacian(n: usize) -> Result<CsrMatrix, EigenError> {
    let edges: Vec<_> = (1..n).map(|i| (i - 1, i)).collect();
    laplacian(n, &edges)
}

/// Laplacian of the star whose center is node `0`.
pub fn star_laplacian(n: usize) -> Result<CsrMatrix, EigenError> {
    let edges: Vec<_> = (1..n).map(|i| (0, i)).collect();
    laplacian(n, &edges)
}

/// Laplacian of the `rows×cols` grid, nodes numbered row by row.
pub fn grid_laplacian(rows: usize, cols: usize) -> Result<CsrMatrix, EigenError> {
    let index = |r: usize, c: usize| r * cols + c;
    let mut edges = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                edges.push((index(r, c), index(r, c + 1)));
            }
            if r + 1 < rows {
                edges.push((index(r, c), index(r + 1, c)));
            }
        }
    }
    laplacian(rows * cols, &edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_sums(a: &CsrMatrix) -> Vec<Real> {
        (0..a.nrows()).map(|i| a.row(i).map(|(_, v)| v).sum()).collect()
    }

    #[test]
    fn test_star_laplacian() {
        let a = star_laplacian(5).unwrap();
        let dense = a.to_dense();

        assert_eq!(a.nnz(), 13);
        assert_eq!(dense[(0, 0)], 4.0);
        assert_eq!(dense[(3, 3)], 1.0);
        assert_eq!(dense[(0, 3)], -1.0);
        assert_eq!(dense[(1, 2)], 0.0);
        assert!(row_sums(&a).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_path_and_grid_laplacians() {
        let path = path_laplacian(4).unwrap();
        assert_eq!(path.nnz(), 10);
        assert!(row_sums(&path).iter().all(|&s| s == 0.0));

        let grid = grid_laplacian(3, 4).unwrap();
        assert_eq!(grid.nrows(), 12);
        // 12 diagonal entries plus two per edge; a 3x4 grid has 17 edges.
        assert_eq!(grid.nnz(), 12 + 2 * 17);
        assert_eq!(grid.to_dense()[(5, 5)], 4.0);
        assert!(row_sums(&grid).iter().all(|&s| s == 0.0));
    }
}
