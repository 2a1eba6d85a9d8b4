//! This module provides utilities for reading and writing sparse matrices in the
//! Matrix Market coordinate format.
//!
//! Supported headers are `%%MatrixMarket matrix coordinate <field> <symmetry>`
//! with the fields `real`, `double`, `integer` and `pattern`, and the
//! symmetries `general`, `symmetric` and `skew-symmetric`. Symmetric files
//! store one triangle; the mirrored entries are expanded on load (negated for
//! skew-symmetric files). Complex and Hermitian matrices are rejected.

use crate::{Real, error::EigenError, matrix::CsrMatrix};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};
use thiserror::Error;

/// Represents all possible errors that can occur during data loading and parsing.
#[derive(Error, Debug)]
pub enum DataLoaderError {
    /// Wraps a standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Occurs if the first line is not a `%%MatrixMarket` banner.
    #[error("Format error: The '%%MatrixMarket' banner was not found or was malformed.")]
    BannerMissing,
    /// Occurs for valid Matrix Market headers this loader does not handle.
    #[error("Unsupported Matrix Market format: {0}")]
    Unsupported(String),
    /// Occurs if the `rows cols nonzeros` line is missing or malformed.
    #[error("Format error: Malformed size line '{0}'.")]
    SizeLine(String),
    /// Occurs when an entry line cannot be parsed.
    #[error("Parse error at line {line}: Failed to parse entry from '{content}'")]
    Entry { line: usize, content: String },
    /// Occurs when an entry lies outside the declared dimensions.
    #[error("Format error at line {line}: Entry ({row}, {col}) lies outside a {nrows}x{ncols} matrix.")]
    IndexOutOfRange {
        line: usize,
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    /// Occurs when the end of a file is reached before all entries were read.
    #[error("Format error: Unexpected end of file, expected {expected} entries but found {found}.")]
    UnexpectedEof { expected: usize, found: usize },
    /// Occurs if the sparse matrix construction fails internally.
    #[error("Internal error: Failed to construct the sparse matrix: {0}")]
    Matrix(#[from] EigenError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Real,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symmetry {
    General,
    Symmetric,
    SkewSymmetric,
}

fn parse_banner(line: &str) -> Result<(Field, Symmetry), DataLoaderError> {
    let tokens: Vec<String> = line
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    if tokens.len() != 5 || tokens[0] != "%%matrixmarket" {
        return Err(DataLoaderError::BannerMissing);
    }
    if tokens[1] != "matrix" {
        return Err(DataLoaderError::Unsupported(format!("object '{}'", tokens[1])));
    }
    if tokens[2] != "coordinate" {
        return Err(DataLoaderError::Unsupported(format!("format '{}'", tokens[2])));
    }

    let field = match tokens[3].as_str() {
        "real" | "double" | "integer" => Field::Real,
        "pattern" => Field::Pattern,
        other => return Err(DataLoaderError::Unsupported(format!("field '{other}'"))),
    };
    let symmetry = match tokens[4].as_str() {
        "general" => Symmetry::General,
        "symmetric" => Symmetry::Symmetric,
        "skew-symmetric" => Symmetry::SkewSymmetric,
        other => return Err(DataLoaderError::Unsupported(format!("symmetry '{other}'"))),
    };
    if field == Field::Pattern && symmetry == Symmetry::SkewSymmetric {
        return Err(DataLoaderError::Unsupported(
            "field 'pattern' with symmetry 'skew-symmetric'".to_string(),
        ));
    }
    Ok((field, symmetry))
}

fn parse_size_line(line: &str) -> Result<(usize, usize, usize), DataLoaderError> {
    let parts: Vec<usize> = line
        .split_whitespace()
        .map(str::parse::<usize>)
        .collect::<Result<_, _>>()
        .map_err(|_| DataLoaderError::SizeLine(line.to_string()))?;
    match parts[..] {
        // A general matrix stores at most one entry per position, and the
        // symmetric variants store fewer.
        [nrows, ncols, nnz] if nrows.checked_mul(ncols).is_some_and(|cap| nnz <= cap) => {
            Ok((nrows, ncols, nnz))
        }
        _ => Err(DataLoaderError::SizeLine(line.to_string())),
    }
}

/// Reads a Matrix Market matrix from any buffered reader.
///
/// # Returns
/// The matrix in CSR form. Pattern files produce a pattern-only matrix whose
/// entries act as `1`; duplicate entries are summed (collapsed for patterns).
pub fn read_matrix_market<R: BufRead>(reader: R) -> Result<CsrMatrix, DataLoaderError> {
    let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));

    let banner = match lines.next() {
        Some((_, line)) => line?,
        None => return Err(DataLoaderError::BannerMissing),
    };
    let (field, symmetry) = parse_banner(&banner)?;

    // Comments and blank lines may appear anywhere after the banner.
    let mut content = lines.filter_map(|(number, line)| match line {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                None
            } else {
                Some(Ok((number, trimmed.to_string())))
            }
        }
        Err(e) => Some(Err(e)),
    });

    let (nrows, ncols, nnz) = match content.next() {
        Some(line) => parse_size_line(&line?.1)?,
        None => return Err(DataLoaderError::SizeLine(String::new())),
    };
    log::debug!("Matrix Market header: {nrows}x{ncols}, {nnz} entries, {field:?}, {symmetry:?}");

    // The entry count is only a hint until the entries are actually read.
    let mut triplets: Vec<(usize, usize, Real)> = Vec::with_capacity(nnz.min(1 << 20));
    for found in 0..nnz {
        let (number, line) = content
            .next()
            .ok_or(DataLoaderError::UnexpectedEof {
                expected: nnz,
                found,
            })??;
        let entry_error = || DataLoaderError::Entry {
            line: number,
            content: line.clone(),
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        let expected_parts = if field == Field::Pattern { 2 } else { 3 };
        if parts.len() < expected_parts {
            return Err(entry_error());
        }
        let row = parts[0].parse::<usize>().map_err(|_| entry_error())?;
        let col = parts[1].parse::<usize>().map_err(|_| entry_error())?;
        let value = match field {
            Field::Pattern => 1.0,
            Field::Real => parts[2].parse::<Real>().map_err(|_| entry_error())?,
        };

        // Matrix Market indices are 1-based.
        if row == 0 || col == 0 || row > nrows || col > ncols {
            return Err(DataLoaderError::IndexOutOfRange {
                line: number,
                row,
                col,
                nrows,
                ncols,
            });
        }
        let (r, c) = (row - 1, col - 1);
        triplets.push((r, c, value));
        match symmetry {
            Symmetry::General => {}
            Symmetry::Symmetric if r != c => triplets.push((c, r, value)),
            Symmetry::SkewSymmetric if r != c => triplets.push((c, r, -value)),
            _ => {}
        }
    }

    let matrix = match field {
        Field::Pattern => {
            let entries: Vec<_> = triplets.iter().map(|&(r, c, _)| (r, c)).collect();
            CsrMatrix::from_pattern(nrows, ncols, &entries)?
        }
        Field::Real => CsrMatrix::from_triplets(nrows, ncols, &triplets)?,
    };
    log::info!(
        "Loaded a {}x{} matrix with {} stored entries.",
        matrix.nrows(),
        matrix.ncols(),
        matrix.nnz()
    );
    Ok(matrix)
}

/// Loads a Matrix Market file from disk.
///
/// This is the main entry point of the module.
pub fn load_matrix_market(path: impl AsRef<Path>) -> Result<CsrMatrix, DataLoaderError> {
    let file = File::open(path)?;
    read_matrix_market(BufReader::new(file))
}

/// Writes a matrix as `coordinate real general` (or `coordinate pattern general`
/// for pattern-only matrices).
pub fn write_matrix_market<W: Write>(matrix: &CsrMatrix, mut writer: W) -> Result<(), DataLoaderError> {
    let field = if matrix.is_pattern() { "pattern" } else { "real" };
    writeln!(writer, "%%MatrixMarket matrix coordinate {field} general")?;
    writeln!(writer, "{} {} {}", matrix.nrows(), matrix.ncols(), matrix.nnz())?;
    for i in 0..matrix.nrows() {
        for (j, value) in matrix.row(i) {
            if matrix.is_pattern() {
                writeln!(writer, "{} {}", i + 1, j + 1)?;
            } else {
                writeln!(writer, "{} {} {value}", i + 1, j + 1)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes a matrix to a Matrix Market file, creating or truncating it.
pub fn save_matrix_market(matrix: &CsrMatrix, path: impl AsRef<Path>) -> Result<(), DataLoaderError> {
    let file = File::create(path)?;
    write_matrix_market(matrix, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Result<CsrMatrix, DataLoaderError> {
        read_matrix_market(text.as_bytes())
    }

    #[test]
    fn test_general_real_matrix() {
        let a = read(
            "%%MatrixMarket matrix coordinate real general\n\
             % a comment\n\
             \n\
             3 3 4\n\
             1 1 2.5\n\
             3 1 -1\n\
             2 2 4e-1\n\
             1 3 7\n",
        )
        .unwrap();

        assert_eq!((a.nrows(), a.ncols(), a.nnz()), (3, 3, 4));
        let dense = a.to_dense();
        assert_eq!(dense[(0, 0)], 2.5);
        assert_eq!(dense[(2, 0)], -1.0);
        assert_eq!(dense[(1, 1)], 0.4);
        assert_eq!(dense[(0, 2)], 7.0);
    }

    #[test]
    fn test_symmetric_entries_are_mirrored() {
        let a = read(
            "%%MatrixMarket matrix coordinate integer symmetric\n\
             2 2 2\n\
             1 1 3\n\
             2 1 -2\n",
        )
        .unwrap();

        let dense = a.to_dense();
        assert_eq!(a.nnz(), 3);
        assert_eq!(dense[(0, 1)], -2.0);
        assert_eq!(dense[(1, 0)], -2.0);
    }

    #[test]
    fn test_skew_symmetric_mirrors_are_negated() {
        let a = read(
            "%%MatrixMarket matrix coordinate real skew-symmetric\n\
             2 2 1\n\
             2 1 1.5\n",
        )
        .unwrap();

        let dense = a.to_dense();
        assert_eq!(dense[(1, 0)], 1.5);
        assert_eq!(dense[(0, 1)], -1.5);
    }

    #[test]
    fn test_pattern_matrix() {
        let a = read(
            "%%MatrixMarket matrix coordinate pattern symmetric\n\
             3 3 2\n\
             2 1\n\
             3 3\n",
        )
        .unwrap();

        assert!(a.is_pattern());
        assert_eq!(a.nnz(), 3);
        assert_eq!(a.to_dense()[(0, 1)], 1.0);
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(read(""), Err(DataLoaderError::BannerMissing)));
        assert!(matches!(
            read("1 1 1\n"),
            Err(DataLoaderError::BannerMissing)
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate complex general\n1 1 0\n"),
            Err(DataLoaderError::Unsupported(_))
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix array real general\n1 1\n"),
            Err(DataLoaderError::Unsupported(_))
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real hermitian\n1 1 0\n"),
            Err(DataLoaderError::Unsupported(_))
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real general\n2 2\n"),
            Err(DataLoaderError::SizeLine(_))
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real general\n2 2 1000000000000000000\n1 1 1.0\n"),
            Err(DataLoaderError::SizeLine(_))
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real general\n2 2 5\n"),
            Err(DataLoaderError::SizeLine(_))
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real general\n2 2 1\n1 x 1.0\n"),
            Err(DataLoaderError::Entry { line: 3, .. })
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real general\n2 2 1\n3 1 1.0\n"),
            Err(DataLoaderError::IndexOutOfRange { row: 3, .. })
        ));
        assert!(matches!(
            read("%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n"),
            Err(DataLoaderError::UnexpectedEof {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_writer_output_loads_back() {
        let a = CsrMatrix::from_triplets(3, 2, &[(0, 1, 0.1), (2, 0, -3.25), (1, 1, 1e-20)])
            .unwrap();
        let mut text = Vec::new();
        write_matrix_market(&a, &mut text).unwrap();

        assert!(text.starts_with(b"%%MatrixMarket matrix coordinate real general\n3 2 3\n"));
        assert_eq!(read_matrix_market(text.as_slice()).unwrap(), a);
    }
}
