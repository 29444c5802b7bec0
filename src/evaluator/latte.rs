//! LattE back-end
//!
//! Runs LattE integrale's `count` (https://www.math.ucdavis.edu/~latte/) on a
//! query file in a scratch directory. The query states `-b + A x = 0` for every
//! row, then marks all rows as linearities and all unknowns as nonnegative:
//!
//! ```text
//! nrows (ncols + 1)
//! -b_i   A_i
//! linearity     nrows   1 2 ... nrows
//! nonnegative   ncols   1 2 ... ncols
//! ```
//!
//! LattE reports an empty system as "Empty polytope or unbounded polytope",
//! sometimes with a failing exit status; both mean a count of 0.

use super::{join, Evaluator};
use crate::error::EvaluatorError;
use crate::weight::{PartitionMatrix, Weight};
use num_bigint::BigUint;
use std::path::PathBuf;
use std::process::Command;

const BACKEND: &str = "latte";
const EMPTY_POLYTOPE: &str = "Empty polytope or unbounded polytope";
const COUNT_MARKER: &str = "number of lattice points";

/// Evaluator backed by LattE's `count`
#[derive(Debug, Clone)]
pub struct LatteEvaluator {
    path: PathBuf,
}

impl LatteEvaluator {
    /// Create an evaluator for the binary at `path`
    pub fn new(path: PathBuf) -> Result<Self, EvaluatorError> {
        if !path.is_file() {
            return Err(EvaluatorError::MissingBinary { backend: BACKEND, path });
        }
        Ok(Self { path })
    }
}

/// Render the query in LattE's input format
pub fn prepare_input(matrix: &PartitionMatrix, point: &Weight) -> String {
    let (nrows, ncols) = matrix.shape();
    let mut s = format!("{} {}\n", nrows, ncols + 1);

    for (row, b) in matrix.iter_rows().zip(point.iter()) {
        s.push_str(&format!("{}   {}\n", -b, join(row)));
    }

    s.push_str(&format!("linearity     {}   {}\n", nrows, join(1..=nrows)));
    s.push_str(&format!("nonnegative   {}   {}\n", ncols, join(1..=ncols)));
    s
}

/// Extract the count from LattE's output
///
/// Accepts the phrasings `number of lattice points: N`,
/// `number of lattice points is N` and `number of lattice points N`.
pub fn parse_output(output: &str) -> Result<BigUint, EvaluatorError> {
    if output.contains(EMPTY_POLYTOPE) {
        return Ok(BigUint::default());
    }

    output
        .match_indices(COUNT_MARKER)
        .find_map(|(start, marker)| count_after(&output[start + marker.len()..]))
        .ok_or_else(|| EvaluatorError::Unparsable {
            backend: BACKEND,
            output: output.to_string(),
        })
}

/// Parse `( is)?(:)? N` at the start of `rest`
fn count_after(rest: &str) -> Option<BigUint> {
    let rest = rest.strip_prefix(" is").unwrap_or(rest);
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let rest = rest.strip_prefix(' ')?;

    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse::<BigUint>().ok()
}

impl Evaluator for LatteEvaluator {
    fn evaluate(&self, matrix: &PartitionMatrix, point: &Weight) -> Result<BigUint, EvaluatorError> {
        let io_err = |source| EvaluatorError::Io { backend: BACKEND, source };

        // count drops auxiliary files into its working directory
        let scratch = tempfile::Builder::new()
            .prefix("kronecker-latte-")
            .tempdir()
            .map_err(io_err)?;
        let input_path = scratch.path().join("query.in");
        std::fs::write(&input_path, prepare_input(matrix, point)).map_err(io_err)?;

        let output = Command::new(&self.path)
            .arg(&input_path)
            .current_dir(scratch.path())
            .output()
            .map_err(|source| EvaluatorError::Spawn { backend: BACKEND, source })?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if !output.status.success() {
            if combined.contains(EMPTY_POLYTOPE) {
                return Ok(BigUint::default());
            }
            return Err(EvaluatorError::Failed {
                backend: BACKEND,
                status: output.status.to_string(),
                output: combined,
            });
        }

        parse_output(&combined)
    }

    fn name(&self) -> String {
        format!("latte[{}]", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_input() {
        let matrix = PartitionMatrix::from_rows(vec![vec![1, 0], vec![0, 1], vec![1, 1]]).unwrap();
        let point: Weight = [2, 3, 5].into_iter().collect();
        let expected = "3 3\n\
                        -2   1 0\n\
                        -3   0 1\n\
                        -5   1 1\n\
                        linearity     3   1 2 3\n\
                        nonnegative   2   1 2\n";
        assert_eq!(prepare_input(&matrix, &point), expected);
    }

    #[test]
    fn test_parse_output_variants() {
        assert_eq!(
            parse_output("...\nThe number of lattice points is 17.\n").unwrap(),
            BigUint::from(17u32)
        );
        assert_eq!(
            parse_output("*****  Total number of lattice points: 5 ****\n").unwrap(),
            BigUint::from(5u32)
        );
        assert_eq!(parse_output("number of lattice points 3\n").unwrap(), BigUint::from(3u32));
    }

    #[test]
    fn test_parse_output_empty_polytope() {
        let output = "Empty polytope or unbounded polytope!\n";
        assert_eq!(parse_output(output).unwrap(), BigUint::from(0u32));
    }

    #[test]
    fn test_parse_output_garbage() {
        assert!(parse_output("Segmentation fault\n").is_err());
        assert!(parse_output("number of lattice points: many\n").is_err());
    }

    #[test]
    fn test_parse_output_skips_earlier_mentions() {
        let output = "Computing the number of lattice points of the polytope...\n\
                      *****  Total number of lattice points: 5 ****\n";
        assert_eq!(parse_output(output).unwrap(), BigUint::from(5u32));

        let output = "number of lattice points: pending\nnumber of lattice points is 12\n";
        assert_eq!(parse_output(output).unwrap(), BigUint::from(12u32));
    }
}
