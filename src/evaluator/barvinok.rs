//! barvinok back-end
//!
//! Runs `barvinok_count` (http://barvinok.gforge.inria.fr/) with the query on
//! stdin, in PolyLib's homogeneous constraint format. Each row is
//! `[eq/ineq flag] [coefficients of x] [constant]`, flag 1 for `>= 0` and 0
//! for `= 0`:
//!
//! ```text
//! (ncols + nrows) (ncols + 2)
//! 1   e_i   0          for every unknown (x_i >= 0)
//! 0   A_i   -b_i       for every row     (A_i x - b_i = 0)
//! ```
//!
//! The count is the last line of the output.

use super::{join, Evaluator};
use crate::error::EvaluatorError;
use crate::weight::{PartitionMatrix, Weight};
use num_bigint::BigUint;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

const BACKEND: &str = "barvinok";

/// Evaluator backed by `barvinok_count`
#[derive(Debug, Clone)]
pub struct BarvinokEvaluator {
    path: PathBuf,
}

impl BarvinokEvaluator {
    /// Create an evaluator for the binary at `path`
    pub fn new(path: PathBuf) -> Result<Self, EvaluatorError> {
        if !path.is_file() {
            return Err(EvaluatorError::MissingBinary { backend: BACKEND, path });
        }
        Ok(Self { path })
    }
}

/// Render the query in barvinok's input format
pub fn prepare_input(matrix: &PartitionMatrix, point: &Weight) -> String {
    let (nrows, ncols) = matrix.shape();
    let mut s = format!("{} {}\n", ncols + nrows, 1 + ncols + 1);

    for i in 0..ncols {
        let delta = (0..ncols).map(|j| u8::from(i == j));
        s.push_str(&format!("1   {}   0\n", join(delta)));
    }

    for (row, b) in matrix.iter_rows().zip(point.iter()) {
        s.push_str(&format!("0   {}   {}\n", join(row), -b));
    }

    s
}

/// Parse the count from the last nonempty line of barvinok's output
pub fn parse_output(output: &str) -> Result<BigUint, EvaluatorError> {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.trim().parse::<BigUint>().ok())
        .ok_or_else(|| EvaluatorError::Unparsable {
            backend: BACKEND,
            output: output.to_string(),
        })
}

impl Evaluator for BarvinokEvaluator {
    fn evaluate(&self, matrix: &PartitionMatrix, point: &Weight) -> Result<BigUint, EvaluatorError> {
        let input = prepare_input(matrix, point);

        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EvaluatorError::Spawn { backend: BACKEND, source })?;

        // dropping stdin closes the pipe; the child is reaped even if the write failed
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input.as_bytes()),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|source| EvaluatorError::Spawn { backend: BACKEND, source })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvaluatorError::Failed {
                backend: BACKEND,
                status: output.status.to_string(),
                output: format!("{}{}", stdout, stderr),
            });
        }
        written.map_err(|source| EvaluatorError::Io { backend: BACKEND, source })?;

        parse_output(&stdout)
    }

    fn name(&self) -> String {
        format!("barvinok[{}]", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_input() {
        let matrix = PartitionMatrix::from_rows(vec![vec![1, 0], vec![0, 1], vec![1, 1]]).unwrap();
        let point: Weight = [2, 3, 5].into_iter().collect();
        let expected = "5 4\n\
                        1   1 0   0\n\
                        1   0 1   0\n\
                        0   1 0   -2\n\
                        0   0 1   -3\n\
                        0   1 1   -5\n";
        assert_eq!(prepare_input(&matrix, &point), expected);
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output("some banner\n42\n").unwrap(), BigUint::from(42u32));
        assert_eq!(
            parse_output("100000000000000000000000\n\n").unwrap(),
            "100000000000000000000000".parse::<BigUint>().unwrap()
        );
        assert!(parse_output("segmentation fault\n").is_err());
        assert!(parse_output("").is_err());
    }

    #[test]
    fn test_missing_binary() {
        assert!(BarvinokEvaluator::new(PathBuf::from("/nonexistent/barvinok_count")).is_err());
    }

    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, body: &str) -> BarvinokEvaluator {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("barvinok_count");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        BarvinokEvaluator::new(path).unwrap()
    }

    #[cfg(unix)]
    fn identity(n: usize) -> (PartitionMatrix, Weight) {
        let rows: Vec<Vec<i64>> = (0..n).map(|i| (0..n).map(|j| i64::from(i == j)).collect()).collect();
        let matrix = PartitionMatrix::from_rows(rows).unwrap();
        (matrix, std::iter::repeat(1).take(n).collect())
    }

    #[cfg(unix)]
    #[test]
    fn test_evaluate_reads_count() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = script(&dir, "cat > /dev/null\necho 1");
        let (matrix, point) = identity(3);
        assert_eq!(evaluator.evaluate(&matrix, &point).unwrap(), BigUint::from(1u32));
    }

    #[cfg(unix)]
    #[test]
    fn test_child_exiting_before_reading_input() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = script(&dir, "echo boom >&2\nexit 3");

        // larger than a pipe buffer, so the write fails once the child is gone
        let (matrix, point) = identity(400);
        assert!(prepare_input(&matrix, &point).len() > 256 * 1024);

        match evaluator.evaluate(&matrix, &point) {
            Err(EvaluatorError::Failed { status, output, .. }) => {
                assert!(status.contains('3'));
                assert!(output.contains("boom"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
