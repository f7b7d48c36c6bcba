//! Shared domain types.
//!
//! In-memory types (`Problem`, `SolveResult`) use nalgebra containers; the
//! `*File` types are their JSON shapes:
//!
//! - `ProblemFile` is what the caller hands to `lsq`
//! - `ResultFile` is what `lsq` writes back (`"C"` and optional `"committee"`)

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::SolverError;
use crate::operator::{LinearOperator, OperatorSpec};

/// Output of a single solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Coefficient vector θ; its length is the number of columns of `A`.
    pub coefficients: DVector<f64>,
    /// Alternative coefficient vectors sampled from a posterior, when the
    /// solver produces them.
    pub committee: Option<Vec<DVector<f64>>>,
}

impl SolveResult {
    pub fn new(coefficients: DVector<f64>) -> Self {
        Self {
            coefficients,
            committee: None,
        }
    }

    pub fn with_committee(mut self, committee: Vec<DVector<f64>>) -> Self {
        self.committee = Some(committee);
        self
    }

    /// `‖A θ - y‖₂`.
    pub fn residual_norm(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> f64 {
        (a * &self.coefficients - y).norm()
    }

    /// `‖A θ - y‖ / ‖y‖`, or the plain residual norm when `y = 0`.
    pub fn relative_residual(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> f64 {
        let r = self.residual_norm(a, y);
        let ynorm = y.norm();
        if ynorm > 0.0 { r / ynorm } else { r }
    }
}

/// A least-squares problem together with an optional caller-supplied preconditioner.
#[derive(Debug, Clone)]
pub struct Problem {
    pub a: DMatrix<f64>,
    pub y: DVector<f64>,
    pub preconditioner: Option<Arc<dyn LinearOperator>>,
}

impl Problem {
    pub fn new(a: DMatrix<f64>, y: DVector<f64>) -> Self {
        Self {
            a,
            y,
            preconditioner: None,
        }
    }

    pub fn n_obs(&self) -> usize {
        self.a.nrows()
    }

    pub fn n_params(&self) -> usize {
        self.a.ncols()
    }
}

/// JSON schema of a problem file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemFile {
    /// Design matrix rows.
    pub a: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditioner: Option<OperatorSpec>,
}

impl ProblemFile {
    /// Validate shapes and convert to nalgebra containers.
    pub fn into_problem(self) -> Result<Problem, SolverError> {
        let m = self.a.len();
        let n = self.a.first().map(|r| r.len()).unwrap_or(0);

        let mut flat = Vec::with_capacity(m * n);
        for row in &self.a {
            if row.len() != n {
                return Err(SolverError::DimensionMismatch {
                    context: "design matrix row length",
                    expected: n,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        if self.y.len() != m {
            return Err(SolverError::DimensionMismatch {
                context: "target vector length vs design matrix rows",
                expected: m,
                found: self.y.len(),
            });
        }

        let preconditioner = match &self.preconditioner {
            Some(spec) => Some(spec.build()?),
            None => None,
        };

        Ok(Problem {
            a: DMatrix::from_row_slice(m, n, &flat),
            y: DVector::from_vec(self.y),
            preconditioner,
        })
    }
}

/// JSON schema of a result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub solver: String,
    #[serde(rename = "C")]
    pub coefficients: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committee: Option<Vec<Vec<f64>>>,
    pub residual_norm: f64,
    pub relative_rmse: f64,
}

impl ResultFile {
    pub fn from_result(solver: &str, result: &SolveResult, residual_norm: f64, relative_rmse: f64) -> Self {
        Self {
            solver: solver.to_string(),
            coefficients: result.coefficients.iter().copied().collect(),
            committee: result
                .committee
                .as_ref()
                .map(|c| c.iter().map(|v| v.iter().copied().collect()).collect()),
            residual_norm,
            relative_rmse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_file_converts_row_major() {
        let file: ProblemFile = serde_json::from_str(r#"{"a": [[1, 2], [3, 4], [5, 6]], "y": [1, 2, 3]}"#).unwrap();
        let problem = file.into_problem().unwrap();
        assert_eq!(problem.a[(0, 1)], 2.0);
        assert_eq!(problem.a[(2, 0)], 5.0);
        assert_eq!(problem.n_obs(), 3);
        assert_eq!(problem.n_params(), 2);
        assert!(problem.preconditioner.is_none());
    }

    #[test]
    fn problem_file_rejects_ragged_rows() {
        let file = ProblemFile {
            a: vec![vec![1.0, 2.0], vec![3.0]],
            y: vec![1.0, 2.0],
            preconditioner: None,
        };
        assert!(matches!(
            file.into_problem(),
            Err(SolverError::DimensionMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn problem_file_reads_preconditioner() {
        let file: ProblemFile =
            serde_json::from_str(r#"{"a": [[1, 0], [0, 1]], "y": [1, 2], "preconditioner": {"diagonal": [1, 2]}}"#)
                .unwrap();
        let problem = file.into_problem().unwrap();
        let p = problem.preconditioner.unwrap();
        assert!(!p.is_identity());
    }

    #[test]
    fn result_file_omits_missing_committee() {
        let result = SolveResult::new(DVector::from_row_slice(&[1.0, 2.0]));
        let json = serde_json::to_string(&ResultFile::from_result("qr", &result, 0.0, 0.0)).unwrap();
        assert!(json.contains(r#""C":[1.0,2.0]"#));
        assert!(!json.contains("committee"));
    }

    #[test]
    fn result_file_writes_committee_when_present() {
        let result = SolveResult::new(DVector::from_row_slice(&[1.0]))
            .with_committee(vec![DVector::from_row_slice(&[0.9]), DVector::from_row_slice(&[1.1])]);
        let json = serde_json::to_string(&ResultFile::from_result("blr_svd", &result, 0.0, 0.0)).unwrap();
        assert!(json.contains(r#""committee":[[0.9],[1.1]]"#));
    }

    #[test]
    fn relative_residual_handles_zero_target() {
        let a = DMatrix::<f64>::identity(2, 2);
        let y = DVector::<f64>::zeros(2);
        let result = SolveResult::new(DVector::from_row_slice(&[3.0, 4.0]));
        assert!((result.relative_residual(&a, &y) - 5.0).abs() < 1e-12);
    }
}
