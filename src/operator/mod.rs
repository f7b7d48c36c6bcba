//! Linear operators used as preconditioners / Tychonov operators.
//!
//! Solvers only need two capabilities from a preconditioner `P`:
//!
//! - `apply(v) = P v` (used to stack `λP` under the design matrix)
//! - `solve(v) = P⁻¹ v` (used for the change of variables in RRQR)
//!
//! Dense forms of `P` and `P⁻¹` are derived column by column from these two
//! operations, so custom operators only implement the matrix-free part.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector, LU};
use serde::{Deserialize, Serialize};

use crate::error::SolverError;

/// A square, invertible linear operator on parameter space.
pub trait LinearOperator: fmt::Debug + Send + Sync {
    /// Compute `P v`.
    fn apply(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError>;

    /// Compute `P⁻¹ v`.
    fn solve(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError>;

    /// True when `apply` and `solve` are both no-ops.
    fn is_identity(&self) -> bool {
        false
    }

    /// Dense `n × n` matrix of `P`.
    fn to_dense(&self, n: usize) -> Result<DMatrix<f64>, SolverError> {
        dense_from_columns(n, |e| self.apply(e))
    }

    /// Dense `n × n` matrix of `P⁻¹`.
    fn inverse_dense(&self, n: usize) -> Result<DMatrix<f64>, SolverError> {
        dense_from_columns(n, |e| self.solve(e))
    }
}

fn dense_from_columns<F>(n: usize, mut column: F) -> Result<DMatrix<f64>, SolverError>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, SolverError>,
{
    let mut out = DMatrix::<f64>::zeros(n, n);
    let mut e = DVector::<f64>::zeros(n);
    for j in 0..n {
        e[j] = 1.0;
        let col = column(&e)?;
        if col.len() != n {
            return Err(SolverError::DimensionMismatch {
                context: "preconditioner column",
                expected: n,
                found: col.len(),
            });
        }
        out.set_column(j, &col);
        e[j] = 0.0;
    }
    Ok(out)
}

/// Shared default preconditioner.
pub fn identity() -> Arc<dyn LinearOperator> {
    Arc::new(Identity)
}

/// The identity operator; valid for any dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl LinearOperator for Identity {
    fn apply(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        Ok(v.clone())
    }

    fn solve(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        Ok(v.clone())
    }

    fn is_identity(&self) -> bool {
        true
    }

    fn to_dense(&self, n: usize) -> Result<DMatrix<f64>, SolverError> {
        Ok(DMatrix::identity(n, n))
    }

    fn inverse_dense(&self, n: usize) -> Result<DMatrix<f64>, SolverError> {
        Ok(DMatrix::identity(n, n))
    }
}

/// Diagonal scaling `P = diag(d)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagonal {
    diag: DVector<f64>,
}

impl Diagonal {
    /// Build a diagonal operator; every entry must be finite.
    pub fn new(diag: DVector<f64>) -> Result<Self, SolverError> {
        if diag.iter().any(|d| !d.is_finite()) {
            return Err(SolverError::NonFinite("diagonal preconditioner"));
        }
        Ok(Self { diag })
    }

    fn check_len(&self, v: &DVector<f64>) -> Result<(), SolverError> {
        if v.len() != self.diag.len() {
            return Err(SolverError::DimensionMismatch {
                context: "diagonal preconditioner",
                expected: self.diag.len(),
                found: v.len(),
            });
        }
        Ok(())
    }
}

impl LinearOperator for Diagonal {
    fn apply(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        self.check_len(v)?;
        Ok(v.component_mul(&self.diag))
    }

    fn solve(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        self.check_len(v)?;
        if self.diag.iter().any(|&d| d == 0.0) {
            return Err(SolverError::SingularOperator);
        }
        Ok(v.component_div(&self.diag))
    }
}

/// General invertible matrix. The LU factorization is computed once at construction.
#[derive(Debug, Clone)]
pub struct DenseOperator {
    matrix: DMatrix<f64>,
    lu: LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
}

impl DenseOperator {
    pub fn new(matrix: DMatrix<f64>) -> Result<Self, SolverError> {
        if !matrix.is_square() {
            return Err(SolverError::DimensionMismatch {
                context: "dense preconditioner (must be square)",
                expected: matrix.nrows(),
                found: matrix.ncols(),
            });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite("dense preconditioner"));
        }
        let lu = matrix.clone().lu();
        Ok(Self { matrix, lu })
    }

    fn check_len(&self, v: &DVector<f64>) -> Result<(), SolverError> {
        if v.len() != self.matrix.ncols() {
            return Err(SolverError::DimensionMismatch {
                context: "dense preconditioner",
                expected: self.matrix.ncols(),
                found: v.len(),
            });
        }
        Ok(())
    }
}

impl LinearOperator for DenseOperator {
    fn apply(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        self.check_len(v)?;
        Ok(&self.matrix * v)
    }

    fn solve(&self, v: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        self.check_len(v)?;
        self.lu.solve(v).ok_or(SolverError::SingularOperator)
    }

    fn to_dense(&self, n: usize) -> Result<DMatrix<f64>, SolverError> {
        if n != self.matrix.ncols() {
            return Err(SolverError::DimensionMismatch {
                context: "dense preconditioner",
                expected: self.matrix.ncols(),
                found: n,
            });
        }
        Ok(self.matrix.clone())
    }
}

/// Serializable description of a preconditioner, as found in problem files.
///
/// ```json
/// "identity"
/// {"diagonal": [1.0, 2.0]}
/// {"dense": [[1.0, 0.0], [0.5, 1.0]]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperatorSpec {
    #[default]
    Identity,
    Diagonal(Vec<f64>),
    /// Row-major rows.
    Dense(Vec<Vec<f64>>),
}

impl OperatorSpec {
    pub fn build(&self) -> Result<Arc<dyn LinearOperator>, SolverError> {
        match self {
            OperatorSpec::Identity => Ok(identity()),
            OperatorSpec::Diagonal(d) => Ok(Arc::new(Diagonal::new(DVector::from_vec(d.clone()))?)),
            OperatorSpec::Dense(rows) => {
                let n = rows.len();
                let mut flat = Vec::with_capacity(n * n);
                for row in rows {
                    if row.len() != n {
                        return Err(SolverError::DimensionMismatch {
                            context: "dense preconditioner row",
                            expected: n,
                            found: row.len(),
                        });
                    }
                    flat.extend_from_slice(row);
                }
                Ok(Arc::new(DenseOperator::new(DMatrix::from_row_slice(n, n, &flat))?))
            }
        }
    }
}
