//! Least-squares solvers.
//!
//! Every solver is an immutable configuration record implementing
//! [`LinearSolver`]. [`Solver`] is the tagged variant over all of them, which
//! is also the shape used in JSON config files:
//!
//! ```json
//! {"solver": "qr", "lambda": 0.1}
//! {"solver": "lsqr", "damp": 0.001, "maxiter": 500}
//! {"solver": "blr_svd", "committee_size": 32}
//! ```

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::SolveResult;
use crate::error::SolverError;
use crate::operator::LinearOperator;

pub mod bayes;
pub mod lsqr;
pub mod qr;
pub mod rrqr;

pub use bayes::{ARD_THRESHOLD, Bard, BayesianLinearRegressionSvd, Bl};
pub use lsqr::Lsqr;
pub use qr::Qr;
pub use rrqr::Rrqr;

/// A least-squares algorithm with fixed parameters.
pub trait LinearSolver {
    /// Short identifier, e.g. `"qr"`.
    fn name(&self) -> &'static str;

    /// Solve for θ given the design matrix and target vector.
    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError>;
}

/// Any of the supported solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "solver", rename_all = "snake_case")]
pub enum Solver {
    Qr(Qr),
    Rrqr(Rrqr),
    Lsqr(Lsqr),
    Bl(Bl),
    Bard(Bard),
    #[serde(rename = "blr_svd")]
    BayesianLinearRegressionSvd(BayesianLinearRegressionSvd),
}

impl Solver {
    /// One instance of every solver with default parameters.
    pub fn all_defaults() -> Vec<Solver> {
        vec![
            Solver::Qr(Qr::default()),
            Solver::Rrqr(Rrqr::default()),
            Solver::Lsqr(Lsqr::default()),
            Solver::Bl(Bl::default()),
            Solver::Bard(Bard::default()),
            Solver::BayesianLinearRegressionSvd(BayesianLinearRegressionSvd::default()),
        ]
    }

    /// Attach a preconditioner to the solvers that accept one; others are returned unchanged.
    pub fn with_preconditioner(self, p: Arc<dyn LinearOperator>) -> Self {
        match self {
            Solver::Qr(s) => Solver::Qr(s.with_preconditioner(p)),
            Solver::Rrqr(s) => Solver::Rrqr(s.with_preconditioner(p)),
            Solver::Lsqr(s) => Solver::Lsqr(s.with_preconditioner(p)),
            other => other,
        }
    }

    fn inner(&self) -> &dyn LinearSolver {
        match self {
            Solver::Qr(s) => s,
            Solver::Rrqr(s) => s,
            Solver::Lsqr(s) => s,
            Solver::Bl(s) => s,
            Solver::Bard(s) => s,
            Solver::BayesianLinearRegressionSvd(s) => s,
        }
    }
}

impl LinearSolver for Solver {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError> {
        self.inner().solve(a, y)
    }
}

/// Shape and finiteness checks shared by every solver.
pub(crate) fn check_problem(a: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), SolverError> {
    if y.len() != a.nrows() {
        return Err(SolverError::DimensionMismatch {
            context: "target vector length vs design matrix rows",
            expected: a.nrows(),
            found: y.len(),
        });
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("design matrix"));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("target vector"));
    }
    Ok(())
}

pub(crate) fn check_non_negative(name: &str, value: f64) -> Result<(), SolverError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(SolverError::InvalidParameter(format!(
            "{name} must be finite and >= 0, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Diagonal;

    #[test]
    fn config_parses_tagged_solvers_with_defaults() {
        let json = r#"[
            {"solver": "qr", "lambda": 0.5},
            {"solver": "rrqr"},
            {"solver": "lsqr", "maxiter": 50},
            {"solver": "bl"},
            {"solver": "bard"},
            {"solver": "blr_svd", "committee_size": 4}
        ]"#;
        let solvers: Vec<Solver> = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = solvers.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["qr", "rrqr", "lsqr", "bl", "bard", "blr_svd"]);

        match &solvers[0] {
            Solver::Qr(q) => assert_eq!(q.lambda, 0.5),
            other => panic!("unexpected {other:?}"),
        }
        match &solvers[2] {
            Solver::Lsqr(l) => {
                assert_eq!(l.maxiter, 50);
                assert_eq!(l.damp, 5e-3);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &solvers[5] {
            Solver::BayesianLinearRegressionSvd(b) => assert_eq!(b.committee_size, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn all_defaults_covers_every_solver() {
        assert_eq!(Solver::all_defaults().len(), 6);
    }

    #[test]
    fn dispatch_reports_dimension_mismatch() {
        let a = DMatrix::<f64>::identity(3, 2);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        for solver in Solver::all_defaults() {
            let err = solver.solve(&a, &y).unwrap_err();
            assert!(
                matches!(err, SolverError::DimensionMismatch { .. }),
                "{} returned {err:?}",
                solver.name()
            );
        }
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let mut a = DMatrix::<f64>::identity(2, 2);
        a[(0, 1)] = f64::NAN;
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert_eq!(check_problem(&a, &y), Err(SolverError::NonFinite("design matrix")));
    }

    #[test]
    fn preconditioner_reaches_qr() {
        let p: Arc<dyn LinearOperator> = Arc::new(Diagonal::new(DVector::from_row_slice(&[2.0, 2.0])).unwrap());
        let solver = Solver::Qr(Qr::new(1.0)).with_preconditioner(p);
        match solver {
            Solver::Qr(q) => assert!(!q.preconditioner.is_identity()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
