//! Tikhonov-regularized QR.
//!
//! With `λ = 0` this is a plain QR least-squares solve. Otherwise the
//! regularization is folded into an augmented system:
//!
//! ```text
//! ⎡ A  ⎤ θ ≈ ⎡ y ⎤
//! ⎣ λP ⎦     ⎣ 0 ⎦
//! ```
//!
//! which minimizes `‖A θ - y‖² + λ² ‖P θ‖²`.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::SolveResult;
use crate::error::SolverError;
use crate::math::qr_least_squares;
use crate::operator::{LinearOperator, identity};
use crate::solvers::{LinearSolver, check_problem};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Qr {
    /// Regularization weight λ.
    pub lambda: f64,
    #[serde(skip, default = "identity")]
    pub preconditioner: Arc<dyn LinearOperator>,
}

impl Default for Qr {
    fn default() -> Self {
        Self {
            lambda: 0.0,
            preconditioner: identity(),
        }
    }
}

impl Qr {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            ..Self::default()
        }
    }

    pub fn with_preconditioner(mut self, p: Arc<dyn LinearOperator>) -> Self {
        self.preconditioner = p;
        self
    }
}

impl LinearSolver for Qr {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError> {
        check_problem(a, y)?;
        if !self.lambda.is_finite() {
            return Err(SolverError::InvalidParameter(format!("lambda must be finite, got {}", self.lambda)));
        }

        if self.lambda == 0.0 {
            return Ok(SolveResult::new(qr_least_squares(a, y)?));
        }

        let (m, n) = a.shape();
        let reg = self.preconditioner.to_dense(n)? * self.lambda;

        let mut stacked = DMatrix::<f64>::zeros(m + n, n);
        stacked.view_mut((0, 0), (m, n)).copy_from(a);
        stacked.view_mut((m, 0), (n, n)).copy_from(&reg);

        let mut target = DVector::<f64>::zeros(m + n);
        target.rows_mut(0, m).copy_from(y);

        Ok(SolveResult::new(qr_least_squares(&stacked, &target)?))
    }
}
