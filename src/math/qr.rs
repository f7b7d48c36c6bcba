//! Least-squares solves by Householder QR.
//!
//! Two shapes are handled:
//!
//! ```text
//! m >= n:  A = Q R,   θ = R⁻¹ (Qᵀ y)[..n]          (least-squares solution)
//! m <  n:  Aᵀ = Q R,  θ = Q R⁻ᵀ y                  (minimum-norm solution)
//! ```
//!
//! Nalgebra's `QR::solve` only accepts square systems, so the tall case goes
//! through `q_tr_mul` + a triangular solve instead.

use nalgebra::{DMatrix, DVector};

use crate::error::SolverError;

/// Solve `min ‖A θ - y‖₂` by QR.
///
/// Returns `RankDeficient` if the triangular factor has a numerically zero pivot.
pub fn qr_least_squares(a: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
    let (m, n) = a.shape();
    if y.len() != m {
        return Err(SolverError::DimensionMismatch {
            context: "target vector length vs design matrix rows",
            expected: m,
            found: y.len(),
        });
    }
    if n == 0 {
        return Ok(DVector::zeros(0));
    }
    if m == 0 {
        return Err(SolverError::RankDeficient { rank: 0, cols: n });
    }

    if m >= n {
        let qr = a.clone().qr();
        let r = qr.r();
        check_rank(&r, m.max(n), n)?;

        let mut qty = y.clone();
        qr.q_tr_mul(&mut qty);
        let rhs = qty.rows(0, n).into_owned();
        r.solve_upper_triangular(&rhs)
            .ok_or(SolverError::RankDeficient { rank: numerical_rank(&r, m.max(n)), cols: n })
    } else {
        let qr = a.transpose().qr();
        let r = qr.r();
        check_rank(&r, m.max(n), n)?;

        // A = Rᵀ Qᵀ, so solve Rᵀ z = y and map back with Q.
        let z = r
            .tr_solve_upper_triangular(y)
            .ok_or(SolverError::RankDeficient { rank: numerical_rank(&r, m.max(n)), cols: n })?;
        Ok(qr.q() * z)
    }
}

/// Relative threshold below which a pivot of `R` counts as zero.
fn pivot_tolerance(r: &DMatrix<f64>, dim: usize) -> f64 {
    let max_diag = r.diagonal().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    max_diag * dim as f64 * f64::EPSILON
}

fn numerical_rank(r: &DMatrix<f64>, dim: usize) -> usize {
    let tol = pivot_tolerance(r, dim);
    r.diagonal().iter().filter(|v| v.abs() > tol).count()
}

fn check_rank(r: &DMatrix<f64>, dim: usize, cols: usize) -> Result<(), SolverError> {
    let k = r.nrows().min(r.ncols());
    let rank = numerical_rank(r, dim);
    if rank < k {
        return Err(SolverError::RankDeficient { rank, cols });
    }
    Ok(())
}
