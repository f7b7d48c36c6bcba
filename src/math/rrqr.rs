//! Rank-revealing QR with column pivoting and relative truncation.
//!
//! Pivot selection follows Businger–Golub: at each step pick the remaining
//! column with the largest norm, orthogonalize the rest against it. The
//! diagonal of `R` then decays monotonically and the numerical rank is the
//! number of leading pivots with `|r_kk| > rtol * |r_11|`.
//!
//! For tall matrices the pivots are chosen on a Gaussian sketch `Ω A` with
//! `n + SKETCH_OVERSAMPLE` rows. The sketch preserves column geometry with
//! high probability, so the pivot order and rank are those of `A`, but they
//! depend on the random draw. The final coefficients are then obtained from
//! an ordinary QR least-squares solve on the selected columns of `A`.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::SolverError;
use crate::math::qr::qr_least_squares;

/// Extra sketch rows beyond the column count.
pub const SKETCH_OVERSAMPLE: usize = 10;

/// Pivot order and `R` diagonal of a column-pivoted QR.
#[derive(Debug, Clone)]
pub struct PivotedQr {
    /// `order[k]` is the original column chosen as the k-th pivot.
    pub order: Vec<usize>,
    /// `|r_kk|` for each pivot, non-increasing.
    pub r_diag: Vec<f64>,
}

impl PivotedQr {
    /// Number of pivots above `rtol` relative to the dominant one.
    pub fn rank(&self, rtol: f64) -> usize {
        let Some(&lead) = self.r_diag.first() else {
            return 0;
        };
        if lead <= 0.0 {
            return 0;
        }
        self.r_diag.iter().take_while(|&&r| r > rtol * lead).count()
    }
}

/// Column-pivoted Gram–Schmidt QR (with one reorthogonalization pass).
///
/// Only the pivot order and `|r_kk|` are returned; `Q` and the off-diagonal
/// part of `R` are not needed for rank detection.
pub fn pivoted_qr(a: &DMatrix<f64>) -> PivotedQr {
    let (m, n) = a.shape();
    let steps = m.min(n);
    let mut work = a.clone();
    let mut order: Vec<usize> = (0..n).collect();
    let mut r_diag = Vec::with_capacity(steps);

    for k in 0..steps {
        let mut best = k;
        let mut best_norm = -1.0;
        for j in k..n {
            let norm = work.column(j).norm_squared();
            if norm > best_norm {
                best_norm = norm;
                best = j;
            }
        }
        if best != k {
            work.swap_columns(k, best);
            order.swap(k, best);
        }

        let rkk = work.column(k).norm();
        r_diag.push(rkk);
        if rkk == 0.0 {
            // Everything left is exactly zero.
            r_diag.resize(steps, 0.0);
            break;
        }

        let q = work.column(k) / rkk;
        for j in (k + 1)..n {
            for _ in 0..2 {
                let proj = q.dot(&work.column(j));
                work.column_mut(j).axpy(-proj, &q, 1.0);
            }
        }
    }

    PivotedQr { order, r_diag }
}

/// Gaussian sketch `Ω A` with `rows` rows, scaled so `E[ΩᵀΩ] = I`.
pub fn gaussian_sketch<R: Rng + ?Sized>(a: &DMatrix<f64>, rows: usize, rng: &mut R) -> DMatrix<f64> {
    let m = a.nrows();
    let scale = 1.0 / (rows as f64).sqrt();
    let omega = DMatrix::<f64>::from_fn(rows, m, |_, _| {
        let z: f64 = StandardNormal.sample(rng);
        z * scale
    });
    omega * a
}

/// Outcome of a truncated least-squares solve.
#[derive(Debug, Clone)]
pub struct TruncatedSolve {
    pub coefficients: DVector<f64>,
    pub rank: usize,
}

/// Solve `min ‖A θ - y‖` restricted to the numerically significant columns of `A`.
///
/// Columns beyond the detected rank get a zero coefficient.
pub fn truncated_least_squares<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    y: &DVector<f64>,
    rtol: f64,
    rng: &mut R,
) -> Result<TruncatedSolve, SolverError> {
    let (m, n) = a.shape();
    if y.len() != m {
        return Err(SolverError::DimensionMismatch {
            context: "target vector length vs design matrix rows",
            expected: m,
            found: y.len(),
        });
    }
    if !(rtol.is_finite() && rtol >= 0.0) {
        return Err(SolverError::InvalidParameter(format!("rtol must be finite and >= 0, got {rtol}")));
    }

    let sketch_rows = n + SKETCH_OVERSAMPLE;
    let pivots = if m > sketch_rows {
        pivoted_qr(&gaussian_sketch(a, sketch_rows, rng))
    } else {
        pivoted_qr(a)
    };
    let rank = pivots.rank(rtol);
    log::debug!("rank-revealing QR: {rank} of {n} columns retained (rtol={rtol:e})");

    let mut coefficients = DVector::<f64>::zeros(n);
    if rank == 0 {
        return Ok(TruncatedSolve { coefficients, rank });
    }

    let selected = &pivots.order[..rank];
    let a_k = a.select_columns(selected);
    let z = qr_least_squares(&a_k, y)?;
    for (&col, &value) in selected.iter().zip(z.iter()) {
        coefficients[col] = value;
    }

    Ok(TruncatedSolve { coefficients, rank })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn pivot_order_prefers_largest_column() {
        let a = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 10.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.1]);
        let piv = pivoted_qr(&a);
        assert_eq!(piv.order[0], 2);
        assert_eq!(piv.order[1], 1);
        assert!(piv.r_diag.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn duplicated_column_is_truncated() {
        // Third column = first + second.
        let a = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, -1.0, 1.0],
        );
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0, 0.5]);
        let mut rng = StdRng::seed_from_u64(7);
        let out = truncated_least_squares(&a, &y, 1e-10, &mut rng).unwrap();
        assert_eq!(out.rank, 2);

        // Truncated solution is still a least-squares solution.
        let residual = &a * &out.coefficients - &y;
        let grad = a.transpose() * residual;
        assert!(grad.norm() < 1e-10);
    }

    #[test]
    fn sketched_pivots_on_tall_matrix_match_full_rank_solution() {
        let m = 60;
        let a = DMatrix::<f64>::from_fn(m, 3, |i, j| ((i * (j + 2)) as f64 * 0.37).sin() + j as f64 * 0.1);
        let truth = DVector::from_row_slice(&[0.5, -1.0, 2.0]);
        let y = &a * &truth;

        let mut rng = StdRng::seed_from_u64(11);
        let out = truncated_least_squares(&a, &y, 1e-12, &mut rng).unwrap();
        assert_eq!(out.rank, 3);
        assert!((out.coefficients - truth).norm() < 1e-8);
    }

    #[test]
    fn zero_matrix_has_rank_zero() {
        let a = DMatrix::<f64>::zeros(3, 2);
        let y = DVector::from_row_slice(&[1.0, 1.0, 1.0]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = truncated_least_squares(&a, &y, 1e-15, &mut rng).unwrap();
        assert_eq!(out.rank, 0);
        assert_eq!(out.coefficients, DVector::zeros(2));
    }

    #[test]
    fn negative_rtol_is_rejected() {
        let a = DMatrix::<f64>::identity(2, 2);
        let y = DVector::from_row_slice(&[1.0, 1.0]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            truncated_least_squares(&a, &y, -1.0, &mut rng),
            Err(SolverError::InvalidParameter(_))
        ));
    }
}
