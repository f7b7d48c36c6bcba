//! LSQR (Paige & Saunders, 1982).
//!
//! Solves the damped least-squares problem
//!
//! ```text
//! minimize ‖A x - b‖² + damp² ‖x‖²
//! ```
//!
//! via Golub–Kahan bidiagonalization. Only products `A v` and `Aᵀ u` are
//! needed. Stopping rules are those of Paige & Saunders:
//!
//! 1. `‖r‖ ≤ btol ‖b‖ + atol ‖A‖ ‖x‖` (compatible system)
//! 2. `‖Aᵀ r‖ / (‖A‖ ‖r‖) ≤ atol` (least-squares solution)
//! 3. `cond(A) ≥ conlim`
//! 4–6. the same three tests at machine precision
//! 7. iteration limit

use std::fmt;

use nalgebra::{DMatrix, DVector};

/// Tuning knobs for [`lsqr`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LsqrOptions {
    pub damp: f64,
    pub atol: f64,
    pub btol: f64,
    /// `0` disables the condition-number test.
    pub conlim: f64,
    pub iter_lim: usize,
}

impl Default for LsqrOptions {
    fn default() -> Self {
        Self {
            damp: 0.0,
            atol: 1e-6,
            btol: f64::EPSILON.sqrt(),
            conlim: 1e8,
            iter_lim: 100_000,
        }
    }
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsqrStop {
    /// `b = 0` or `Aᵀ b = 0`; `x = 0` is exact.
    TrivialSolution,
    ResidualTolerance,
    LeastSquaresTolerance,
    ConditionLimit,
    ResidualMachinePrecision,
    LeastSquaresMachinePrecision,
    ConditionMachinePrecision,
    IterationLimit,
}

impl LsqrStop {
    /// True for every reason except the iteration cap.
    pub fn converged(self) -> bool {
        !matches!(self, LsqrStop::IterationLimit)
    }
}

impl fmt::Display for LsqrStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LsqrStop::TrivialSolution => "the exact solution is x = 0",
            LsqrStop::ResidualTolerance => "Ax - b is small enough, given atol, btol",
            LsqrStop::LeastSquaresTolerance => "the least-squares solution is good enough, given atol",
            LsqrStop::ConditionLimit => "the estimate of cond(A) has exceeded conlim",
            LsqrStop::ResidualMachinePrecision => "Ax - b is small enough for this machine",
            LsqrStop::LeastSquaresMachinePrecision => "the least-squares solution is good enough for this machine",
            LsqrStop::ConditionMachinePrecision => "cond(A) seems to be too large for this machine",
            LsqrStop::IterationLimit => "the iteration limit has been reached",
        };
        f.write_str(msg)
    }
}

/// Per-iteration progress snapshot.
#[derive(Debug, Clone, Copy)]
pub struct LsqrProgress {
    pub iteration: usize,
    /// `‖b - A x‖`.
    pub r1norm: f64,
    /// `sqrt(‖b - A x‖² + damp² ‖x‖²)`.
    pub r2norm: f64,
    /// Estimate of `‖Aᵀ r - damp² x‖`.
    pub arnorm: f64,
    pub anorm: f64,
    pub acond: f64,
    pub xnorm: f64,
}

/// Final iterate and diagnostics.
#[derive(Debug, Clone)]
pub struct LsqrOutcome {
    pub x: DVector<f64>,
    pub stop: LsqrStop,
    pub iterations: usize,
    pub r1norm: f64,
    pub r2norm: f64,
    pub anorm: f64,
    pub acond: f64,
    pub arnorm: f64,
    pub xnorm: f64,
}

/// Run LSQR on a dense matrix. `on_progress` is called once per iteration.
///
/// The caller is responsible for `b.len() == a.nrows()`.
pub fn lsqr<F>(a: &DMatrix<f64>, b: &DVector<f64>, opts: &LsqrOptions, mut on_progress: F) -> LsqrOutcome
where
    F: FnMut(&LsqrProgress),
{
    let n = a.ncols();
    let eps = f64::EPSILON;
    let damp = opts.damp;
    let dampsq = damp * damp;
    let ctol = if opts.conlim > 0.0 { 1.0 / opts.conlim } else { 0.0 };

    let mut itn = 0usize;
    let mut stop = LsqrStop::TrivialSolution;
    let mut anorm = 0.0_f64;
    let mut acond = 0.0_f64;
    let mut ddnorm = 0.0_f64;
    let mut res2 = 0.0_f64;
    let mut xnorm = 0.0_f64;
    let mut xxnorm = 0.0_f64;
    let mut z = 0.0_f64;
    let mut cs2 = -1.0_f64;
    let mut sn2 = 0.0_f64;

    let mut x = DVector::<f64>::zeros(n);
    let mut u = b.clone();
    let bnorm = b.norm();
    let mut beta = bnorm;
    let mut v;
    let mut alfa;

    if beta > 0.0 {
        u /= beta;
        v = a.tr_mul(&u);
        alfa = v.norm();
    } else {
        v = DVector::<f64>::zeros(n);
        alfa = 0.0;
    }
    if alfa > 0.0 {
        v /= alfa;
    }
    let mut w = v.clone();

    let mut rhobar = alfa;
    let mut phibar = beta;
    let mut r1norm = beta;
    let mut r2norm = beta;
    let mut arnorm = alfa * beta;

    if arnorm == 0.0 {
        return LsqrOutcome {
            x,
            stop,
            iterations: 0,
            r1norm,
            r2norm,
            anorm,
            acond,
            arnorm,
            xnorm,
        };
    }

    while itn < opts.iter_lim {
        itn += 1;

        // Next step of the bidiagonalization:
        //   beta u = A v - alfa u,   alfa v = Aᵀ u - beta v
        u = a * &v - &u * alfa;
        beta = u.norm();
        if beta > 0.0 {
            u /= beta;
            anorm = (anorm * anorm + alfa * alfa + beta * beta + dampsq).sqrt();
            v = a.tr_mul(&u) - &v * beta;
            alfa = v.norm();
            if alfa > 0.0 {
                v /= alfa;
            }
        }

        // Eliminate the damping parameter.
        let rhobar1 = (rhobar * rhobar + dampsq).sqrt();
        let cs1 = rhobar / rhobar1;
        let sn1 = damp / rhobar1;
        let psi = sn1 * phibar;
        phibar *= cs1;

        // Eliminate the subdiagonal element of the lower bidiagonal matrix.
        let rho = (rhobar1 * rhobar1 + beta * beta).sqrt();
        let cs = rhobar1 / rho;
        let sn = beta / rho;
        let theta = sn * alfa;
        rhobar = -cs * alfa;
        let phi = cs * phibar;
        phibar *= sn;
        let tau = sn * phi;

        let t1 = phi / rho;
        let t2 = -theta / rho;
        ddnorm += (&w / rho).norm_squared();
        x.axpy(t1, &w, 1.0);
        w = &v + &w * t2;

        // ‖x‖ estimate via a plane rotation on the right.
        let delta = sn2 * rho;
        let gambar = -cs2 * rho;
        let rhs = phi - delta * z;
        let zbar = rhs / gambar;
        xnorm = (xxnorm + zbar * zbar).sqrt();
        let gamma = (gambar * gambar + theta * theta).sqrt();
        cs2 = gambar / gamma;
        sn2 = theta / gamma;
        z = rhs / gamma;
        xxnorm += z * z;

        acond = anorm * ddnorm.sqrt();
        let res1 = phibar * phibar;
        res2 += psi * psi;
        let rnorm = (res1 + res2).sqrt();
        arnorm = alfa * tau.abs();

        let r1sq = rnorm * rnorm - dampsq * xxnorm;
        r1norm = r1sq.abs().sqrt();
        if r1sq < 0.0 {
            r1norm = -r1norm;
        }
        r2norm = rnorm;

        on_progress(&LsqrProgress {
            iteration: itn,
            r1norm,
            r2norm,
            arnorm,
            anorm,
            acond,
            xnorm,
        });

        let test1 = rnorm / bnorm;
        let test2 = arnorm / (anorm * rnorm + eps);
        let test3 = 1.0 / (acond + eps);
        let t1 = test1 / (1.0 + anorm * xnorm / bnorm);
        let rtol = opts.btol + opts.atol * anorm * xnorm / bnorm;

        // Later tests take precedence.
        let mut reason = None;
        if itn >= opts.iter_lim {
            reason = Some(LsqrStop::IterationLimit);
        }
        if 1.0 + test3 <= 1.0 {
            reason = Some(LsqrStop::ConditionMachinePrecision);
        }
        if 1.0 + test2 <= 1.0 {
            reason = Some(LsqrStop::LeastSquaresMachinePrecision);
        }
        if 1.0 + t1 <= 1.0 {
            reason = Some(LsqrStop::ResidualMachinePrecision);
        }
        if test3 <= ctol {
            reason = Some(LsqrStop::ConditionLimit);
        }
        if test2 <= opts.atol {
            reason = Some(LsqrStop::LeastSquaresTolerance);
        }
        if test1 <= rtol {
            reason = Some(LsqrStop::ResidualTolerance);
        }

        if let Some(r) = reason {
            stop = r;
            break;
        }
    }

    if itn >= opts.iter_lim && stop == LsqrStop::TrivialSolution {
        stop = LsqrStop::IterationLimit;
    }

    LsqrOutcome {
        x,
        stop,
        iterations: itn,
        r1norm,
        r2norm,
        anorm,
        acond,
        arnorm,
        xnorm,
    }
}
