//! Iterative least squares via LSQR.
//!
//! Minimizes `‖A θ - y‖² + damp² ‖θ‖²`. Non-convergence is not an error: the
//! last iterate is returned and the final relative residual is logged.
//!
//! A preconditioner can be configured but is not applied to `A` or `y`; a
//! warning is logged whenever one is present.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::SolveResult;
use crate::error::SolverError;
use crate::math::{LsqrOptions, lsqr};
use crate::operator::LinearOperator;
use crate::solvers::{LinearSolver, check_non_negative, check_problem};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Lsqr {
    pub damp: f64,
    pub atol: f64,
    pub btol: f64,
    pub conlim: f64,
    pub maxiter: usize,
    pub verbose: bool,
    #[serde(skip)]
    pub preconditioner: Option<Arc<dyn LinearOperator>>,
}

impl Default for Lsqr {
    fn default() -> Self {
        Self {
            damp: 5e-3,
            atol: 1e-6,
            btol: f64::EPSILON.sqrt(),
            conlim: 1e8,
            maxiter: 100_000,
            verbose: false,
            preconditioner: None,
        }
    }
}

impl Lsqr {
    pub fn with_preconditioner(mut self, p: Arc<dyn LinearOperator>) -> Self {
        self.preconditioner = Some(p);
        self
    }

    fn options(&self) -> LsqrOptions {
        LsqrOptions {
            damp: self.damp,
            atol: self.atol,
            btol: self.btol,
            conlim: self.conlim,
            iter_lim: self.maxiter,
        }
    }
}

impl LinearSolver for Lsqr {
    fn name(&self) -> &'static str {
        "lsqr"
    }

    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError> {
        check_problem(a, y)?;
        check_non_negative("damp", self.damp)?;
        check_non_negative("atol", self.atol)?;
        check_non_negative("btol", self.btol)?;
        check_non_negative("conlim", self.conlim)?;

        if self.preconditioner.is_some() {
            log::warn!("LSQR: preconditioner is configured but not applied; solving the unpreconditioned system");
        }
        log::info!(
            "LSQR: damp={:e} atol={:e} conlim={:e} maxiter={}",
            self.damp,
            self.atol,
            self.conlim,
            self.maxiter
        );

        let verbose = self.verbose;
        let outcome = lsqr(a, y, &self.options(), |p| {
            if verbose {
                log::info!(
                    "LSQR iter {:>6}: |r|={:.6e} |A'r|={:.3e} cond(A)~{:.3e} |x|={:.3e}",
                    p.iteration,
                    p.r1norm,
                    p.arnorm,
                    p.acond,
                    p.xnorm
                );
            } else {
                log::debug!("LSQR iter {}: |r|={:.6e}", p.iteration, p.r1norm);
            }
        });

        if !outcome.stop.converged() {
            log::warn!("LSQR: no convergence within {} iterations; returning last iterate", self.maxiter);
        }

        let result = SolveResult::new(outcome.x);
        log::info!(
            "LSQR: stopped after {} iterations ({}); relative RMSE {:.6e}",
            outcome.iterations,
            outcome.stop,
            result.relative_residual(a, y)
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Diagonal;
    use crate::solvers::Qr;
    use std::sync::{Mutex, Once};
    use std::thread::{self, ThreadId};

    /// Collects log records per thread so parallel tests do not see each other's output.
    struct CaptureLogger {
        records: Mutex<Vec<(ThreadId, log::Level, String)>>,
    }

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if let Ok(mut records) = self.records.lock() {
                records.push((thread::current().id(), record.level(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger {
        records: Mutex::new(Vec::new()),
    };
    static INIT: Once = Once::new();

    fn warnings_from(f: impl FnOnce()) -> Vec<String> {
        INIT.call_once(|| {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });
        let me = thread::current().id();
        LOGGER.records.lock().unwrap().retain(|(id, _, _)| *id != me);
        f();
        LOGGER
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, level, _)| *id == me && *level == log::Level::Warn)
            .map(|(_, _, msg)| msg.clone())
            .collect()
    }

    fn problem() -> (DMatrix<f64>, DVector<f64>) {
        let a = DMatrix::<f64>::from_fn(30, 5, |i, j| ((i * 7 + j * 3) % 11) as f64 / 11.0 + if i == j { 1.0 } else { 0.0 });
        let y = DVector::<f64>::from_fn(30, |i, _| (i as f64 * 0.37).sin());
        (a, y)
    }

    #[test]
    fn small_damping_is_close_to_qr() {
        let (a, y) = problem();
        let lsqr = Lsqr {
            damp: 0.0,
            atol: 1e-12,
            btol: 1e-12,
            ..Lsqr::default()
        };
        let c = lsqr.solve(&a, &y).unwrap().coefficients;
        let reference = Qr::default().solve(&a, &y).unwrap().coefficients;
        assert!((c - reference).norm() < 1e-6);
    }

    #[test]
    fn damping_matches_regularized_qr() {
        let (a, y) = problem();
        let damp = 0.3;
        let lsqr = Lsqr {
            damp,
            atol: 1e-12,
            btol: 1e-12,
            ..Lsqr::default()
        };
        let c = lsqr.solve(&a, &y).unwrap().coefficients;
        let reference = Qr::new(damp).solve(&a, &y).unwrap().coefficients;
        assert!((c - reference).norm() < 1e-6);
    }

    #[test]
    fn residual_does_not_grow_with_more_iterations() {
        let (a, y) = problem();
        let mut prev = f64::INFINITY;
        for maxiter in [1, 2, 3, 5, 10, 50] {
            let lsqr = Lsqr {
                damp: 0.0,
                atol: 0.0,
                btol: 0.0,
                maxiter,
                ..Lsqr::default()
            };
            let res = lsqr.solve(&a, &y).unwrap().residual_norm(&a, &y);
            assert!(res <= prev + 1e-10, "maxiter {maxiter}: {res} > {prev}");
            prev = res;
        }
    }

    #[test]
    fn non_convergence_returns_iterate_without_error() {
        let (a, y) = problem();
        let lsqr = Lsqr {
            atol: 0.0,
            btol: 0.0,
            conlim: 0.0,
            maxiter: 1,
            ..Lsqr::default()
        };
        let result = lsqr.solve(&a, &y).unwrap();
        assert_eq!(result.coefficients.len(), 5);
        assert!(result.coefficients.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn preconditioner_is_accepted_but_not_applied() {
        let (a, y) = problem();
        let p = Arc::new(Diagonal::new(DVector::from_element(5, 100.0)).unwrap());
        let plain = Lsqr::default().solve(&a, &y).unwrap().coefficients;
        let with_p = Lsqr::default().with_preconditioner(p).solve(&a, &y).unwrap().coefficients;
        assert!((plain - with_p).norm() < 1e-14);
    }

    #[test]
    fn configured_preconditioner_logs_a_warning() {
        let (a, y) = problem();
        let p = Arc::new(Diagonal::new(DVector::from_element(5, 2.0)).unwrap());
        let with_p = warnings_from(|| {
            Lsqr::default().with_preconditioner(p).solve(&a, &y).unwrap();
        });
        assert!(with_p.iter().any(|msg| msg.contains("preconditioner")), "{with_p:?}");

        let without = warnings_from(|| {
            Lsqr::default().solve(&a, &y).unwrap();
        });
        assert!(!without.iter().any(|msg| msg.contains("preconditioner")), "{without:?}");
    }

    #[test]
    fn negative_damping_is_rejected() {
        let (a, y) = problem();
        let lsqr = Lsqr {
            damp: -1.0,
            ..Lsqr::default()
        };
        assert!(matches!(lsqr.solve(&a, &y), Err(SolverError::InvalidParameter(_))));
    }
}
