//! Bayesian linear regression solvers.
//!
//! - `Bl`: shared Gaussian prior, posterior mean as θ
//! - `Bard`: automatic relevance determination, poorly determined coefficients pruned to zero
//! - `BayesianLinearRegressionSvd`: shared prior on an SVD of `A`, optional posterior committee
//!
//! Covariances and hyperparameters are computed by the kernels but only the
//! posterior mean (and committee) are returned.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::domain::SolveResult;
use crate::error::SolverError;
use crate::math::{EvidenceOptions, Prior, bayesian_linear_regression, bayesian_linear_regression_svd};
use crate::solvers::{LinearSolver, check_problem};

/// Minimum well-determinedness `γ_i` a coefficient needs to survive ARD.
pub const ARD_THRESHOLD: f64 = 0.1;

fn check_tol(tol: f64) -> Result<(), SolverError> {
    if !(tol.is_finite() && tol > 0.0) {
        return Err(SolverError::InvalidParameter(format!("tol must be finite and > 0, got {tol}")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bl {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for Bl {
    fn default() -> Self {
        let opts = EvidenceOptions::default();
        Self {
            max_iter: opts.max_iter,
            tol: opts.tol,
        }
    }
}

impl LinearSolver for Bl {
    fn name(&self) -> &'static str {
        "bl"
    }

    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError> {
        check_problem(a, y)?;
        check_tol(self.tol)?;
        let opts = EvidenceOptions {
            max_iter: self.max_iter,
            tol: self.tol,
            verbose: false,
        };
        let fit = bayesian_linear_regression(a, y, Prior::Shared, &opts)?;
        if !fit.converged {
            log::debug!("BL: evidence maximization stopped after {} iterations", fit.iterations);
        }
        Ok(SolveResult::new(fit.mean))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bard {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for Bard {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tol: EvidenceOptions::default().tol,
        }
    }
}

impl LinearSolver for Bard {
    fn name(&self) -> &'static str {
        "bard"
    }

    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError> {
        check_problem(a, y)?;
        check_tol(self.tol)?;
        let opts = EvidenceOptions {
            max_iter: self.max_iter,
            tol: self.tol,
            verbose: false,
        };
        let fit = bayesian_linear_regression(a, y, Prior::Ard { threshold: ARD_THRESHOLD }, &opts)?;
        let pruned = fit.pruned();
        if !pruned.is_empty() {
            log::debug!("BARD: pruned coefficients {pruned:?}");
        }
        Ok(SolveResult::new(fit.mean))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianLinearRegressionSvd {
    pub verbose: bool,
    /// Number of posterior draws to return; `0` disables the committee.
    pub committee_size: usize,
    /// Fix the committee RNG.
    pub seed: Option<u64>,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for BayesianLinearRegressionSvd {
    fn default() -> Self {
        let opts = EvidenceOptions::default();
        Self {
            verbose: false,
            committee_size: 0,
            seed: None,
            max_iter: opts.max_iter,
            tol: opts.tol,
        }
    }
}

impl BayesianLinearRegressionSvd {
    pub fn with_committee(committee_size: usize) -> Self {
        Self {
            committee_size,
            ..Self::default()
        }
    }
}

impl LinearSolver for BayesianLinearRegressionSvd {
    fn name(&self) -> &'static str {
        "blr_svd"
    }

    fn solve(&self, a: &DMatrix<f64>, y: &DVector<f64>) -> Result<SolveResult, SolverError> {
        check_problem(a, y)?;
        check_tol(self.tol)?;
        let opts = EvidenceOptions {
            max_iter: self.max_iter,
            tol: self.tol,
            verbose: self.verbose,
        };
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fit = bayesian_linear_regression_svd(a, y, &opts, self.committee_size, &mut rng)?;
        if self.verbose {
            log::info!(
                "BLR-SVD: {} iterations, noise variance {:.3e}, prior variance {:.3e}",
                fit.iterations,
                fit.noise_variance,
                fit.prior_variance
            );
        }

        let result = SolveResult::new(fit.mean);
        Ok(match fit.committee {
            Some(committee) => result.with_committee(committee),
            None => result,
        })
    }
}
