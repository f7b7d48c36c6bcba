//! Evidence-maximization Bayesian linear regression.
//!
//! Model:
//!
//! ```text
//! y = A θ + ε,   ε ~ N(0, β⁻¹ I),   θ_i ~ N(0, α_i⁻¹)
//! ```
//!
//! The hyperparameters are estimated with MacKay's fixed-point updates:
//!
//! ```text
//! Σ = (diag(α) + β AᵀA)⁻¹,   μ = β Σ Aᵀ y
//! γ_i = 1 - α_i Σ_ii          (how well θ_i is determined by the data)
//! α   = Σγ / ‖μ‖²             (shared prior)
//! α_i = γ_i / μ_i²            (ARD)
//! β   = (m - Σγ) / ‖y - A μ‖²
//! ```
//!
//! Two factorizations are provided: a Cholesky of the posterior precision each
//! iteration (works for both priors), and a one-off thin SVD of `A` for the
//! shared prior, which also makes posterior sampling cheap.

use nalgebra::{Cholesky, DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::SolverError;

/// Prior precisions above this are treated as infinite and the coefficient pruned.
pub const ALPHA_MAX: f64 = 1e10;

/// Lower bound on the noise variance, relative to the mean square of `y`.
const NOISE_FLOOR_REL: f64 = 1e-14;

const TINY: f64 = 1e-300;

/// Iteration controls shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidenceOptions {
    pub max_iter: usize,
    /// Relative change of every hyperparameter below which iteration stops.
    pub tol: f64,
    /// Log every iteration at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for EvidenceOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol: 1e-6,
            verbose: false,
        }
    }
}

/// Prior over the coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prior {
    /// One precision shared by all coefficients.
    Shared,
    /// One precision per coefficient; after convergence coefficients with
    /// `γ_i < threshold` are pruned.
    Ard { threshold: f64 },
}

/// Posterior and hyperparameters from [`bayesian_linear_regression`].
#[derive(Debug, Clone)]
pub struct BayesianFit {
    pub mean: DVector<f64>,
    /// Posterior covariance; rows/columns of pruned coefficients are zero.
    pub covariance: DMatrix<f64>,
    pub noise_variance: f64,
    /// `1 / α_i`; zero for pruned coefficients.
    pub prior_variance: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl BayesianFit {
    /// Coefficients removed by ARD.
    pub fn pruned(&self) -> Vec<usize> {
        self.prior_variance
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 0.0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Posterior from [`bayesian_linear_regression_svd`].
#[derive(Debug, Clone)]
pub struct SvdBayesianFit {
    pub mean: DVector<f64>,
    pub noise_variance: f64,
    pub prior_variance: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Posterior draws, present when a non-zero committee was requested.
    pub committee: Option<Vec<DVector<f64>>>,
}

fn check_shapes(a: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), SolverError> {
    if y.len() != a.nrows() {
        return Err(SolverError::DimensionMismatch {
            context: "target vector length vs design matrix rows",
            expected: a.nrows(),
            found: y.len(),
        });
    }
    if a.nrows() == 0 {
        return Err(SolverError::InvalidParameter("Bayesian regression needs at least one observation".into()));
    }
    Ok(())
}

fn noise_floor(y: &DVector<f64>) -> f64 {
    let mean_square = y.norm_squared() / y.len().max(1) as f64;
    (mean_square * NOISE_FLOOR_REL).max(TINY)
}

fn initial_noise_precision(y: &DVector<f64>, floor: f64) -> f64 {
    let n = y.len() as f64;
    let mean = y.sum() / n;
    let var = y.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    1.0 / var.max(floor)
}

fn noise_precision(m: usize, gamma_sum: f64, rss: f64, floor: f64) -> f64 {
    let dof = (m as f64 - gamma_sum).max(f64::EPSILON);
    (dof / rss.max(TINY)).min(1.0 / floor)
}

fn relative_change(old: f64, new: f64) -> f64 {
    (new - old).abs() / old.abs().max(TINY)
}

struct Posterior {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

/// Posterior over the `active` coefficients only.
fn posterior(
    ata: &DMatrix<f64>,
    aty: &DVector<f64>,
    alpha: &DVector<f64>,
    beta: f64,
    active: &[usize],
) -> Result<Posterior, SolverError> {
    let mut precision = ata.select_rows(active).select_columns(active) * beta;
    for (k, &i) in active.iter().enumerate() {
        precision[(k, k)] += alpha[i];
    }
    let chol = Cholesky::new(precision).ok_or(SolverError::NotPositiveDefinite)?;
    let mean = chol.solve(&(aty.select_rows(active) * beta));
    let covariance = chol.inverse();
    Ok(Posterior { mean, covariance })
}

fn scatter(n: usize, active: &[usize], values: &DVector<f64>) -> DVector<f64> {
    let mut out = DVector::zeros(n);
    for (k, &i) in active.iter().enumerate() {
        out[i] = values[k];
    }
    out
}

/// Bayesian linear regression with a shared or ARD prior, solved by Cholesky.
pub fn bayesian_linear_regression(
    a: &DMatrix<f64>,
    y: &DVector<f64>,
    prior: Prior,
    opts: &EvidenceOptions,
) -> Result<BayesianFit, SolverError> {
    check_shapes(a, y)?;
    let (m, n) = a.shape();

    let ata = a.tr_mul(a);
    let aty = a.tr_mul(y);
    if ata.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("AᵀA"));
    }
    if aty.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("Aᵀy"));
    }
    let floor = noise_floor(y);

    let mut beta = initial_noise_precision(y, floor);
    let mut alpha = DVector::<f64>::from_element(n, 1.0);
    let mut active: Vec<usize> = (0..n).collect();
    let mut converged = false;
    let mut iterations = 0;

    while iterations < opts.max_iter && !active.is_empty() {
        iterations += 1;
        let post = posterior(&ata, &aty, &alpha, beta, &active)?;
        let mean = scatter(n, &active, &post.mean);

        let gamma: Vec<f64> = active
            .iter()
            .enumerate()
            .map(|(k, &i)| (1.0 - alpha[i] * post.covariance[(k, k)]).clamp(0.0, 1.0))
            .collect();
        let gamma_sum: f64 = gamma.iter().sum();
        let rss = (y - a * &mean).norm_squared();

        let new_beta = noise_precision(m, gamma_sum, rss, floor);
        let mut max_change = relative_change(beta, new_beta);
        beta = new_beta;

        match prior {
            Prior::Shared => {
                let new_alpha = (gamma_sum / mean.norm_squared().max(TINY)).min(ALPHA_MAX);
                max_change = max_change.max(relative_change(alpha[active[0]], new_alpha));
                for &i in &active {
                    alpha[i] = new_alpha;
                }
            }
            Prior::Ard { .. } => {
                let mut keep = Vec::with_capacity(active.len());
                for (k, &i) in active.iter().enumerate() {
                    let mu = post.mean[k];
                    let new_alpha = gamma[k] / (mu * mu).max(TINY);
                    if new_alpha > ALPHA_MAX {
                        // Relevance collapsed; drop the coefficient for good.
                        max_change = f64::INFINITY;
                        continue;
                    }
                    max_change = max_change.max(relative_change(alpha[i], new_alpha));
                    alpha[i] = new_alpha;
                    keep.push(i);
                }
                active = keep;
            }
        }

        log_iteration(opts.verbose, iterations, beta, gamma_sum, active.len());

        if max_change < opts.tol {
            converged = true;
            break;
        }
    }

    if let Prior::Ard { threshold } = prior {
        if !active.is_empty() {
            let post = posterior(&ata, &aty, &alpha, beta, &active)?;
            let before = active.len();
            active = active
                .iter()
                .enumerate()
                .filter(|(k, i)| 1.0 - alpha[**i] * post.covariance[(*k, *k)] >= threshold)
                .map(|(_, &i)| i)
                .collect();
            if active.len() < before {
                log::debug!("ARD pruned {} poorly determined coefficients", before - active.len());
            }
        }
    }

    let mut mean = DVector::zeros(n);
    let mut covariance = DMatrix::zeros(n, n);
    let mut prior_variance = DVector::zeros(n);
    if !active.is_empty() {
        let post = posterior(&ata, &aty, &alpha, beta, &active)?;
        mean = scatter(n, &active, &post.mean);
        for (k, &i) in active.iter().enumerate() {
            prior_variance[i] = 1.0 / alpha[i];
            for (l, &j) in active.iter().enumerate() {
                covariance[(i, j)] = post.covariance[(k, l)];
            }
        }
    }

    if mean.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("Bayesian posterior mean"));
    }

    Ok(BayesianFit {
        mean,
        covariance,
        noise_variance: 1.0 / beta,
        prior_variance,
        iterations,
        converged,
    })
}

/// Shared-prior Bayesian linear regression on a thin SVD of `A`.
///
/// With `committee_size > 0`, that many vectors are drawn from the Gaussian
/// posterior `N(μ, Σ)`. When `A` has more columns than rows the draws include
/// the prior-only directions outside the row space of `A`.
pub fn bayesian_linear_regression_svd<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    y: &DVector<f64>,
    opts: &EvidenceOptions,
    committee_size: usize,
    rng: &mut R,
) -> Result<SvdBayesianFit, SolverError> {
    check_shapes(a, y)?;
    let (m, n) = a.shape();
    if n == 0 {
        return Ok(SvdBayesianFit {
            mean: DVector::zeros(0),
            noise_variance: 1.0 / initial_noise_precision(y, noise_floor(y)),
            prior_variance: 0.0,
            iterations: 0,
            converged: true,
            committee: (committee_size > 0).then(|| vec![DVector::zeros(0); committee_size]),
        });
    }

    let svd = a.clone().svd(true, true);
    let u = svd.u.as_ref().ok_or(SolverError::NonFinite("SVD left singular vectors"))?;
    let v_t = svd.v_t.as_ref().ok_or(SolverError::NonFinite("SVD right singular vectors"))?;
    let s = &svd.singular_values;
    let s2 = s.component_mul(s);
    let uty = u.tr_mul(y);
    let floor = noise_floor(y);

    let mut beta = initial_noise_precision(y, floor);
    let mut alpha = 1.0_f64;
    let mut converged = false;
    let mut iterations = 0;

    let mean_for = |alpha: f64, beta: f64| -> DVector<f64> {
        let c = DVector::from_fn(s.len(), |i, _| beta * s[i] * uty[i] / (alpha + beta * s2[i]));
        v_t.tr_mul(&c)
    };

    while iterations < opts.max_iter {
        iterations += 1;
        let mean = mean_for(alpha, beta);
        let gamma_sum: f64 = s2.iter().map(|&l| beta * l / (alpha + beta * l)).sum();
        let rss = (y - a * &mean).norm_squared();

        let new_alpha = (gamma_sum / mean.norm_squared().max(TINY)).min(ALPHA_MAX);
        let new_beta = noise_precision(m, gamma_sum, rss, floor);
        let max_change = relative_change(alpha, new_alpha).max(relative_change(beta, new_beta));
        alpha = new_alpha;
        beta = new_beta;

        log_iteration(opts.verbose, iterations, beta, gamma_sum, n);

        if max_change < opts.tol {
            converged = true;
            break;
        }
    }

    let mean = mean_for(alpha, beta);
    if mean.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("Bayesian posterior mean"));
    }

    let committee = if committee_size > 0 {
        let std_in_range = DVector::from_fn(s.len(), |i, _| 1.0 / (alpha + beta * s2[i]).sqrt());
        let null_space = n > s.len();
        let mut draws = Vec::with_capacity(committee_size);
        for _ in 0..committee_size {
            let z = DVector::from_fn(s.len(), |i, _| {
                let g: f64 = StandardNormal.sample(rng);
                g * std_in_range[i]
            });
            let mut draw = &mean + v_t.tr_mul(&z);
            if null_space {
                let g = DVector::from_fn(n, |_, _| {
                    let g: f64 = StandardNormal.sample(rng);
                    g / alpha.sqrt()
                });
                let in_range = v_t.tr_mul(&(v_t * &g));
                draw += g - in_range;
            }
            draws.push(draw);
        }
        Some(draws)
    } else {
        None
    };

    Ok(SvdBayesianFit {
        mean,
        noise_variance: 1.0 / beta,
        prior_variance: 1.0 / alpha,
        iterations,
        converged,
        committee,
    })
}

fn log_iteration(verbose: bool, iteration: usize, beta: f64, gamma_sum: f64, active: usize) {
    if verbose {
        log::info!(
            "evidence iteration {iteration}: noise variance {:.3e}, effective parameters {gamma_sum:.3}, active {active}",
            1.0 / beta
        );
    } else {
        log::debug!(
            "evidence iteration {iteration}: noise variance {:.3e}, effective parameters {gamma_sum:.3}, active {active}",
            1.0 / beta
        );
    }
}
