//! Command-line parsing for `lsq`.
//!
//! Parsing stays separate from the solver code: every `SolverCommand` maps to
//! a `Solver` configuration via [`SolverCommand::to_solver`].

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::solvers::{Bard, BayesianLinearRegressionSvd, Bl, Lsqr, Qr, Rrqr, Solver};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lsq", version, about = "Linear least-squares solvers (QR, RRQR, LSQR, Bayesian)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Solve a problem file with one solver and print (or write) the result.
    Solve(SolveArgs),
    /// Run several solver configurations on the same problem and print a residual table.
    Compare(CompareArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SolveArgs {
    /// Problem JSON (`{"a": [[...]], "y": [...]}`).
    #[arg(short = 'p', long)]
    pub problem: PathBuf,

    /// Write the result JSON here.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Export coefficients (and committee) to CSV.
    #[arg(long)]
    pub export_csv: Option<PathBuf>,

    #[command(subcommand)]
    pub solver: SolverCommand,
}

#[derive(Debug, Parser, Clone)]
pub struct CompareArgs {
    /// Problem JSON.
    #[arg(short = 'p', long)]
    pub problem: PathBuf,

    /// JSON array of solver configurations; every solver with defaults if omitted.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

/// Solver selection with its parameters.
#[derive(Debug, Subcommand, Clone)]
pub enum SolverCommand {
    /// Tikhonov-regularized QR.
    Qr {
        #[arg(long, default_value_t = 0.0)]
        lambda: f64,
    },
    /// Rank-revealing QR.
    Rrqr {
        #[arg(long, default_value_t = 1e-15)]
        rtol: f64,

        /// Fix the pivot sketch RNG.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Iterative LSQR.
    Lsqr {
        #[arg(long, default_value_t = 5e-3)]
        damp: f64,

        #[arg(long, default_value_t = 1e-6)]
        atol: f64,

        #[arg(long, default_value_t = f64::EPSILON.sqrt())]
        btol: f64,

        #[arg(long, default_value_t = 1e8)]
        conlim: f64,

        #[arg(long, default_value_t = 100_000)]
        maxiter: usize,

        /// Log every iteration at info level.
        #[arg(long)]
        verbose: bool,
    },
    /// Bayesian linear regression.
    Bl,
    /// Bayesian linear regression with automatic relevance determination.
    Bard,
    /// SVD-based Bayesian linear regression with an optional posterior committee.
    BlrSvd {
        #[arg(long)]
        verbose: bool,

        #[arg(long, default_value_t = 0)]
        committee_size: usize,

        /// Fix the committee RNG.
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl SolverCommand {
    pub fn to_solver(&self) -> Solver {
        match *self {
            SolverCommand::Qr { lambda } => Solver::Qr(Qr::new(lambda)),
            SolverCommand::Rrqr { rtol, seed } => Solver::Rrqr(Rrqr {
                seed,
                ..Rrqr::new(rtol)
            }),
            SolverCommand::Lsqr {
                damp,
                atol,
                btol,
                conlim,
                maxiter,
                verbose,
            } => Solver::Lsqr(Lsqr {
                damp,
                atol,
                btol,
                conlim,
                maxiter,
                verbose,
                preconditioner: None,
            }),
            SolverCommand::Bl => Solver::Bl(Bl::default()),
            SolverCommand::Bard => Solver::Bard(Bard::default()),
            SolverCommand::BlrSvd {
                verbose,
                committee_size,
                seed,
            } => Solver::BayesianLinearRegressionSvd(BayesianLinearRegressionSvd {
                verbose,
                seed,
                ..BayesianLinearRegressionSvd::with_committee(committee_size)
            }),
        }
    }
}
