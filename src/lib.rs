//! `lsq-solvers` library crate.
//!
//! A uniform interface over linear least-squares algorithms: every solver
//! takes `(A, y)` and returns coefficients `C` minimizing `‖A C - y‖` (plus an
//! optional regularization term), with an optional posterior committee.
//!
//! The binary (`lsq`) is a thin wrapper around this library so that:
//!
//! - solvers are testable without spawning processes
//! - the same solvers can be embedded by other fitting code

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod operator;
pub mod report;
pub mod solvers;

pub use domain::{Problem, SolveResult};
pub use error::SolverError;
pub use operator::{DenseOperator, Diagonal, Identity, LinearOperator, OperatorSpec};
pub use solvers::{Bard, BayesianLinearRegressionSvd, Bl, LinearSolver, Lsqr, Qr, Rrqr, Solver};
