//! Shared solve pipeline used by `lsq solve` and `lsq compare`.
//!
//! problem -> attach preconditioner -> solve -> residual diagnostics

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::domain::{Problem, ResultFile, SolveResult};
use crate::error::SolverError;
use crate::solvers::{LinearSolver, Solver};

/// Outputs of a single solver run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub solver: &'static str,
    pub result: SolveResult,
    pub residual_norm: f64,
    pub relative_rmse: f64,
    pub elapsed: Duration,
}

impl RunOutput {
    pub fn to_file(&self) -> ResultFile {
        ResultFile::from_result(self.solver, &self.result, self.residual_norm, self.relative_rmse)
    }
}

/// Outcome of running several configurations on the same problem.
///
/// `outputs` and `failures` keep the order of the input configurations.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub outputs: Vec<RunOutput>,
    pub failures: Vec<(&'static str, SolverError)>,
}

/// Run one solver on `problem`.
pub fn run_solver(problem: &Problem, solver: Solver) -> Result<RunOutput, SolverError> {
    let solver = match &problem.preconditioner {
        Some(p) => solver.with_preconditioner(p.clone()),
        None => solver,
    };

    let started = Instant::now();
    let result = solver.solve(&problem.a, &problem.y)?;
    let elapsed = started.elapsed();

    let residual_norm = result.residual_norm(&problem.a, &problem.y);
    let relative_rmse = result.relative_residual(&problem.a, &problem.y);
    log::debug!(
        "{}: |r|={residual_norm:.6e} relative={relative_rmse:.6e} in {:.3}ms",
        solver.name(),
        elapsed.as_secs_f64() * 1e3
    );

    Ok(RunOutput {
        solver: solver.name(),
        result,
        residual_norm,
        relative_rmse,
        elapsed,
    })
}

/// Run every configuration on `problem` in parallel.
pub fn run_comparison(problem: &Problem, solvers: Vec<Solver>) -> Comparison {
    let runs: Vec<(&'static str, Result<RunOutput, SolverError>)> = solvers
        .into_par_iter()
        .map(|solver| {
            let name = solver.name();
            (name, run_solver(problem, solver))
        })
        .collect();

    let mut outputs = Vec::new();
    let mut failures = Vec::new();
    for (name, run) in runs {
        match run {
            Ok(output) => outputs.push(output),
            Err(err) => {
                log::warn!("{name} failed: {err}");
                failures.push((name, err));
            }
        }
    }

    Comparison { outputs, failures }
}
