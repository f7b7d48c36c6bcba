//! Formatted terminal output for `lsq`.
//!
//! Formatting stays here so the solver code never prints.

use crate::app::pipeline::{Comparison, RunOutput};
use crate::domain::Problem;

/// Summary of a single solve.
pub fn format_solve_summary(problem: &Problem, run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== lsq - linear least squares ===\n");
    out.push_str(&format!(
        "Problem: {} observations x {} parameters | preconditioner: {}\n",
        problem.n_obs(),
        problem.n_params(),
        if problem.preconditioner.is_some() { "yes" } else { "no" }
    ));
    out.push_str(&format!("Solver: {}\n", run.solver));
    out.push_str(&format!(
        "Residual: |A C - y|={:.6e} relative={:.6e}\n",
        run.residual_norm, run.relative_rmse
    ));
    out.push_str(&format!("Time: {:.3}ms\n", run.elapsed.as_secs_f64() * 1e3));

    out.push_str("\nCoefficients:\n");
    let coefficients: Vec<f64> = run.result.coefficients.iter().copied().collect();
    out.push_str(&format!("- C: {}\n", fmt_vec(&coefficients)));
    if let Some(committee) = &run.result.committee {
        out.push_str(&format!("- committee: {} members\n", committee.len()));
    }

    out
}

/// Residual table for a multi-solver comparison, best relative residual first.
pub fn format_comparison(problem: &Problem, comparison: &Comparison) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== lsq compare ({} x {}) ===\n",
        problem.n_obs(),
        problem.n_params()
    ));
    out.push_str(&format!(
        "{:<4} {:<8} {:>14} {:>14} {:>12} {:>10}\n",
        "#", "solver", "|r|", "relative", "|C|", "ms"
    ));

    let mut ranked: Vec<&RunOutput> = comparison.outputs.iter().collect();
    ranked.sort_by(|a, b| a.relative_rmse.total_cmp(&b.relative_rmse));

    for (i, run) in ranked.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {:<8} {:>14.6e} {:>14.6e} {:>12.4e} {:>10.3}\n",
            i + 1,
            run.solver,
            run.residual_norm,
            run.relative_rmse,
            run.result.coefficients.norm(),
            run.elapsed.as_secs_f64() * 1e3
        ));
    }

    if !comparison.failures.is_empty() {
        out.push_str("\nFailed:\n");
        for (name, err) in &comparison.failures {
            out.push_str(&format!("- {name}: {err}\n"));
        }
    }

    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SolveResult;
    use crate::error::SolverError;
    use nalgebra::{DMatrix, DVector};
    use std::time::Duration;

    fn run(solver: &'static str, relative_rmse: f64) -> RunOutput {
        RunOutput {
            solver,
            result: SolveResult::new(DVector::from_row_slice(&[1.0, 2.0])),
            residual_norm: relative_rmse,
            relative_rmse,
            elapsed: Duration::from_millis(2),
        }
    }

    fn problem() -> Problem {
        Problem::new(DMatrix::<f64>::identity(2, 2), DVector::from_row_slice(&[1.0, 2.0]))
    }

    #[test]
    fn summary_lists_coefficients() {
        let text = format_solve_summary(&problem(), &run("qr", 0.0));
        assert!(text.contains("Solver: qr"));
        assert!(text.contains("[1.000000, 2.000000]"));
        assert!(!text.contains("committee"));
    }

    #[test]
    fn comparison_ranks_by_relative_residual() {
        let comparison = Comparison {
            outputs: vec![run("lsqr", 1e-3), run("qr", 1e-9)],
            failures: vec![("bard", SolverError::NotPositiveDefinite)],
        };
        let text = format_comparison(&problem(), &comparison);
        let qr = text.find("qr ").unwrap();
        let lsqr = text.find("lsqr").unwrap();
        assert!(qr < lsqr);
        assert!(text.contains("- bard:"));
    }
}
