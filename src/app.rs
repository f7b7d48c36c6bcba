//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs the logger
//! - parses CLI arguments
//! - reads the problem (and solver configs)
//! - runs the solve pipeline
//! - prints reports and writes optional outputs

use clap::Parser;
use env_logger::Env;

use crate::cli::{Command, CompareArgs, SolveArgs};
use crate::error::AppError;
use crate::solvers::Solver;

pub mod pipeline;

/// Entry point for the `lsq` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Solve(args) => handle_solve(args),
        Command::Compare(args) => handle_compare(args),
    }
}

fn handle_solve(args: SolveArgs) -> Result<(), AppError> {
    let problem = crate::io::read_problem_json(&args.problem)?;
    let run = pipeline::run_solver(&problem, args.solver.to_solver())?;

    println!("{}", crate::report::format_solve_summary(&problem, &run));

    if let Some(path) = &args.output {
        crate::io::write_result_json(path, &run.to_file())?;
        log::info!("Wrote {}", path.display());
    }
    if let Some(path) = &args.export_csv {
        crate::io::write_coefficients_csv(path, &run.result)?;
        log::info!("Wrote {}", path.display());
    }

    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let problem = crate::io::read_problem_json(&args.problem)?;
    let solvers = match &args.config {
        Some(path) => crate::io::read_solver_configs(path)?,
        None => Solver::all_defaults(),
    };

    let comparison = pipeline::run_comparison(&problem, solvers);
    println!("{}", crate::report::format_comparison(&problem, &comparison));

    if comparison.outputs.is_empty() {
        return Err(AppError::new(4, "Every solver failed."));
    }
    Ok(())
}
