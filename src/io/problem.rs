//! Read problem and solver-config JSON files.
//!
//! Problem files follow `domain::ProblemFile`; config files are a JSON array
//! of `solvers::Solver` objects tagged by `"solver"`.

use std::fs::File;
use std::path::Path;

use crate::domain::{Problem, ProblemFile};
use crate::error::AppError;
use crate::solvers::Solver;

/// Read and validate a problem JSON file.
pub fn read_problem_json(path: &Path) -> Result<Problem, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open problem JSON '{}': {e}", path.display())))?;
    let raw: ProblemFile = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid problem JSON '{}': {e}", path.display())))?;
    raw.into_problem()
        .map_err(|e| AppError::new(2, format!("Invalid problem '{}': {e}", path.display())))
}

/// Read a list of solver configurations.
pub fn read_solver_configs(path: &Path) -> Result<Vec<Solver>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open solver config '{}': {e}", path.display())))?;
    let solvers: Vec<Solver> = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid solver config '{}': {e}", path.display())))?;
    if solvers.is_empty() {
        return Err(AppError::new(2, format!("Solver config '{}' lists no solvers.", path.display())));
    }
    Ok(solvers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("lsq-{}-{name}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_problem_from_disk() {
        let path = temp_file("problem.json", r#"{"a": [[1, 0], [0, 1], [1, 1]], "y": [1, 1, 2]}"#);
        let problem = read_problem_json(&path).unwrap();
        assert_eq!(problem.a.shape(), (3, 2));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_problem_file_exits_with_code_two() {
        let err = read_problem_json(Path::new("/definitely/not/here.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_config_is_rejected() {
        let path = temp_file("empty.json", "[]");
        assert!(read_solver_configs(&path).is_err());
        std::fs::remove_file(path).ok();
    }
}
