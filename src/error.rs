//! Error types.
//!
//! - `SolverError` is what the library returns from every `solve` call.
//! - `AppError` is what the `lsq` binary reports: a message plus a process exit code.

use thiserror::Error;

/// Failure of a single least-squares solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("dimension mismatch in {context}: expected {expected}, got {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("matrix is rank deficient (numerical rank {rank} of {cols} columns)")]
    RankDeficient { rank: usize, cols: usize },
    #[error("preconditioner is singular and cannot be inverted")]
    SingularOperator,
    #[error("posterior precision matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("non-finite value encountered in {0}")]
    NonFinite(&'static str),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<SolverError> for AppError {
    fn from(err: SolverError) -> Self {
        AppError::new(4, format!("Solve failed: {err}"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_error_maps_to_exit_code_four() {
        let err: AppError = SolverError::SingularOperator.into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("singular"));
    }
}
