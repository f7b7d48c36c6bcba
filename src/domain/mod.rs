//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - the in-memory problem and solve output (`Problem`, `SolveResult`)
//! - their JSON file shapes (`ProblemFile`, `ResultFile`)

pub mod types;

pub use types::*;
