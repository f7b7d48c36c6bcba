//! Input/output helpers.
//!
//! - problem + solver config JSON ingest (`problem`)
//! - result JSON output (`result`)
//! - coefficient CSV export (`export`)

pub mod export;
pub mod problem;
pub mod result;

pub use export::*;
pub use problem::*;
pub use result::*;
