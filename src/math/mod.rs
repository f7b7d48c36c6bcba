//! Numerical kernels: QR least squares, rank-revealing QR, LSQR and
//! evidence-maximization Bayesian regression.

pub mod bayes;
pub mod lsqr;
pub mod qr;
pub mod rrqr;

pub use bayes::*;
pub use lsqr::*;
pub use qr::*;
pub use rrqr::*;
