//! The substitution model: an eigen-decomposed rate matrix, per-site
//! rate-category weights and rates, and equilibrium state frequencies.
//! This crate never fits or decomposes a model itself (§1 out of
//! scope) — it only stores and uses what the caller supplies.

pub mod eigen;
pub mod frequencies;
pub mod rates;

pub use eigen::EigenDecomposition;
pub use frequencies::Frequencies;
pub use rates::CategoryRates;
pub use rates::CategoryWeights;
