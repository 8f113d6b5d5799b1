//! Fitness evaluation
//!
//! Per-output metric accumulation and the multi-criteria evaluator that
//! reduces a fuzzy system's behavior on a dataset to a single scalar.

pub mod evaluator;
pub mod metrics;

pub mod prelude {
    pub use super::evaluator::*;
    pub use super::metrics::*;
}
