//! # fuzzy-coevo
//!
//! Cooperative coevolution of fuzzy inference systems for supervised
//! classification and regression on tabular datasets.
//!
//! Two populations evolve in parallel on their own threads: one encodes
//! membership-function positions, the other encodes rule antecedents and
//! consequents. Individuals are scored by composing them with the peer
//! population's elite representatives into complete fuzzy systems and
//! running those against the dataset under a multi-criteria fitness.
//!
//! ## Features
//!
//! - **Packed bit genomes** with single-point crossover and per-bit
//!   flip mutation
//! - **Coco membership functions** for inputs, singleton outputs,
//!   centroid defuzzification
//! - **Multi-criteria fitness**: sensitivity, specificity, accuracy,
//!   PPV, RMSE/MSE/RRSE/RAE, threshold-distance (ADM/MDM), rule-size
//!   and over-learning criteria, linearly combined
//! - **Cooperative evaluation** with lock → snapshot → unlock
//!   representative exchange and a value-copied champion record
//! - **XML persistence** of trained systems with exact round trips
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fuzzy_coevo::prelude::*;
//!
//! fn main() -> CoevResult<()> {
//!     let dataset = Arc::new(Dataset::from_path("diabetes.csv", 1)?);
//!     let mut params = SystemParameters::default();
//!     params.dataset_name = "diabetes.csv".to_string();
//!     params.memberships.max_generations = 100;
//!     params.rules.max_generations = 100;
//!
//!     let coevolution = Coevolution::new(params, dataset)?;
//!     let outcome = coevolution.run()?;
//!
//!     if let Some(best) = outcome.best {
//!         println!("best fitness: {:.4}", best.fitness);
//!         println!("{}", best.system.describe());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! - [`genome`]: packed bit chromosome and the two encoding layouts
//! - [`dataset`]: `;`-separated dataset loading with missing values and
//!   per-variable universes
//! - [`fuzzy`]: variables, sets, rules, the inference system and the
//!   genome decoder
//! - [`fitness`]: metric tallies and the composite evaluator
//! - [`population`]: individuals and the named populations with
//!   representative slots
//! - [`operators`]: selection strategies, crossover and mutation
//! - [`coevolution`]: the two engines, champion tracking and the runner
//! - [`stats`]: generation snapshots and the aggregated run history
//! - [`config`]: every knob of a run in one struct
//! - [`persist`]: XML save/load of trained systems

pub mod config;
pub mod coevolution;
pub mod dataset;
pub mod error;
pub mod fitness;
pub mod fuzzy;
pub mod genome;
pub mod operators;
pub mod persist;
pub mod population;
pub mod rng;
pub mod stats;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{FitnessWeights, PopulationSettings, SystemParameters};
    pub use crate::coevolution::prelude::*;
    pub use crate::dataset::{Dataset, Universe};
    pub use crate::error::*;
    pub use crate::fitness::prelude::*;
    pub use crate::fuzzy::prelude::*;
    pub use crate::genome::prelude::*;
    pub use crate::operators::{
        reproduce, single_point_crossover, ReproductionParams, SelectionStrategy,
    };
    pub use crate::persist::{load_system, save_system, PersistedSystem};
    pub use crate::population::prelude::*;
    pub use crate::rng::EvoRng;
    pub use crate::stats::{CoevEvent, GenerationSnapshot, StatsReport};
}
