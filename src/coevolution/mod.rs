//! Cooperative coevolution
//!
//! Two populations — membership-function layouts and rule bases — evolve
//! on their own OS threads. Individuals are scored by composing them
//! with the peer population's published representatives into complete
//! fuzzy systems and running those against the dataset. A shared
//! [`BestTracker`](best::BestTracker) keeps the champion system by value
//! from the moment it is first seen.

pub mod best;
pub mod engine;
pub mod pair;
pub mod runner;

pub mod prelude {
    pub use super::best::*;
    pub use super::engine::*;
    pub use super::pair::*;
    pub use super::runner::*;
}
