//! Population management
//!
//! The Individual wrapper and the named, fixed-size populations that
//! exchange representatives during coevolution.

pub mod individual;
#[allow(clippy::module_inception)]
pub mod population;

pub mod prelude {
    pub use super::individual::*;
    pub use super::population::*;
}
