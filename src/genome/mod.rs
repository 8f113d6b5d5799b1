//! Genome representation
//!
//! This module provides the packed bit chromosome and the bit-layout
//! arithmetic shared by the memberships and rules encodings.

pub mod bit_genome;
pub mod layout;

pub mod prelude {
    pub use super::bit_genome::*;
    pub use super::layout::*;
}
