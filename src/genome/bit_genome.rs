//! Packed bit genome
//!
//! This module provides the fixed-length chromosome type shared by both
//! populations. Bits are packed into `u64` blocks; multi-bit fields are
//! read and written little-endian (the bit at `offset + k` contributes
//! `1 << k`).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenomeError;

const BLOCK_BITS: usize = 64;

/// Fixed-length packed bit chromosome
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitGenome {
    blocks: Vec<u64>,
    len: usize,
}

impl BitGenome {
    /// Create an all-zeros genome of the given length
    pub fn zeros(len: usize) -> Self {
        Self {
            blocks: vec![0; len.div_ceil(BLOCK_BITS)],
            len,
        }
    }

    /// Create a genome with uniformly random bits
    pub fn random<R: Rng>(len: usize, rng: &mut R) -> Self {
        let mut genome = Self::zeros(len);
        for block in &mut genome.blocks {
            *block = rng.gen();
        }
        genome.mask_tail();
        genome
    }

    /// Create a genome from explicit bits
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut genome = Self::zeros(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                genome.blocks[i / BLOCK_BITS] |= 1 << (i % BLOCK_BITS);
            }
        }
        genome
    }

    /// Length in bits
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the genome has no bits
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get a single bit
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index out of range");
        self.blocks[index / BLOCK_BITS] >> (index % BLOCK_BITS) & 1 == 1
    }

    /// Set a single bit
    pub fn set(&mut self, index: usize, bit: bool) {
        assert!(index < self.len, "bit index out of range");
        let mask = 1u64 << (index % BLOCK_BITS);
        if bit {
            self.blocks[index / BLOCK_BITS] |= mask;
        } else {
            self.blocks[index / BLOCK_BITS] &= !mask;
        }
    }

    /// Flip a single bit
    pub fn flip(&mut self, index: usize) {
        assert!(index < self.len, "bit index out of range");
        self.blocks[index / BLOCK_BITS] ^= 1 << (index % BLOCK_BITS);
    }

    /// Read `nbits` bits starting at `offset` as a little-endian unsigned integer
    pub fn slice_as_uint(&self, offset: usize, nbits: usize) -> u64 {
        assert!(nbits <= BLOCK_BITS, "field exceeds 64 bits");
        assert!(offset + nbits <= self.len, "field extends past genome end");
        let mut value = 0u64;
        for k in 0..nbits {
            if self.get(offset + k) {
                value |= 1 << k;
            }
        }
        value
    }

    /// Write the low `nbits` bits of `value` at `offset`, little-endian
    pub fn write_uint(&mut self, offset: usize, nbits: usize, value: u64) {
        assert!(nbits <= BLOCK_BITS, "field exceeds 64 bits");
        assert!(offset + nbits <= self.len, "field extends past genome end");
        for k in 0..nbits {
            self.set(offset + k, value >> k & 1 == 1);
        }
    }

    /// Number of one bits
    pub fn count_ones(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Single-point crossover at `point`, swapping suffixes
    ///
    /// `point` must lie in `[1, len - 1]`; both parents must have the same
    /// length. Returns the two children.
    pub fn crossover(
        &self,
        other: &Self,
        point: usize,
    ) -> Result<(Self, Self), GenomeError> {
        if self.len != other.len {
            return Err(GenomeError::LengthMismatch {
                expected: self.len,
                actual: other.len,
            });
        }
        if point == 0 || point >= self.len {
            return Err(GenomeError::InvalidCrossoverPoint {
                point,
                len: self.len,
            });
        }
        let mut child1 = self.clone();
        let mut child2 = other.clone();
        for i in point..self.len {
            let (a, b) = (self.get(i), other.get(i));
            child1.set(i, b);
            child2.set(i, a);
        }
        Ok((child1, child2))
    }

    /// Flip each bit independently with probability `p`
    pub fn mutate_flip<R: Rng>(&mut self, p: f64, rng: &mut R) {
        for i in 0..self.len {
            if rng.gen::<f64>() < p {
                self.flip(i);
            }
        }
    }

    fn mask_tail(&mut self) {
        let tail = self.len % BLOCK_BITS;
        if tail != 0 {
            if let Some(last) = self.blocks.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl std::fmt::Display for BitGenome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.len {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}
