//! Genetic operators
//!
//! Selection, crossover and mutation on [`BitGenome`] individuals. The
//! strategies are tagged variants rather than trait objects, so the
//! per-generation loop stays monomorphic.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::error::GenomeError;
use crate::genome::bit_genome::BitGenome;

/// Parent-selection strategy
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Tournament over `size` distinct, uniformly drawn competitors
    Tournament { size: usize },
    /// Fitness-proportionate selection over cumulative fitness buckets
    Roulette,
}

impl SelectionStrategy {
    /// Select one index from `(index-preserving) fitness` values
    ///
    /// Ties inside a tournament resolve to the lower index, matching the
    /// elite ordering.
    pub fn select<R: Rng>(&self, fitnesses: &[f64], rng: &mut R) -> usize {
        assert!(!fitnesses.is_empty(), "selection over empty population");
        match *self {
            Self::Tournament { size } => {
                let k = size.max(1).min(fitnesses.len());
                let indices: Vec<usize> = (0..fitnesses.len()).collect();
                let mut best = usize::MAX;
                let mut best_fit = f64::NEG_INFINITY;
                for &i in indices.choose_multiple(rng, k) {
                    if fitnesses[i] > best_fit || (fitnesses[i] == best_fit && i < best) {
                        best = i;
                        best_fit = fitnesses[i];
                    }
                }
                best
            }
            Self::Roulette => match WeightedIndex::new(fitnesses) {
                Ok(dist) => dist.sample(rng),
                // All-zero or otherwise unusable weights: fall back to uniform
                Err(_) => rng.gen_range(0..fitnesses.len()),
            },
        }
    }

    /// Select `count` indices with replacement
    pub fn select_many<R: Rng>(&self, fitnesses: &[f64], count: usize, rng: &mut R) -> Vec<usize> {
        (0..count).map(|_| self.select(fitnesses, rng)).collect()
    }
}

/// Single-point crossover at a uniformly drawn point in `[1, len - 1]`
///
/// Returns clones of the parents when they are too short to cut.
pub fn single_point_crossover<R: Rng>(
    parent1: &BitGenome,
    parent2: &BitGenome,
    rng: &mut R,
) -> Result<(BitGenome, BitGenome), GenomeError> {
    if parent1.len() < 2 {
        return Ok((parent1.clone(), parent2.clone()));
    }
    let point = rng.gen_range(1..parent1.len());
    parent1.crossover(parent2, point)
}

/// Reproduction parameters for one population
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReproductionParams {
    /// Probability that a parent pair undergoes crossover (else cloned)
    pub crossover_prob: f64,
    /// Probability that a child is mutated at all
    pub mutate_individual_prob: f64,
    /// Per-bit flip probability when a child is mutated
    pub mutate_bit_prob: f64,
}

/// Produce `count` children from the parent pool
///
/// Parents are consumed pairwise; with probability `crossover_prob` a pair
/// is recombined by single-point crossover, otherwise cloned. Each child
/// is then independently flip-mutated with probability
/// `mutate_individual_prob` (per child) and `mutate_bit_prob` (per bit).
pub fn reproduce<R: Rng>(
    parents: &[&BitGenome],
    count: usize,
    params: &ReproductionParams,
    rng: &mut R,
) -> Result<Vec<BitGenome>, GenomeError> {
    let mut children = Vec::with_capacity(count);
    let mut next = 0usize;
    while children.len() < count {
        let p1 = parents[next % parents.len()];
        let p2 = parents[(next + 1) % parents.len()];
        next += 2;

        let (c1, c2) = if rng.gen::<f64>() < params.crossover_prob {
            single_point_crossover(p1, p2, rng)?
        } else {
            (p1.clone(), p2.clone())
        };
        children.push(c1);
        if children.len() < count {
            children.push(c2);
        }
    }
    for child in &mut children {
        if rng.gen::<f64>() < params.mutate_individual_prob {
            child.mutate_flip(params.mutate_bit_prob, rng);
        }
    }
    Ok(children)
}
