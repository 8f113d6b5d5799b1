//! Individual wrapper type
//!
//! Pairs a genome with its fitness. Individuals are owned by exactly one
//! population; elitism and representative publication move them between
//! generations and populations by value-copy.

use serde::{Deserialize, Serialize};

use crate::genome::bit_genome::BitGenome;

/// An individual in one of the two populations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// The genome of this individual
    pub genome: BitGenome,
    /// Composed fitness (None until evaluated this generation)
    pub fitness: Option<f64>,
}

impl Individual {
    /// Create a new unevaluated individual
    pub fn new(genome: BitGenome) -> Self {
        Self {
            genome,
            fitness: None,
        }
    }

    /// Create an individual with a known fitness
    pub fn with_fitness(genome: BitGenome, fitness: f64) -> Self {
        Self {
            genome,
            fitness: Some(fitness),
        }
    }

    /// Check if this individual has been evaluated
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness, treating unevaluated individuals as 0.0
    pub fn fitness_or_zero(&self) -> f64 {
        self.fitness.unwrap_or(0.0)
    }

    /// Set the fitness value
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unevaluated() {
        let ind = Individual::new(BitGenome::zeros(8));
        assert!(!ind.is_evaluated());
        assert_eq!(ind.fitness_or_zero(), 0.0);
    }

    #[test]
    fn test_with_fitness() {
        let ind = Individual::with_fitness(BitGenome::zeros(8), 0.42);
        assert!(ind.is_evaluated());
        assert_eq!(ind.fitness_or_zero(), 0.42);
    }

    #[test]
    fn test_set_fitness() {
        let mut ind = Individual::new(BitGenome::zeros(8));
        ind.set_fitness(0.9);
        assert_eq!(ind.fitness, Some(0.9));
    }
}
