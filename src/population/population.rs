//! Population type
//!
//! A named, fixed-size array of individuals. Besides the usual selection
//! support, a population owns a representatives slot: a deep copy of its
//! top individuals, published under the population's lock for the peer
//! population to snapshot.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::genome::bit_genome::BitGenome;
use crate::population::individual::Individual;

/// Identity of one of the two coevolving populations
///
/// Composition order is fixed by identity: memberships genomes always
/// come first when a pair is decoded, regardless of which engine drives
/// the evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopulationId {
    Memberships,
    Rules,
}

impl PopulationId {
    /// Canonical population name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memberships => "MEMBERSHIPS",
            Self::Rules => "RULES",
        }
    }
}

impl std::fmt::Display for PopulationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two coevolving populations
#[derive(Clone, Debug)]
pub struct Population {
    id: PopulationId,
    individuals: Vec<Individual>,
    representatives: Vec<Individual>,
    generation: usize,
}

impl Population {
    /// Create a population from existing individuals
    pub fn new(id: PopulationId, individuals: Vec<Individual>) -> Self {
        Self {
            id,
            individuals,
            representatives: Vec::new(),
            generation: 0,
        }
    }

    /// Create a population of random genomes
    pub fn random<R: Rng>(id: PopulationId, size: usize, genome_len: usize, rng: &mut R) -> Self {
        let individuals = (0..size)
            .map(|_| Individual::new(BitGenome::random(genome_len, rng)))
            .collect();
        Self::new(id, individuals)
    }

    /// Population identity
    pub fn id(&self) -> PopulationId {
        self.id
    }

    /// Population name
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Number of individuals
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Check if the population is empty
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Current generation number
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Borrow an individual
    pub fn get(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }

    /// Iterate over the individuals
    pub fn iter(&self) -> impl Iterator<Item = &Individual> {
        self.individuals.iter()
    }

    /// Borrow all individuals
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Clone all genomes in individual order
    pub fn genomes(&self) -> Vec<BitGenome> {
        self.individuals.iter().map(|i| i.genome.clone()).collect()
    }

    /// Fitness per individual, unevaluated reading as 0.0
    pub fn fitnesses(&self) -> Vec<f64> {
        self.individuals
            .iter()
            .map(Individual::fitness_or_zero)
            .collect()
    }

    /// Assign a fitness to one individual
    pub fn set_fitness(&mut self, index: usize, fitness: f64) {
        self.individuals[index].set_fitness(fitness);
    }

    /// Indices of the top `k` individuals, best first
    ///
    /// Deterministic: fitness descending, ties broken by insertion index
    /// (lower index wins).
    pub fn elite_indices(&self, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.individuals.len()).collect();
        indices.sort_by(|&a, &b| {
            let fa = self.individuals[a].fitness_or_zero();
            let fb = self.individuals[b].fitness_or_zero();
            fb.partial_cmp(&fa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        indices.truncate(k);
        indices
    }

    /// Deep copies of the top `k` individuals, best first
    pub fn select_elites(&self, k: usize) -> Vec<Individual> {
        self.elite_indices(k)
            .into_iter()
            .map(|i| self.individuals[i].clone())
            .collect()
    }

    /// Best individual (ties to the lower index)
    pub fn best(&self) -> Option<&Individual> {
        self.elite_indices(1).first().map(|&i| &self.individuals[i])
    }

    /// Publish deep copies of the top `k` individuals for the peer
    pub fn publish_representatives(&mut self, k: usize) {
        self.representatives = self.select_elites(k);
    }

    /// Deep copy of the currently published representatives
    pub fn representatives_snapshot(&self) -> Vec<Individual> {
        self.representatives.clone()
    }

    /// Swap in the next generation: elites plus freshly bred children
    ///
    /// Total size is preserved; children enter unevaluated.
    pub fn replace_generation(&mut self, elites: Vec<Individual>, children: Vec<BitGenome>) {
        debug_assert_eq!(elites.len() + children.len(), self.individuals.len());
        let mut next = elites;
        next.extend(children.into_iter().map(Individual::new));
        self.individuals = next;
        self.generation += 1;
    }

    /// Mean fitness of the evaluated individuals
    pub fn mean_fitness(&self) -> Option<f64> {
        let evaluated: Vec<f64> = self
            .individuals
            .iter()
            .filter_map(|i| i.fitness)
            .collect();
        if evaluated.is_empty() {
            None
        } else {
            Some(evaluated.iter().sum::<f64>() / evaluated.len() as f64)
        }
    }

    /// Fitness standard deviation of the evaluated individuals
    pub fn fitness_std(&self) -> Option<f64> {
        let mean = self.mean_fitness()?;
        let evaluated: Vec<f64> = self
            .individuals
            .iter()
            .filter_map(|i| i.fitness)
            .collect();
        if evaluated.len() < 2 {
            return None;
        }
        let variance = evaluated.iter().map(|f| (f - mean).powi(2)).sum::<f64>()
            / (evaluated.len() - 1) as f64;
        Some(variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population(fitnesses: &[f64]) -> Population {
        let individuals = fitnesses
            .iter()
            .map(|&f| Individual::with_fitness(BitGenome::zeros(8), f))
            .collect();
        Population::new(PopulationId::Rules, individuals)
    }

    #[test]
    fn test_random_population() {
        let mut rng = rand::thread_rng();
        let pop = Population::random(PopulationId::Memberships, 10, 32, &mut rng);
        assert_eq!(pop.len(), 10);
        assert_eq!(pop.name(), "MEMBERSHIPS");
        assert!(pop.iter().all(|i| !i.is_evaluated()));
        assert!(pop.iter().all(|i| i.genome.len() == 32));
    }

    #[test]
    fn test_elite_indices_ordering() {
        let pop = population(&[0.1, 0.9, 0.5, 0.9, 0.2]);
        // 0.9 tie: index 1 before index 3
        assert_eq!(pop.elite_indices(3), vec![1, 3, 2]);
    }

    #[test]
    fn test_best_breaks_ties_by_index() {
        let pop = population(&[0.7, 0.7, 0.3]);
        let best = pop.best().unwrap();
        assert_eq!(best.fitness, Some(0.7));
        assert_eq!(pop.elite_indices(1), vec![0]);
    }

    #[test]
    fn test_publish_and_snapshot_representatives() {
        let mut pop = population(&[0.1, 0.9, 0.5]);
        pop.publish_representatives(2);
        let reps = pop.representatives_snapshot();
        assert_eq!(reps.len(), 2);
        assert_eq!(reps[0].fitness, Some(0.9));
        assert_eq!(reps[1].fitness, Some(0.5));
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let mut pop = population(&[0.4, 0.8]);
        pop.publish_representatives(1);
        let mut reps = pop.representatives_snapshot();
        reps[0].set_fitness(0.0);
        // Mutating the snapshot does not touch the published slot
        assert_eq!(pop.representatives_snapshot()[0].fitness, Some(0.8));
    }

    #[test]
    fn test_replace_generation_preserves_size() {
        let mut pop = population(&[0.1, 0.5, 0.9]);
        let elites = pop.select_elites(1);
        let children = vec![BitGenome::zeros(8), BitGenome::zeros(8)];
        pop.replace_generation(elites, children);
        assert_eq!(pop.len(), 3);
        assert_eq!(pop.generation(), 1);
        assert_eq!(pop.get(0).unwrap().fitness, Some(0.9));
        assert!(!pop.get(1).unwrap().is_evaluated());
    }

    #[test]
    fn test_mean_and_std() {
        let pop = population(&[0.2, 0.4, 0.6]);
        assert!((pop.mean_fitness().unwrap() - 0.4).abs() < 1e-12);
        assert!((pop.fitness_std().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_single_individual_generation_is_noop() {
        let mut pop = population(&[0.5]);
        let elites = pop.select_elites(1);
        let before = pop.get(0).unwrap().genome.clone();
        pop.replace_generation(elites, vec![]);
        assert_eq!(pop.len(), 1);
        assert_eq!(pop.get(0).unwrap().genome, before);
    }

    #[test]
    fn test_fitnesses_defaults_unevaluated_to_zero() {
        let mut rng = rand::thread_rng();
        let pop = Population::random(PopulationId::Rules, 3, 8, &mut rng);
        assert_eq!(pop.fitnesses(), vec![0.0, 0.0, 0.0]);
    }
}
