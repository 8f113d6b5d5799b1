//! Run statistics
//!
//! Each engine emits one snapshot per generation plus best-tracking
//! events onto a channel; a single aggregator drains the channel and
//! keeps the run history.

use serde::{Deserialize, Serialize};

use crate::population::population::PopulationId;

/// Fitness statistics of one population at one generation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    pub population: PopulationId,
    pub generation: usize,
    pub population_size: usize,
    pub min_fitness: f64,
    pub max_fitness: f64,
    pub mean_fitness: f64,
    pub std_dev: f64,
}

impl GenerationSnapshot {
    /// Build a snapshot from per-individual fitnesses, in individual order
    pub fn from_fitnesses(
        population: PopulationId,
        generation: usize,
        fitnesses: &[f64],
    ) -> Self {
        let n = fitnesses.len();
        let min = fitnesses.iter().copied().fold(f64::INFINITY, f64::min);
        let max = fitnesses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = fitnesses.iter().sum::<f64>() / n.max(1) as f64;
        let std_dev = if n > 1 {
            (fitnesses.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            population,
            generation,
            population_size: n,
            min_fitness: if n > 0 { min } else { 0.0 },
            max_fitness: if n > 0 { max } else { 0.0 },
            mean_fitness: mean,
            std_dev,
        }
    }
}

/// Event stream flowing from the engines to the aggregator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CoevEvent {
    /// A generation finished evaluating
    Generation(GenerationSnapshot),
    /// The global best improved
    NewBest {
        population: PopulationId,
        generation: usize,
        fitness: f64,
    },
    /// A population's termination fitness was reached
    ThresholdReached {
        population: PopulationId,
        fitness: f64,
    },
}

/// Aggregated history of a finished run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsReport {
    /// Generation snapshots in arrival order
    pub snapshots: Vec<GenerationSnapshot>,
    /// Best-improvement events in arrival order
    pub new_best_events: Vec<CoevEvent>,
    /// Whether a termination threshold fired
    pub threshold_reached: bool,
}

impl StatsReport {
    /// Drain a channel until every sender hangs up
    pub fn collect(receiver: std::sync::mpsc::Receiver<CoevEvent>) -> Self {
        let mut report = Self::default();
        for event in receiver {
            match event {
                CoevEvent::Generation(snapshot) => report.snapshots.push(snapshot),
                CoevEvent::NewBest { .. } => report.new_best_events.push(event),
                CoevEvent::ThresholdReached { .. } => report.threshold_reached = true,
            }
        }
        report
    }

    /// Snapshots of one population, in generation order
    pub fn population_history(&self, population: PopulationId) -> Vec<&GenerationSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.population == population)
            .collect()
    }

    /// Highest max-fitness seen across all snapshots
    pub fn best_fitness(&self) -> f64 {
        self.snapshots
            .iter()
            .map(|s| s.max_fitness)
            .fold(0.0, f64::max)
    }
}
