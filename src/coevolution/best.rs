//! Champion tracking
//!
//! The best system of the whole run is persisted by value at the moment
//! a strictly better fitness is observed: the decoded system, both
//! genomes and the metric report all live inside the record, so nothing
//! needs re-decoding or re-evaluating later.

use std::sync::Mutex;

use crate::fitness::metrics::FitnessMetrics;
use crate::fuzzy::system::FuzzySystem;
use crate::genome::bit_genome::BitGenome;
use crate::population::population::PopulationId;

/// Snapshot of the best system seen so far
#[derive(Clone, Debug)]
pub struct BestRecord {
    pub fitness: f64,
    pub metrics: FitnessMetrics,
    pub system: FuzzySystem,
    pub memberships: BitGenome,
    pub rules: BitGenome,
    /// Generation of the discovering engine
    pub generation: usize,
    /// Which population's evaluation loop found it
    pub discovered_by: PopulationId,
}

/// Mutex-guarded champion record shared by both engines
///
/// Writes happen only on strict fitness improvement.
#[derive(Debug, Default)]
pub struct BestTracker {
    inner: Mutex<Option<BestRecord>>,
}

impl BestTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate; stores it and returns true on strict improvement
    pub fn offer(&self, candidate: BestRecord) -> bool {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let improved = match guard.as_ref() {
            Some(current) => candidate.fitness > current.fitness,
            None => true,
        };
        if improved {
            *guard = Some(candidate);
        }
        improved
    }

    /// Best fitness seen so far, 0.0 before the first offer
    pub fn best_fitness(&self) -> f64 {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|r| r.fitness)
            .unwrap_or(0.0)
    }

    /// Deep copy of the champion record
    pub fn snapshot(&self) -> Option<BestRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
