//! Pair evaluation
//!
//! Composes one memberships genome with one rules genome, decodes the
//! pair into a fuzzy system, and scores it against the dataset. Each
//! engine thread owns a private `PairEvaluator`; nothing here is shared
//! or locked.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::SystemParameters;
use crate::dataset::Dataset;
use crate::error::CoevResult;
use crate::fitness::evaluator::{FitnessEvaluator, FitnessReport};
use crate::fuzzy::decoder::SystemDecoder;
use crate::fuzzy::system::FuzzySystem;
use crate::genome::bit_genome::BitGenome;
use crate::genome::layout::GenomeLayout;

/// A decoded system together with its fitness report
#[derive(Clone, Debug)]
pub struct ScoredSystem {
    pub system: FuzzySystem,
    pub report: FitnessReport,
}

/// Decoder plus evaluator for one worker thread
#[derive(Clone, Debug)]
pub struct PairEvaluator {
    decoder: SystemDecoder,
    evaluator: FitnessEvaluator,
}

impl PairEvaluator {
    /// Build an evaluator bound to the run parameters and the dataset
    pub fn new(params: &SystemParameters, dataset: Arc<Dataset>) -> Self {
        Self {
            decoder: SystemDecoder::new(params, &dataset),
            evaluator: FitnessEvaluator::new(params, dataset),
        }
    }

    /// The genome layout in force
    pub fn layout(&self) -> &GenomeLayout {
        self.decoder.layout()
    }

    /// Decode and score a genome pair (memberships always first)
    ///
    /// Genome-length mismatches are configuration errors and propagate;
    /// degenerate systems come back as floor-fitness reports.
    pub fn score(
        &self,
        memberships: &BitGenome,
        rules: &BitGenome,
    ) -> CoevResult<ScoredSystem> {
        let mut system = self.decoder.decode(memberships, rules)?;
        let report = self.evaluator.evaluate(&mut system);
        Ok(ScoredSystem { system, report })
    }

    /// Like [`score`](Self::score), polling `stop` between samples
    ///
    /// Returns `Ok(None)` when cancelled mid-evaluation.
    pub fn score_cancellable(
        &self,
        memberships: &BitGenome,
        rules: &BitGenome,
        stop: &AtomicBool,
    ) -> CoevResult<Option<ScoredSystem>> {
        let mut system = self.decoder.decode(memberships, rules)?;
        Ok(self
            .evaluator
            .evaluate_cancellable(&mut system, stop)
            .map(|report| ScoredSystem { system, report }))
    }

    /// Decode without scoring
    pub fn decode(
        &self,
        memberships: &BitGenome,
        rules: &BitGenome,
    ) -> CoevResult<FuzzySystem> {
        Ok(self.decoder.decode(memberships, rules)?)
    }
}
