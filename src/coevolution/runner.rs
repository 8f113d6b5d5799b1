//! Coevolution runner
//!
//! Builds the two populations, spawns one engine thread per population
//! plus the stats aggregator, and collects the outcome: the champion
//! system, the per-generation history and the final engine states.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::info;

use crate::config::SystemParameters;
use crate::coevolution::best::{BestRecord, BestTracker};
use crate::coevolution::engine::{CancelToken, EngineState, EvolutionEngine, RunSignals};
use crate::coevolution::pair::PairEvaluator;
use crate::dataset::Dataset;
use crate::error::{CoevResult, EvolutionError};
use crate::genome::layout::GenomeLayout;
use crate::population::population::{Population, PopulationId};
use crate::rng::EvoRng;
use crate::stats::StatsReport;

/// Outcome of a finished run
#[derive(Debug)]
pub struct CoevolutionOutcome {
    /// Champion record (None only if every evaluation was cancelled away)
    pub best: Option<BestRecord>,
    /// Aggregated per-generation statistics
    pub stats: StatsReport,
    /// Final state of the memberships engine
    pub memberships_state: EngineState,
    /// Final state of the rules engine
    pub rules_state: EngineState,
}

/// Two-population cooperative coevolution run
pub struct Coevolution {
    params: SystemParameters,
    dataset: Arc<Dataset>,
    signals: Arc<RunSignals>,
}

impl Coevolution {
    /// Set up a run; fails fast on inconsistent configuration
    pub fn new(params: SystemParameters, dataset: Arc<Dataset>) -> CoevResult<Self> {
        params.validate()?;
        if dataset.nb_out_vars() != params.nb_out_vars {
            return Err(EvolutionError::Configuration(format!(
                "dataset has {} output variables, parameters declare {}",
                dataset.nb_out_vars(),
                params.nb_out_vars
            )));
        }
        Ok(Self {
            params,
            dataset,
            signals: Arc::new(RunSignals::new()),
        })
    }

    /// Handle for cancelling the run from another thread
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken::new(self.signals.clone())
    }

    /// Run both engines to completion and gather the outcome
    pub fn run(&self) -> CoevResult<CoevolutionOutcome> {
        let layout = GenomeLayout::new(&self.params, self.dataset.nb_in_vars());
        info!(
            samples = self.dataset.nb_samples(),
            in_vars = self.dataset.nb_in_vars(),
            out_vars = self.dataset.nb_out_vars(),
            memberships_bits = layout.memberships_len(),
            rules_bits = layout.rules_len(),
            "starting coevolution"
        );

        let mut rng = EvoRng::spawn();
        let mut memberships = Population::random(
            PopulationId::Memberships,
            self.params.memberships.population_size,
            layout.memberships_len(),
            &mut rng,
        );
        let mut rules = Population::random(
            PopulationId::Rules,
            self.params.rules.population_size,
            layout.rules_len(),
            &mut rng,
        );
        // Seed the representative slots so neither engine starts against
        // an empty peer
        memberships.publish_representatives(self.params.memberships.cooperators);
        rules.publish_representatives(self.params.rules.cooperators);

        let memberships = Arc::new(Mutex::new(memberships));
        let rules = Arc::new(Mutex::new(rules));
        let best = Arc::new(BestTracker::new());
        let (events, receiver) = mpsc::channel();

        let aggregator = thread::spawn(move || StatsReport::collect(receiver));

        let mut memberships_engine = EvolutionEngine::new(
            PopulationId::Memberships,
            memberships.clone(),
            rules.clone(),
            PairEvaluator::new(&self.params, self.dataset.clone()),
            self.params.memberships.clone(),
            best.clone(),
            self.signals.clone(),
            events.clone(),
        );
        let mut rules_engine = EvolutionEngine::new(
            PopulationId::Rules,
            rules,
            memberships,
            PairEvaluator::new(&self.params, self.dataset.clone()),
            self.params.rules.clone(),
            best.clone(),
            self.signals.clone(),
            events,
        );

        let memberships_worker = thread::spawn(move || {
            let mut rng = EvoRng::spawn();
            memberships_engine.run(&mut rng)
        });
        let rules_worker = thread::spawn(move || {
            let mut rng = EvoRng::spawn();
            rules_engine.run(&mut rng)
        });

        let memberships_state = join_engine(memberships_worker, PopulationId::Memberships)?;
        let rules_state = join_engine(rules_worker, PopulationId::Rules)?;

        // All senders are gone now; the aggregator drains and returns
        let stats = aggregator
            .join()
            .map_err(|_| EvolutionError::Worker("stats aggregator panicked".to_string()))?;

        let best = best.snapshot();
        if let Some(record) = &best {
            info!(
                fitness = record.fitness,
                discovered_by = record.discovered_by.name(),
                generation = record.generation,
                "coevolution finished"
            );
        }

        Ok(CoevolutionOutcome {
            best,
            stats,
            memberships_state,
            rules_state,
        })
    }
}

fn join_engine(
    worker: thread::JoinHandle<CoevResult<EngineState>>,
    id: PopulationId,
) -> CoevResult<EngineState> {
    worker
        .join()
        .map_err(|_| EvolutionError::Worker(format!("{} engine panicked", id.name())))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Arc<Dataset> {
        let rows: Vec<Vec<String>> = "id;x;y\n0;0;0\n1;1;1\n2;0;0\n3;1;1"
            .lines()
            .map(|l| l.split(';').map(str::to_string).collect())
            .collect();
        Arc::new(Dataset::from_rows(rows, 1).unwrap())
    }

    fn small_params() -> SystemParameters {
        let mut params = SystemParameters {
            nb_rules: 2,
            nb_var_per_rule: 1,
            in_vars_code_size: 1,
            in_sets_code_size: 1,
            ..Default::default()
        };
        for pop in [&mut params.memberships, &mut params.rules] {
            pop.population_size = 8;
            pop.elite_size = 2;
            pop.cooperators = 2;
            pop.max_generations = 4;
        }
        params
    }

    #[test]
    fn test_run_produces_best_and_stats() {
        let coev = Coevolution::new(small_params(), dataset()).unwrap();
        let outcome = coev.run().unwrap();

        let best = outcome.best.expect("a best system must exist");
        assert!(best.fitness > 0.0 && best.fitness <= 1.0);

        // Both populations reported every generation unless a threshold
        // ended the run early
        assert!(!outcome.stats.snapshots.is_empty());
        assert!(matches!(
            outcome.memberships_state,
            EngineState::Done | EngineState::Stopped
        ));
        assert!(matches!(
            outcome.rules_state,
            EngineState::Done | EngineState::Stopped
        ));
    }

    #[test]
    fn test_mismatched_output_count_rejected() {
        let params = SystemParameters {
            nb_out_vars: 2,
            thresholds: vec![0.5, 0.5],
            ..small_params()
        };
        assert!(matches!(
            Coevolution::new(params, dataset()),
            Err(EvolutionError::Configuration(_))
        ));
    }

    #[test]
    fn test_cancellation_stops_both_engines() {
        let mut params = small_params();
        for pop in [&mut params.memberships, &mut params.rules] {
            pop.max_generations = 10_000;
            pop.population_size = 10;
        }
        let coev = Coevolution::new(params, dataset()).unwrap();
        let token = coev.cancel_token();
        token.cancel();
        let outcome = coev.run().unwrap();
        assert_eq!(outcome.memberships_state, EngineState::Stopped);
        assert_eq!(outcome.rules_state, EngineState::Stopped);
    }

    #[test]
    fn test_threshold_terminates_early() {
        let mut params = small_params();
        for pop in [&mut params.memberships, &mut params.rules] {
            pop.max_generations = 50;
            pop.max_fitness = 0.0005;
        }
        let coev = Coevolution::new(params, dataset()).unwrap();
        let outcome = coev.run().unwrap();
        assert!(outcome.stats.threshold_reached);
        assert_eq!(outcome.memberships_state, EngineState::Done);
        assert_eq!(outcome.rules_state, EngineState::Done);
    }
}
