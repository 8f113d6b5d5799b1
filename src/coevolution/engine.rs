//! Per-population evolution engine
//!
//! Each engine drives one population through the generational loop:
//! snapshot the peer's representatives, compose and score every
//! individual, publish stats, then breed the next generation and publish
//! its own representatives. Peer access is always lock → deep-copy →
//! unlock; no two locks are ever held together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PopulationSettings;
use crate::coevolution::best::{BestRecord, BestTracker};
use crate::coevolution::pair::{PairEvaluator, ScoredSystem};
use crate::error::CoevResult;
use crate::genome::bit_genome::BitGenome;
use crate::operators::{reproduce, ReproductionParams};
use crate::population::population::{Population, PopulationId};
use crate::rng::EvoRng;
use crate::stats::{CoevEvent, GenerationSnapshot};

/// State machine of one engine
///
/// Idle → Running → (Evaluating ↔ Breeding)* → Done | Stopped.
/// Evaluating → Breeding is where peer representatives are consumed;
/// Breeding → Evaluating is where the new representatives are published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Running,
    Evaluating,
    Breeding,
    Done,
    Stopped,
}

/// Shared run-level flags polled by both engines
///
/// `stop` is the external cancellation flag; `threshold` is raised by an
/// engine whose population reached its termination fitness, after which
/// both engines finish as Done.
#[derive(Debug, Default)]
pub struct RunSignals {
    stop: AtomicBool,
    threshold: AtomicBool,
}

impl RunSignals {
    /// Create clear signals
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cooperative cancellation
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// The raw stop flag, for sample-level polling
    pub fn stop_flag(&self) -> &AtomicBool {
        &self.stop
    }

    /// Raise the fitness-threshold termination event
    pub fn raise_threshold(&self) {
        self.threshold.store(true, Ordering::Relaxed);
    }

    /// Whether a termination threshold fired
    pub fn threshold_reached(&self) -> bool {
        self.threshold.load(Ordering::Relaxed)
    }
}

/// Cancellation handle for a running coevolution
#[derive(Clone, Debug)]
pub struct CancelToken {
    signals: Arc<RunSignals>,
}

impl CancelToken {
    /// Wrap the shared signals
    pub fn new(signals: Arc<RunSignals>) -> Self {
        Self { signals }
    }

    /// Ask both engines to stop after their current sample
    pub fn cancel(&self) {
        self.signals.request_stop();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.signals.stopped()
    }
}

/// What a generation step decided after its fitness write-back
enum StepOutcome {
    Breed,
    Stop,
    Threshold(f64),
}

/// Generational loop of one population
pub struct EvolutionEngine {
    id: PopulationId,
    own: Arc<Mutex<Population>>,
    peer: Arc<Mutex<Population>>,
    evaluator: PairEvaluator,
    settings: PopulationSettings,
    best: Arc<BestTracker>,
    signals: Arc<RunSignals>,
    events: Sender<CoevEvent>,
    state: EngineState,
}

impl EvolutionEngine {
    /// Wire up an engine; it does nothing until [`run`](Self::run)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PopulationId,
        own: Arc<Mutex<Population>>,
        peer: Arc<Mutex<Population>>,
        evaluator: PairEvaluator,
        settings: PopulationSettings,
        best: Arc<BestTracker>,
        signals: Arc<RunSignals>,
        events: Sender<CoevEvent>,
    ) -> Self {
        Self {
            id,
            own,
            peer,
            evaluator,
            settings,
            best,
            signals,
            events,
            state: EngineState::Idle,
        }
    }

    /// Current state-machine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the generational loop to completion, cancellation or threshold
    pub fn run(&mut self, rng: &mut EvoRng) -> CoevResult<EngineState> {
        self.state = EngineState::Running;
        debug!(population = self.id.name(), "engine starting");

        for _ in 0..self.settings.max_generations {
            if self.signals.threshold_reached() {
                self.state = EngineState::Done;
                break;
            }
            if self.signals.stopped() {
                self.finish_stopped();
                break;
            }

            self.state = EngineState::Evaluating;
            let (genomes, generation) = {
                let own = self.lock_own();
                (own.genomes(), own.generation())
            };

            let mut fitnesses: Vec<f64> = Vec::with_capacity(genomes.len());
            for genome in &genomes {
                // Cancellation point: never begin the next individual
                if self.signals.stopped() {
                    break;
                }
                let fitness = self.evaluate_individual(genome, generation)?;
                fitnesses.push(fitness);
            }

            let outcome = {
                let mut own = self.lock_own();
                for (i, &fitness) in fitnesses.iter().enumerate() {
                    own.set_fitness(i, fitness);
                }
                let snapshot =
                    GenerationSnapshot::from_fitnesses(self.id, generation, &own.fitnesses());
                let _ = self.events.send(CoevEvent::Generation(snapshot));

                let best_fitness = self.best.best_fitness();
                if self.signals.stopped() {
                    own.publish_representatives(self.settings.cooperators);
                    StepOutcome::Stop
                } else if best_fitness >= self.settings.max_fitness {
                    let _ = self.events.send(CoevEvent::ThresholdReached {
                        population: self.id,
                        fitness: best_fitness,
                    });
                    self.signals.raise_threshold();
                    own.publish_representatives(self.settings.cooperators);
                    StepOutcome::Threshold(best_fitness)
                } else {
                    StepOutcome::Breed
                }
            };

            match outcome {
                StepOutcome::Stop => {
                    self.state = EngineState::Stopped;
                    break;
                }
                StepOutcome::Threshold(fitness) => {
                    info!(
                        population = self.id.name(),
                        fitness, "termination fitness reached"
                    );
                    self.state = EngineState::Done;
                    break;
                }
                StepOutcome::Breed => {
                    self.state = EngineState::Breeding;
                    let mut own = self.lock_own();
                    self.breed(&mut own, rng)?;
                    own.publish_representatives(self.settings.cooperators);
                }
            }
        }

        if !matches!(self.state, EngineState::Done | EngineState::Stopped) {
            self.state = EngineState::Done;
        }
        debug!(population = self.id.name(), state = ?self.state, "engine finished");
        Ok(self.state)
    }

    /// Score one individual against the peer's current representatives
    ///
    /// Fitness is the maximum over all cooperators; with none published
    /// the individual keeps fitness 0.0.
    fn evaluate_individual(&self, genome: &BitGenome, generation: usize) -> CoevResult<f64> {
        let representatives = self.lock_peer().representatives_snapshot();

        let mut best_fitness = 0.0f64;
        let mut best_pair: Option<(ScoredSystem, BitGenome, BitGenome)> = None;
        for representative in &representatives {
            // Composition order is fixed by identity: memberships first
            let (memberships, rules) = match self.id {
                PopulationId::Memberships => (genome, &representative.genome),
                PopulationId::Rules => (&representative.genome, genome),
            };
            let Some(scored) =
                self.evaluator
                    .score_cancellable(memberships, rules, self.signals.stop_flag())?
            else {
                break;
            };
            if scored.report.fitness > best_fitness {
                best_fitness = scored.report.fitness;
                best_pair = Some((scored, memberships.clone(), rules.clone()));
            }
        }

        if let Some((scored, memberships, rules)) = best_pair {
            self.offer_best(scored, memberships, rules, generation);
        }
        Ok(best_fitness)
    }

    /// Push a candidate champion; emits the new-best event on improvement
    fn offer_best(
        &self,
        scored: ScoredSystem,
        memberships: BitGenome,
        rules: BitGenome,
        generation: usize,
    ) {
        let fitness = scored.report.fitness;
        let record = BestRecord {
            fitness,
            metrics: scored.report.metrics,
            system: scored.system,
            memberships,
            rules,
            generation,
            discovered_by: self.id,
        };
        if self.best.offer(record) {
            info!(
                population = self.id.name(),
                generation,
                fitness,
                "new best system"
            );
            let _ = self.events.send(CoevEvent::NewBest {
                population: self.id,
                generation,
                fitness,
            });
        }
    }

    /// Breed the next generation: elites carry over, children fill the rest
    fn breed(&self, own: &mut Population, rng: &mut EvoRng) -> CoevResult<()> {
        let elite_size = self.settings.elite_size.min(own.len());
        let children_count = own.len() - elite_size;
        let elites = own.select_elites(elite_size);

        let children = if children_count > 0 {
            let fitnesses = own.fitnesses();
            let parent_indices = self
                .settings
                .selection
                .select_many(&fitnesses, children_count, rng);
            let parents: Vec<&BitGenome> = parent_indices
                .iter()
                .map(|&i| &own.individuals()[i].genome)
                .collect();
            let params = ReproductionParams {
                crossover_prob: self.settings.crossover_prob,
                mutate_individual_prob: self.settings.mutate_individual_prob,
                mutate_bit_prob: self.settings.mutate_bit_prob,
            };
            reproduce(&parents, children_count, &params, rng)?
        } else {
            Vec::new()
        };

        own.replace_generation(elites, children);
        Ok(())
    }

    fn finish_stopped(&mut self) {
        self.lock_own()
            .publish_representatives(self.settings.cooperators);
        self.state = EngineState::Stopped;
    }

    fn lock_own(&self) -> std::sync::MutexGuard<'_, Population> {
        self.own
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_peer(&self) -> std::sync::MutexGuard<'_, Population> {
        self.peer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::config::SystemParameters;
    use crate::dataset::Dataset;
    use crate::genome::layout::GenomeLayout;

    fn dataset() -> Arc<Dataset> {
        let rows: Vec<Vec<String>> = "id;x;y\n0;0;0\n1;1;1\n2;0;0\n3;1;1"
            .lines()
            .map(|l| l.split(';').map(str::to_string).collect())
            .collect();
        Arc::new(Dataset::from_rows(rows, 1).unwrap())
    }

    fn params() -> SystemParameters {
        let mut params = SystemParameters {
            nb_rules: 2,
            nb_var_per_rule: 1,
            in_vars_code_size: 1,
            in_sets_code_size: 1,
            ..Default::default()
        };
        params.memberships.population_size = 6;
        params.memberships.elite_size = 2;
        params.rules.population_size = 6;
        params.rules.elite_size = 2;
        // Keep the termination threshold out of reach so generation
        // counts are deterministic
        params.memberships.max_fitness = 2.0;
        params.rules.max_fitness = 2.0;
        params
    }

    fn setup(
        params: &SystemParameters,
    ) -> (
        Arc<Mutex<Population>>,
        Arc<Mutex<Population>>,
        PairEvaluator,
    ) {
        let dataset = dataset();
        let evaluator = PairEvaluator::new(params, dataset);
        let layout: GenomeLayout = evaluator.layout().clone();
        let mut rng = EvoRng::seeded(5);
        let mut memb = Population::random(
            PopulationId::Memberships,
            params.memberships.population_size,
            layout.memberships_len(),
            &mut rng,
        );
        let mut rules = Population::random(
            PopulationId::Rules,
            params.rules.population_size,
            layout.rules_len(),
            &mut rng,
        );
        memb.publish_representatives(params.memberships.cooperators);
        rules.publish_representatives(params.rules.cooperators);
        (
            Arc::new(Mutex::new(memb)),
            Arc::new(Mutex::new(rules)),
            evaluator,
        )
    }

    #[test]
    fn test_engine_runs_to_done() {
        let params = params();
        let (memb, rules, evaluator) = setup(&params);
        let (tx, rx) = mpsc::channel();
        let mut engine = EvolutionEngine::new(
            PopulationId::Rules,
            rules.clone(),
            memb,
            evaluator,
            params.rules.clone(),
            Arc::new(BestTracker::new()),
            Arc::new(RunSignals::new()),
            tx,
        );
        let mut rng = EvoRng::seeded(9);
        let state = engine.run(&mut rng).unwrap();
        assert_eq!(state, EngineState::Done);

        drop(engine);
        let events: Vec<CoevEvent> = rx.try_iter().collect();
        let generations = events
            .iter()
            .filter(|e| matches!(e, CoevEvent::Generation(_)))
            .count();
        assert_eq!(generations, params.rules.max_generations);

        // The elites of the final generation carry composed fitness in (0, 1];
        // the freshly bred children are still unevaluated
        let rules = rules.lock().unwrap();
        for individual in rules.iter().take(params.rules.elite_size) {
            let f = individual.fitness_or_zero();
            assert!(f > 0.0 && f <= 1.0);
        }
    }

    #[test]
    fn test_engine_stops_on_cancellation() {
        let params = params();
        let (memb, rules, evaluator) = setup(&params);
        let signals = Arc::new(RunSignals::new());
        signals.request_stop();
        let (tx, _rx) = mpsc::channel();
        let mut engine = EvolutionEngine::new(
            PopulationId::Rules,
            rules,
            memb,
            evaluator,
            params.rules.clone(),
            Arc::new(BestTracker::new()),
            signals,
            tx,
        );
        let mut rng = EvoRng::seeded(9);
        assert_eq!(engine.run(&mut rng).unwrap(), EngineState::Stopped);
    }

    #[test]
    fn test_engine_raises_threshold() {
        let mut params = params();
        // Any composed system beats a zero threshold immediately
        params.rules.max_fitness = 0.0005;
        let (memb, rules, evaluator) = setup(&params);
        let signals = Arc::new(RunSignals::new());
        let (tx, rx) = mpsc::channel();
        let mut engine = EvolutionEngine::new(
            PopulationId::Rules,
            rules,
            memb,
            evaluator,
            params.rules.clone(),
            Arc::new(BestTracker::new()),
            signals.clone(),
            tx,
        );
        let mut rng = EvoRng::seeded(3);
        assert_eq!(engine.run(&mut rng).unwrap(), EngineState::Done);
        assert!(signals.threshold_reached());
        drop(engine);
        let events: Vec<CoevEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, CoevEvent::ThresholdReached { .. })));
    }

    #[test]
    fn test_zero_cooperators_leaves_fitness_zero() {
        let mut params = params();
        params.memberships.cooperators = 0;
        params.rules.max_generations = 1;
        // All-zero fitness would stall roulette; tournament stays defined
        params.rules.selection = crate::operators::SelectionStrategy::Tournament { size: 2 };
        let (memb, rules, evaluator) = setup(&params);
        {
            // Re-publish with zero cooperators: the peer offers nothing
            memb.lock().unwrap().publish_representatives(0);
        }
        let (tx, _rx) = mpsc::channel();
        let mut engine = EvolutionEngine::new(
            PopulationId::Rules,
            rules.clone(),
            memb,
            evaluator,
            params.rules.clone(),
            Arc::new(BestTracker::new()),
            Arc::new(RunSignals::new()),
            tx,
        );
        let mut rng = EvoRng::seeded(1);
        engine.run(&mut rng).unwrap();
        // Fitness assignments happened (0.0, not NaN), elites carried over
        let rules = rules.lock().unwrap();
        assert!(rules
            .iter()
            .take(params.rules.elite_size)
            .all(|i| i.fitness == Some(0.0)));
    }
}
