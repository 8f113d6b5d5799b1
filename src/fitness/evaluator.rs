//! Multi-criteria fitness evaluator
//!
//! Drives a fuzzy system across every sample of the dataset, tallies the
//! classification and regression criteria per output variable, grades
//! rule generality, and folds everything into one scalar fitness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{FitnessWeights, SystemParameters};
use crate::dataset::Dataset;
use crate::error::FuzzyError;
use crate::fitness::metrics::{rule_generality_grade, FitnessMetrics, OutputTally};
use crate::fuzzy::system::FuzzySystem;

/// Lowest fitness a composed system can receive
pub const FITNESS_FLOOR: f64 = 0.001;

/// A rule counts as fired on a sample from this firing strength
const FIRED_THRESHOLD: f64 = 0.2;

/// A winner must beat the runner-up by this margin (or stand alone)
const WINNER_MARGIN: f64 = 0.2;

/// Outcome of evaluating one system against the dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitnessReport {
    /// Composite scalar fitness, floored at [`FITNESS_FLOOR`]
    pub fitness: f64,
    /// All criteria, averaged across outputs
    pub metrics: FitnessMetrics,
    /// The system defuzzified a flat-zero surface on some sample
    pub degenerate: bool,
}

impl FitnessReport {
    fn degenerate() -> Self {
        Self {
            fitness: FITNESS_FLOOR,
            metrics: FitnessMetrics::default(),
            degenerate: true,
        }
    }
}

/// Evaluator bound to one dataset and one weight configuration
///
/// The evaluator itself is immutable and cheap to clone; the mutable
/// per-sample scratch lives inside the [`FuzzySystem`] being scored, so
/// each worker thread evaluates with its own system instances.
#[derive(Clone, Debug)]
pub struct FitnessEvaluator {
    dataset: Arc<Dataset>,
    weights: FitnessWeights,
    thresholds: Vec<f64>,
    thresholds_enabled: bool,
}

impl FitnessEvaluator {
    /// Create an evaluator from the run parameters and the shared dataset
    pub fn new(params: &SystemParameters, dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            weights: params.weights,
            thresholds: params.thresholds.clone(),
            thresholds_enabled: params.thresholds_enabled,
        }
    }

    /// Create an evaluator from explicit weights and thresholds
    ///
    /// Used when re-evaluating a persisted system, whose weights travel
    /// with the file rather than with a parameter set.
    pub fn with_weights(
        weights: FitnessWeights,
        thresholds: Vec<f64>,
        thresholds_enabled: bool,
        dataset: Arc<Dataset>,
    ) -> Self {
        Self {
            dataset,
            weights,
            thresholds,
            thresholds_enabled,
        }
    }

    /// The dataset this evaluator scores against
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Apply the per-output classification threshold
    ///
    /// With thresholding enabled: 1.0 from the threshold up, 0.0 for
    /// non-negative values below it, −1.0 for negative values. Disabled,
    /// the value passes through.
    pub fn threshold(&self, out_var: usize, value: f64) -> f64 {
        if !self.thresholds_enabled {
            return value;
        }
        if value >= self.thresholds[out_var] {
            1.0
        } else if value >= 0.0 {
            0.0
        } else {
            -1.0
        }
    }

    /// Score a system against the whole dataset
    ///
    /// A degenerate defuzzification anywhere aborts the pass and reports
    /// floor fitness; the engine stays alive and selection pressure
    /// removes the individual.
    pub fn evaluate(&self, system: &mut FuzzySystem) -> FitnessReport {
        static NEVER: AtomicBool = AtomicBool::new(false);
        self.evaluate_cancellable(system, &NEVER)
            .expect("evaluation without cancellation cannot be interrupted")
    }

    /// Score a system, polling `stop` between samples
    ///
    /// Returns `None` when cancelled; the current sample is always
    /// completed before the poll.
    pub fn evaluate_cancellable(
        &self,
        system: &mut FuzzySystem,
        stop: &AtomicBool,
    ) -> Option<FitnessReport> {
        let nb_samples = self.dataset.nb_samples();
        let nb_out = self.dataset.nb_out_vars();
        let nb_rules = system.rules().len();

        let mut tallies: Vec<OutputTally> = vec![OutputTally::default(); nb_out];
        let mut times_fired = vec![0usize; nb_rules];
        let mut times_winner = vec![0usize; nb_rules];
        let columns = self.input_columns(system);
        let mut inputs: Vec<Option<f64>> = vec![None; columns.len()];

        for sample in 0..nb_samples {
            for (slot, cell) in inputs.iter_mut().enumerate() {
                *cell = self.dataset.input(sample, columns[slot]);
            }
            let eval = match system.evaluate_sample(&inputs) {
                Ok(eval) => eval,
                Err(FuzzyError::DegenerateSystem(_)) => return Some(FitnessReport::degenerate()),
                Err(_) => return Some(FitnessReport::degenerate()),
            };

            for out in 0..nb_out {
                let predicted = eval.outputs[out];
                let actual = self.dataset.output(sample, out);
                tallies[out].record(
                    predicted,
                    actual,
                    self.threshold(out, predicted),
                    self.threshold(out, actual),
                    self.thresholds[out],
                );
            }

            self.record_rule_activity(
                system,
                &eval.rule_firings,
                &mut times_fired,
                &mut times_winner,
            );

            if stop.load(Ordering::Relaxed) {
                return None;
            }
        }

        let outputs: Vec<_> = tallies.iter().map(|t| t.finish(nb_samples)).collect();
        let size = size_criterion(system);
        let over_learn = over_learn_criterion(&times_fired, &times_winner, nb_samples);
        let metrics = FitnessMetrics::from_outputs(&outputs, size, over_learn);

        Some(FitnessReport {
            fitness: self.composite(&metrics),
            metrics,
            degenerate: false,
        })
    }

    /// Per-sample defuzzified and thresholded outputs of a loaded system
    ///
    /// Unlike [`evaluate`](Self::evaluate), a degenerate surface here is a
    /// hard error: predictions from a broken system are meaningless.
    pub fn predict(&self, system: &mut FuzzySystem) -> Result<Vec<Vec<f64>>, FuzzyError> {
        let mut predictions = Vec::with_capacity(self.dataset.nb_samples());
        let columns = self.input_columns(system);
        let mut inputs: Vec<Option<f64>> = vec![None; columns.len()];
        for sample in 0..self.dataset.nb_samples() {
            for (slot, cell) in inputs.iter_mut().enumerate() {
                *cell = self.dataset.input(sample, columns[slot]);
            }
            let eval = system.evaluate_sample(&inputs)?;
            predictions.push(
                eval.outputs
                    .iter()
                    .enumerate()
                    .map(|(out, &v)| self.threshold(out, v))
                    .collect(),
            );
        }
        Ok(predictions)
    }

    /// Map each system input variable to its dataset column
    ///
    /// Matched by name so a persisted system carrying only its used
    /// variables still reads the right columns; unmatched names fall back
    /// to positional indexing.
    fn input_columns(&self, system: &FuzzySystem) -> Vec<usize> {
        let names = self.dataset.var_names();
        let nb_in = self.dataset.nb_in_vars();
        system
            .in_vars()
            .iter()
            .enumerate()
            .map(|(slot, var)| {
                names[..nb_in]
                    .iter()
                    .position(|n| n.as_str() == var.name())
                    .unwrap_or(slot.min(nb_in.saturating_sub(1)))
            })
            .collect()
    }

    fn record_rule_activity(
        &self,
        system: &FuzzySystem,
        firings: &[f64],
        times_fired: &mut [usize],
        times_winner: &mut [usize],
    ) {
        let mut winner: Option<usize> = None;
        let mut winner_firing = 0.0f64;
        let mut second_firing = 0.0f64;
        for (i, rule) in system.rules().iter().enumerate() {
            if rule.consequents().is_empty() {
                continue;
            }
            let firing = firings[i];
            if firing >= FIRED_THRESHOLD {
                times_fired[i] += 1;
            }
            if firing > winner_firing {
                second_firing = winner_firing;
                winner = Some(i);
                winner_firing = firing;
            } else if firing > second_firing {
                second_firing = firing;
            }
        }
        if let Some(w) = winner {
            if winner_firing - second_firing >= WINNER_MARGIN || second_firing == 0.0 {
                times_winner[w] += 1;
            }
        }
    }

    /// Weighted composite of all criteria
    ///
    /// Error metrics enter as `2^(−x)` so every term lives in `[0, 1]`;
    /// the sum is normalized by the active weights and floored.
    fn composite(&self, m: &FitnessMetrics) -> f64 {
        let w = &self.weights;
        let numerator = w.sensitivity * m.sensitivity
            + w.specificity * m.specificity
            + w.accuracy * m.accuracy
            + w.ppv * m.ppv
            + w.rmse * (-m.rmse).exp2()
            + w.rrse * (-m.rrse).exp2()
            + w.rae * (-m.rae).exp2()
            + w.mse * (-m.mse).exp2()
            + w.adm * m.adm
            + w.mdm * m.mdm
            + w.size * m.size
            + w.over_learn * m.over_learn;
        let denominator = w.total();
        let fitness = numerator / denominator;
        if !fitness.is_finite() || fitness <= 0.0 {
            FITNESS_FLOOR
        } else {
            fitness.max(FITNESS_FLOOR)
        }
    }
}

/// Size criterion: 1 / total antecedent count, 0 for an all-empty rule base
fn size_criterion(system: &FuzzySystem) -> f64 {
    let total: usize = system.rules().iter().map(|r| r.nb_antecedents()).sum();
    if total > 0 {
        1.0 / total as f64
    } else {
        0.0
    }
}

/// Over-learn criterion: the minimum generality grade across all rules
fn over_learn_criterion(
    times_fired: &[usize],
    times_winner: &[usize],
    nb_samples: usize,
) -> f64 {
    let mut min_grade = 1.0f64;
    for (fired, winner) in times_fired.iter().zip(times_winner) {
        let firing_rate = *fired as f64 / nb_samples as f64;
        let winner_rate = if *fired > 0 {
            *winner as f64 / *fired as f64
        } else {
            0.0
        };
        min_grade = min_grade.min(rule_generality_grade(firing_rate, winner_rate));
    }
    min_grade
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Universe;
    use crate::fuzzy::rule::{FuzzyRule, RulePair};
    use crate::fuzzy::variable::FuzzyVariable;

    fn dataset(text: &str, nb_out: usize) -> Arc<Dataset> {
        let rows: Vec<Vec<String>> = text
            .lines()
            .map(|l| l.split(';').map(str::to_string).collect())
            .collect();
        Arc::new(Dataset::from_rows(rows, nb_out).unwrap())
    }

    /// "if x is high then y is high", default low; separable x in {0, 1}
    fn identity_setup() -> (FitnessEvaluator, FuzzySystem) {
        let ds = dataset("id;x;y\n0;0;0\n1;1;1\n2;0;0\n3;1;1", 1);
        let params = SystemParameters {
            nb_var_per_rule: 1,
            thresholds: vec![0.5],
            ..Default::default()
        };
        let evaluator = FitnessEvaluator::new(&params, ds);

        let mut x = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 1.0 });
        x.add_set("MF 0", 0.0, 0);
        x.add_set("MF 1", 1.0, 1);
        let mut y = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 1.0 });
        y.add_set("MF 0", 0.0, 0);
        y.add_set("MF 1", 1.0, 1);
        let rule = FuzzyRule::new(
            vec![RulePair { var: 0, set: 1 }],
            vec![RulePair { var: 0, set: 1 }],
        );
        let system = FuzzySystem::new(vec![x], vec![y], vec![rule], vec![0]);
        (evaluator, system)
    }

    #[test]
    fn test_identity_rule_is_perfect() {
        let (evaluator, mut system) = identity_setup();
        let report = evaluator.evaluate(&mut system);
        assert!(!report.degenerate);
        assert_eq!(report.metrics.sensitivity, 1.0);
        assert_eq!(report.metrics.specificity, 1.0);
        assert_eq!(report.metrics.accuracy, 1.0);
        // Default weights are sensitivity 1.0 + specificity 0.8
        assert!((report.fitness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_semantics() {
        let (evaluator, _) = identity_setup();
        assert_eq!(evaluator.threshold(0, 0.7), 1.0);
        assert_eq!(evaluator.threshold(0, 0.5), 1.0);
        assert_eq!(evaluator.threshold(0, 0.3), 0.0);
        assert_eq!(evaluator.threshold(0, -0.3), -1.0);
    }

    #[test]
    fn test_threshold_passthrough_when_disabled() {
        let ds = dataset("id;x;y\n0;0;0\n1;1;1", 1);
        let params = SystemParameters {
            thresholds_enabled: false,
            ..Default::default()
        };
        let evaluator = FitnessEvaluator::new(&params, ds);
        assert_eq!(evaluator.threshold(0, 0.3), 0.3);
    }

    #[test]
    fn test_fitness_in_unit_interval() {
        let (evaluator, mut system) = identity_setup();
        let report = evaluator.evaluate(&mut system);
        assert!(report.fitness > 0.0 && report.fitness <= 1.0);
    }

    #[test]
    fn test_degenerate_system_gets_floor_fitness() {
        let ds = dataset("id;x;y\n0;0;0\n1;1;1", 1);
        let params = SystemParameters {
            nb_var_per_rule: 1,
            ..Default::default()
        };
        let evaluator = FitnessEvaluator::new(&params, ds);

        let mut x = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 1.0 });
        x.add_set("MF 0", 0.0, 0);
        x.add_set("MF 1", 1.0, 1);
        // An output variable with no sets leaves the membership surface
        // flat zero on every sample
        let y = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 1.0 });
        let rule = FuzzyRule::new(vec![RulePair { var: 0, set: 1 }], vec![]);
        let mut system = FuzzySystem::new(vec![x], vec![y], vec![rule], vec![0]);
        let report = evaluator.evaluate(&mut system);
        assert!(report.degenerate);
        assert_eq!(report.fitness, FITNESS_FLOOR);
    }

    #[test]
    fn test_size_criterion() {
        let (_, system) = identity_setup();
        assert_eq!(size_criterion(&system), 1.0);
    }

    #[test]
    fn test_over_learn_all_rules_frequent() {
        // Both rules fire on every sample
        assert_eq!(over_learn_criterion(&[10, 10], &[5, 5], 10), 1.0);
    }

    #[test]
    fn test_over_learn_penalizes_rare_dominant_rule() {
        // Rule 1 fired once in 100 samples and won that one time
        let grade = over_learn_criterion(&[100, 1], &[50, 1], 100);
        assert_eq!(grade, 0.0);
    }

    #[test]
    fn test_predict_applies_threshold() {
        let (evaluator, mut system) = identity_setup();
        let predictions = evaluator.predict(&mut system).unwrap();
        assert_eq!(predictions.len(), 4);
        assert_eq!(predictions[0], vec![0.0]);
        assert_eq!(predictions[1], vec![1.0]);
    }

    #[test]
    fn test_cancellation_returns_none() {
        let (evaluator, mut system) = identity_setup();
        let stop = AtomicBool::new(true);
        assert!(evaluator.evaluate_cancellable(&mut system, &stop).is_none());
    }

    #[test]
    fn test_composite_uses_error_mapping() {
        let ds = dataset("id;x;y\n0;0;0\n1;1;1", 1);
        let params = SystemParameters {
            weights: FitnessWeights {
                sensitivity: 0.0,
                specificity: 0.0,
                rmse: 1.0,
                ..FitnessWeights::default()
            },
            ..Default::default()
        };
        let evaluator = FitnessEvaluator::new(&params, ds);
        let metrics = FitnessMetrics {
            rmse: 1.0,
            ..Default::default()
        };
        // 2^-1 = 0.5 with a unit weight
        assert!((evaluator.composite(&metrics) - 0.5).abs() < 1e-12);
    }
}
