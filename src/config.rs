//! System parameters
//!
//! All knobs of a run in one explicitly passed struct: the structural
//! genome parameters, the per-population evolution settings, the fitness
//! weights and the classification thresholds. Nothing here is global
//! state; the engines borrow what they need.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoevResult, EvolutionError};
use crate::operators::SelectionStrategy;

/// Evolution settings for one of the two populations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationSettings {
    /// Generations to run
    pub max_generations: usize,
    /// Number of individuals
    pub population_size: usize,
    /// Individuals carried over unchanged each generation
    pub elite_size: usize,
    /// Representatives published for the peer population
    pub cooperators: usize,
    /// Parent-selection strategy for reproduction
    pub selection: SelectionStrategy,
    /// Probability that a parent pair undergoes crossover
    pub crossover_prob: f64,
    /// Probability that a child is mutated at all
    pub mutate_individual_prob: f64,
    /// Per-bit flip probability when a child is mutated
    pub mutate_bit_prob: f64,
    /// Fitness at which the whole run terminates early
    pub max_fitness: f64,
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            max_generations: 10,
            population_size: 10,
            elite_size: 5,
            cooperators: 2,
            selection: SelectionStrategy::Roulette,
            crossover_prob: 0.5,
            mutate_individual_prob: 0.5,
            mutate_bit_prob: 0.025,
            max_fitness: 1.0,
        }
    }
}

/// Weights of the composite fitness criteria
///
/// Error metrics (RMSE, RRSE, RAE, MSE) enter the composite as `2^(-x)`;
/// all other criteria are already in `[0, 1]`. A weight of 0 removes the
/// criterion from both the numerator and the normalizing sum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    pub sensitivity: f64,
    pub specificity: f64,
    pub accuracy: f64,
    pub ppv: f64,
    pub rmse: f64,
    pub rrse: f64,
    pub rae: f64,
    pub mse: f64,
    /// Mean distance to threshold over correctly classified samples
    pub adm: f64,
    /// Minimum distance to threshold over correctly classified samples
    pub mdm: f64,
    /// Rule-size criterion (fewer antecedents scores higher)
    pub size: f64,
    /// Over-learning penalty
    pub over_learn: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            specificity: 0.8,
            accuracy: 0.0,
            ppv: 0.0,
            rmse: 0.0,
            rrse: 0.0,
            rae: 0.0,
            mse: 0.0,
            adm: 0.0,
            mdm: 0.0,
            size: 0.0,
            over_learn: 0.0,
        }
    }
}

impl FitnessWeights {
    /// Sum of all active weights (the composite denominator)
    pub fn total(&self) -> f64 {
        self.sensitivity
            + self.specificity
            + self.accuracy
            + self.ppv
            + self.rmse
            + self.rrse
            + self.rae
            + self.mse
            + self.adm
            + self.mdm
            + self.size
            + self.over_learn
    }
}

/// Complete parameter set of a coevolution run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemParameters {
    /// Name of the dataset (carried into persisted systems)
    pub dataset_name: String,
    /// Number of rules
    pub nb_rules: usize,
    /// Maximum antecedent slots per rule
    pub nb_var_per_rule: usize,
    /// Number of output variables
    pub nb_out_vars: usize,
    /// Sets per input variable
    pub nb_in_sets: usize,
    /// Sets per output variable
    pub nb_out_sets: usize,
    /// Fixed-vars rule encoding (experimental): slot k addresses variable k
    pub fixed_vars: bool,
    /// Bits per input-variable index
    pub in_vars_code_size: usize,
    /// Bits per output-variable index
    pub out_vars_code_size: usize,
    /// Bits per input-set index
    pub in_sets_code_size: usize,
    /// Bits per output-set index
    pub out_sets_code_size: usize,
    /// Bits per input-set position
    pub in_sets_pos_code_size: usize,
    /// Bits per output-set position
    pub out_sets_pos_code_size: usize,
    /// Settings of the memberships population
    pub memberships: PopulationSettings,
    /// Settings of the rules population
    pub rules: PopulationSettings,
    /// Composite fitness weights
    pub weights: FitnessWeights,
    /// Whether defuzzified outputs are thresholded into class labels
    pub thresholds_enabled: bool,
    /// Per-output classification threshold (length `nb_out_vars`)
    pub thresholds: Vec<f64>,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            dataset_name: String::new(),
            nb_rules: 5,
            nb_var_per_rule: 4,
            nb_out_vars: 1,
            nb_in_sets: 2,
            nb_out_sets: 2,
            fixed_vars: false,
            in_vars_code_size: 1,
            out_vars_code_size: 2,
            in_sets_code_size: 2,
            out_sets_code_size: 1,
            in_sets_pos_code_size: 4,
            out_sets_pos_code_size: 1,
            memberships: PopulationSettings::default(),
            rules: PopulationSettings::default(),
            weights: FitnessWeights::default(),
            thresholds_enabled: true,
            thresholds: vec![0.5],
        }
    }
}

impl SystemParameters {
    /// Load parameters from a JSON file
    pub fn load(path: impl AsRef<Path>) -> CoevResult<Self> {
        let file = File::open(path).map_err(|e| EvolutionError::Configuration(e.to_string()))?;
        let params: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EvolutionError::Configuration(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> CoevResult<()> {
        let file = File::create(path).map_err(|e| EvolutionError::Configuration(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| EvolutionError::Configuration(e.to_string()))?;
        Ok(())
    }

    /// Check the parameter set for structural consistency
    ///
    /// Violations here are fatal: a genome built from an inconsistent
    /// layout cannot be decoded meaningfully, so the run refuses to start.
    pub fn validate(&self) -> CoevResult<()> {
        let fail = |msg: String| Err(EvolutionError::Configuration(msg));

        if self.nb_rules == 0 {
            return fail("nb_rules must be at least 1".into());
        }
        if self.nb_var_per_rule == 0 {
            return fail("nb_var_per_rule must be at least 1".into());
        }
        if self.nb_out_vars == 0 {
            return fail("nb_out_vars must be at least 1".into());
        }
        if self.nb_in_sets == 0 || self.nb_out_sets == 0 {
            return fail("set counts must be at least 1".into());
        }
        if self.in_sets_pos_code_size == 0 || self.in_sets_pos_code_size > 32 {
            return fail(format!(
                "in_sets_pos_code_size {} outside [1, 32]",
                self.in_sets_pos_code_size
            ));
        }
        if self.out_sets_pos_code_size == 0 || self.out_sets_pos_code_size > 32 {
            return fail(format!(
                "out_sets_pos_code_size {} outside [1, 32]",
                self.out_sets_pos_code_size
            ));
        }
        if self.in_sets_code_size == 0 || self.out_sets_code_size == 0 {
            return fail("set index code sizes must be at least 1".into());
        }
        if !self.fixed_vars && (self.in_vars_code_size == 0 || self.out_vars_code_size == 0) {
            return fail("variable index code sizes must be at least 1 in evolving-vars mode".into());
        }
        if self.thresholds.len() != self.nb_out_vars {
            return fail(format!(
                "{} thresholds configured for {} output variables",
                self.thresholds.len(),
                self.nb_out_vars
            ));
        }
        if self.weights.total() <= 0.0 {
            return fail("at least one fitness weight must be positive".into());
        }
        for (name, pop) in [("memberships", &self.memberships), ("rules", &self.rules)] {
            if pop.population_size == 0 {
                return fail(format!("{name}: population_size must be at least 1"));
            }
            if pop.elite_size > pop.population_size {
                return fail(format!(
                    "{name}: elite_size {} exceeds population_size {}",
                    pop.elite_size, pop.population_size
                ));
            }
            if pop.cooperators > pop.population_size {
                return fail(format!(
                    "{name}: cooperators {} exceeds population_size {}",
                    pop.cooperators, pop.population_size
                ));
            }
            for (label, p) in [
                ("crossover_prob", pop.crossover_prob),
                ("mutate_individual_prob", pop.mutate_individual_prob),
                ("mutate_bit_prob", pop.mutate_bit_prob),
            ] {
                if !(0.0..=1.0).contains(&p) {
                    return fail(format!("{name}: {label} {p} outside [0, 1]"));
                }
            }
        }
        Ok(())
    }
}
