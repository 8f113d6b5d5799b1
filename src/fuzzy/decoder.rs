//! Genome decoding
//!
//! Interprets a genome pair — one memberships chromosome, one rules
//! chromosome — as a complete [`FuzzySystem`]. Decoding never fails on
//! out-of-range values (those are don't-cares or clamp to 0); only a
//! genome whose length contradicts the layout is rejected.

use crate::config::SystemParameters;
use crate::dataset::{Dataset, Universe};
use crate::error::GenomeError;
use crate::fuzzy::rule::{FuzzyRule, RulePair};
use crate::fuzzy::system::FuzzySystem;
use crate::fuzzy::variable::FuzzyVariable;
use crate::genome::bit_genome::BitGenome;
use crate::genome::layout::GenomeLayout;

/// Decoder for one dataset/parameter combination
///
/// Holds the layout, the variable names and the universes; systems are
/// produced by value so callers can keep a decoded champion around
/// without touching the decoder again.
#[derive(Clone, Debug)]
pub struct SystemDecoder {
    layout: GenomeLayout,
    var_names: Vec<String>,
    universes: Vec<Universe>,
}

impl SystemDecoder {
    /// Build a decoder from the run parameters and the dataset
    pub fn new(params: &SystemParameters, dataset: &Dataset) -> Self {
        let layout = GenomeLayout::new(params, dataset.nb_in_vars());
        Self {
            layout,
            var_names: dataset.var_names().to_vec(),
            universes: (0..dataset.nb_in_vars() + dataset.nb_out_vars())
                .map(|v| dataset.universe(v))
                .collect(),
        }
    }

    /// The layout in force
    pub fn layout(&self) -> &GenomeLayout {
        &self.layout
    }

    /// Decode a genome pair into a fuzzy system
    pub fn decode(
        &self,
        memberships: &BitGenome,
        rules: &BitGenome,
    ) -> Result<FuzzySystem, GenomeError> {
        self.layout.check_memberships(memberships)?;
        self.layout.check_rules(rules)?;

        let in_vars = self.decode_input_variables(memberships);
        let out_vars = self.decode_output_variables(memberships);
        let rule_list = self.decode_rules(rules);
        let default_rules = self.decode_default_rules(rules);

        Ok(FuzzySystem::new(in_vars, out_vars, rule_list, default_rules))
    }

    fn decode_input_variables(&self, genome: &BitGenome) -> Vec<FuzzyVariable> {
        let l = &self.layout;
        (0..l.nb_in_vars)
            .map(|i| {
                let universe = self.universes[i];
                let mut var = FuzzyVariable::new_input(self.var_names[i].clone(), universe);
                for k in 0..l.nb_in_sets {
                    var.add_set(format!("MF {k}"), 0.0, k);
                }
                let step = pos_step(universe, l.in_sets_pos_code);
                let positions: Vec<f64> = (0..l.nb_in_sets)
                    .map(|k| {
                        let code = genome.slice_as_uint(l.in_pos_offset(i, k), l.in_sets_pos_code);
                        universe.min + code as f64 * step
                    })
                    .collect();
                var.assign_positions(positions);
                var
            })
            .collect()
    }

    fn decode_output_variables(&self, genome: &BitGenome) -> Vec<FuzzyVariable> {
        let l = &self.layout;
        (0..l.nb_out_vars)
            .map(|i| {
                let universe = self.universes[l.nb_in_vars + i];
                let mut var =
                    FuzzyVariable::new_output(self.var_names[l.nb_in_vars + i].clone(), universe);
                for k in 0..l.nb_out_sets {
                    var.add_set(format!("MF {k}"), 0.0, k);
                }
                let step = pos_step(universe, l.out_sets_pos_code);
                let positions: Vec<f64> = (0..l.nb_out_sets)
                    .map(|k| {
                        let code = genome.slice_as_uint(l.out_pos_offset(i, k), l.out_sets_pos_code);
                        universe.min + code as f64 * step
                    })
                    .collect();
                var.assign_positions(positions);
                var
            })
            .collect()
    }

    fn decode_rules(&self, genome: &BitGenome) -> Vec<FuzzyRule> {
        let l = &self.layout;
        (0..l.nb_rules)
            .map(|r| {
                let mut antecedents = Vec::with_capacity(l.nb_var_per_rule);
                for slot in 0..l.nb_var_per_rule {
                    let offset = l.antecedent_offset(r, slot);
                    let (var, set) = if l.fixed_vars {
                        (slot as u64, genome.slice_as_uint(offset, l.in_sets_code))
                    } else {
                        (
                            genome.slice_as_uint(offset, l.in_vars_code),
                            genome.slice_as_uint(offset + l.in_vars_code, l.in_sets_code),
                        )
                    };
                    // Out-of-range variable or set reads as don't care
                    if (var as usize) < l.nb_in_vars && (set as usize) < l.nb_in_sets {
                        antecedents.push(RulePair {
                            var: var as usize,
                            set: set as usize,
                        });
                    }
                }

                let mut consequents = Vec::with_capacity(l.nb_out_vars);
                for slot in 0..l.nb_out_vars {
                    let offset = l.consequent_offset(r, slot);
                    let (var, set) = if l.fixed_vars {
                        (slot as u64, genome.slice_as_uint(offset, l.out_sets_code))
                    } else {
                        (
                            genome.slice_as_uint(offset, l.out_vars_code),
                            genome.slice_as_uint(offset + l.out_vars_code, l.out_sets_code),
                        )
                    };
                    if (var as usize) < l.nb_out_vars {
                        let set = if (set as usize) < l.nb_out_sets { set as usize } else { 0 };
                        consequents.push(RulePair {
                            var: var as usize,
                            set,
                        });
                    }
                }

                FuzzyRule::new(antecedents, consequents)
            })
            .collect()
    }

    fn decode_default_rules(&self, genome: &BitGenome) -> Vec<usize> {
        let l = &self.layout;
        (0..l.nb_out_vars)
            .map(|i| {
                let value =
                    genome.slice_as_uint(l.default_rule_offset(i), l.out_sets_code) as usize;
                if value < l.nb_out_sets {
                    value
                } else {
                    0
                }
            })
            .collect()
    }
}

/// Position quantization step: the universe span divided by the largest
/// encodable code
fn pos_step(universe: Universe, code_size: usize) -> f64 {
    let levels = (1u64 << code_size) - 1;
    if levels == 0 {
        return 0.0;
    }
    universe.span() / levels as f64
}
