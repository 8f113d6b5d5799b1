//! Genome bit layouts
//!
//! Both populations share the [`BitGenome`](super::bit_genome::BitGenome)
//! representation; what differs is the interpretation. This module holds
//! the offset arithmetic for the two encodings:
//!
//! - **Memberships**: one position code per set, input variables first,
//!   then output variables.
//! - **Rules**: `nb_rules` consecutive rule blocks (antecedent pairs then
//!   consequent pairs), followed by one default-rule set code per output
//!   variable. In fixed-vars mode the variable codes are omitted and slot
//!   `k` implicitly addresses variable `k`.

use serde::{Deserialize, Serialize};

use crate::config::SystemParameters;
use crate::error::GenomeError;
use crate::genome::bit_genome::BitGenome;

/// Bit-offset arithmetic for the memberships and rules encodings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeLayout {
    /// Number of input variables (taken from the dataset)
    pub nb_in_vars: usize,
    /// Number of output variables
    pub nb_out_vars: usize,
    /// Number of rules
    pub nb_rules: usize,
    /// Maximum antecedent slots per rule
    pub nb_var_per_rule: usize,
    /// Sets per input variable
    pub nb_in_sets: usize,
    /// Sets per output variable
    pub nb_out_sets: usize,
    /// Bits per input-variable index
    pub in_vars_code: usize,
    /// Bits per output-variable index
    pub out_vars_code: usize,
    /// Bits per input-set index
    pub in_sets_code: usize,
    /// Bits per output-set index
    pub out_sets_code: usize,
    /// Bits per input-set position
    pub in_sets_pos_code: usize,
    /// Bits per output-set position
    pub out_sets_pos_code: usize,
    /// Fixed-vars mode: antecedent slot k addresses variable k
    pub fixed_vars: bool,
}

impl GenomeLayout {
    /// Build the layout from the structural parameters and the dataset's
    /// input-variable count
    pub fn new(params: &SystemParameters, nb_in_vars: usize) -> Self {
        Self {
            nb_in_vars,
            nb_out_vars: params.nb_out_vars,
            nb_rules: params.nb_rules,
            nb_var_per_rule: params.nb_var_per_rule,
            nb_in_sets: params.nb_in_sets,
            nb_out_sets: params.nb_out_sets,
            in_vars_code: params.in_vars_code_size,
            out_vars_code: params.out_vars_code_size,
            in_sets_code: params.in_sets_code_size,
            out_sets_code: params.out_sets_code_size,
            in_sets_pos_code: params.in_sets_pos_code_size,
            out_sets_pos_code: params.out_sets_pos_code_size,
            fixed_vars: params.fixed_vars,
        }
    }

    /// Total length of a memberships genome in bits
    pub fn memberships_len(&self) -> usize {
        self.nb_in_vars * self.nb_in_sets * self.in_sets_pos_code
            + self.nb_out_vars * self.nb_out_sets * self.out_sets_pos_code
    }

    /// Length of one rule block in bits
    pub fn rule_len(&self) -> usize {
        if self.fixed_vars {
            self.nb_var_per_rule * self.in_sets_code + self.nb_out_vars * self.out_sets_code
        } else {
            self.nb_var_per_rule * (self.in_vars_code + self.in_sets_code)
                + self.nb_out_vars * (self.out_vars_code + self.out_sets_code)
        }
    }

    /// Length of the default-rules tail in bits
    pub fn default_rules_len(&self) -> usize {
        self.nb_out_vars * self.out_sets_code
    }

    /// Total length of a rules genome in bits
    pub fn rules_len(&self) -> usize {
        self.nb_rules * self.rule_len() + self.default_rules_len()
    }

    /// Offset of the position code for input variable `var`, set `set`
    pub fn in_pos_offset(&self, var: usize, set: usize) -> usize {
        (var * self.nb_in_sets + set) * self.in_sets_pos_code
    }

    /// Offset of the position code for output variable `var`, set `set`
    pub fn out_pos_offset(&self, var: usize, set: usize) -> usize {
        self.nb_in_vars * self.nb_in_sets * self.in_sets_pos_code
            + (var * self.nb_out_sets + set) * self.out_sets_pos_code
    }

    /// Offset of antecedent slot `slot` in rule `rule`
    ///
    /// In evolving-vars mode the field is a (variable, set) code pair; in
    /// fixed-vars mode only the set code is stored.
    pub fn antecedent_offset(&self, rule: usize, slot: usize) -> usize {
        let width = if self.fixed_vars {
            self.in_sets_code
        } else {
            self.in_vars_code + self.in_sets_code
        };
        rule * self.rule_len() + slot * width
    }

    /// Offset of consequent slot `slot` in rule `rule`
    pub fn consequent_offset(&self, rule: usize, slot: usize) -> usize {
        let (in_width, out_width) = if self.fixed_vars {
            (self.in_sets_code, self.out_sets_code)
        } else {
            (
                self.in_vars_code + self.in_sets_code,
                self.out_vars_code + self.out_sets_code,
            )
        };
        rule * self.rule_len() + self.nb_var_per_rule * in_width + slot * out_width
    }

    /// Offset of the default-rule set code for output variable `var`
    pub fn default_rule_offset(&self, var: usize) -> usize {
        self.nb_rules * self.rule_len() + var * self.out_sets_code
    }

    /// Check a memberships genome against this layout
    pub fn check_memberships(&self, genome: &BitGenome) -> Result<(), GenomeError> {
        if genome.len() != self.memberships_len() {
            return Err(GenomeError::LengthMismatch {
                expected: self.memberships_len(),
                actual: genome.len(),
            });
        }
        Ok(())
    }

    /// Check a rules genome against this layout
    pub fn check_rules(&self, genome: &BitGenome) -> Result<(), GenomeError> {
        if genome.len() != self.rules_len() {
            return Err(GenomeError::LengthMismatch {
                expected: self.rules_len(),
                actual: genome.len(),
            });
        }
        Ok(())
    }
}
