//! Assembled fuzzy system
//!
//! A complete inference system: input variables, output variables, rules
//! and the per-output default rules. One sample flows through
//! fuzzification, rule firing, default-rule injection and centroid
//! defuzzification.

use serde::{Deserialize, Serialize};

use crate::error::FuzzyError;
use crate::fuzzy::rule::FuzzyRule;
use crate::fuzzy::variable::FuzzyVariable;

/// Sampling resolution of the defuzzification grid
pub const DEFUZZ_RESOLUTION: usize = 100;

/// Result of pushing one sample through the system
#[derive(Clone, Debug, PartialEq)]
pub struct SampleEvaluation {
    /// Defuzzified value per output variable
    pub outputs: Vec<f64>,
    /// Firing strength per rule, in rule order
    pub rule_firings: Vec<f64>,
}

/// A fully loaded fuzzy inference system
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FuzzySystem {
    in_vars: Vec<FuzzyVariable>,
    out_vars: Vec<FuzzyVariable>,
    rules: Vec<FuzzyRule>,
    /// Default output set per output variable
    default_rules: Vec<usize>,
}

impl FuzzySystem {
    /// Assemble a system from its parts
    ///
    /// Recomputes the `used_by_system` flags from the rules.
    pub fn new(
        in_vars: Vec<FuzzyVariable>,
        out_vars: Vec<FuzzyVariable>,
        rules: Vec<FuzzyRule>,
        default_rules: Vec<usize>,
    ) -> Self {
        let mut system = Self {
            in_vars,
            out_vars,
            rules,
            default_rules,
        };
        system.mark_used_variables();
        system
    }

    /// Input variables
    pub fn in_vars(&self) -> &[FuzzyVariable] {
        &self.in_vars
    }

    /// Output variables
    pub fn out_vars(&self) -> &[FuzzyVariable] {
        &self.out_vars
    }

    /// Rules in genome order
    pub fn rules(&self) -> &[FuzzyRule] {
        &self.rules
    }

    /// Default output set per output variable
    pub fn default_rules(&self) -> &[usize] {
        &self.default_rules
    }

    /// Recompute `used_by_system` on the input variables from the rules
    pub fn mark_used_variables(&mut self) {
        for var in &mut self.in_vars {
            var.set_used_by_system(false);
        }
        for rule in &self.rules {
            for pair in rule.antecedents() {
                self.in_vars[pair.var].set_used_by_system(true);
            }
        }
    }

    /// Evaluate one sample
    ///
    /// `inputs` holds one cell per input variable; `None` marks a missing
    /// value, which zeroes that variable's memberships and so suppresses
    /// every rule referencing it.
    pub fn evaluate_sample(
        &mut self,
        inputs: &[Option<f64>],
    ) -> Result<SampleEvaluation, FuzzyError> {
        // Clear previous per-sample state
        for var in &mut self.out_vars {
            var.clear_eval();
        }
        let mut max_fired = vec![0.0f64; self.out_vars.len()];

        // Fuzzify the inputs the rules actually use
        for (i, var) in self.in_vars.iter_mut().enumerate() {
            var.clear_eval();
            if !var.is_used_by_system() {
                continue;
            }
            match inputs[i] {
                Some(value) => var.evaluate(value),
                None => var.set_missing(),
            }
        }

        // Fire the rules, accumulating into the output sets
        let mut rule_firings = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let firing = rule.firing_strength(&self.in_vars);
            rule_firings.push(firing);
            for pair in rule.consequents() {
                self.out_vars[pair.var].set_mut(pair.set).accumulate_max(firing);
                if firing > max_fired[pair.var] {
                    max_fired[pair.var] = firing;
                }
            }
        }

        // Default rule: whatever the rules left unexplained
        for (i, var) in self.out_vars.iter_mut().enumerate() {
            if self.default_rules[i] < var.nb_sets() {
                var.set_mut(self.default_rules[i])
                    .accumulate_max(1.0 - max_fired[i]);
            }
        }

        // Defuzzify
        let mut outputs = Vec::with_capacity(self.out_vars.len());
        for (i, var) in self.out_vars.iter().enumerate() {
            let value = var
                .defuzz(DEFUZZ_RESOLUTION)
                .ok_or(FuzzyError::DegenerateSystem(i))?;
            outputs.push(value);
        }

        Ok(SampleEvaluation {
            outputs,
            rule_firings,
        })
    }

    /// Human-readable description: rules, default rule, membership layout
    pub fn describe(&self) -> String {
        let mut text = String::new();
        for rule in &self.rules {
            text.push_str(&rule.description(&self.in_vars, &self.out_vars));
            text.push('\n');
        }
        text.push_str("ELSE :");
        for (i, var) in self.out_vars.iter().enumerate() {
            text.push_str(&format!(" {} is {}", var.name(), self.default_rules[i]));
        }
        text.push_str("\n\nMembership functions :\n");
        for var in self.in_vars.iter().filter(|v| v.is_used_by_system()) {
            let positions: Vec<String> = var
                .sets()
                .iter()
                .map(|s| format!("{}", s.position()))
                .collect();
            text.push_str(&format!("{} ({}) ; ", var.name(), positions.join(" , ")));
        }
        for (i, var) in self.out_vars.iter().enumerate() {
            let positions: Vec<String> = var
                .sets()
                .iter()
                .map(|s| format!("{}", s.position()))
                .collect();
            text.push_str(&format!("{} ({})", var.name(), positions.join(" , ")));
            text.push_str(if i == self.out_vars.len() - 1 { "\n" } else { " ; " });
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Universe;
    use crate::fuzzy::rule::RulePair;

    /// One input (sets at 0 and 1), one output (singletons at 0 and 1),
    /// single rule "if x is high then y is high", default set 0.
    fn identity_system() -> FuzzySystem {
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
        FuzzySystem::new(vec![x], vec![y], vec![rule], vec![0])
    }

    #[test]
    fn test_identity_rule_high_input() {
        let mut system = identity_system();
        let eval = system.evaluate_sample(&[Some(1.0)]).unwrap();
        // Rule fires at 1.0 into MF 1; default contributes 0 to MF 0
        assert!((eval.outputs[0] - 1.0).abs() < 1e-12);
        assert_eq!(eval.rule_firings, vec![1.0]);
    }

    #[test]
    fn test_identity_rule_low_input() {
        let mut system = identity_system();
        let eval = system.evaluate_sample(&[Some(0.0)]).unwrap();
        // Rule fires at 0; default rule puts 1.0 on MF 0 at position 0
        assert!((eval.outputs[0] - 0.0).abs() < 1e-12);
        assert_eq!(eval.rule_firings, vec![0.0]);
    }

    #[test]
    fn test_default_rule_fills_unfired_output() {
        let mut x = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 1.0 });
        x.add_set("MF 0", 0.0, 0);
        x.add_set("MF 1", 1.0, 1);
        let mut y = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 4.0 });
        y.add_set("MF 0", 1.0, 0);
        y.add_set("MF 1", 3.0, 1);
        let rule = FuzzyRule::new(
            vec![RulePair { var: 0, set: 1 }],
            vec![RulePair { var: 0, set: 0 }],
        );
        // Default set is MF 1 at position 3.0
        let mut system = FuzzySystem::new(vec![x], vec![y], vec![rule], vec![1]);
        let eval = system.evaluate_sample(&[Some(0.0)]).unwrap();
        // No rule fired: the default set gets evaluation 1.0 and the
        // defuzzified value is exactly its position
        assert!((eval.outputs[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_firing_blends_with_default() {
        let mut system = identity_system();
        let eval = system.evaluate_sample(&[Some(0.75)]).unwrap();
        // Rule fires 0.75 into MF 1 (pos 1); default adds 0.25 to MF 0 (pos 0)
        let expected = (0.75 * 1.0 + 0.25 * 0.0) / (0.75 + 0.25);
        assert!((eval.outputs[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_input_falls_back_to_default() {
        let mut system = identity_system();
        let eval = system.evaluate_sample(&[None]).unwrap();
        assert_eq!(eval.rule_firings, vec![0.0]);
        assert!((eval.outputs[0] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_used_flags_recomputed() {
        let system = identity_system();
        assert!(system.in_vars()[0].is_used_by_system());

        let mut x = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 1.0 });
        x.add_set("MF 0", 0.0, 0);
        let mut y = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 1.0 });
        y.add_set("MF 0", 0.0, 0);
        let empty = FuzzyRule::new(vec![], vec![RulePair { var: 0, set: 0 }]);
        let system = FuzzySystem::new(vec![x], vec![y], vec![empty], vec![0]);
        assert!(!system.in_vars()[0].is_used_by_system());
    }

    #[test]
    fn test_describe_contains_rules_and_defaults() {
        let system = identity_system();
        let text = system.describe();
        assert!(text.contains("IF x is MF 1 THEN y is MF 1"));
        assert!(text.contains("ELSE : y is 0"));
        assert!(text.contains("Membership functions :"));
    }
}
