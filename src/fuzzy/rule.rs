//! Fuzzy rules
//!
//! A rule pairs antecedent (input variable, set) references with
//! consequent (output variable, set) references. Firing strength is the
//! minimum of the antecedent memberships; a missing input contributes 0
//! and suppresses the rule for that sample.

use serde::{Deserialize, Serialize};

use crate::fuzzy::variable::FuzzyVariable;

/// A (variable index, set index) reference inside a rule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePair {
    pub var: usize,
    pub set: usize,
}

/// One fuzzy rule
///
/// A rule whose antecedent list is empty after don't-care filtering is
/// retained but never fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuzzyRule {
    antecedents: Vec<RulePair>,
    consequents: Vec<RulePair>,
}

impl FuzzyRule {
    /// Create a rule from its antecedent and consequent pairs
    pub fn new(antecedents: Vec<RulePair>, consequents: Vec<RulePair>) -> Self {
        Self {
            antecedents,
            consequents,
        }
    }

    /// Antecedent pairs
    pub fn antecedents(&self) -> &[RulePair] {
        &self.antecedents
    }

    /// Consequent pairs
    pub fn consequents(&self) -> &[RulePair] {
        &self.consequents
    }

    /// Number of active antecedents (the Size criterion counts these)
    pub fn nb_antecedents(&self) -> usize {
        self.antecedents.len()
    }

    /// Firing strength against the current memberships: the minimum over
    /// all antecedents, 0.0 for an empty rule
    pub fn firing_strength(&self, in_vars: &[FuzzyVariable]) -> f64 {
        if self.antecedents.is_empty() {
            return 0.0;
        }
        self.antecedents
            .iter()
            .map(|pair| in_vars[pair.var].set(pair.set).eval())
            .fold(f64::INFINITY, f64::min)
    }

    /// Human-readable rule text, e.g. `IF x is MF 1 AND y is MF 0 THEN z is MF 1`
    pub fn description(&self, in_vars: &[FuzzyVariable], out_vars: &[FuzzyVariable]) -> String {
        if self.antecedents.is_empty() {
            return String::from("(empty rule)");
        }
        let ifs: Vec<String> = self
            .antecedents
            .iter()
            .map(|p| {
                format!(
                    "{} is {}",
                    in_vars[p.var].name(),
                    in_vars[p.var].set(p.set).name()
                )
            })
            .collect();
        let thens: Vec<String> = self
            .consequents
            .iter()
            .map(|p| {
                format!(
                    "{} is {}",
                    out_vars[p.var].name(),
                    out_vars[p.var].set(p.set).name()
                )
            })
            .collect();
        format!("IF {} THEN {}", ifs.join(" AND "), thens.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Universe;

    fn in_vars() -> Vec<FuzzyVariable> {
        let mut a = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 10.0 });
        a.add_set("MF 0", 2.0, 0);
        a.add_set("MF 1", 8.0, 1);
        let mut b = FuzzyVariable::new_input("y", Universe { min: 0.0, max: 10.0 });
        b.add_set("MF 0", 3.0, 0);
        b.add_set("MF 1", 7.0, 1);
        vec![a, b]
    }

    #[test]
    fn test_firing_strength_is_min() {
        let mut vars = in_vars();
        vars[0].evaluate(8.0); // MF 1 of x: 1.0
        vars[1].evaluate(5.0); // MF 1 of y: 0.5
        let rule = FuzzyRule::new(
            vec![RulePair { var: 0, set: 1 }, RulePair { var: 1, set: 1 }],
            vec![RulePair { var: 0, set: 0 }],
        );
        assert!((rule.firing_strength(&vars) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_variable_suppresses_rule() {
        let mut vars = in_vars();
        vars[0].evaluate(8.0);
        vars[1].set_missing();
        let rule = FuzzyRule::new(
            vec![RulePair { var: 0, set: 1 }, RulePair { var: 1, set: 0 }],
            vec![RulePair { var: 0, set: 0 }],
        );
        assert_eq!(rule.firing_strength(&vars), 0.0);
    }

    #[test]
    fn test_empty_rule_never_fires() {
        let vars = in_vars();
        let rule = FuzzyRule::new(vec![], vec![RulePair { var: 0, set: 0 }]);
        assert_eq!(rule.firing_strength(&vars), 0.0);
        assert_eq!(rule.nb_antecedents(), 0);
    }

    #[test]
    fn test_description() {
        let in_vars = in_vars();
        let mut out = FuzzyVariable::new_output("z", Universe { min: 0.0, max: 1.0 });
        out.add_set("MF 0", 0.0, 0);
        out.add_set("MF 1", 1.0, 1);
        let rule = FuzzyRule::new(
            vec![RulePair { var: 0, set: 1 }],
            vec![RulePair { var: 0, set: 1 }],
        );
        assert_eq!(
            rule.description(&in_vars, &[out]),
            "IF x is MF 1 THEN z is MF 1"
        );
    }
}
