//! Fuzzy variables
//!
//! An input variable carries an ordered list of coco (triangular,
//! overlapping) sets and evaluates sample values into memberships. An
//! output variable carries singleton sets whose accumulators are filled
//! during rule firing and reduced by defuzzification.

use serde::{Deserialize, Serialize};

use crate::dataset::Universe;
use crate::fuzzy::set::FuzzySet;

/// Kind of a fuzzy variable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    /// Input: coco membership functions
    Input,
    /// Output: singleton spikes
    Output,
}

/// A linguistic variable with its ordered sets
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FuzzyVariable {
    name: String,
    kind: VariableKind,
    universe: Universe,
    sets: Vec<FuzzySet>,
    /// True when at least one active rule references this variable
    #[serde(skip)]
    used_by_system: bool,
    /// Per-sample transient: the current input value
    #[serde(skip)]
    input_value: Option<f64>,
    /// Per-sample transient: the current cell failed to parse
    #[serde(skip)]
    missing: bool,
}

impl FuzzyVariable {
    /// Create an input (coco) variable
    pub fn new_input(name: impl Into<String>, universe: Universe) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Input,
            universe,
            sets: Vec::new(),
            used_by_system: false,
            input_value: None,
            missing: false,
        }
    }

    /// Create an output (singleton) variable
    pub fn new_output(name: impl Into<String>, universe: Universe) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Output,
            universe,
            sets: Vec::new(),
            used_by_system: false,
            input_value: None,
            missing: false,
        }
    }

    /// Variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable kind
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Universe of discourse
    pub fn universe(&self) -> Universe {
        self.universe
    }

    /// Append a set in insertion order
    pub fn add_set(&mut self, name: impl Into<String>, position: f64, index: usize) {
        self.sets.push(FuzzySet::new(name, position, index));
    }

    /// Number of sets
    pub fn nb_sets(&self) -> usize {
        self.sets.len()
    }

    /// Borrow the sets
    pub fn sets(&self) -> &[FuzzySet] {
        &self.sets
    }

    /// Borrow one set
    pub fn set(&self, index: usize) -> &FuzzySet {
        &self.sets[index]
    }

    /// Mutably borrow one set
    pub fn set_mut(&mut self, index: usize) -> &mut FuzzySet {
        &mut self.sets[index]
    }

    /// Find a set index by name
    pub fn set_index_by_name(&self, name: &str) -> Option<usize> {
        self.sets.iter().position(|s| s.name() == name)
    }

    /// Assign sorted positions to the sets in order
    ///
    /// The genome encodes a multiset of positions, not an ordered list;
    /// `positions` is sorted ascending here before assignment, so set `k`
    /// always ends up left of set `k + 1`.
    pub fn assign_positions(&mut self, mut positions: Vec<f64>) {
        debug_assert_eq!(positions.len(), self.sets.len());
        positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for (set, position) in self.sets.iter_mut().zip(positions) {
            set.set_position(position);
        }
    }

    /// Reorder existing sets so positions are nondecreasing
    pub fn sort_by_position(&mut self) {
        self.sets.sort_by(|a, b| {
            a.position()
                .partial_cmp(&b.position())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Whether an active rule references this variable
    pub fn is_used_by_system(&self) -> bool {
        self.used_by_system
    }

    /// Mark or unmark the variable as referenced by the rules
    pub fn set_used_by_system(&mut self, used: bool) {
        self.used_by_system = used;
    }

    /// Whether the current sample's value is missing
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Record the current sample's input value
    pub fn set_input_value(&mut self, value: f64) {
        self.input_value = Some(value);
        self.missing = false;
    }

    /// Flag the current sample's value as missing; memberships stay zero
    pub fn set_missing(&mut self) {
        self.input_value = None;
        self.missing = true;
    }

    /// Reset all per-sample state
    pub fn clear_eval(&mut self) {
        for set in &mut self.sets {
            set.clear_eval();
        }
        self.input_value = None;
        self.missing = false;
    }

    /// Fill each set's membership for the value `x`
    ///
    /// Coco membership of set `k` is the triangle peaking at its position
    /// with the base reaching the neighbor positions; the edge sets hold
    /// membership 1.0 all the way to their side of the universe.
    pub fn evaluate(&mut self, x: f64) {
        self.set_input_value(x);
        let positions: Vec<f64> = self.sets.iter().map(FuzzySet::position).collect();
        for (k, set) in self.sets.iter_mut().enumerate() {
            set.set_eval(coco_membership(&positions, k, x));
        }
    }

    /// Reduce the output accumulators to a crisp value
    ///
    /// Singleton variables take the eval-weighted mean of set positions;
    /// coco variables take the centroid of the clipped membership surface
    /// sampled at `resolution` points. Returns `None` when the surface is
    /// flat zero (a degenerate system).
    pub fn defuzz(&self, resolution: usize) -> Option<f64> {
        match self.kind {
            VariableKind::Output => {
                let total: f64 = self.sets.iter().map(FuzzySet::eval).sum();
                if total <= 0.0 {
                    return None;
                }
                let weighted: f64 = self
                    .sets
                    .iter()
                    .map(|s| s.eval() * s.position())
                    .sum();
                Some(weighted / total)
            }
            VariableKind::Input => {
                let positions: Vec<f64> = self.sets.iter().map(FuzzySet::position).collect();
                let span = self.universe.span();
                let steps = resolution.max(2);
                let mut num = 0.0;
                let mut den = 0.0;
                for i in 0..steps {
                    let x = self.universe.min + span * i as f64 / (steps - 1) as f64;
                    let mu = self
                        .sets
                        .iter()
                        .enumerate()
                        .map(|(k, s)| s.eval().min(coco_membership(&positions, k, x)))
                        .fold(0.0f64, f64::max);
                    num += x * mu;
                    den += mu;
                }
                if den <= 0.0 {
                    return None;
                }
                Some(num / den)
            }
        }
    }
}

/// Triangle membership of set `k` at `x`, shoulders at the neighbor
/// positions, clamped at the universe ends
fn coco_membership(positions: &[f64], k: usize, x: f64) -> f64 {
    let peak = positions[k];
    if x == peak {
        return 1.0;
    }
    if x < peak {
        if k == 0 {
            return 1.0;
        }
        let left = positions[k - 1];
        if x <= left || peak - left <= 0.0 {
            return 0.0;
        }
        (x - left) / (peak - left)
    } else {
        if k == positions.len() - 1 {
            return 1.0;
        }
        let right = positions[k + 1];
        if x >= right || right - peak <= 0.0 {
            return 0.0;
        }
        (right - x) / (right - peak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_var(positions: &[f64]) -> FuzzyVariable {
        let mut var = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 10.0 });
        for (i, &p) in positions.iter().enumerate() {
            var.add_set(format!("MF {i}"), p, i);
        }
        var
    }

    #[test]
    fn test_coco_membership_at_peaks() {
        let mut var = input_var(&[2.0, 5.0, 8.0]);
        var.evaluate(5.0);
        assert_eq!(var.set(0).eval(), 0.0);
        assert_eq!(var.set(1).eval(), 1.0);
        assert_eq!(var.set(2).eval(), 0.0);
    }

    #[test]
    fn test_coco_membership_between_peaks() {
        let mut var = input_var(&[2.0, 5.0, 8.0]);
        var.evaluate(3.5);
        assert!((var.set(0).eval() - 0.5).abs() < 1e-12);
        assert!((var.set(1).eval() - 0.5).abs() < 1e-12);
        assert_eq!(var.set(2).eval(), 0.0);
    }

    #[test]
    fn test_coco_membership_edge_shoulders() {
        let mut var = input_var(&[2.0, 5.0, 8.0]);
        var.evaluate(0.5);
        assert_eq!(var.set(0).eval(), 1.0);
        var.evaluate(9.5);
        assert_eq!(var.set(2).eval(), 1.0);
    }

    #[test]
    fn test_coco_membership_collapsed_positions() {
        let mut var = input_var(&[4.0, 4.0, 4.0]);
        var.evaluate(4.0);
        assert_eq!(var.set(0).eval(), 1.0);
        assert_eq!(var.set(1).eval(), 1.0);
        assert_eq!(var.set(2).eval(), 1.0);
        var.evaluate(6.0);
        // Only the rightmost shoulder reaches past the collapsed peak
        assert_eq!(var.set(2).eval(), 1.0);
        assert_eq!(var.set(1).eval(), 0.0);
    }

    #[test]
    fn test_assign_positions_sorts() {
        let mut var = input_var(&[0.0, 0.0, 0.0]);
        var.assign_positions(vec![7.0, 1.0, 4.0]);
        assert_eq!(var.set(0).position(), 1.0);
        assert_eq!(var.set(1).position(), 4.0);
        assert_eq!(var.set(2).position(), 7.0);
    }

    #[test]
    fn test_singleton_defuzz_weighted_mean() {
        let mut var = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 1.0 });
        var.add_set("MF 0", 0.0, 0);
        var.add_set("MF 1", 1.0, 1);
        var.set_mut(0).set_eval(1.0);
        var.set_mut(1).set_eval(3.0);
        assert!((var.defuzz(100).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_singleton_defuzz_single_active_set() {
        let mut var = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 1.0 });
        var.add_set("MF 0", 0.2, 0);
        var.add_set("MF 1", 0.9, 1);
        var.set_mut(1).set_eval(1.0);
        assert_eq!(var.defuzz(100).unwrap(), 0.9);
    }

    #[test]
    fn test_defuzz_flat_zero_is_degenerate() {
        let mut var = FuzzyVariable::new_output("y", Universe { min: 0.0, max: 1.0 });
        var.add_set("MF 0", 0.2, 0);
        assert!(var.defuzz(100).is_none());
    }

    #[test]
    fn test_missing_value_keeps_memberships_zero() {
        let mut var = input_var(&[2.0, 5.0, 8.0]);
        var.set_missing();
        assert!(var.is_missing());
        assert!(var.sets().iter().all(|s| s.eval() == 0.0));
    }

    #[test]
    fn test_clear_eval_resets_state() {
        let mut var = input_var(&[2.0, 5.0, 8.0]);
        var.evaluate(3.0);
        var.clear_eval();
        assert!(!var.is_missing());
        assert!(var.sets().iter().all(|s| s.eval() == 0.0));
    }

    #[test]
    fn test_sort_by_position_reorders_sets() {
        let mut var = FuzzyVariable::new_input("x", Universe { min: 0.0, max: 1.0 });
        var.add_set("high", 0.9, 0);
        var.add_set("low", 0.1, 1);
        var.sort_by_position();
        assert_eq!(var.set(0).name(), "low");
        assert_eq!(var.set(1).name(), "high");
    }
}
