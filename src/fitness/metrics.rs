//! Metric accumulation
//!
//! One [`OutputTally`] accumulates the classification and regression
//! counters of a single output variable across all samples; `finish`
//! derives the per-output metrics, which the evaluator then averages
//! across outputs.

use serde::{Deserialize, Serialize};

/// Saturation boundary of the distance-to-threshold contribution
pub const ADM_SATURATION: f64 = 0.71428;

/// Firing-rate membership edges of the over-learn grader
const MF_FIRING_LOW: f64 = 0.1;
const MF_FIRING_HIGH: f64 = 0.5;

/// Winner-rate membership edges of the over-learn grader
const MF_WINNER_NEVER: f64 = 0.1;
const MF_WINNER_SOMETIME: f64 = 0.4;
const MF_WINNER_ALWAYS: f64 = 0.7;

/// Running counters for one output variable
#[derive(Clone, Debug)]
pub struct OutputTally {
    tp: usize,
    tn: usize,
    fp: usize,
    fn_: usize,
    /// Σ (predicted − actual)²
    sum_sq_error: f64,
    /// Σ ((predicted − actual) / mean(predicted, actual))²
    sum_rel_sq_error: f64,
    /// Σ |predicted − actual| / mean(predicted, actual)
    sum_abs_rel_error: f64,
    sum_dist_below: f64,
    sum_dist_above: f64,
    min_dist_below: f64,
    min_dist_above: f64,
}

impl Default for OutputTally {
    fn default() -> Self {
        Self {
            tp: 0,
            tn: 0,
            fp: 0,
            fn_: 0,
            sum_sq_error: 0.0,
            sum_rel_sq_error: 0.0,
            sum_abs_rel_error: 0.0,
            sum_dist_below: 0.0,
            sum_dist_above: 0.0,
            min_dist_below: f64::INFINITY,
            min_dist_above: f64::INFINITY,
        }
    }
}

impl OutputTally {
    /// Fold one sample into the counters
    ///
    /// `predicted` and `actual` are the defuzzified and expected raw
    /// values; `predicted_class` and `actual_class` their thresholded
    /// labels; `threshold` the classification threshold of this output.
    pub fn record(
        &mut self,
        predicted: f64,
        actual: f64,
        predicted_class: f64,
        actual_class: f64,
        threshold: f64,
    ) {
        let error = predicted - actual;
        if error != 0.0 {
            let mean = (predicted + actual) / 2.0;
            if mean != 0.0 {
                let rel = error / mean;
                self.sum_rel_sq_error += rel * rel;
                self.sum_abs_rel_error += rel.abs();
            }
            self.sum_sq_error += error * error;
        }

        if predicted_class == actual_class && actual_class == 0.0 {
            // Correct, below threshold
            self.tn += 1;
            let dist = (threshold - predicted) / (threshold - actual);
            self.sum_dist_below += adm_contribution(dist);
            if dist < self.min_dist_below {
                self.min_dist_below = dist;
            }
        } else if predicted_class == actual_class && actual_class == 1.0 {
            // Correct, above threshold
            self.tp += 1;
            let dist = (predicted - threshold) / (actual - threshold);
            self.sum_dist_above += adm_contribution(dist);
            if dist < self.min_dist_above {
                self.min_dist_above = dist;
            }
        } else if predicted_class != actual_class && actual_class == 0.0 {
            self.fp += 1;
        } else if predicted_class != actual_class && actual_class == 1.0 {
            self.fn_ += 1;
        }
    }

    /// Derive the per-output metrics
    pub fn finish(&self, nb_samples: usize) -> OutputMetrics {
        let n = nb_samples as f64;
        let ratio = |num: usize, den: usize| {
            if den > 0 {
                num as f64 / den as f64
            } else {
                0.0
            }
        };

        let negatives = self.tn + self.fp;
        let positives = self.tp + self.fn_;
        let adm_below = if negatives > 0 {
            self.sum_dist_below / negatives as f64
        } else {
            0.0
        };
        let adm_above = if positives > 0 {
            self.sum_dist_above / positives as f64
        } else {
            0.0
        };

        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };

        OutputMetrics {
            sensitivity: ratio(self.tp, self.tp + self.fn_),
            specificity: ratio(self.tn, self.tn + self.fp),
            accuracy: ratio(self.tp + self.tn, self.tp + self.tn + self.fp + self.fn_),
            ppv: ratio(self.tp, self.tp + self.fp),
            rmse: (self.sum_sq_error / n).sqrt(),
            rrse: (self.sum_rel_sq_error / n).sqrt(),
            rae: self.sum_abs_rel_error / n,
            mse: self.sum_sq_error / n,
            adm: (adm_below + adm_above) / 2.0,
            mdm: (finite_or_zero(self.min_dist_below) + finite_or_zero(self.min_dist_above)) / 2.0,
        }
    }
}

/// Per-output derived metrics
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMetrics {
    pub sensitivity: f64,
    pub specificity: f64,
    pub accuracy: f64,
    pub ppv: f64,
    pub rmse: f64,
    pub rrse: f64,
    pub rae: f64,
    pub mse: f64,
    pub adm: f64,
    pub mdm: f64,
}

/// All criteria of one evaluated system, averaged across outputs
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessMetrics {
    pub sensitivity: f64,
    pub specificity: f64,
    pub accuracy: f64,
    pub ppv: f64,
    pub rmse: f64,
    pub rrse: f64,
    pub rae: f64,
    pub mse: f64,
    pub adm: f64,
    pub mdm: f64,
    /// Size criterion: 1 / Σ antecedents, higher for leaner rule bases
    pub size: f64,
    /// Over-learn criterion: minimum rule generality grade
    pub over_learn: f64,
}

impl FitnessMetrics {
    /// Average per-output metrics and attach the global criteria
    pub fn from_outputs(outputs: &[OutputMetrics], size: f64, over_learn: f64) -> Self {
        let n = outputs.len().max(1) as f64;
        let mean = |f: fn(&OutputMetrics) -> f64| outputs.iter().map(f).sum::<f64>() / n;
        Self {
            sensitivity: mean(|m| m.sensitivity),
            specificity: mean(|m| m.specificity),
            accuracy: mean(|m| m.accuracy),
            ppv: mean(|m| m.ppv),
            rmse: mean(|m| m.rmse),
            rrse: mean(|m| m.rrse),
            rae: mean(|m| m.rae),
            mse: mean(|m| m.mse),
            adm: mean(|m| m.adm),
            mdm: mean(|m| m.mdm),
            size,
            over_learn,
        }
    }
}

/// Distance-to-threshold contribution of one correctly classified sample
///
/// Saturates at 1.0 from `d >= 0.71428`; below that the smooth shape
/// `d (2.8 − 1.96 d)` rewards predictions that sit clear of the
/// threshold without overshooting.
pub fn adm_contribution(dist: f64) -> f64 {
    if dist >= ADM_SATURATION {
        1.0
    } else {
        dist * (2.8 - 1.96 * dist)
    }
}

/// Generality grade of one rule from its firing and winner rates
///
/// Firing has two memberships (low/high, edges 0.1/0.5); the winner rate
/// has three (never/sometime/always, edges 0.1/0.4/0.7). The graded
/// conclusions {high → 1.0, low∧never → 0.7, low∧sometime → 0.3,
/// low∧always → 0.0} are combined by truth-weighted average. Rules that
/// fire often grade 1.0; rules that fire rarely but always dominate when
/// they do grade 0.0.
pub fn rule_generality_grade(firing_rate: f64, winner_rate: f64) -> f64 {
    let firing_high = ramp_up(firing_rate, MF_FIRING_LOW, MF_FIRING_HIGH);
    let firing_low = ramp_down(firing_rate, MF_FIRING_LOW, MF_FIRING_HIGH);

    let winner_never = ramp_down(winner_rate, MF_WINNER_NEVER, MF_WINNER_SOMETIME);
    let winner_always = ramp_up(winner_rate, MF_WINNER_SOMETIME, MF_WINNER_ALWAYS);
    let winner_sometime = triangle(
        winner_rate,
        MF_WINNER_NEVER,
        MF_WINNER_SOMETIME,
        MF_WINNER_ALWAYS,
    );

    let truth = [
        firing_high,
        firing_low.min(winner_never),
        firing_low.min(winner_sometime),
        firing_low.min(winner_always),
    ];
    let weighted = truth[0] * 1.0 + truth[1] * 0.7 + truth[2] * 0.3;
    let total: f64 = truth.iter().sum();
    if total <= 0.0 {
        1.0
    } else {
        weighted / total
    }
}

fn ramp_up(x: f64, lo: f64, hi: f64) -> f64 {
    if x <= lo {
        0.0
    } else if x >= hi {
        1.0
    } else {
        (x - lo) / (hi - lo)
    }
}

fn ramp_down(x: f64, lo: f64, hi: f64) -> f64 {
    1.0 - ramp_up(x, lo, hi)
}

fn triangle(x: f64, left: f64, peak: f64, right: f64) -> f64 {
    if x <= left || x >= right {
        0.0
    } else if x <= peak {
        (x - left) / (peak - left)
    } else {
        (right - x) / (right - peak)
    }
}
