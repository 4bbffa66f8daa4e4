//! Order statistics for simulation outputs.

use serde::{Deserialize, Serialize};

/// Sort a copy of `values` ascending. NaNs sort last.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Percentile `q` (0–100) of an ascending slice, linearly interpolated
/// between closest ranks. Empty input yields 0.0.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Fraction of values strictly above `threshold`.
pub fn fraction_above(values: &[f64], threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v > threshold).count() as f64 / values.len() as f64
}

/// Distribution summary reported for every stochastic output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub mean:   f64,
    pub std:    f64,
    pub median: f64,
    pub ci95:   (f64, f64),
    pub ci50:   (f64, f64),
    pub p10:    f64,
    pub p90:    f64,
}

impl Summary {
    pub fn from_values(values: &[f64]) -> Self {
        let s = sorted(values);
        Self {
            mean:   mean(values),
            std:    std_dev(values),
            median: percentile(&s, 50.0),
            ci95:   (percentile(&s, 2.5), percentile(&s, 97.5)),
            ci50:   (percentile(&s, 25.0), percentile(&s, 75.0)),
            p10:    percentile(&s, 10.0),
            p90:    percentile(&s, 90.0),
        }
    }
}
