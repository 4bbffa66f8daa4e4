//! Hazard-ratio distributions handed to the core by intervention definitions.
//!
//! Serialized with an explicit `type` tag:
//!   {"type": "lognormal", "log_mean": -0.22, "log_sd": 0.08}

use crate::error::{SimError, SimResult};
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};

/// z-score of a two-sided 95% interval.
const Z_95: f64 = 1.959_963_984_540_054;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HazardDistribution {
    Point { value: f64 },
    Normal { mean: f64, sd: f64 },
    LogNormal { log_mean: f64, log_sd: f64 },
    Beta { alpha: f64, beta: f64 },
    Uniform {
        #[serde(alias = "min")]
        low:  f64,
        #[serde(alias = "max")]
        high: f64,
    },
}

impl HazardDistribution {
    /// Lognormal matching a reported point estimate and 95% CI, the way
    /// meta-analyses publish hazard ratios.
    pub fn lognormal_from_ci(point: f64, lower: f64, upper: f64) -> SimResult<Self> {
        if !(point > 0.0 && lower > 0.0 && upper > lower) {
            return Err(SimError::InvalidDistribution {
                distribution: "lognormal",
                reason:       format!("need 0 < lower < upper and point > 0, got {point} ({lower}, {upper})"),
            });
        }
        Ok(Self::LogNormal {
            log_mean: point.ln(),
            log_sd:   (upper.ln() - lower.ln()) / (2.0 * Z_95),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point { .. } => "point",
            Self::Normal { .. } => "normal",
            Self::LogNormal { .. } => "lognormal",
            Self::Beta { .. } => "beta",
            Self::Uniform { .. } => "uniform",
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        let fail = |reason: String| -> SimResult<()> {
            Err(SimError::InvalidDistribution { distribution: self.kind(), reason })
        };
        match *self {
            Self::Point { value } if !value.is_finite() => fail(format!("value must be finite, got {value}")),
            Self::Normal { mean, sd } if !mean.is_finite() || !(sd > 0.0 && sd.is_finite()) => {
                fail(format!("need finite mean and sd > 0, got mean={mean} sd={sd}"))
            }
            Self::LogNormal { log_mean, log_sd } if !log_mean.is_finite() || !(log_sd > 0.0 && log_sd.is_finite()) => {
                fail(format!("need finite log_mean and log_sd > 0, got log_mean={log_mean} log_sd={log_sd}"))
            }
            Self::Beta { alpha, beta } if !(alpha > 0.0 && beta > 0.0 && alpha.is_finite() && beta.is_finite()) => {
                fail(format!("need alpha > 0 and beta > 0, got alpha={alpha} beta={beta}"))
            }
            Self::Uniform { low, high } if !(low.is_finite() && high.is_finite() && low < high) => {
                fail(format!("need finite low < high, got low={low} high={high}"))
            }
            _ => Ok(()),
        }
    }

    /// Draw `n` values. Parameters are validated first, so a malformed
    /// distribution is rejected before any sampling happens.
    pub fn sample(&self, n: usize, rng: &mut SimRng) -> SimResult<Vec<f64>> {
        self.validate()?;
        let reject = |e: &dyn std::fmt::Display| SimError::InvalidDistribution {
            distribution: self.kind(),
            reason:       e.to_string(),
        };
        let samples = match *self {
            Self::Point { value } => vec![value; n],
            Self::Normal { mean, sd } => {
                let d = rand_distr::Normal::new(mean, sd).map_err(|e| reject(&e))?;
                rng.sample_n(&d, n)
            }
            Self::LogNormal { log_mean, log_sd } => {
                let d = rand_distr::LogNormal::new(log_mean, log_sd).map_err(|e| reject(&e))?;
                rng.sample_n(&d, n)
            }
            Self::Beta { alpha, beta } => {
                let d = rand_distr::Beta::new(alpha, beta).map_err(|e| reject(&e))?;
                rng.sample_n(&d, n)
            }
            Self::Uniform { low, high } => {
                let d = rand_distr::Uniform::new(low, high);
                rng.sample_n(&d, n)
            }
        };
        Ok(samples)
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Self::Point { value } => value,
            Self::Normal { mean, .. } => mean,
            Self::LogNormal { log_mean, log_sd } => (log_mean + log_sd * log_sd / 2.0).exp(),
            Self::Beta { alpha, beta } => alpha / (alpha + beta),
            Self::Uniform { low, high } => (low + high) / 2.0,
        }
    }
}
