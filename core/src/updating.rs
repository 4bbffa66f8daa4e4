//! Importance-sampling update of imputed baseline variables.
//!
//! When a person's exercise, BMI, sleep etc. are not reported they are
//! imputed from population priors. Each observation the person does give
//! sharpens that prior:
//!
//!   P(state | observations) ∝ P(observations | state) × P(state)
//!
//! The posterior is approximated by weighting prior samples by the joint
//! likelihood and resampling.

use crate::error::{SimError, SimResult};
use crate::rng::{RngBank, SimRng, StreamSlot};
use log::{debug, warn};
use rand::distributions::WeightedIndex;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};
use std::collections::BTreeMap;

/// Below this the importance weights are treated as all zero.
const MIN_WEIGHT_SUM: f64 = 1e-10;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineVariable {
    ExerciseMinPerWeek,
    Bmi,
    SleepHours,
    SystolicBp,
    DietAdherence,
}

impl BaselineVariable {
    /// `[low, high)` band for a categorical answer, if the label is known.
    pub fn category_band(&self, label: &str) -> Option<(f64, f64)> {
        let bands: &[(&str, f64, f64)] = match self {
            Self::ExerciseMinPerWeek => &[
                ("sedentary", 0.0, 30.0),
                ("light", 30.0, 75.0),
                ("moderate", 75.0, 150.0),
                ("active", 150.0, 300.0),
                ("very_active", 300.0, f64::INFINITY),
            ],
            Self::Bmi => &[
                ("underweight", 0.0, 18.5),
                ("normal", 18.5, 25.0),
                ("overweight", 25.0, 30.0),
                ("obese", 30.0, 40.0),
                ("severely_obese", 40.0, f64::INFINITY),
            ],
            Self::SleepHours => &[
                ("very_short", 0.0, 5.0),
                ("short", 5.0, 6.0),
                ("normal", 6.0, 8.0),
                ("long", 8.0, 9.0),
                ("very_long", 9.0, f64::INFINITY),
            ],
            Self::SystolicBp | Self::DietAdherence => &[],
        };
        bands.iter().find(|(name, _, _)| *name == label).map(|(_, lo, hi)| (*lo, *hi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PriorShape {
    Normal,
    /// Lognormal with the given arithmetic mean and SD.
    LogNormal,
    /// Normal draws clipped to the bounds.
    TruncatedNormal { lower: Option<f64>, upper: Option<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImputationPrior {
    pub variable: BaselineVariable,
    pub mean:     f64,
    pub std:      f64,
    pub shape:    PriorShape,
}

impl ImputationPrior {
    pub fn sample(&self, n: usize, rng: &mut SimRng) -> SimResult<Vec<f64>> {
        let invalid = |reason: String| SimError::InvalidDistribution { distribution: "imputation prior", reason };
        if !(self.std > 0.0 && self.mean.is_finite()) {
            return Err(invalid(format!("need finite mean and std > 0, got {} ± {}", self.mean, self.std)));
        }
        match self.shape {
            PriorShape::Normal => {
                let d = rand_distr::Normal::new(self.mean, self.std).map_err(|e| invalid(e.to_string()))?;
                Ok(rng.sample_n(&d, n))
            }
            PriorShape::LogNormal => {
                if self.mean <= 0.0 {
                    return Err(invalid(format!("lognormal mean must be > 0, got {}", self.mean)));
                }
                let cv2 = (self.std / self.mean).powi(2);
                let log_sd = (1.0 + cv2).ln().sqrt();
                let log_mean = self.mean.ln() - 0.5 * (1.0 + cv2).ln();
                let d = rand_distr::LogNormal::new(log_mean, log_sd).map_err(|e| invalid(e.to_string()))?;
                Ok(rng.sample_n(&d, n))
            }
            PriorShape::TruncatedNormal { lower, upper } => {
                let d = rand_distr::Normal::new(self.mean, self.std).map_err(|e| invalid(e.to_string()))?;
                Ok(rng
                    .sample_n(&d, n)
                    .into_iter()
                    .map(|x| {
                        let x = lower.map_or(x, |lo| x.max(lo));
                        upper.map_or(x, |hi| x.min(hi))
                    })
                    .collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Reported value with normal measurement error. Zero error means the
    /// value is taken as exact.
    Exact { value: f64, measurement_error: f64 },
    /// Categorical answer such as "moderate" exercise.
    Category { label: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub variable: BaselineVariable,
    pub evidence: Evidence,
}

impl Observation {
    /// P(observation | true value).
    pub fn likelihood(&self, true_value: f64) -> f64 {
        match &self.evidence {
            Evidence::Exact { value, measurement_error } if *measurement_error > 0.0 => {
                Normal::new(true_value, *measurement_error)
                    .map(|d| d.pdf(*value))
                    .unwrap_or(0.0)
            }
            Evidence::Exact { value, .. } => {
                if (value - true_value).abs() < 1e-6 { 1.0 } else { 0.0 }
            }
            Evidence::Category { label } => match self.variable.category_band(label) {
                Some((lo, hi)) => {
                    if lo <= true_value && true_value < hi { 1.0 } else { 0.0 }
                }
                None => 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorState {
    pub variable:       BaselineVariable,
    pub prior_mean:     f64,
    pub prior_std:      f64,
    pub posterior_mean: f64,
    pub posterior_std:  f64,
    pub n_observations: usize,
    /// Importance-resampled posterior draws.
    pub samples:        Vec<f64>,
}

impl PosteriorState {
    pub fn uncertainty_reduction(&self) -> f64 {
        1.0 - self.posterior_std / self.prior_std
    }
}

// ── Updating ─────────────────────────────────────────────────────────────────

pub fn bayesian_update(
    prior: &ImputationPrior,
    observations: &[Observation],
    n_samples: usize,
    seed: u64,
) -> SimResult<PosteriorState> {
    if n_samples == 0 {
        return Err(SimError::InvalidInput("n_samples must be > 0".into()));
    }
    let bank = RngBank::new(seed);
    let prior_samples = prior.sample(n_samples, &mut bank.stream(StreamSlot::PriorSamples))?;

    let mut weights: Vec<f64> = prior_samples
        .iter()
        .map(|x| observations.iter().map(|o| o.likelihood(*x)).product::<f64>())
        .collect();
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum < MIN_WEIGHT_SUM || !weight_sum.is_finite() {
        warn!(
            "updating: observations incompatible with prior for {:?}, using uniform weights",
            prior.variable
        );
        weights = vec![1.0 / n_samples as f64; n_samples];
    } else {
        weights.iter_mut().for_each(|w| *w /= weight_sum);
    }

    let posterior_mean: f64 = weights.iter().zip(&prior_samples).map(|(w, x)| w * x).sum();
    let posterior_var: f64 = weights
        .iter()
        .zip(&prior_samples)
        .map(|(w, x)| w * (x - posterior_mean).powi(2))
        .sum();

    let index = WeightedIndex::new(&weights).map_err(|e| anyhow::anyhow!("importance weights: {e}"))?;
    let samples = bank
        .stream(StreamSlot::Resample)
        .sample_n(&index, n_samples)
        .into_iter()
        .map(|i| prior_samples[i])
        .collect();

    let posterior = PosteriorState {
        variable: prior.variable,
        prior_mean: prior.mean,
        prior_std: prior.std,
        posterior_mean,
        posterior_std: posterior_var.sqrt(),
        n_observations: observations.len(),
        samples,
    };
    debug!(
        "updating: {:?} {:.2} ± {:.2} -> {:.2} ± {:.2}",
        prior.variable, prior.mean, prior.std, posterior.posterior_mean, posterior.posterior_std
    );
    Ok(posterior)
}

/// Update every variable in `priors`. Variables without observations keep
/// their prior.
pub fn update_state(
    priors: &BTreeMap<BaselineVariable, ImputationPrior>,
    observations: &[Observation],
    n_samples: usize,
    seed: u64,
) -> SimResult<BTreeMap<BaselineVariable, PosteriorState>> {
    let mut by_variable: BTreeMap<BaselineVariable, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        by_variable.entry(obs.variable).or_default().push(obs.clone());
    }

    let mut posteriors = BTreeMap::new();
    for (variable, prior) in priors {
        let posterior = match by_variable.get(variable) {
            Some(obs) => bayesian_update(prior, obs, n_samples, seed)?,
            None => PosteriorState {
                variable:       *variable,
                prior_mean:     prior.mean,
                prior_std:      prior.std,
                posterior_mean: prior.mean,
                posterior_std:  prior.std,
                n_observations: 0,
                samples:        prior.sample(n_samples, &mut RngBank::new(seed).stream(StreamSlot::PriorSamples))?,
            },
        };
        posteriors.insert(*variable, posterior);
    }
    Ok(posteriors)
}

/// US adult population priors (NHANES).
pub fn default_priors() -> BTreeMap<BaselineVariable, ImputationPrior> {
    let truncated = |variable, mean, std, lower, upper| ImputationPrior {
        variable,
        mean,
        std,
        shape: PriorShape::TruncatedNormal { lower, upper },
    };
    [
        truncated(BaselineVariable::ExerciseMinPerWeek, 100.0, 80.0, Some(0.0), None),
        truncated(BaselineVariable::Bmi, 28.5, 6.0, Some(15.0), Some(60.0)),
        truncated(BaselineVariable::SleepHours, 6.8, 1.2, Some(3.0), Some(12.0)),
        truncated(BaselineVariable::SystolicBp, 128.0, 18.0, Some(80.0), Some(200.0)),
        truncated(BaselineVariable::DietAdherence, 0.4, 0.2, Some(0.0), Some(1.0)),
    ]
    .into_iter()
    .map(|p| (p.variable, p))
    .collect()
}
