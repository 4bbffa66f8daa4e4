//! Profile sweeps and flat result records.
//!
//! Runs one simulation per profile of a `ProfileGrid` and flattens each
//! result into a `ProfileResultRecord` keyed by the profile key, ready to be
//! written as JSON for lookup-table consumers.
//!
//! Two methods:
//!   - `MonteCarlo`: the vectorized engine in this crate
//!   - `Mcmc`: full-posterior inference through an attached
//!     `InferenceBackend`. No backend ships with the core; asking for one
//!     that is not attached is an error, never a silent fallback.

use crate::baseline::BaselineTable;
use crate::error::{SimError, SimResult};
use crate::intervention::Intervention;
use crate::life_table::Substrate;
use crate::lifecycle::LifecycleModel;
use crate::monte_carlo::{MonteCarloEngine, MonteCarloSettings, SimulationResult};
use crate::profile::{ActivityLevel, BmiCategory, Profile, ProfileGrid, SmokingStatus};
use crate::stats;
use crate::types::{Age, Sex};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    MonteCarlo,
    Mcmc,
}

/// Full-posterior sampler plugged in from outside the core.
pub trait InferenceBackend: Sync {
    fn name(&self) -> &str;

    fn simulate(
        &self,
        intervention: &Intervention,
        profile: &Profile,
        settings: &MonteCarloSettings,
    ) -> SimResult<SimulationResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResultRecord {
    pub profile_key:                   String,
    pub age:                           Age,
    pub sex:                           Sex,
    pub bmi_category:                  BmiCategory,
    pub bmi_midpoint:                  f64,
    pub smoking_status:                SmokingStatus,
    pub has_diabetes:                  bool,
    pub has_hypertension:              bool,
    pub activity_level:                ActivityLevel,
    pub qaly_median:                   f64,
    pub qaly_mean:                     f64,
    pub qaly_ci95:                     (f64, f64),
    pub qaly_ci50:                     (f64, f64),
    pub prob_positive:                 f64,
    pub cvd_contribution:              f64,
    pub cancer_contribution:           f64,
    pub other_contribution:            f64,
    pub life_years_gained:             f64,
    pub causal_fraction_mean:          f64,
    pub causal_fraction_ci95:          (f64, f64),
    pub baseline_mortality_multiplier: f64,
    pub baseline_life_expectancy:      f64,
    pub baseline_qalys:                f64,
    pub n_samples:                     usize,
    pub discount_rate:                 f64,
    pub method:                        Method,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputeSummary {
    pub n_profiles:        usize,
    pub median_of_medians: f64,
    pub mean_of_medians:   f64,
    pub min_median:        f64,
    pub max_median:        f64,
    pub std_of_medians:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedTable {
    pub intervention_id: String,
    pub method:          Method,
    pub results:         BTreeMap<String, ProfileResultRecord>,
    pub summary:         PrecomputeSummary,
}

impl PrecomputedTable {
    pub fn get(&self, profile: &Profile) -> Option<&ProfileResultRecord> {
        self.results.get(&profile.key())
    }

    pub fn save(&self, path: &Path) -> SimResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── Precomputer ──────────────────────────────────────────────────────────────

pub struct Precomputer<'a> {
    substrate: &'a Substrate,
    baseline:  Option<&'a BaselineTable>,
    backend:   Option<&'a dyn InferenceBackend>,
}

impl<'a> Precomputer<'a> {
    pub fn new(substrate: &'a Substrate) -> Self {
        Self {
            substrate,
            baseline: None,
            backend: None,
        }
    }

    pub fn with_baseline_table(mut self, table: &'a BaselineTable) -> Self {
        self.baseline = Some(table);
        self
    }

    pub fn with_backend(mut self, backend: &'a dyn InferenceBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn run_profile(
        &self,
        intervention: &Intervention,
        profile: &Profile,
        settings: &MonteCarloSettings,
        method: Method,
    ) -> SimResult<ProfileResultRecord> {
        let result = match method {
            Method::MonteCarlo => {
                MonteCarloEngine::new(self.substrate).simulate_qaly(intervention, profile, settings)?
            }
            Method::Mcmc => {
                let backend = self.backend.ok_or_else(|| SimError::CapabilityUnavailable {
                    capability: "full-posterior inference backend (mcmc)".into(),
                })?;
                backend.simulate(intervention, profile, settings)?
            }
        };

        let mut lifecycle = LifecycleModel::new(self.substrate);
        if let Some(table) = self.baseline {
            lifecycle = lifecycle.with_baseline_table(table);
        }
        let baseline = lifecycle.baseline(
            profile.age,
            profile.sex,
            settings.discount_rate,
            result.baseline_mortality_multiplier,
        )?;

        Ok(ProfileResultRecord {
            profile_key:                   profile.key(),
            age:                           profile.age,
            sex:                           profile.sex,
            bmi_category:                  profile.bmi,
            bmi_midpoint:                  profile.bmi_midpoint(),
            smoking_status:                profile.smoking,
            has_diabetes:                  profile.has_diabetes,
            has_hypertension:              profile.has_hypertension,
            activity_level:                profile.activity,
            qaly_median:                   result.median,
            qaly_mean:                     result.mean,
            qaly_ci95:                     result.ci95,
            qaly_ci50:                     result.ci50,
            prob_positive:                 result.prob_positive,
            cvd_contribution:              result.pathway_contributions.cvd,
            cancer_contribution:           result.pathway_contributions.cancer,
            other_contribution:            result.pathway_contributions.other,
            life_years_gained:             result.life_years_gained,
            causal_fraction_mean:          result.causal_fraction_mean,
            causal_fraction_ci95:          result.causal_fraction_ci95,
            baseline_mortality_multiplier: result.baseline_mortality_multiplier,
            baseline_life_expectancy:      baseline.life_years,
            baseline_qalys:                baseline.qalys,
            n_samples:                     result.n_simulations,
            discount_rate:                 settings.discount_rate,
            method,
        })
    }

    /// Run every profile in `grid`. Profiles are independent and run in
    /// parallel; profile `i` uses seed `settings.seed + i`.
    pub fn precompute(
        &self,
        intervention: &Intervention,
        grid: &ProfileGrid,
        settings: &MonteCarloSettings,
        method: Method,
    ) -> SimResult<PrecomputedTable> {
        let profiles = grid.profiles();
        info!(
            "precompute: {} over {} profiles ({method:?}, n={})",
            intervention.id,
            profiles.len(),
            settings.n_simulations
        );

        let records: Vec<ProfileResultRecord> = profiles
            .par_iter()
            .enumerate()
            .map(|(i, profile)| {
                let profile_settings = MonteCarloSettings {
                    seed: settings.seed.wrapping_add(i as u64),
                    ..*settings
                };
                self.run_profile(intervention, profile, &profile_settings, method)
            })
            .collect::<SimResult<_>>()?;

        let medians: Vec<f64> = records.iter().map(|r| r.qaly_median).collect();
        let sorted = stats::sorted(&medians);
        let summary = PrecomputeSummary {
            n_profiles:        records.len(),
            median_of_medians: stats::percentile(&sorted, 50.0),
            mean_of_medians:   stats::mean(&medians),
            min_median:        sorted.first().copied().unwrap_or(0.0),
            max_median:        sorted.last().copied().unwrap_or(0.0),
            std_of_medians:    stats::std_dev(&medians),
        };
        info!(
            "precompute: {} done, median of medians {:.4} (range {:.4} to {:.4})",
            intervention.id, summary.median_of_medians, summary.min_median, summary.max_median
        );

        Ok(PrecomputedTable {
            intervention_id: intervention.id.clone(),
            method,
            results: records.into_iter().map(|r| (r.profile_key.clone(), r)).collect(),
            summary,
        })
    }
}
