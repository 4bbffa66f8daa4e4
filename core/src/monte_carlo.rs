//! Vectorized Monte Carlo engine.
//!
//! Propagates hazard-ratio uncertainty, confounding uncertainty and
//! person-level quality heterogeneity into a distribution of QALY gains.
//! No per-simulation control flow: everything is N×T array arithmetic.
//!
//!   1. Year arrays (qx, quality, discount, cause fractions) built once, 1×T
//!   2. N hazard ratios and N causal fractions drawn from seeded streams
//!   3. log-HR × effect modifier × causal fraction, then pathway exponents
//!   4. N×1 pathway HRs broadcast against 1×T fractions → N×T intervention qx
//!   5. exclusive cumulative product along years → N×T survival
//!   6. survival × (quality + per-person offset) × discount, summed over T

use crate::error::SimResult;
use crate::intervention::Intervention;
use crate::life_table::Substrate;
use crate::lifecycle::{check_inputs, discount_factor};
use crate::profile::Profile;
use crate::rng::{RngBank, SimRng, StreamSlot};
use crate::stats::{self, Summary};
use crate::types::{PathwayValues, DEFAULT_DISCOUNT_RATE, MAX_ANNUAL_MORTALITY};
use log::{debug, warn};
use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSettings {
    pub n_simulations:     usize,
    pub discount_rate:     f64,
    pub apply_confounding: bool,
    pub seed:              u64,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            n_simulations:     10_000,
            discount_rate:     DEFAULT_DISCOUNT_RATE,
            apply_confounding: true,
            seed:              42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub median:                        f64,
    pub mean:                          f64,
    pub std:                           f64,
    pub ci95:                          (f64, f64),
    pub ci50:                          (f64, f64),
    pub prob_positive:                 f64,
    pub prob_more_than_one_year:       f64,
    /// Median QALY gain attributed to each pathway.
    pub pathway_contributions:         PathwayValues,
    /// Median undiscounted life-years gained.
    pub life_years_gained:             f64,
    pub causal_fraction_mean:          f64,
    pub causal_fraction_ci95:          (f64, f64),
    pub baseline_mortality_multiplier: f64,
    pub effect_modifier:               f64,
    pub n_simulations:                 usize,
    pub discount_rate:                 f64,
    /// Raw per-simulation gains, kept for callers that need more than the
    /// summary (e.g. combining runs).
    #[serde(skip)]
    pub gains:                         Vec<f64>,
}

impl SimulationResult {
    /// Uninformative result for interventions with no mortality effect.
    pub fn neutral(settings: &MonteCarloSettings, multiplier: f64, modifier: f64) -> Self {
        Self {
            median:                        0.0,
            mean:                          0.0,
            std:                           0.0,
            ci95:                          (0.0, 0.0),
            ci50:                          (0.0, 0.0),
            prob_positive:                 0.5,
            prob_more_than_one_year:       0.0,
            pathway_contributions:         PathwayValues::default(),
            life_years_gained:             0.0,
            causal_fraction_mean:          0.0,
            causal_fraction_ci95:          (0.0, 0.0),
            baseline_mortality_multiplier: multiplier,
            effect_modifier:               modifier,
            n_simulations:                 settings.n_simulations,
            discount_rate:                 settings.discount_rate,
            gains:                         Vec::new(),
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Year-indexed arrays shared by every simulated person.
struct YearArrays {
    base_qx:  Array1<f64>,
    quality:  Array1<f64>,
    discount: Array1<f64>,
    cvd:      Array1<f64>,
    cancer:   Array1<f64>,
    other:    Array1<f64>,
}

pub struct MonteCarloEngine<'a> {
    substrate: &'a Substrate,
}

impl<'a> MonteCarloEngine<'a> {
    pub fn new(substrate: &'a Substrate) -> Self {
        Self { substrate }
    }

    pub fn simulate_qaly(
        &self,
        intervention: &Intervention,
        profile: &Profile,
        settings: &MonteCarloSettings,
    ) -> SimResult<SimulationResult> {
        let multiplier = profile.baseline_mortality_multiplier();
        let modifier = profile.intervention_effect_modifier(intervention.category);
        check_inputs(settings.discount_rate, multiplier)?;

        let Some(effect) = &intervention.mortality else {
            debug!("monte_carlo: {} has no mortality effect, neutral result", intervention.id);
            return Ok(SimulationResult::neutral(settings, multiplier, modifier));
        };
        if settings.n_simulations == 0 || profile.age >= self.substrate.model.max_age {
            return Ok(SimulationResult::neutral(settings, multiplier, modifier));
        }

        let n = settings.n_simulations;
        let bank = RngBank::new(settings.seed);
        let years = self.year_arrays(profile, multiplier, settings.discount_rate);

        // ── Draws ────────────────────────────────────────────────────────────
        let mut hr_rng = bank.stream(StreamSlot::HazardRatio);
        let mut hazard_ratios = effect.hazard_ratio.sample(n, &mut hr_rng)?;
        let mut repair_rng = bank.stream(StreamSlot::HazardRepair);
        if !repair_hazard_ratios(&mut hazard_ratios, &mut repair_rng) {
            warn!(
                "monte_carlo: {} produced no valid hazard ratios, neutral result",
                intervention.id
            );
            return Ok(SimulationResult::neutral(settings, multiplier, modifier));
        }

        let (causal_fractions, cf_mean, cf_ci95) = if settings.apply_confounding {
            let prior = intervention.confounding_prior();
            let draws = prior.sample(n, &mut bank.stream(StreamSlot::CausalFraction))?;
            (draws, prior.mean(), prior.credible_interval(0.95)?)
        } else {
            (vec![1.0; n], 1.0, (1.0, 1.0))
        };

        let offset_sd = self.substrate.model.quality_offset_sd;
        let offsets = if offset_sd > 0.0 {
            let normal = rand_distr::Normal::new(0.0, offset_sd)
                .map_err(|e| anyhow::anyhow!("quality offset distribution: {e}"))?;
            bank.stream(StreamSlot::QualityOffset).sample_n(&normal, n)
        } else {
            vec![0.0; n]
        };

        // ── Effective hazard ratios (N×1 per pathway) ────────────────────────
        let log_hr: Array1<f64> = Array1::from_iter(
            hazard_ratios
                .iter()
                .zip(&causal_fractions)
                .map(|(hr, cf)| hr.ln() * modifier * cf),
        );
        let exponents = self.substrate.model.pathway_exponents;
        let hr_cvd = log_hr.mapv(|l| (l * exponents.cvd).exp()).insert_axis(Axis(1));
        let hr_cancer = log_hr.mapv(|l| (l * exponents.cancer).exp()).insert_axis(Axis(1));
        let hr_other = log_hr.mapv(|l| (l * exponents.other).exp()).insert_axis(Axis(1));

        let row = |a: &Array1<f64>| a.clone().insert_axis(Axis(0));
        let (cf_cvd, cf_cancer, cf_other) = (row(&years.cvd), row(&years.cancer), row(&years.other));

        // ── N×T mortality and survival ───────────────────────────────────────
        let mut relative_risk = &hr_cvd * &cf_cvd;
        relative_risk += &(&hr_cancer * &cf_cancer);
        relative_risk += &(&hr_other * &cf_other);

        let base_qx_row = row(&years.base_qx);
        let int_qx = (&relative_risk * &base_qx_row).mapv(|q| q.min(MAX_ANNUAL_MORTALITY));
        let survival = exclusive_survival(&int_qx);
        let base_survival = exclusive_survival(&base_qx_row);

        // ── Quality-weighted, discounted integration ─────────────────────────
        let floor = self.substrate.model.quality_floor;
        let offsets = Array1::from(offsets).insert_axis(Axis(1));
        let quality = (&row(&years.quality) + &offsets).mapv(|q| q.clamp(floor, 1.0));
        let weight = &quality * &row(&years.discount);

        let survival_gain = &survival - &base_survival;
        let yearly_gain = &survival_gain * &weight;
        let gains = yearly_gain.sum_axis(Axis(1));
        let life_years = survival_gain.sum_axis(Axis(1));

        // ── Pathway attribution ──────────────────────────────────────────────
        let positive = yearly_gain.mapv(|d| d.max(0.0));
        let total_reduction = relative_risk.mapv(|r| 1.0 - r);
        let attribute = |hr: &Array2<f64>, cf: &Array2<f64>| -> f64 {
            let reduction = &hr.mapv(|h| 1.0 - h) * cf;
            let share = Zip::from(&reduction)
                .and(&total_reduction)
                .map_collect(|&r, &total| if total > 1e-12 { r / total } else { 0.0 });
            let per_person = (&positive * &share).sum_axis(Axis(1));
            stats::percentile(&stats::sorted(&per_person.to_vec()), 50.0)
        };
        let pathway_contributions = PathwayValues::new(
            attribute(&hr_cvd, &cf_cvd),
            attribute(&hr_cancer, &cf_cancer),
            attribute(&hr_other, &cf_other),
        );

        // ── Summary ──────────────────────────────────────────────────────────
        let gains = gains.to_vec();
        let summary = Summary::from_values(&gains);
        let result = SimulationResult {
            median:                        summary.median,
            mean:                          summary.mean,
            std:                           summary.std,
            ci95:                          summary.ci95,
            ci50:                          summary.ci50,
            prob_positive:                 stats::fraction_above(&gains, 0.0),
            prob_more_than_one_year:       stats::fraction_above(&gains, 1.0),
            pathway_contributions,
            life_years_gained:             stats::percentile(&stats::sorted(&life_years.to_vec()), 50.0),
            causal_fraction_mean:          cf_mean,
            causal_fraction_ci95:          cf_ci95,
            baseline_mortality_multiplier: multiplier,
            effect_modifier:               modifier,
            n_simulations:                 n,
            discount_rate:                 settings.discount_rate,
            gains,
        };
        debug!(
            "monte_carlo: {} profile={} n={n} median={:.4} ci95=({:.4}, {:.4}) p_pos={:.3}",
            intervention.id,
            profile.key(),
            result.median,
            result.ci95.0,
            result.ci95.1,
            result.prob_positive
        );
        Ok(result)
    }

    fn year_arrays(&self, profile: &Profile, multiplier: f64, discount_rate: f64) -> YearArrays {
        let s = self.substrate;
        let ages: Vec<_> = (profile.age..s.model.max_age).collect();
        let fractions: Vec<PathwayValues> = ages.iter().map(|a| s.cause_fraction(*a)).collect();
        YearArrays {
            base_qx:  ages
                .iter()
                .map(|a| (s.mortality_rate(*a, profile.sex) * multiplier).min(MAX_ANNUAL_MORTALITY))
                .collect(),
            quality:  ages.iter().map(|a| s.quality_weight(*a)).collect(),
            discount: (0..ages.len())
                .map(|t| discount_factor(discount_rate, t))
                .collect(),
            cvd:      fractions.iter().map(|f| f.cvd).collect(),
            cancer:   fractions.iter().map(|f| f.cancer).collect(),
            other:    fractions.iter().map(|f| f.other).collect(),
        }
    }
}

/// Survival at the start of each year: column 0 is 1.0, column t is the
/// product of (1 − qx) over columns 0..t.
fn exclusive_survival(qx: &Array2<f64>) -> Array2<f64> {
    let mut survival = Array2::<f64>::ones(qx.raw_dim());
    for t in 1..qx.ncols() {
        let next = &survival.column(t - 1) * &qx.column(t - 1).mapv(|q| 1.0 - q);
        survival.column_mut(t).assign(&next);
    }
    survival
}

/// Replace non-finite or non-positive draws by resampling uniformly from the
/// valid ones. Returns false when nothing valid is left to resample from.
fn repair_hazard_ratios(samples: &mut [f64], rng: &mut SimRng) -> bool {
    let valid: Vec<f64> = samples.iter().copied().filter(|h| h.is_finite() && *h > 0.0).collect();
    if valid.is_empty() {
        return false;
    }
    let invalid = samples.len() - valid.len();
    if invalid > 0 {
        warn!("monte_carlo: resampling {invalid} invalid hazard ratio draws");
        for h in samples.iter_mut().filter(|h| !(h.is_finite() && **h > 0.0)) {
            *h = valid[rng.next_u64_below(valid.len() as u64) as usize];
        }
    }
    true
}
