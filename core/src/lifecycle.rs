//! Deterministic lifecycle integrator.
//!
//! Walks one cohort year by year from `start_age` to the horizon, carrying a
//! baseline and an intervention survival curve side by side:
//!   1. base qx = life-table qx × baseline multiplier, capped at 0.99
//!   2. intervention qx = base qx × Σ cause_fraction[p] × HR[p], capped
//!   3. QALYs accrue as survival-at-start-of-year × quality × (1+r)^-t
//!   4. each year's positive QALY difference is attributed to pathways in
//!      proportion to cause_fraction[p] × (1 − HR[p])
//!   5. stop once both curves fall below the survival cutoff

use crate::baseline::BaselineTable;
use crate::error::{SimError, SimResult};
use crate::life_table::Substrate;
use crate::types::{Age, Pathway, PathwayHazardRatios, PathwayValues, Sex, MAX_ANNUAL_MORTALITY};
use log::debug;
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleResult {
    pub start_age:               Age,
    pub sex:                     Sex,
    pub discount_rate:           f64,
    pub baseline_qalys:          f64,
    pub intervention_qalys:      f64,
    pub qaly_gain:               f64,
    pub baseline_life_years:     f64,
    pub intervention_life_years: f64,
    pub life_years_gained:       f64,
    pub pathway_contributions:   PathwayValues,
}

/// Remaining life expectancy and discounted QALYs with no intervention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineTotals {
    pub life_years: f64,
    pub qalys:      f64,
}

// ── Integrator ───────────────────────────────────────────────────────────────

pub struct LifecycleModel<'a> {
    substrate: &'a Substrate,
    baseline:  Option<&'a BaselineTable>,
}

impl<'a> LifecycleModel<'a> {
    pub fn new(substrate: &'a Substrate) -> Self {
        Self { substrate, baseline: None }
    }

    /// Use a precomputed table for default-discount, unadjusted baselines.
    /// Only `baseline` reads it: `calculate` always integrates both arms
    /// together so the gain and its pathway split come from one pass.
    pub fn with_baseline_table(mut self, table: &'a BaselineTable) -> Self {
        self.baseline = Some(table);
        self
    }

    pub fn calculate(
        &self,
        start_age: Age,
        sex: Sex,
        hazard_ratios: &PathwayHazardRatios,
        discount_rate: f64,
        baseline_multiplier: f64,
    ) -> SimResult<LifecycleResult> {
        hazard_ratios.validate()?;
        check_inputs(discount_rate, baseline_multiplier)?;

        let s = self.substrate;
        let cutoff = s.model.survival_cutoff;

        let mut base_survival = 1.0;
        let mut int_survival = 1.0;
        let mut baseline_qalys = 0.0;
        let mut intervention_qalys = 0.0;
        let mut baseline_life_years = 0.0;
        let mut intervention_life_years = 0.0;
        let mut contributions = PathwayValues::default();

        for (year, age) in (start_age..s.model.max_age).enumerate() {
            let base_qx = (s.mortality_rate(age, sex) * baseline_multiplier).min(MAX_ANNUAL_MORTALITY);
            let fractions = s.cause_fraction(age);
            let int_qx = (base_qx * hazard_ratios.weighted(&fractions)).min(MAX_ANNUAL_MORTALITY);

            let weight = s.quality_weight(age) * discount_factor(discount_rate, year);
            let base_year = base_survival * weight;
            let int_year = int_survival * weight;

            baseline_qalys += base_year;
            intervention_qalys += int_year;
            baseline_life_years += base_survival;
            intervention_life_years += int_survival;

            let diff = int_year - base_year;
            if diff > 0.0 {
                attribute(diff, &fractions, hazard_ratios, &mut contributions);
            }

            base_survival *= 1.0 - base_qx;
            int_survival *= 1.0 - int_qx;
            if base_survival < cutoff && int_survival < cutoff {
                break;
            }
        }

        let result = LifecycleResult {
            start_age,
            sex,
            discount_rate,
            baseline_qalys,
            intervention_qalys,
            qaly_gain: intervention_qalys - baseline_qalys,
            baseline_life_years,
            intervention_life_years,
            life_years_gained: intervention_life_years - baseline_life_years,
            pathway_contributions: contributions,
        };
        debug!(
            "lifecycle: age={start_age} sex={sex} r={discount_rate} gain={:.4} ly_gained={:.4}",
            result.qaly_gain, result.life_years_gained
        );
        Ok(result)
    }

    /// Baseline-only totals. Served from the precomputed table when one is
    /// attached and the inputs match the table's assumptions; otherwise
    /// integrated in full.
    pub fn baseline(
        &self,
        start_age: Age,
        sex: Sex,
        discount_rate: f64,
        baseline_multiplier: f64,
    ) -> SimResult<BaselineTotals> {
        check_inputs(discount_rate, baseline_multiplier)?;

        let fast_path_ok = discount_rate == self.substrate.model.default_discount_rate
            && baseline_multiplier == 1.0;
        if fast_path_ok {
            if let Some(totals) = self.baseline.and_then(|t| t.lookup(start_age, sex)) {
                return Ok(totals);
            }
        }
        Ok(self.integrate_baseline(start_age, sex, discount_rate, baseline_multiplier))
    }

    pub(crate) fn integrate_baseline(
        &self,
        start_age: Age,
        sex: Sex,
        discount_rate: f64,
        baseline_multiplier: f64,
    ) -> BaselineTotals {
        let s = self.substrate;
        let mut survival = 1.0;
        let mut totals = BaselineTotals { life_years: 0.0, qalys: 0.0 };

        for (year, age) in (start_age..s.model.max_age).enumerate() {
            let qx = (s.mortality_rate(age, sex) * baseline_multiplier).min(MAX_ANNUAL_MORTALITY);
            totals.qalys += survival * s.quality_weight(age) * discount_factor(discount_rate, year);
            totals.life_years += survival;
            survival *= 1.0 - qx;
            if survival < s.model.survival_cutoff {
                break;
            }
        }
        totals
    }
}

pub fn discount_factor(rate: f64, year: usize) -> f64 {
    (1.0 + rate).powi(-(year as i32))
}

/// Split one year's QALY difference across pathways by their share of the
/// mortality reduction.
fn attribute(
    diff: f64,
    fractions: &PathwayValues,
    hazard_ratios: &PathwayHazardRatios,
    contributions: &mut PathwayValues,
) {
    let reduction = |p: Pathway| fractions.get(p) * (1.0 - hazard_ratios.get(p));
    let total = reduction(Pathway::Cvd) + reduction(Pathway::Cancer) + reduction(Pathway::Other);
    if total <= 0.0 {
        return;
    }
    contributions.cvd += diff * reduction(Pathway::Cvd) / total;
    contributions.cancer += diff * reduction(Pathway::Cancer) / total;
    contributions.other += diff * reduction(Pathway::Other) / total;
}

pub(crate) fn check_discount_rate(discount_rate: f64) -> SimResult<()> {
    if !(discount_rate > -1.0 && discount_rate.is_finite()) {
        return Err(SimError::InvalidInput(format!("discount rate must be > -1, got {discount_rate}")));
    }
    Ok(())
}

pub(crate) fn check_inputs(discount_rate: f64, baseline_multiplier: f64) -> SimResult<()> {
    check_discount_rate(discount_rate)?;
    if !(baseline_multiplier > 0.0 && baseline_multiplier.is_finite()) {
        return Err(SimError::InvalidInput(format!(
            "baseline mortality multiplier must be positive, got {baseline_multiplier}"
        )));
    }
    Ok(())
}
