//! Markov state-transition simulator.
//!
//! One simulated lifetime is a sequence of yearly transitions over
//! `(alive, condition flags)`. Each year, in order:
//!   1. accrue a discounted QALY, quality reduced by active conditions'
//!      decrements and floored
//!   2. draw incidence for every condition not yet present
//!   3. draw death against base qx × Π condition multipliers × frailty × HR,
//!      capped at 0.99
//!
//! Draws are generated up front, one array for incidence and one for
//! mortality, so a baseline and an intervention arm can replay identical
//! randomness and differ only in the mortality threshold.
//!
//! Lifetimes are independent: batches run on rayon with one stream per
//! lifetime index, so results do not depend on the thread count.

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::life_table::{AnchorTable, Interpolation, Substrate};
use crate::lifecycle::{check_discount_rate, discount_factor};
use crate::rng::{RngBank, SimRng, StreamSlot};
use crate::stats::Summary;
use crate::types::{Age, Condition, Sex, DEFAULT_DISCOUNT_RATE, MAX_ANNUAL_MORTALITY};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ── Calibration ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ConditionParams {
    incidence:            AnchorTable,
    prevalence:           AnchorTable,
    mortality_multiplier: f64,
    quality_decrement:    f64,
}

/// Incidence, prevalence, mortality and quality effects per condition,
/// indexed by `Condition`.
#[derive(Debug, Clone)]
pub struct ConditionTables {
    params: Vec<ConditionParams>,
}

impl ConditionTables {
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        let mut params = Vec::with_capacity(Condition::COUNT);
        for condition in Condition::ALL {
            let entry = config
                .conditions
                .iter()
                .find(|c| c.condition == condition)
                .ok_or_else(|| SimError::InvalidTable {
                    table:  "conditions".into(),
                    reason: format!("missing entry for {condition}"),
                })?;
            params.push(ConditionParams {
                incidence: AnchorTable::new(
                    &format!("conditions.{condition}.incidence"),
                    &entry.incidence,
                    Interpolation::Linear,
                )?,
                prevalence: AnchorTable::new(
                    &format!("conditions.{condition}.prevalence"),
                    &entry.prevalence,
                    Interpolation::Linear,
                )?,
                mortality_multiplier: entry.mortality_multiplier,
                quality_decrement:    entry.quality_decrement,
            });
        }
        Ok(Self { params })
    }

    pub fn builtin() -> SimResult<Self> {
        Self::from_config(&SimConfig::builtin())
    }

    pub fn incidence(&self, condition: Condition, age: Age) -> f64 {
        self.params[condition.index()].incidence.value_at(age as f64)
    }

    pub fn prevalence(&self, condition: Condition, age: Age) -> f64 {
        self.params[condition.index()].prevalence.value_at(age as f64)
    }

    pub fn mortality_multiplier(&self, condition: Condition) -> f64 {
        self.params[condition.index()].mortality_multiplier
    }

    pub fn quality_decrement(&self, condition: Condition) -> f64 {
        self.params[condition.index()].quality_decrement
    }
}

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    pub alive:  bool,
    conditions: [bool; Condition::COUNT],
}

impl Default for HealthState {
    fn default() -> Self {
        Self::healthy()
    }
}

impl HealthState {
    pub fn healthy() -> Self {
        Self {
            alive:      true,
            conditions: [false; Condition::COUNT],
        }
    }

    /// Start from the conditions a risk profile already asserts.
    pub fn from_profile(profile: &crate::profile::Profile) -> Self {
        Self::healthy()
            .with(Condition::Diabetes, profile.has_diabetes)
            .with(Condition::Hypertension, profile.has_hypertension)
    }

    pub fn with(mut self, condition: Condition, present: bool) -> Self {
        self.set(condition, present);
        self
    }

    pub fn has(&self, condition: Condition) -> bool {
        self.conditions[condition.index()]
    }

    pub fn set(&mut self, condition: Condition, present: bool) {
        self.conditions[condition.index()] = present;
    }

    pub fn active(&self) -> impl Iterator<Item = Condition> + '_ {
        Condition::ALL.into_iter().filter(|c| self.has(*c))
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.iter().filter(|c| **c).count()
    }
}

/// What the caller knows about each condition. `None` = unknown, sampled
/// from age-specific prevalence at the start of each lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KnownConditions {
    facts: [Option<bool>; Condition::COUNT],
}

impl KnownConditions {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Every condition known to be absent.
    pub fn all_absent() -> Self {
        Self {
            facts: [Some(false); Condition::COUNT],
        }
    }

    pub fn with(mut self, condition: Condition, present: bool) -> Self {
        self.facts[condition.index()] = Some(present);
        self
    }

    pub fn get(&self, condition: Condition) -> Option<bool> {
        self.facts[condition.index()]
    }

    pub fn known(&self) -> Vec<Condition> {
        Condition::ALL.into_iter().filter(|c| self.get(*c).is_some()).collect()
    }

    pub fn unknown_conditions(&self) -> Vec<Condition> {
        Condition::ALL.into_iter().filter(|c| self.get(*c).is_none()).collect()
    }

    pub fn fraction_unknown(&self) -> f64 {
        self.unknown_conditions().len() as f64 / Condition::COUNT as f64
    }
}

// ── Public types ─────────────────────────────────────────────────────────────

/// One simulated person at the start of a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub start_age: Age,
    pub sex:       Sex,
    pub state:     HealthState,
    /// Unobserved mortality multiplier. 1.0 = average.
    pub frailty:   f64,
}

impl Individual {
    pub fn new(start_age: Age, sex: Sex) -> Self {
        Self {
            start_age,
            sex,
            state: HealthState::healthy(),
            frailty: 1.0,
        }
    }

    pub fn with_state(self, state: HealthState) -> Self {
        Self { state, ..self }
    }

    pub fn with_frailty(self, frailty: f64) -> Self {
        Self { frailty, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeOutcome {
    pub qalys:      f64,
    pub life_years: f64,
    /// `None` if the person survived to the horizon.
    pub death_age:  Option<Age>,
    pub acquired:   Vec<(Condition, Age)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedOutcome {
    pub baseline:     LifetimeOutcome,
    pub intervention: LifetimeOutcome,
}

impl PairedOutcome {
    pub fn qaly_gain(&self) -> f64 {
        self.intervention.qalys - self.baseline.qalys
    }

    pub fn life_years_gained(&self) -> f64 {
        self.intervention.life_years - self.baseline.life_years
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkovSettings {
    pub n_simulations: usize,
    pub discount_rate: f64,
    pub seed:          u64,
}

impl Default for MarkovSettings {
    fn default() -> Self {
        Self {
            n_simulations: 1_000,
            discount_rate: DEFAULT_DISCOUNT_RATE,
            seed:          42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovResult {
    pub baseline:          Summary,
    pub intervention:      Summary,
    pub qaly_gain:         Summary,
    pub life_years_gained: Summary,
    pub n_simulations:     usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUncertaintyResult {
    pub qalys:         Summary,
    pub life_years:    Summary,
    pub known:         Vec<Condition>,
    pub unknown:       Vec<Condition>,
    /// Log-frailty SD after shrinking for known conditions.
    pub frailty_sd:    f64,
    pub n_simulations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertaintyLevel {
    Low,
    Moderate,
    High,
}

impl CertaintyLevel {
    pub fn from_known(known: &KnownConditions) -> Self {
        let n_known = known.known().len();
        if n_known == 0 {
            Self::Low
        } else if n_known * 2 < Condition::COUNT {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDistribution {
    pub result:    StateUncertaintyResult,
    pub certainty: CertaintyLevel,
}

/// Pre-generated uniforms for one lifetime: one incidence row and one
/// mortality draw per simulated year.
struct LifetimeDraws {
    incidence: Vec<[f64; Condition::COUNT]>,
    mortality: Vec<f64>,
}

impl LifetimeDraws {
    fn generate(years: usize, rng: &mut SimRng) -> Self {
        let incidence = (0..years)
            .map(|_| {
                let mut row = [0.0; Condition::COUNT];
                row.iter_mut().for_each(|u| *u = rng.next_f64());
                row
            })
            .collect();
        let mortality = rng.uniforms(years);
        Self { incidence, mortality }
    }
}

// ── Simulator ────────────────────────────────────────────────────────────────

pub struct MarkovSimulator<'a> {
    substrate:  &'a Substrate,
    conditions: &'a ConditionTables,
}

impl<'a> MarkovSimulator<'a> {
    pub fn new(substrate: &'a Substrate, conditions: &'a ConditionTables) -> Self {
        Self { substrate, conditions }
    }

    pub fn simulate_lifetime(
        &self,
        person: &Individual,
        intervention_hr: f64,
        discount_rate: f64,
        rng: &mut SimRng,
    ) -> SimResult<LifetimeOutcome> {
        check_hr(intervention_hr)?;
        check_discount_rate(discount_rate)?;
        let draws = LifetimeDraws::generate(self.horizon(person), rng);
        Ok(self.replay(person, intervention_hr, discount_rate, &draws))
    }

    /// Baseline (HR = 1) and intervention arms over the same draws.
    pub fn simulate_paired(
        &self,
        person: &Individual,
        intervention_hr: f64,
        discount_rate: f64,
        rng: &mut SimRng,
    ) -> SimResult<PairedOutcome> {
        check_hr(intervention_hr)?;
        check_discount_rate(discount_rate)?;
        let draws = LifetimeDraws::generate(self.horizon(person), rng);
        Ok(PairedOutcome {
            baseline:     self.replay(person, 1.0, discount_rate, &draws),
            intervention: self.replay(person, intervention_hr, discount_rate, &draws),
        })
    }

    /// `n_simulations` paired lifetimes of the same person.
    pub fn run_paired(
        &self,
        person: &Individual,
        intervention_hr: f64,
        settings: &MarkovSettings,
    ) -> SimResult<MarkovResult> {
        check_hr(intervention_hr)?;
        check_discount_rate(settings.discount_rate)?;
        let bank = RngBank::new(settings.seed);
        let pairs: Vec<PairedOutcome> = (0..settings.n_simulations)
            .into_par_iter()
            .map(|i| {
                let mut rng = bank.item_stream(StreamSlot::Lifetime, i as u64);
                let draws = LifetimeDraws::generate(self.horizon(person), &mut rng);
                PairedOutcome {
                    baseline:     self.replay(person, 1.0, settings.discount_rate, &draws),
                    intervention: self.replay(person, intervention_hr, settings.discount_rate, &draws),
                }
            })
            .collect();

        let collect = |f: fn(&PairedOutcome) -> f64| -> Vec<f64> { pairs.iter().map(f).collect() };
        let result = MarkovResult {
            baseline:          Summary::from_values(&collect(|p| p.baseline.qalys)),
            intervention:      Summary::from_values(&collect(|p| p.intervention.qalys)),
            qaly_gain:         Summary::from_values(&collect(PairedOutcome::qaly_gain)),
            life_years_gained: Summary::from_values(&collect(PairedOutcome::life_years_gained)),
            n_simulations:     settings.n_simulations,
        };
        debug!(
            "markov: paired age={} sex={} hr={intervention_hr} n={} gain_mean={:.4}",
            person.start_age, person.sex, settings.n_simulations, result.qaly_gain.mean
        );
        Ok(result)
    }

    /// Lifetime QALY distribution for someone we only partly know. Known
    /// conditions are fixed; unknown ones are sampled from prevalence, and
    /// log-frailty SD shrinks with `sqrt(fraction_unknown)`.
    ///
    /// Every lifetime consumes the same prevalence, frailty and transition
    /// draws whatever is known, so for a fixed seed adding facts can only
    /// remove spread.
    pub fn simulate_with_state_uncertainty(
        &self,
        start_age: Age,
        sex: Sex,
        known: &KnownConditions,
        intervention_hr: f64,
        settings: &MarkovSettings,
    ) -> SimResult<StateUncertaintyResult> {
        check_hr(intervention_hr)?;
        check_discount_rate(settings.discount_rate)?;
        let bank = RngBank::new(settings.seed);
        let frailty_sd = self.substrate.model.frailty_sd * known.fraction_unknown().sqrt();
        let standard_normal = rand_distr::StandardNormal;

        let outcomes: Vec<LifetimeOutcome> = (0..settings.n_simulations)
            .into_par_iter()
            .map(|i| {
                let i = i as u64;
                let mut prevalence_rng = bank.item_stream(StreamSlot::Prevalence, i);
                let mut state = HealthState::healthy();
                for condition in Condition::ALL {
                    let u = prevalence_rng.next_f64();
                    let present = known
                        .get(condition)
                        .unwrap_or_else(|| u < self.conditions.prevalence(condition, start_age));
                    state.set(condition, present);
                }

                let z: f64 = bank.item_stream(StreamSlot::Frailty, i).sample(&standard_normal);
                let person = Individual::new(start_age, sex)
                    .with_state(state)
                    .with_frailty((frailty_sd * z).exp());

                let mut rng = bank.item_stream(StreamSlot::Lifetime, i);
                let draws = LifetimeDraws::generate(self.horizon(&person), &mut rng);
                self.replay(&person, intervention_hr, settings.discount_rate, &draws)
            })
            .collect();

        let qalys: Vec<f64> = outcomes.iter().map(|o| o.qalys).collect();
        let life_years: Vec<f64> = outcomes.iter().map(|o| o.life_years).collect();
        let result = StateUncertaintyResult {
            qalys: Summary::from_values(&qalys),
            life_years: Summary::from_values(&life_years),
            known: known.known(),
            unknown: known.unknown_conditions(),
            frailty_sd,
            n_simulations: settings.n_simulations,
        };
        info!(
            "markov: state uncertainty age={start_age} sex={sex} known={} qaly_mean={:.3} qaly_std={:.3}",
            result.known.len(),
            result.qalys.mean,
            result.qalys.std
        );
        Ok(result)
    }

    pub fn outcome_distribution(
        &self,
        start_age: Age,
        sex: Sex,
        known: &KnownConditions,
        intervention_hr: f64,
        settings: &MarkovSettings,
    ) -> SimResult<OutcomeDistribution> {
        Ok(OutcomeDistribution {
            result:    self.simulate_with_state_uncertainty(start_age, sex, known, intervention_hr, settings)?,
            certainty: CertaintyLevel::from_known(known),
        })
    }

    fn horizon(&self, person: &Individual) -> usize {
        self.substrate.model.max_age.saturating_sub(person.start_age) as usize
    }

    /// Run one lifetime over pre-generated draws.
    fn replay(
        &self,
        person: &Individual,
        intervention_hr: f64,
        discount_rate: f64,
        draws: &LifetimeDraws,
    ) -> LifetimeOutcome {
        let s = self.substrate;
        let tables = self.conditions;
        let mut state = person.state;
        let mut outcome = LifetimeOutcome {
            qalys:      0.0,
            life_years: 0.0,
            death_age:  None,
            acquired:   Vec::new(),
        };

        for (year, age) in (person.start_age..s.model.max_age).enumerate() {
            if !state.alive {
                break;
            }

            let decrement: f64 = state.active().map(|c| tables.quality_decrement(c)).sum();
            let quality = (s.quality_weight(age) - decrement).max(s.model.quality_floor);
            outcome.qalys += quality * discount_factor(discount_rate, year);
            outcome.life_years += 1.0;

            for condition in Condition::ALL {
                if !state.has(condition)
                    && draws.incidence[year][condition.index()] < tables.incidence(condition, age)
                {
                    state.set(condition, true);
                    outcome.acquired.push((condition, age));
                }
            }

            let multiplier: f64 = state.active().map(|c| tables.mortality_multiplier(c)).product();
            let qx = (s.mortality_rate(age, person.sex) * multiplier * person.frailty * intervention_hr)
                .min(MAX_ANNUAL_MORTALITY);
            if draws.mortality[year] < qx {
                state.alive = false;
                outcome.death_age = Some(age);
            }
        }
        outcome
    }
}

fn check_hr(hr: f64) -> SimResult<()> {
    if !(hr > 0.0 && hr.is_finite()) {
        return Err(SimError::InvalidInput(format!("intervention hazard ratio must be positive, got {hr}")));
    }
    Ok(())
}
