//! Life-table substrate: mortality, cause-of-death and quality-weight
//! schedules indexed by age.
//!
//! Every schedule stores sparse anchors and interpolates between them:
//!   - mortality (qx) log-linearly, which keeps it positive and exponential
//!   - cause fractions and quality weights linearly
//!
//! Ages outside the anchor range clamp to the nearest anchor. A lookup on an
//! anchor age returns the anchor value exactly.

use crate::config::{ModelConfig, SimConfig};
use crate::error::{SimError, SimResult};
use crate::types::{Age, PathwayValues, Sex};

// ── Anchor interpolation ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    /// Linear in ln(value). Falls back to linear if either anchor is ≤ 0.
    LogLinear,
}

/// Sparse age anchors with interpolation and clamping.
#[derive(Debug, Clone)]
pub struct AnchorTable {
    ages:          Vec<f64>,
    values:        Vec<f64>,
    interpolation: Interpolation,
}

impl AnchorTable {
    pub fn new(name: &str, anchors: &[(f64, f64)], interpolation: Interpolation) -> SimResult<Self> {
        if anchors.is_empty() {
            return Err(SimError::InvalidTable {
                table:  name.to_string(),
                reason: "at least one anchor is required".into(),
            });
        }
        if anchors.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(SimError::InvalidTable {
                table:  name.to_string(),
                reason: "anchor ages must be strictly increasing".into(),
            });
        }
        Ok(Self {
            ages: anchors.iter().map(|(a, _)| *a).collect(),
            values: anchors.iter().map(|(_, v)| *v).collect(),
            interpolation,
        })
    }

    pub fn value_at(&self, age: f64) -> f64 {
        let last = self.ages.len() - 1;
        if age <= self.ages[0] {
            return self.values[0];
        }
        if age >= self.ages[last] {
            return self.values[last];
        }

        // ages[i] <= age < ages[i + 1]
        let i = self.ages.partition_point(|a| *a <= age) - 1;
        let (a0, a1) = (self.ages[i], self.ages[i + 1]);
        let (v0, v1) = (self.values[i], self.values[i + 1]);
        if age == a0 {
            return v0;
        }

        let t = (age - a0) / (a1 - a0);
        match self.interpolation {
            Interpolation::LogLinear if v0 > 0.0 && v1 > 0.0 => {
                (v0.ln() + t * (v1.ln() - v0.ln())).exp()
            }
            _ => v0 + t * (v1 - v0),
        }
    }

    pub fn anchor_ages(&self) -> &[f64] {
        &self.ages
    }
}

// ── Schedules ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LifeTable {
    male:   AnchorTable,
    female: AnchorTable,
}

impl LifeTable {
    /// Annual probability of death at `age`.
    pub fn mortality_rate(&self, age: Age, sex: Sex) -> f64 {
        self.table(sex).value_at(age as f64)
    }

    pub fn table(&self, sex: Sex) -> &AnchorTable {
        match sex {
            Sex::Male => &self.male,
            Sex::Female => &self.female,
        }
    }
}

/// Share of deaths by pathway. Sums to 1.0 at every age.
#[derive(Debug, Clone)]
pub struct CauseFractionSchedule {
    cvd:    AnchorTable,
    cancer: AnchorTable,
    other:  AnchorTable,
}

impl CauseFractionSchedule {
    pub fn cause_fraction(&self, age: Age) -> PathwayValues {
        let a = age as f64;
        // All three share anchor ages, so linear interpolation keeps the sum at 1.
        PathwayValues::new(self.cvd.value_at(a), self.cancer.value_at(a), self.other.value_at(a))
    }
}

#[derive(Debug, Clone)]
pub struct QualityWeightSchedule {
    weights: AnchorTable,
}

impl QualityWeightSchedule {
    pub fn quality_weight(&self, age: Age) -> f64 {
        self.weights.value_at(age as f64)
    }
}

// ── Substrate ────────────────────────────────────────────────────────────────

/// The read-only tables every engine integrates over. Build once and share
/// by reference (or `Arc`) across threads.
#[derive(Debug, Clone)]
pub struct Substrate {
    pub life_table:      LifeTable,
    pub cause_fractions: CauseFractionSchedule,
    pub quality_weights: QualityWeightSchedule,
    pub model:           ModelConfig,
}

impl Substrate {
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        config.validate()?;

        let fractions = &config.cause_fractions.anchors;
        let cvd: Vec<(f64, f64)> = fractions.iter().map(|a| (a.age, a.cvd)).collect();
        let cancer: Vec<(f64, f64)> = fractions.iter().map(|a| (a.age, a.cancer)).collect();
        let other: Vec<(f64, f64)> = fractions.iter().map(|a| (a.age, a.other)).collect();

        Ok(Self {
            life_table: LifeTable {
                male:   AnchorTable::new("life_tables.male", &config.life_tables.male, Interpolation::LogLinear)?,
                female: AnchorTable::new("life_tables.female", &config.life_tables.female, Interpolation::LogLinear)?,
            },
            cause_fractions: CauseFractionSchedule {
                cvd:    AnchorTable::new("cause_fractions.cvd", &cvd, Interpolation::Linear)?,
                cancer: AnchorTable::new("cause_fractions.cancer", &cancer, Interpolation::Linear)?,
                other:  AnchorTable::new("cause_fractions.other", &other, Interpolation::Linear)?,
            },
            quality_weights: QualityWeightSchedule {
                weights: AnchorTable::new(
                    "quality_weights",
                    &config.quality_weights.anchors,
                    Interpolation::Linear,
                )?,
            },
            model: config.model.clone(),
        })
    }

    pub fn builtin() -> SimResult<Self> {
        Self::from_config(&SimConfig::builtin())
    }

    pub fn mortality_rate(&self, age: Age, sex: Sex) -> f64 {
        self.life_table.mortality_rate(age, sex)
    }

    pub fn cause_fraction(&self, age: Age) -> PathwayValues {
        self.cause_fractions.cause_fraction(age)
    }

    pub fn quality_weight(&self, age: Age) -> f64 {
        self.quality_weights.quality_weight(age)
    }
}
