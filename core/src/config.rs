use crate::error::{SimError, SimResult};
use crate::types::{Age, Condition, PathwayValues, DEFAULT_DISCOUNT_RATE, MAX_AGE};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sparse `(age, value)` anchors, ascending by age.
pub type Anchors = Vec<(f64, f64)>;

// ── Life-table substrate ─────────────────────────────────────────────────────

/// Annual probability of death (qx) by sex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeTableConfig {
    pub source: String,
    pub male:   Anchors,
    pub female: Anchors,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CauseFractionAnchor {
    pub age:    f64,
    pub cvd:    f64,
    pub cancer: f64,
    pub other:  f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CauseFractionConfig {
    pub anchors: Vec<CauseFractionAnchor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityWeightConfig {
    pub anchors: Anchors,
}

// ── Chronic conditions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub condition:            Condition,
    /// Annual incidence among people without the condition.
    pub incidence:            Anchors,
    /// Point prevalence, used to sample conditions nobody told us about.
    pub prevalence:           Anchors,
    pub mortality_multiplier: f64,
    pub quality_decrement:    f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ConditionsFile {
    conditions: Vec<ConditionConfig>,
}

// ── Model constants ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub max_age:               Age,
    pub default_discount_rate: f64,
    /// Overall HR is raised to these powers to get pathway HRs.
    pub pathway_exponents:     PathwayValues,
    /// SD of the per-person quality-weight offset around the population curve.
    pub quality_offset_sd:     f64,
    pub quality_floor:         f64,
    /// Base SD of log-frailty when every condition is unknown.
    pub frailty_sd:            f64,
    /// Integration stops once both survival curves drop below this.
    pub survival_cutoff:       f64,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Every calibration table the core reads. Built once, shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub life_tables:     LifeTableConfig,
    pub cause_fractions: CauseFractionConfig,
    pub quality_weights: QualityWeightConfig,
    pub conditions:      Vec<ConditionConfig>,
    pub model:           ModelConfig,
}

impl SimConfig {
    /// Load calibration tables from `data_dir`. Files that are absent fall
    /// back to the built-in tables; files that exist must parse and validate.
    ///
    /// Layout:
    ///   life_tables.json       LifeTableConfig
    ///   cause_fractions.json   CauseFractionConfig
    ///   quality_weights.json   QualityWeightConfig
    ///   conditions.json        {"conditions": [ConditionConfig, ...]}
    ///   model.json             ModelConfig
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let builtin = Self::builtin();

        let life_tables = read_section(data_dir, "life_tables.json", builtin.life_tables)?;
        let cause_fractions =
            read_section(data_dir, "cause_fractions.json", builtin.cause_fractions)?;
        let quality_weights =
            read_section(data_dir, "quality_weights.json", builtin.quality_weights)?;
        let conditions = read_section(
            data_dir,
            "conditions.json",
            ConditionsFile { conditions: builtin.conditions },
        )?
        .conditions;
        let model = read_section(data_dir, "model.json", builtin.model)?;

        let config = Self {
            life_tables,
            cause_fractions,
            quality_weights,
            conditions,
            model,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject tables that would break interpolation or the model invariants.
    pub fn validate(&self) -> SimResult<()> {
        for (name, anchors) in [
            ("life_tables.male", &self.life_tables.male),
            ("life_tables.female", &self.life_tables.female),
        ] {
            check_anchors(name, anchors)?;
            if let Some((age, qx)) = anchors.iter().find(|(_, qx)| !(*qx > 0.0 && *qx <= 1.0)) {
                return Err(invalid(name, format!("qx at age {age} must be in (0, 1], got {qx}")));
            }
        }

        let fractions = &self.cause_fractions.anchors;
        let ages: Anchors = fractions.iter().map(|a| (a.age, a.cvd)).collect();
        check_anchors("cause_fractions", &ages)?;
        for a in fractions {
            let sum = a.cvd + a.cancer + a.other;
            if (sum - 1.0).abs() > 1e-6 {
                return Err(invalid(
                    "cause_fractions",
                    format!("fractions at age {} sum to {sum}, expected 1.0", a.age),
                ));
            }
            if a.cvd < 0.0 || a.cancer < 0.0 || a.other < 0.0 {
                return Err(invalid("cause_fractions", format!("negative fraction at age {}", a.age)));
            }
        }

        check_anchors("quality_weights", &self.quality_weights.anchors)?;
        if let Some((age, w)) = self
            .quality_weights
            .anchors
            .iter()
            .find(|(_, w)| !(*w > 0.0 && *w <= 1.0))
        {
            return Err(invalid(
                "quality_weights",
                format!("weight at age {age} must be in (0, 1], got {w}"),
            ));
        }

        for condition in Condition::ALL {
            let matches = self.conditions.iter().filter(|c| c.condition == condition).count();
            if matches != 1 {
                return Err(invalid(
                    "conditions",
                    format!("expected exactly one entry for {condition}, found {matches}"),
                ));
            }
        }
        for c in &self.conditions {
            let name = format!("conditions.{}", c.condition);
            check_anchors(&name, &c.incidence)?;
            check_anchors(&name, &c.prevalence)?;
            let mut rates = c.incidence.iter().chain(c.prevalence.iter());
            if rates.any(|(_, p)| !(0.0..=1.0).contains(p)) {
                return Err(invalid(&name, "rates must be probabilities in [0, 1]".into()));
            }
            if c.mortality_multiplier <= 0.0 || !(0.0..1.0).contains(&c.quality_decrement) {
                return Err(invalid(&name, "multiplier must be > 0 and decrement in [0, 1)".into()));
            }
        }

        let m = &self.model;
        if m.max_age == 0 || m.default_discount_rate <= -1.0 {
            return Err(invalid("model", "max_age must be > 0 and discount rate > -1".into()));
        }
        if m.quality_offset_sd < 0.0 || m.frailty_sd < 0.0 {
            return Err(invalid("model", "standard deviations must be ≥ 0".into()));
        }
        if !(0.0..1.0).contains(&m.quality_floor) || !(0.0..1.0).contains(&m.survival_cutoff) {
            return Err(invalid("model", "quality_floor and survival_cutoff must be in [0, 1)".into()));
        }
        Ok(())
    }

    /// Published calibration: CDC 2021 period life tables, cause-of-death
    /// shares from CDC WONDER, EQ-5D population norms, and condition rates
    /// from NHANES / CDC surveillance.
    pub fn builtin() -> Self {
        Self {
            life_tables: LifeTableConfig {
                source: "CDC National Vital Statistics Reports, US life tables 2021".into(),
                male: vec![
                    (0.0, 0.00566), (1.0, 0.00039), (5.0, 0.00012), (10.0, 0.00011),
                    (15.0, 0.00050), (20.0, 0.00129), (25.0, 0.00156), (30.0, 0.00175),
                    (35.0, 0.00209), (40.0, 0.00261), (45.0, 0.00369), (50.0, 0.00547),
                    (55.0, 0.00832), (60.0, 0.01206), (65.0, 0.01697), (70.0, 0.02467),
                    (75.0, 0.03711), (80.0, 0.05640), (85.0, 0.08737), (90.0, 0.13510),
                    (95.0, 0.19853), (100.0, 0.27500),
                ],
                female: vec![
                    (0.0, 0.00476), (1.0, 0.00031), (5.0, 0.00010), (10.0, 0.00009),
                    (15.0, 0.00025), (20.0, 0.00047), (25.0, 0.00059), (30.0, 0.00073),
                    (35.0, 0.00096), (40.0, 0.00136), (45.0, 0.00204), (50.0, 0.00310),
                    (55.0, 0.00469), (60.0, 0.00692), (65.0, 0.01019), (70.0, 0.01556),
                    (75.0, 0.02502), (80.0, 0.04085), (85.0, 0.06837), (90.0, 0.11295),
                    (95.0, 0.17639), (100.0, 0.25500),
                ],
            },
            cause_fractions: CauseFractionConfig {
                anchors: vec![
                    CauseFractionAnchor { age: 40.0, cvd: 0.20, cancer: 0.25, other: 0.55 },
                    CauseFractionAnchor { age: 50.0, cvd: 0.25, cancer: 0.35, other: 0.40 },
                    CauseFractionAnchor { age: 60.0, cvd: 0.30, cancer: 0.35, other: 0.35 },
                    CauseFractionAnchor { age: 70.0, cvd: 0.35, cancer: 0.30, other: 0.35 },
                    CauseFractionAnchor { age: 80.0, cvd: 0.40, cancer: 0.20, other: 0.40 },
                    CauseFractionAnchor { age: 90.0, cvd: 0.45, cancer: 0.12, other: 0.43 },
                ],
            },
            quality_weights: QualityWeightConfig {
                anchors: vec![
                    (25.0, 0.92), (35.0, 0.90), (45.0, 0.88), (55.0, 0.85),
                    (65.0, 0.82), (75.0, 0.78), (85.0, 0.72), (95.0, 0.65),
                ],
            },
            conditions: builtin_conditions(),
            model: ModelConfig {
                max_age:               MAX_AGE,
                default_discount_rate: DEFAULT_DISCOUNT_RATE,
                pathway_exponents:     PathwayValues::new(1.3, 0.8, 0.6),
                quality_offset_sd:     0.12,
                quality_floor:         0.1,
                frailty_sd:            0.3,
                survival_cutoff:       0.001,
            },
        }
    }
}

fn builtin_conditions() -> Vec<ConditionConfig> {
    const AGES: [f64; 6] = [30.0, 45.0, 55.0, 65.0, 75.0, 85.0];
    let anchors = |values: [f64; 6]| -> Anchors { AGES.iter().copied().zip(values).collect() };

    vec![
        ConditionConfig {
            condition:            Condition::Diabetes,
            incidence:            anchors([0.0023, 0.0071, 0.0093, 0.0104, 0.0083, 0.0063]),
            prevalence:           anchors([0.04, 0.10, 0.16, 0.23, 0.26, 0.24]),
            mortality_multiplier: 1.8,
            quality_decrement:    0.06,
        },
        ConditionConfig {
            condition:            Condition::Hypertension,
            incidence:            anchors([0.0083, 0.0158, 0.0265, 0.0414, 0.0302, 0.0451]),
            prevalence:           anchors([0.12, 0.30, 0.45, 0.58, 0.65, 0.70]),
            mortality_multiplier: 1.3,
            quality_decrement:    0.02,
        },
        ConditionConfig {
            condition:            Condition::HeartDisease,
            incidence:            anchors([0.0006, 0.0030, 0.0071, 0.0107, 0.0160, 0.0171]),
            prevalence:           anchors([0.02, 0.06, 0.11, 0.18, 0.28, 0.35]),
            mortality_multiplier: 2.0,
            quality_decrement:    0.08,
        },
        ConditionConfig {
            condition:            Condition::Stroke,
            incidence:            anchors([0.0002, 0.0015, 0.0026, 0.0061, 0.0070, 0.0104]),
            prevalence:           anchors([0.01, 0.02, 0.03, 0.06, 0.10, 0.14]),
            mortality_multiplier: 2.5,
            quality_decrement:    0.12,
        },
        ConditionConfig {
            condition:            Condition::Cancer,
            incidence:            anchors([0.0013, 0.0033, 0.0079, 0.0110, 0.0226, 0.0184]),
            prevalence:           anchors([0.03, 0.05, 0.09, 0.16, 0.24, 0.30]),
            mortality_multiplier: 1.5,
            quality_decrement:    0.08,
        },
        ConditionConfig {
            condition:            Condition::Arthritis,
            incidence:            anchors([0.0046, 0.0154, 0.0284, 0.0428, 0.0472, 0.0462]),
            prevalence:           anchors([0.08, 0.20, 0.32, 0.42, 0.50, 0.55]),
            mortality_multiplier: 1.1,
            quality_decrement:    0.05,
        },
    ]
}

fn read_section<T: DeserializeOwned>(data_dir: &str, file: &str, fallback: T) -> anyhow::Result<T> {
    let path = format!("{data_dir}/{file}");
    if !Path::new(&path).exists() {
        warn!("config: {path} not found, using built-in table");
        return Ok(fallback);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let section = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
    Ok(section)
}

fn check_anchors(table: &str, anchors: &Anchors) -> SimResult<()> {
    if anchors.is_empty() {
        return Err(invalid(table, "at least one anchor is required".into()));
    }
    if anchors.windows(2).any(|w| w[1].0 <= w[0].0) {
        return Err(invalid(table, "anchor ages must be strictly increasing".into()));
    }
    if anchors.iter().any(|(age, v)| !age.is_finite() || !v.is_finite()) {
        return Err(invalid(table, "anchors must be finite".into()));
    }
    Ok(())
}

fn invalid(table: &str, reason: String) -> SimError {
    SimError::InvalidTable { table: table.to_string(), reason }
}
