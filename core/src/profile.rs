//! Profile risk model.
//!
//! A `Profile` is the demographic and lifestyle description of one person.
//! It feeds two adjustments:
//!   1. `baseline_mortality_multiplier`: how much riskier than the life
//!      table this person is, as a product of independent relative risks
//!   2. `intervention_effect_modifier`: how strongly an intervention's
//!      log-HR applies to this person
//!
//! The multiplicative combination treats BMI, smoking, diabetes,
//! hypertension and activity as independent. They are correlated in
//! practice, so the product overstates risk for people with several factors.

use crate::confounding::InterventionCategory;
use crate::types::{Age, Sex};
use serde::{Deserialize, Serialize};

// ── Risk factors ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Normal,
    Overweight,
    Obese,
    SeverelyObese,
}

impl BmiCategory {
    pub const ALL: [BmiCategory; 4] = [Self::Normal, Self::Overweight, Self::Obese, Self::SeverelyObese];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Overweight => "overweight",
            Self::Obese => "obese",
            Self::SeverelyObese => "severely_obese",
        }
    }

    /// All-cause mortality RR vs normal weight (Global BMI Mortality
    /// Collaboration 2016).
    pub fn relative_risk(&self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Overweight => 1.11,
            Self::Obese => 1.44,
            Self::SeverelyObese => 2.06,
        }
    }

    /// Representative BMI for reporting.
    pub fn midpoint(&self) -> f64 {
        match self {
            Self::Normal => 22.0,
            Self::Overweight => 27.5,
            Self::Obese => 32.5,
            Self::SeverelyObese => 40.0,
        }
    }

    pub fn is_obese(&self) -> bool {
        matches!(self, Self::Obese | Self::SeverelyObese)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmokingStatus {
    Never,
    Former,
    Current,
}

impl SmokingStatus {
    pub const ALL: [SmokingStatus; 3] = [Self::Never, Self::Former, Self::Current];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Former => "former",
            Self::Current => "current",
        }
    }

    /// Jha 2013, Carter 2015.
    pub fn relative_risk(&self) -> f64 {
        match self {
            Self::Never => 1.0,
            Self::Former => 1.34,
            Self::Current => 2.80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 4] = [Self::Sedentary, Self::Light, Self::Moderate, Self::Active];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
        }
    }

    /// Relative to meeting guidelines (moderate). Arem 2015 dose-response.
    pub fn relative_risk(&self) -> f64 {
        match self {
            Self::Sedentary => 1.40,
            Self::Light => 1.15,
            Self::Moderate => 1.0,
            Self::Active => 0.90,
        }
    }

    /// Exercise benefit shrinks as baseline activity rises.
    fn exercise_modifier(&self) -> f64 {
        match self {
            Self::Sedentary => 1.25,
            Self::Light => 1.10,
            Self::Moderate => 1.0,
            Self::Active => 0.75,
        }
    }
}

const DIABETES_RR: f64 = 1.80;
const HYPERTENSION_RR: f64 = 1.50;

// ── Profile ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub age:              Age,
    pub sex:              Sex,
    pub bmi:              BmiCategory,
    pub smoking:          SmokingStatus,
    pub has_diabetes:     bool,
    pub has_hypertension: bool,
    pub activity:         ActivityLevel,
}

impl Profile {
    /// Healthy reference person: normal weight, never smoked, no diabetes or
    /// hypertension, moderately active.
    pub fn new(age: Age, sex: Sex) -> Self {
        Self {
            age,
            sex,
            bmi: BmiCategory::Normal,
            smoking: SmokingStatus::Never,
            has_diabetes: false,
            has_hypertension: false,
            activity: ActivityLevel::Moderate,
        }
    }

    pub fn with_bmi(self, bmi: BmiCategory) -> Self {
        Self { bmi, ..self }
    }

    pub fn with_smoking(self, smoking: SmokingStatus) -> Self {
        Self { smoking, ..self }
    }

    pub fn with_diabetes(self, has_diabetes: bool) -> Self {
        Self { has_diabetes, ..self }
    }

    pub fn with_hypertension(self, has_hypertension: bool) -> Self {
        Self { has_hypertension, ..self }
    }

    pub fn with_activity(self, activity: ActivityLevel) -> Self {
        Self { activity, ..self }
    }

    /// `age_sex_bmi_smoking_diabetesFlag_hypertensionFlag_activity`,
    /// e.g. `40_male_obese_never_nondiabetic_normotensive_sedentary`.
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}",
            self.age,
            self.sex.as_str(),
            self.bmi.as_str(),
            self.smoking.as_str(),
            if self.has_diabetes { "diabetic" } else { "nondiabetic" },
            if self.has_hypertension { "hypertensive" } else { "normotensive" },
            self.activity.as_str(),
        )
    }

    pub fn bmi_midpoint(&self) -> f64 {
        self.bmi.midpoint()
    }

    /// Product of the independent relative risks for this profile.
    pub fn baseline_mortality_multiplier(&self) -> f64 {
        let mut m = self.bmi.relative_risk() * self.smoking.relative_risk();
        if self.has_diabetes {
            m *= DIABETES_RR;
        }
        if self.has_hypertension {
            m *= HYPERTENSION_RR;
        }
        m * self.activity.relative_risk()
    }

    /// Multiplier applied to the intervention's log-HR for this person.
    pub fn intervention_effect_modifier(&self, category: InterventionCategory) -> f64 {
        let mut modifier = 1.0;
        match category {
            InterventionCategory::Exercise => {
                if self.bmi.is_obese() {
                    modifier *= 1.15;
                }
                if self.age > 70 {
                    modifier *= 0.90;
                }
                modifier *= self.activity.exercise_modifier();
            }
            InterventionCategory::Diet => {
                if self.bmi.is_obese() {
                    modifier *= 1.20;
                }
                if self.has_diabetes {
                    modifier *= 1.10;
                }
            }
            // Smoking cessation: quitting earlier recovers more.
            InterventionCategory::Substance => {
                if self.age < 40 {
                    modifier *= 1.30;
                } else if self.age > 60 {
                    modifier *= 0.85;
                }
            }
            _ => {}
        }
        modifier
    }
}

// ── Grid ─────────────────────────────────────────────────────────────────────

/// Cartesian set of profiles for precomputation sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileGrid {
    pub ages:         Vec<Age>,
    pub sexes:        Vec<Sex>,
    pub bmi:          Vec<BmiCategory>,
    pub smoking:      Vec<SmokingStatus>,
    pub diabetes:     Vec<bool>,
    pub hypertension: Vec<bool>,
    pub activity:     Vec<ActivityLevel>,
}

impl Default for ProfileGrid {
    fn default() -> Self {
        Self {
            ages:         (25..=80).step_by(5).collect(),
            sexes:        Sex::ALL.to_vec(),
            bmi:          BmiCategory::ALL.to_vec(),
            smoking:      SmokingStatus::ALL.to_vec(),
            diabetes:     vec![false, true],
            hypertension: vec![false, true],
            activity:     ActivityLevel::ALL.to_vec(),
        }
    }
}

impl ProfileGrid {
    /// Grid over the given ages and sexes with every other factor at its
    /// healthy reference value.
    pub fn reference(ages: Vec<Age>, sexes: Vec<Sex>) -> Self {
        Self {
            ages,
            sexes,
            bmi:          vec![BmiCategory::Normal],
            smoking:      vec![SmokingStatus::Never],
            diabetes:     vec![false],
            hypertension: vec![false],
            activity:     vec![ActivityLevel::Moderate],
        }
    }

    pub fn count(&self) -> usize {
        self.ages.len()
            * self.sexes.len()
            * self.bmi.len()
            * self.smoking.len()
            * self.diabetes.len()
            * self.hypertension.len()
            * self.activity.len()
    }

    pub fn profiles(&self) -> Vec<Profile> {
        let mut out = Vec::with_capacity(self.count());
        for &age in &self.ages {
            for &sex in &self.sexes {
                for &bmi in &self.bmi {
                    for &smoking in &self.smoking {
                        for &has_diabetes in &self.diabetes {
                            for &has_hypertension in &self.hypertension {
                                for &activity in &self.activity {
                                    out.push(Profile {
                                        age,
                                        sex,
                                        bmi,
                                        smoking,
                                        has_diabetes,
                                        has_hypertension,
                                        activity,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}
