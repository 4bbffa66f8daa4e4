//! Shared primitive types used across the simulation core.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Age in whole years.
pub type Age = u32;

/// Integration horizon. Nobody is simulated past this age.
pub const MAX_AGE: Age = 100;

/// Annual discount rate the baseline table is computed at.
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.03;

/// Hard cap on any annual probability of death.
pub const MAX_ANNUAL_MORTALITY: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cause-of-death pathways an intervention can act through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pathway {
    Cvd,
    Cancer,
    Other,
}

impl Pathway {
    pub const ALL: [Pathway; 3] = [Pathway::Cvd, Pathway::Cancer, Pathway::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cvd => "cvd",
            Self::Cancer => "cancer",
            Self::Other => "other",
        }
    }
}

/// One value per pathway: cause-of-death fractions, QALY contributions,
/// pathway-strength exponents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PathwayValues {
    pub cvd:    f64,
    pub cancer: f64,
    pub other:  f64,
}

impl PathwayValues {
    pub fn new(cvd: f64, cancer: f64, other: f64) -> Self {
        Self { cvd, cancer, other }
    }

    pub fn get(&self, pathway: Pathway) -> f64 {
        match pathway {
            Pathway::Cvd => self.cvd,
            Pathway::Cancer => self.cancer,
            Pathway::Other => self.other,
        }
    }

    pub fn total(&self) -> f64 {
        self.cvd + self.cancer + self.other
    }
}

/// Pathway-specific hazard ratios. 1.0 = no effect, < 1.0 protective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathwayHazardRatios {
    pub cvd:    f64,
    pub cancer: f64,
    pub other:  f64,
}

impl PathwayHazardRatios {
    pub const NEUTRAL: PathwayHazardRatios = PathwayHazardRatios {
        cvd:    1.0,
        cancer: 1.0,
        other:  1.0,
    };

    pub fn new(cvd: f64, cancer: f64, other: f64) -> Self {
        Self { cvd, cancer, other }
    }

    /// Derive pathway ratios from a single overall ratio by raising it to
    /// each pathway's strength exponent.
    pub fn from_overall(hr: f64, exponents: &PathwayValues) -> Self {
        Self {
            cvd:    hr.powf(exponents.cvd),
            cancer: hr.powf(exponents.cancer),
            other:  hr.powf(exponents.other),
        }
    }

    pub fn get(&self, pathway: Pathway) -> f64 {
        match pathway {
            Pathway::Cvd => self.cvd,
            Pathway::Cancer => self.cancer,
            Pathway::Other => self.other,
        }
    }

    /// Cause-weighted relative risk: Σ cause_fraction[p] × HR[p].
    pub fn weighted(&self, fractions: &PathwayValues) -> f64 {
        fractions.cvd * self.cvd + fractions.cancer * self.cancer + fractions.other * self.other
    }

    pub fn validate(&self) -> SimResult<()> {
        for pathway in Pathway::ALL {
            let hr = self.get(pathway);
            if !hr.is_finite() || hr <= 0.0 {
                return Err(SimError::InvalidInput(format!(
                    "{} hazard ratio must be positive and finite, got {hr}",
                    pathway.as_str()
                )));
            }
        }
        Ok(())
    }
}

/// Tracked chronic conditions. Discriminants index `HealthState` arrays.
/// NEVER reorder: the order fixes each condition's slot in per-year draw arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Diabetes = 0,
    Hypertension = 1,
    HeartDisease = 2,
    Stroke = 3,
    Cancer = 4,
    Arthritis = 5,
}

impl Condition {
    pub const COUNT: usize = 6;

    pub const ALL: [Condition; Condition::COUNT] = [
        Condition::Diabetes,
        Condition::Hypertension,
        Condition::HeartDisease,
        Condition::Stroke,
        Condition::Cancer,
        Condition::Arthritis,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes",
            Self::Hypertension => "hypertension",
            Self::HeartDisease => "heart_disease",
            Self::Stroke => "stroke",
            Self::Cancer => "cancer",
            Self::Arthritis => "arthritis",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
