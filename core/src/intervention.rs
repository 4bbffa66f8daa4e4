//! Interventions as the core sees them: a category, an optional mortality
//! effect, and an optional confounding-prior override.
//!
//! Values are immutable once built. Deriving a variant (a stronger dose, a
//! combined programme) goes through `InterventionBuilder::from_intervention`,
//! which copies components into a fresh builder instead of mutating a clone.

use crate::confounding::{ConfoundingPrior, EvidenceType, InterventionCategory};
use crate::distribution::HazardDistribution;
use crate::error::SimResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityEffect {
    /// Overall all-cause hazard ratio as reported by the source study.
    pub hazard_ratio: HazardDistribution,
    pub evidence:     Option<EvidenceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id:             String,
    pub name:           String,
    pub category:       InterventionCategory,
    pub mortality:      Option<MortalityEffect>,
    pub prior_override: Option<ConfoundingPrior>,
}

impl Intervention {
    pub fn builder(id: &str, category: InterventionCategory) -> InterventionBuilder {
        InterventionBuilder::new(id, category)
    }

    /// Prior used for the causal fraction: the explicit override if one was
    /// given, otherwise the category prior adjusted for study design.
    pub fn confounding_prior(&self) -> ConfoundingPrior {
        if let Some(prior) = &self.prior_override {
            return prior.clone();
        }
        let prior = ConfoundingPrior::for_category(self.category);
        match self.mortality.as_ref().and_then(|m| m.evidence) {
            Some(evidence) => prior.with_evidence(evidence),
            None => prior,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterventionBuilder {
    id:             String,
    name:           Option<String>,
    category:       InterventionCategory,
    hazard_ratio:   Option<HazardDistribution>,
    evidence:       Option<EvidenceType>,
    prior_override: Option<HazardDistribution>,
}

impl InterventionBuilder {
    pub fn new(id: &str, category: InterventionCategory) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            category,
            hazard_ratio: None,
            evidence: None,
            prior_override: None,
        }
    }

    /// Seed a builder with every component of an existing intervention.
    pub fn from_intervention(base: &Intervention) -> Self {
        Self {
            id:             base.id.clone(),
            name:           Some(base.name.clone()),
            category:       base.category,
            hazard_ratio:   base.mortality.as_ref().map(|m| m.hazard_ratio.clone()),
            evidence:       base.mortality.as_ref().and_then(|m| m.evidence),
            prior_override: base.prior_override.as_ref().map(|p| HazardDistribution::Beta {
                alpha: p.alpha,
                beta:  p.beta,
            }),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn hazard_ratio(mut self, dist: HazardDistribution) -> Self {
        self.hazard_ratio = Some(dist);
        self
    }

    pub fn evidence(mut self, evidence: EvidenceType) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Override the category prior. Must be a beta distribution.
    pub fn confounding_prior(mut self, dist: HazardDistribution) -> Self {
        self.prior_override = Some(dist);
        self
    }

    pub fn build(self) -> SimResult<Intervention> {
        let mortality = match self.hazard_ratio {
            Some(hazard_ratio) => {
                hazard_ratio.validate()?;
                Some(MortalityEffect { hazard_ratio, evidence: self.evidence })
            }
            None => None,
        };
        let prior_override = self
            .prior_override
            .as_ref()
            .map(ConfoundingPrior::from_distribution)
            .transpose()?;

        Ok(Intervention {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            category: self.category,
            mortality,
            prior_override,
        })
    }
}
