//! Precomputed baseline table.
//!
//! Remaining life expectancy and remaining discounted QALYs for every
//! integer age 0..=max_age and both sexes, integrated once with neutral
//! hazard ratios at the default discount rate.
//!
//! Lifecycle: build once (`compute` or `load_or_compute`), then hand a
//! reference to `LifecycleModel::with_baseline_table`. The table is only
//! consulted for default-discount, unadjusted baselines; everything else
//! takes the full integration path.
//!
//! On-disk layout:
//!   {"life_expectancy": {"male": {"40": 38.1, ...}, "female": {...}},
//!    "remaining_qalys": {...}}

use crate::error::SimResult;
use crate::life_table::Substrate;
use crate::lifecycle::{BaselineTotals, LifecycleModel};
use crate::types::{Age, Sex};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineTable {
    pub life_expectancy: BTreeMap<Sex, BTreeMap<Age, f64>>,
    pub remaining_qalys: BTreeMap<Sex, BTreeMap<Age, f64>>,
}

impl BaselineTable {
    pub fn compute(substrate: &Substrate) -> Self {
        let model = LifecycleModel::new(substrate);
        let rate = substrate.model.default_discount_rate;
        let mut table = Self::default();

        for sex in Sex::ALL {
            let rows: Vec<(Age, BaselineTotals)> = (0..=substrate.model.max_age)
                .into_par_iter()
                .map(|age| (age, model.integrate_baseline(age, sex, rate, 1.0)))
                .collect();
            table.life_expectancy.insert(sex, rows.iter().map(|(a, t)| (*a, t.life_years)).collect());
            table.remaining_qalys.insert(sex, rows.iter().map(|(a, t)| (*a, t.qalys)).collect());
        }
        info!("baseline: computed {} ages x {} sexes", substrate.model.max_age + 1, Sex::ALL.len());
        table
    }

    /// `None` for ages the table does not cover.
    pub fn lookup(&self, age: Age, sex: Sex) -> Option<BaselineTotals> {
        let life_years = *self.life_expectancy.get(&sex)?.get(&age)?;
        let qalys = *self.remaining_qalys.get(&sex)?.get(&age)?;
        Some(BaselineTotals { life_years, qalys })
    }

    pub fn len(&self) -> usize {
        self.life_expectancy.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self, path: &Path) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load the table from `path`, or compute it if the file is missing or
    /// unreadable. Never fails.
    pub fn load_or_compute(path: &Path, substrate: &Substrate) -> Self {
        match Self::load(path) {
            Ok(table) if !table.is_empty() => table,
            Ok(_) => {
                warn!("baseline: {} is empty, computing", path.display());
                Self::compute(substrate)
            }
            Err(e) => {
                warn!("baseline: cannot load {}: {e}, computing", path.display());
                Self::compute(substrate)
            }
        }
    }
}
