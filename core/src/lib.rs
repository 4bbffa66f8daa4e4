//! Lifetime QALY simulation core.
//!
//! Turns a person's demographic and risk-factor profile plus an
//! intervention's hazard-ratio evidence into distributions of
//! quality-adjusted life years gained.
//!
//! Layers, leaves first:
//!   1. `life_table`  : mortality, cause-of-death and quality schedules
//!   2. `confounding` : causal-fraction priors and hazard-ratio shrinkage
//!   3. `profile`     : baseline mortality multipliers and effect modifiers
//!   4. `lifecycle`   : deterministic year-by-year integration
//!   5. `monte_carlo` : vectorized uncertainty propagation
//!   6. `markov`      : stochastic chronic-condition state transitions

pub mod baseline;
pub mod config;
pub mod confounding;
pub mod distribution;
pub mod error;
pub mod intervention;
pub mod life_table;
pub mod lifecycle;
pub mod markov;
pub mod monte_carlo;
pub mod precompute;
pub mod profile;
pub mod rng;
pub mod stats;
pub mod types;
pub mod updating;
