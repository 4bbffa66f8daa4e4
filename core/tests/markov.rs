//! Markov lifetime simulator: paired arms, state uncertainty and certainty
//! levels.

use qaly_core::{
    life_table::Substrate,
    markov::{
        CertaintyLevel, ConditionTables, HealthState, Individual, KnownConditions, MarkovSettings,
        MarkovSimulator,
    },
    rng::SimRng,
    types::{Condition, Sex},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn fixtures() -> (Substrate, ConditionTables) {
    (Substrate::builtin().unwrap(), ConditionTables::builtin().unwrap())
}

fn settings(n: usize) -> MarkovSettings {
    MarkovSettings { n_simulations: n, ..MarkovSettings::default() }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn health_state_indexing() {
    let state = HealthState::healthy()
        .with(Condition::Diabetes, true)
        .with(Condition::Arthritis, true);
    assert!(state.alive);
    assert!(state.has(Condition::Diabetes));
    assert!(!state.has(Condition::Hypertension));
    assert_eq!(state.condition_count(), 2);
    assert_eq!(state.active().collect::<Vec<_>>(), vec![Condition::Diabetes, Condition::Arthritis]);
}

/// A single lifetime ends by max age and never records more life years than
/// the horizon allows.
#[test]
fn single_lifetime_is_bounded() {
    let (s, c) = fixtures();
    let sim = MarkovSimulator::new(&s, &c);
    let person = Individual::new(60, Sex::Female);
    let outcome = sim.simulate_lifetime(&person, 1.0, 0.03, &mut SimRng::new(3, 0)).unwrap();

    assert!(outcome.life_years >= 1.0 && outcome.life_years <= 40.0);
    assert!(outcome.qalys > 0.0 && outcome.qalys < outcome.life_years);
    if let Some(age) = outcome.death_age {
        assert!((60..100).contains(&age));
    }
    for (_, age) in &outcome.acquired {
        assert!(*age >= 60);
    }
}

/// With HR = 1 both arms replay identical draws, so every paired difference
/// is exactly zero.
#[test]
fn paired_unit_hazard_ratio_gives_exactly_zero() {
    let (s, c) = fixtures();
    let r = MarkovSimulator::new(&s, &c)
        .run_paired(&Individual::new(50, Sex::Male), 1.0, &settings(500))
        .unwrap();
    assert_eq!(r.qaly_gain.mean, 0.0);
    assert_eq!(r.qaly_gain.std, 0.0);
    assert_eq!(r.life_years_gained.mean, 0.0);
    assert_eq!(r.baseline, r.intervention);
}

/// Lower mortality in the same draws can only lengthen a lifetime.
#[test]
fn protective_hazard_ratio_gives_non_negative_paired_gains() {
    let (s, c) = fixtures();
    let sim = MarkovSimulator::new(&s, &c);
    let person = Individual::new(50, Sex::Female);
    let mut rng = SimRng::new(11, 0);
    for _ in 0..200 {
        let pair = sim.simulate_paired(&person, 0.8, 0.03, &mut rng).unwrap();
        assert!(pair.qaly_gain() >= 0.0, "negative paired gain {}", pair.qaly_gain());
        assert!(pair.life_years_gained() >= 0.0);
    }

    let r = sim.run_paired(&person, 0.8, &settings(1_000)).unwrap();
    assert!(r.qaly_gain.mean > 0.0);
    assert!(r.intervention.mean > r.baseline.mean);
}

#[test]
fn invalid_hazard_ratio_is_rejected() {
    let (s, c) = fixtures();
    let sim = MarkovSimulator::new(&s, &c);
    assert!(sim.run_paired(&Individual::new(50, Sex::Male), 0.0, &settings(10)).is_err());
    assert!(sim.run_paired(&Individual::new(50, Sex::Male), f64::NAN, &settings(10)).is_err());
}

/// Existing conditions cost QALYs.
#[test]
fn chronic_conditions_reduce_expected_qalys() {
    let (s, c) = fixtures();
    let sim = MarkovSimulator::new(&s, &c);
    let healthy = Individual::new(55, Sex::Male);
    let sick = Individual::new(55, Sex::Male).with_state(
        HealthState::healthy()
            .with(Condition::Diabetes, true)
            .with(Condition::HeartDisease, true),
    );
    let a = sim.run_paired(&healthy, 1.0, &settings(1_000)).unwrap();
    let b = sim.run_paired(&sick, 1.0, &settings(1_000)).unwrap();
    assert!(b.baseline.mean < a.baseline.mean);
}

/// Knowing that no condition is present narrows the outcome distribution.
#[test]
fn known_state_shrinks_variance() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (s, c) = fixtures();
    let sim = MarkovSimulator::new(&s, &c);
    let unknown = sim
        .simulate_with_state_uncertainty(50, Sex::Male, &KnownConditions::unknown(), 1.0, &settings(2_000))
        .unwrap();
    let known = sim
        .simulate_with_state_uncertainty(50, Sex::Male, &KnownConditions::all_absent(), 1.0, &settings(2_000))
        .unwrap();

    assert!(
        known.qalys.std < unknown.qalys.std,
        "known std {} not below unknown std {}", known.qalys.std, unknown.qalys.std
    );
    assert_eq!(known.frailty_sd, 0.0);
    assert_eq!(known.unknown.len(), 0);
    assert_eq!(unknown.known.len(), 0);
}

#[test]
fn certainty_follows_known_conditions() {
    assert_eq!(CertaintyLevel::from_known(&KnownConditions::unknown()), CertaintyLevel::Low);
    let one = KnownConditions::unknown().with(Condition::Diabetes, false);
    assert_eq!(CertaintyLevel::from_known(&one), CertaintyLevel::Moderate);
    assert_eq!(CertaintyLevel::from_known(&KnownConditions::all_absent()), CertaintyLevel::High);

    let half = KnownConditions::unknown()
        .with(Condition::Diabetes, false)
        .with(Condition::Hypertension, true)
        .with(Condition::HeartDisease, false);
    assert!((half.fraction_unknown() - 0.5).abs() < 1e-12);
}

#[test]
fn outcome_distribution_reports_certainty() {
    let (s, c) = fixtures();
    let known = KnownConditions::unknown().with(Condition::Hypertension, true);
    let d = MarkovSimulator::new(&s, &c)
        .outcome_distribution(65, Sex::Female, &known, 1.0, &settings(300))
        .unwrap();
    assert_eq!(d.certainty, CertaintyLevel::Moderate);
    assert_eq!(d.result.known, vec![Condition::Hypertension]);
    assert_eq!(d.result.n_simulations, 300);
}

#[test]
fn health_state_from_profile_carries_reported_conditions() {
    use qaly_core::profile::Profile;
    let p = Profile::new(50, Sex::Male).with_diabetes(true);
    let state = HealthState::from_profile(&p);
    assert!(state.has(Condition::Diabetes));
    assert!(!state.has(Condition::Hypertension));
    assert_eq!(state.condition_count(), 1);
}

/// Every entry point rejects a discount rate at or below -1 or not finite.
#[test]
fn invalid_discount_rate_is_rejected() {
    let (s, c) = fixtures();
    let sim = MarkovSimulator::new(&s, &c);
    let person = Individual::new(50, Sex::Male);
    for rate in [-1.5, f64::NAN] {
        let bad = MarkovSettings { discount_rate: rate, ..settings(10) };
        let mut rng = SimRng::new(1, 0);
        assert!(sim.simulate_lifetime(&person, 1.0, rate, &mut rng).is_err(), "lifetime accepted {rate}");
        assert!(sim.simulate_paired(&person, 0.8, rate, &mut rng).is_err(), "paired accepted {rate}");
        assert!(sim.run_paired(&person, 0.8, &bad).is_err(), "run_paired accepted {rate}");
        assert!(
            sim.simulate_with_state_uncertainty(50, Sex::Male, &KnownConditions::unknown(), 1.0, &bad).is_err(),
            "state uncertainty accepted {rate}"
        );
        assert!(sim.outcome_distribution(50, Sex::Male, &KnownConditions::unknown(), 1.0, &bad).is_err());
    }
}
