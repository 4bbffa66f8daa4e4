//! Confounding adjustment: Beta priors, HR shrinkage and E-values.

use qaly_core::{
    confounding::{adjust_hr, e_value, ConfoundingPrior, EvidenceType, InterventionCategory, Robustness},
    distribution::HazardDistribution,
    error::SimError,
    intervention::Intervention,
    rng::SimRng,
};

// ── Tests ────────────────────────────────────────────────────────────────────

/// cf = 1 returns the observed HR, cf = 0 returns 1.
#[test]
fn adjust_hr_boundaries() {
    for hr in [0.5, 0.8, 1.0, 1.3, 2.0] {
        assert_eq!(adjust_hr(hr, 1.0), hr, "cf=1 must be identity for hr={hr}");
        assert_eq!(adjust_hr(hr, 0.0), 1.0, "cf=0 must null hr={hr}");
    }
}

/// For a protective HR the adjusted HR shrinks toward 1 as cf falls, and
/// never crosses it.
#[test]
fn adjust_hr_moves_monotonically_toward_one() {
    let hr = 0.7;
    let mut previous = adjust_hr(hr, 1.0);
    for step in (0..10).rev() {
        let cf = step as f64 / 10.0;
        let adjusted = adjust_hr(hr, cf);
        assert!(adjusted >= previous, "cf={cf}: {adjusted} < {previous}");
        assert!(adjusted <= 1.0);
        previous = adjusted;
    }
}

/// Beta(2.5, 5) has mean 1/3.
#[test]
fn beta_prior_moments() {
    let prior = ConfoundingPrior::new(2.5, 5.0).unwrap();
    assert!((prior.mean() - 1.0 / 3.0).abs() < 1e-12);
    let expected_var = 2.5 * 5.0 / (7.5 * 7.5 * 8.5);
    assert!((prior.variance() - expected_var).abs() < 1e-12);

    let samples = prior.sample(20_000, &mut SimRng::new(7, 0)).unwrap();
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    assert!((mean - 1.0 / 3.0).abs() < 0.01, "sample mean {mean}");
    assert!(samples.iter().all(|cf| (0.0..=1.0).contains(cf)));
}

#[test]
fn credible_interval_brackets_the_mean() {
    for category in InterventionCategory::ALL {
        let prior = ConfoundingPrior::for_category(category);
        let (lo, hi) = prior.credible_interval(0.95).unwrap();
        assert!(lo < prior.mean() && prior.mean() < hi, "{category}: [{lo}, {hi}]");
        assert!(lo >= 0.0 && hi <= 1.0);
        assert!(!prior.rationale.is_empty(), "{category} prior has no rationale");
    }
}

/// Evidence quality scales alpha only.
#[test]
fn evidence_scales_alpha_and_keeps_beta() {
    let base = ConfoundingPrior::for_category(InterventionCategory::Exercise);
    let rct = base.with_evidence(EvidenceType::Rct);
    let cohort = base.with_evidence(EvidenceType::Cohort);

    assert_eq!(rct.beta, base.beta);
    assert_eq!(cohort.beta, base.beta);
    assert!((rct.alpha - base.alpha * 1.5).abs() < 1e-12);
    assert!(rct.mean() > base.mean() && base.mean() > cohort.mean());
}

#[test]
fn non_positive_prior_parameters_are_rejected() {
    assert!(matches!(ConfoundingPrior::new(0.0, 1.0), Err(SimError::InvalidPrior { .. })));
    assert!(matches!(ConfoundingPrior::new(2.0, -1.0), Err(SimError::InvalidPrior { .. })));
}

/// An explicit prior override must be a Beta distribution.
#[test]
fn non_beta_override_is_rejected() {
    let result = Intervention::builder("walking", InterventionCategory::Exercise)
        .hazard_ratio(HazardDistribution::Point { value: 0.8 })
        .confounding_prior(HazardDistribution::Normal { mean: 0.5, sd: 0.1 })
        .build();
    assert!(matches!(result, Err(SimError::PriorNotBeta { .. })), "got {result:?}");

    let accepted = Intervention::builder("walking", InterventionCategory::Exercise)
        .hazard_ratio(HazardDistribution::Point { value: 0.8 })
        .confounding_prior(HazardDistribution::Beta { alpha: 4.0, beta: 4.0 })
        .build()
        .unwrap();
    assert_eq!(accepted.confounding_prior().mean(), 0.5);
}

#[test]
fn category_names_round_trip() {
    for category in InterventionCategory::ALL {
        let parsed: InterventionCategory = category.as_str().parse().unwrap();
        assert_eq!(parsed, category);
    }
    assert!("astrology".parse::<InterventionCategory>().is_err());
}

#[test]
fn e_value_of_null_effect_is_one() {
    let e = e_value(1.0).unwrap();
    assert_eq!(e.value, 1.0);
    assert_eq!(e.robustness, Robustness::VerySusceptible);
}

/// Protective and harmful HRs of the same size give the same E-value, and
/// stronger effects are more robust.
#[test]
fn e_value_is_symmetric_and_monotone() {
    let protective = e_value(0.5).unwrap();
    let harmful = e_value(2.0).unwrap();
    assert!((protective.value - harmful.value).abs() < 1e-12);
    assert!((harmful.value - (2.0 + (2.0_f64).sqrt())).abs() < 1e-12);
    assert_eq!(harmful.robustness, Robustness::Robust);

    assert!(e_value(0.9).unwrap().value < e_value(0.7).unwrap().value);
    assert!(e_value(0.0).is_err());
}

#[test]
fn robustness_bands() {
    assert_eq!(Robustness::from_e_value(1.2), Robustness::VerySusceptible);
    assert_eq!(Robustness::from_e_value(1.7), Robustness::ModeratelyRobust);
    assert_eq!(Robustness::from_e_value(2.5), Robustness::ReasonablyRobust);
    assert_eq!(Robustness::from_e_value(3.0), Robustness::Robust);
    assert!(Robustness::Robust.description().starts_with("Robust"));
}

/// Rebuilding from an existing intervention keeps its evidence and prior.
#[test]
fn builder_from_intervention_keeps_components() {
    use qaly_core::intervention::InterventionBuilder;
    let base = Intervention::builder("statins", InterventionCategory::Medical)
        .hazard_ratio(HazardDistribution::Point { value: 0.85 })
        .evidence(EvidenceType::Rct)
        .confounding_prior(HazardDistribution::Beta { alpha: 8.0, beta: 2.0 })
        .build()
        .unwrap();
    let copy = InterventionBuilder::from_intervention(&base).id("statins_v2").build().unwrap();
    assert_eq!(copy.id, "statins_v2");
    assert_eq!(copy.name, base.name);
    assert_eq!(copy.mortality, base.mortality);
    assert_eq!(copy.confounding_prior().alpha, 8.0);
}
