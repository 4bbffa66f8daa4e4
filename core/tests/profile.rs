//! Profile risk model: relative risks, effect modifiers and grids.

use qaly_core::{
    confounding::InterventionCategory,
    profile::{ActivityLevel, BmiCategory, Profile, ProfileGrid, SmokingStatus},
    types::Sex,
};

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn reference_profile_has_unit_multiplier() {
    let p = Profile::new(40, Sex::Male);
    assert_eq!(p.baseline_mortality_multiplier(), 1.0);
    assert_eq!(p.intervention_effect_modifier(InterventionCategory::Exercise), 1.0);
}

#[test]
fn severe_obesity_raises_risk_by_more_than_half() {
    let normal = Profile::new(50, Sex::Female);
    let obese = normal.with_bmi(BmiCategory::SeverelyObese);
    let ratio = obese.baseline_mortality_multiplier() / normal.baseline_mortality_multiplier();
    assert!(ratio > 1.5, "severely obese / normal = {ratio}");
}

#[test]
fn current_smoking_risk_ratio_in_published_range() {
    let never = Profile::new(50, Sex::Male);
    let current = never.with_smoking(SmokingStatus::Current);
    let ratio = current.baseline_mortality_multiplier() / never.baseline_mortality_multiplier();
    assert!((2.5..=3.2).contains(&ratio), "current / never = {ratio}");
}

/// Risk factors combine multiplicatively.
#[test]
fn risk_factors_multiply() {
    let p = Profile::new(60, Sex::Male)
        .with_bmi(BmiCategory::Obese)
        .with_smoking(SmokingStatus::Former)
        .with_diabetes(true)
        .with_hypertension(true)
        .with_activity(ActivityLevel::Sedentary);
    let expected = 1.44 * 1.34 * 1.80 * 1.50 * 1.40;
    assert!((p.baseline_mortality_multiplier() - expected).abs() < 1e-12);
}

#[test]
fn profile_key_format() {
    let p = Profile::new(40, Sex::Male);
    assert_eq!(p.key(), "40_male_normal_never_nondiabetic_normotensive_moderate");

    let q = Profile::new(65, Sex::Female)
        .with_bmi(BmiCategory::SeverelyObese)
        .with_smoking(SmokingStatus::Current)
        .with_diabetes(true)
        .with_hypertension(true)
        .with_activity(ActivityLevel::Sedentary);
    assert_eq!(q.key(), "65_female_severely_obese_current_diabetic_hypertensive_sedentary");
}

/// Exercise helps sedentary and obese people more, and the elderly and the
/// already active less.
#[test]
fn exercise_modifier_tracks_baseline_activity() {
    let base = Profile::new(45, Sex::Male);
    let modifier = |p: Profile| p.intervention_effect_modifier(InterventionCategory::Exercise);

    assert!(modifier(base.with_activity(ActivityLevel::Sedentary)) > modifier(base));
    assert!(modifier(base.with_activity(ActivityLevel::Active)) < modifier(base));
    assert!((modifier(base.with_bmi(BmiCategory::Obese)) - 1.15).abs() < 1e-12);
    assert!((modifier(Profile::new(75, Sex::Male)) - 0.90).abs() < 1e-12);
}

#[test]
fn smoking_cessation_favours_the_young() {
    let modifier = |age| Profile::new(age, Sex::Female).intervention_effect_modifier(InterventionCategory::Substance);
    assert!(modifier(30) > modifier(50));
    assert!(modifier(50) > modifier(70));
}

#[test]
fn categories_without_modifiers_are_neutral() {
    let p = Profile::new(70, Sex::Female)
        .with_bmi(BmiCategory::Obese)
        .with_diabetes(true)
        .with_activity(ActivityLevel::Sedentary);
    for category in [InterventionCategory::Sleep, InterventionCategory::Medical, InterventionCategory::Social] {
        assert_eq!(p.intervention_effect_modifier(category), 1.0, "{category}");
    }
}

#[test]
fn default_grid_covers_every_combination() {
    let grid = ProfileGrid::default();
    assert_eq!(grid.count(), 4608);
    let profiles = grid.profiles();
    assert_eq!(profiles.len(), 4608);

    let mut keys: Vec<String> = profiles.iter().map(Profile::key).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 4608, "profile keys must be unique");
}

#[test]
fn reference_grid_fixes_risk_factors() {
    let grid = ProfileGrid::reference(vec![30, 50], Sex::ALL.to_vec());
    let profiles = grid.profiles();
    assert_eq!(profiles.len(), 4);
    assert!(profiles.iter().all(|p| p.baseline_mortality_multiplier() == 1.0));
}
