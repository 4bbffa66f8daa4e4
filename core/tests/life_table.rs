//! Life-table substrate: interpolation, clamping and schedule invariants.

use qaly_core::{
    config::{CauseFractionAnchor, SimConfig},
    life_table::Substrate,
    types::Sex,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn substrate() -> Substrate {
    Substrate::builtin().unwrap()
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("qaly_core_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// cvd + cancer + other must equal 1 at every age, including between anchors
/// and outside the anchor range.
#[test]
fn cause_fractions_sum_to_one_at_every_age() {
    let s = substrate();
    for age in 0..=110 {
        let f = s.cause_fraction(age);
        assert!(
            (f.total() - 1.0).abs() < 1e-6,
            "age {age}: fractions sum to {}", f.total()
        );
    }
}

/// Past early adulthood quality weights never increase with age.
#[test]
fn quality_weights_are_non_increasing_in_adulthood() {
    let s = substrate();
    for age in 18..110 {
        let (a, b) = (s.quality_weight(age), s.quality_weight(age + 1));
        assert!(a >= b, "quality weight rose from {a} at {age} to {b} at {}", age + 1);
        assert!(b > 0.0 && b <= 1.0, "weight {b} out of (0, 1]");
    }
}

/// Lookups on anchor ages return the anchor values exactly.
#[test]
fn anchor_ages_return_anchor_values_exactly() {
    let config = SimConfig::builtin();
    let s = substrate();

    for (age, qx) in &config.life_tables.male {
        assert_eq!(s.mortality_rate(*age as u32, Sex::Male), *qx, "male qx at {age}");
    }
    for (age, qx) in &config.life_tables.female {
        assert_eq!(s.mortality_rate(*age as u32, Sex::Female), *qx, "female qx at {age}");
    }
    for (age, w) in &config.quality_weights.anchors {
        assert_eq!(s.quality_weight(*age as u32), *w, "quality weight at {age}");
    }
    for a in &config.cause_fractions.anchors {
        let f = s.cause_fraction(a.age as u32);
        assert_eq!((f.cvd, f.cancer, f.other), (a.cvd, a.cancer, a.other), "fractions at {}", a.age);
    }
}

/// Between anchors mortality is log-linear: the midpoint of two anchors five
/// years apart is not the arithmetic mean but sits between them.
#[test]
fn mortality_interpolates_log_linearly() {
    let s = substrate();
    let (q40, q45) = (s.mortality_rate(40, Sex::Male), s.mortality_rate(45, Sex::Male));
    let q42 = s.mortality_rate(42, Sex::Male);
    let expected = (q40.ln() + 0.4 * (q45.ln() - q40.ln())).exp();
    assert!((q42 - expected).abs() < 1e-12, "q42={q42} expected {expected}");
    assert!(q40 < q42 && q42 < q45);
}

/// Ages outside the anchors clamp to the nearest anchor.
#[test]
fn out_of_range_ages_clamp() {
    let s = substrate();
    assert_eq!(s.mortality_rate(120, Sex::Male), s.mortality_rate(100, Sex::Male));
    assert_eq!(s.quality_weight(5), s.quality_weight(25));
    assert_eq!(s.quality_weight(105), s.quality_weight(95));
    assert_eq!(s.cause_fraction(20), s.cause_fraction(40));
}

/// Female mortality is below male at every adult anchor.
#[test]
fn female_mortality_below_male() {
    let s = substrate();
    for age in (20..=95).step_by(5) {
        assert!(
            s.mortality_rate(age, Sex::Female) < s.mortality_rate(age, Sex::Male),
            "female qx not below male at {age}"
        );
    }
}

/// A cause-fraction anchor that does not sum to one is rejected up front.
#[test]
fn unbalanced_cause_fractions_are_rejected() {
    let mut config = SimConfig::builtin();
    config.cause_fractions.anchors[0] = CauseFractionAnchor { age: 40.0, cvd: 0.5, cancer: 0.5, other: 0.5 };
    assert!(config.validate().is_err());
    assert!(Substrate::from_config(&config).is_err());
}

/// Files present in the data directory override the built-in tables; absent
/// files fall back.
#[test]
fn load_reads_present_files_and_falls_back_for_missing() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir("config_load");
    std::fs::write(
        dir.join("quality_weights.json"),
        r#"{"anchors": [[20.0, 0.95], [100.0, 0.60]]}"#,
    )
    .unwrap();

    let config = SimConfig::load(dir.to_str().unwrap()).unwrap();
    assert_eq!(config.quality_weights.anchors, vec![(20.0, 0.95), (100.0, 0.60)]);
    assert_eq!(config.life_tables.male, SimConfig::builtin().life_tables.male);

    let s = Substrate::from_config(&config).unwrap();
    assert!((s.quality_weight(60) - 0.775).abs() < 1e-12);

    std::fs::write(
        dir.join("cause_fractions.json"),
        r#"{"anchors": [{"age": 50.0, "cvd": 0.9, "cancer": 0.9, "other": 0.9}]}"#,
    )
    .unwrap();
    assert!(SimConfig::load(dir.to_str().unwrap()).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
